#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::Generator;
use crate::config::GenerationConfig;
use crate::http::HttpClient;
use crate::{RagError, Result};

/// Generator backed by an Ollama-compatible `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    endpoint: Url,
    model: String,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;
        let http = HttpClient::new(config.timeout()).with_retry_attempts(config.retry_attempts);

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            http,
        })
    }

    #[inline]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.http = self.http.with_retry_delay(delay);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Generator for OllamaGenerator {
    fn generate(&mut self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        debug!(
            "Requesting completion from {} with model {} ({} prompt chars)",
            self.endpoint,
            self.model,
            prompt.chars().count()
        );

        let body = self
            .http
            .post_json(&self.endpoint, &request)
            .map_err(|e| RagError::GenerationService(format!("{:#}", e)))?;

        let response: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            RagError::GenerationService(format!("Unexpected response from {}: {}", self.endpoint, e))
        })?;

        info!("Received {} chars from {}", response.response.len(), self.model);
        Ok(response.response)
    }
}
