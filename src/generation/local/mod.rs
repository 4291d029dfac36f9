// Local generation
// Bounded autoregressive decoding over an in-process causal language model


#[cfg(feature = "local-llm")]
mod candle;

#[cfg(feature = "local-llm")]
pub use candle::CandleModel;

use tracing::{debug, info};

use super::Generator;
use crate::config::LocalModelConfig;
use crate::{RagError, Result};

/// Token-level interface to a causal language model.
///
/// `next_token` is handed only the tokens the model has not seen yet, with
/// `position` being the offset of the first of them in the whole sequence.
/// Position 0 starts a new sequence.
pub trait CausalModel {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn next_token(&mut self, tokens: &[u32], position: usize) -> Result<u32>;

    fn decode(&self, tokens: &[u32], skip_special_tokens: bool) -> Result<String>;

    fn is_eos(&self, token: u32) -> bool;
}

/// Sampling settings for the next-token distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    /// `None` selects the most likely token every step
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub seed: u64,
}

impl From<&LocalModelConfig> for SamplingConfig {
    #[inline]
    fn from(config: &LocalModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            seed: config.seed,
        }
    }
}

/// Generator that runs a [`CausalModel`] for at most `max_new_tokens` steps
#[derive(Debug)]
pub struct LocalGenerator<M> {
    model: M,
    max_new_tokens: usize,
}

impl<M: CausalModel> LocalGenerator<M> {
    #[inline]
    pub fn new(model: M, max_new_tokens: usize) -> Self {
        Self {
            model,
            max_new_tokens,
        }
    }

    #[inline]
    pub fn max_new_tokens(&self) -> usize {
        self.max_new_tokens
    }

    #[inline]
    pub fn into_model(self) -> M {
        self.model
    }
}

impl<M: CausalModel> Generator for LocalGenerator<M> {
    fn generate(&mut self, prompt: &str) -> Result<String> {
        let prompt_tokens = self.model.encode(prompt)?;
        if prompt_tokens.is_empty() {
            return Err(RagError::GenerationRuntime(
                "prompt encoded to no tokens".to_string(),
            ));
        }

        debug!(
            "Generating up to {} tokens after a {}-token prompt",
            self.max_new_tokens,
            prompt_tokens.len()
        );

        let mut generated = Vec::with_capacity(self.max_new_tokens);
        let mut pending = prompt_tokens;
        let mut position = 0;

        while generated.len() < self.max_new_tokens {
            let token = self.model.next_token(&pending, position)?;
            if self.model.is_eos(token) {
                debug!("End of sequence after {} tokens", generated.len());
                break;
            }

            position += pending.len();
            generated.push(token);
            pending = vec![token];
        }

        let text = self.model.decode(&generated, true)?;
        info!("Generated {} tokens locally", generated.len());

        Ok(clean_output(&text))
    }
}

/// Drop control characters other than line breaks and tabs, then trim
pub(crate) fn clean_output(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();
    cleaned.trim().to_string()
}
