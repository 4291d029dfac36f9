use candle_core::quantized::gguf_file;
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_qwen2::ModelWeights;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::{CausalModel, SamplingConfig};
use crate::config::LocalModelConfig;
use crate::{RagError, Result};

const HUB_REVISION: &str = "main";
const TOKENIZER_FILE: &str = "tokenizer.json";

fn runtime_error(context: &str, error: impl std::fmt::Display) -> RagError {
    RagError::GenerationRuntime(format!("{}: {}", context, error))
}

/// Quantized Qwen2 checkpoint (GGUF) with its tokenizer, run through candle
pub struct CandleModel {
    weights: ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    logits_processor: LogitsProcessor,
    eos_token_ids: Vec<u32>,
}

impl std::fmt::Debug for CandleModel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleModel")
            .field("device", &self.device)
            .field("eos_token_ids", &self.eos_token_ids)
            .finish_non_exhaustive()
    }
}

impl CandleModel {
    /// Load weights and tokenizer from local paths, downloading from the
    /// Hugging Face hub whatever is not given as a path
    pub fn load(config: &LocalModelConfig) -> Result<Self> {
        let device = select_device(config.cpu)?;

        let weights_path = match &config.weights_path {
            Some(path) => path.clone(),
            None => fetch_from_hub(&config.repo, &config.weights_file)?,
        };
        let tokenizer_path = match &config.tokenizer_path {
            Some(path) => path.clone(),
            None => fetch_from_hub(&config.tokenizer_repo, TOKENIZER_FILE)?,
        };

        let weights = load_weights(&weights_path, &device)?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            runtime_error(
                &format!("Failed to load tokenizer {}", tokenizer_path.display()),
                e,
            )
        })?;

        let eos_token_ids: Vec<u32> = config
            .eos_tokens
            .iter()
            .filter_map(|token| tokenizer.token_to_id(token))
            .collect();
        if eos_token_ids.is_empty() {
            warn!(
                "None of the end-of-sequence tokens {:?} are in the vocabulary; generation will run to the token limit",
                config.eos_tokens
            );
        }

        Ok(Self {
            weights,
            tokenizer,
            device,
            logits_processor: logits_processor(&SamplingConfig::from(config)),
            eos_token_ids,
        })
    }
}

impl CausalModel for CandleModel {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| runtime_error("Failed to tokenize prompt", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn next_token(&mut self, tokens: &[u32], position: usize) -> Result<u32> {
        let input = Tensor::new(tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| runtime_error("Failed to build input tensor", e))?;
        let logits = self
            .weights
            .forward(&input, position)
            .and_then(|l| l.squeeze(0))
            .map_err(|e| runtime_error("Forward pass failed", e))?;
        self.logits_processor
            .sample(&logits)
            .map_err(|e| runtime_error("Sampling failed", e))
    }

    fn decode(&self, tokens: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.tokenizer
            .decode(tokens, skip_special_tokens)
            .map_err(|e| runtime_error("Failed to decode tokens", e))
    }

    #[inline]
    fn is_eos(&self, token: u32) -> bool {
        self.eos_token_ids.contains(&token)
    }
}

fn select_device(cpu: bool) -> Result<Device> {
    let device = if cpu {
        Device::Cpu
    } else if cuda_is_available() {
        Device::new_cuda(0).map_err(|e| runtime_error("Failed to open CUDA device", e))?
    } else if metal_is_available() {
        Device::new_metal(0).map_err(|e| runtime_error("Failed to open Metal device", e))?
    } else {
        info!("No GPU backend compiled in, running on CPU");
        Device::Cpu
    };
    debug!("Using device {:?}", device);
    Ok(device)
}

fn fetch_from_hub(repo: &str, file: &str) -> Result<PathBuf> {
    info!("Fetching {} from {}", file, repo);
    let api = candle_hf_hub::api::sync::Api::new()
        .map_err(|e| runtime_error("Failed to open Hugging Face hub cache", e))?;
    api.repo(candle_hf_hub::Repo::with_revision(
        repo.to_string(),
        candle_hf_hub::RepoType::Model,
        HUB_REVISION.to_string(),
    ))
    .get(file)
    .map_err(|e| runtime_error(&format!("Failed to fetch {} from {}", file, repo), e))
}

fn load_weights(path: &Path, device: &Device) -> Result<ModelWeights> {
    let start = Instant::now();
    let mut file = File::open(path)
        .map_err(|e| runtime_error(&format!("Failed to open {}", path.display()), e))?;
    let content = gguf_file::Content::read(&mut file)
        .map_err(|e| runtime_error(&format!("Failed to read {}", path.display()), e))?;
    let tensor_count = content.tensor_infos.len();

    let weights = ModelWeights::from_gguf(content, &mut file, device)
        .map_err(|e| runtime_error("Failed to load model weights", e))?;

    info!(
        "Loaded {} tensors from {} in {:.2}s",
        tensor_count,
        path.display(),
        start.elapsed().as_secs_f32()
    );
    Ok(weights)
}

fn logits_processor(sampling: &SamplingConfig) -> LogitsProcessor {
    let strategy = match (sampling.temperature, sampling.top_p) {
        (None, _) => Sampling::ArgMax,
        (Some(temperature), _) if temperature <= 0.0 => Sampling::ArgMax,
        (Some(temperature), None) => Sampling::All { temperature },
        (Some(temperature), Some(p)) => Sampling::TopP { p, temperature },
    };
    LogitsProcessor::from_sampling(sampling.seed, strategy)
}
