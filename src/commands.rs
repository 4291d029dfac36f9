use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::{RagError, Result};
use crate::config::Config;
use crate::embeddings::{ChunkingConfig, Embedder, OllamaClient, split_records};
use crate::generation::{self, Generator, OllamaGenerator};
use crate::index::{DistanceMetric, VectorIndex};
use crate::records::load_records;
use crate::retrieval::Retriever;

/// Chunk and embed the records at `records_path`, then save the index to `index_path`.
///
/// Nothing is written unless every chunk embeds successfully.
#[inline]
pub fn build_index_with<E: Embedder + ?Sized>(
    records_path: &Path,
    index_path: &Path,
    chunking: &ChunkingConfig,
    metric: DistanceMetric,
    embedder: &E,
    show_progress: bool,
) -> Result<VectorIndex> {
    let records = load_records(records_path)?;
    let chunks = split_records(&records, chunking)?;
    info!(
        "Split {} records into {} chunks",
        records.len(),
        chunks.len()
    );

    let bar = if show_progress {
        ProgressBar::new(chunks.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}")
                .context("Invalid progress bar template")?,
        )
    } else {
        ProgressBar::hidden()
    };

    let index = VectorIndex::build_with_progress(chunks, embedder, metric, |done| {
        bar.set_position(done as u64);
    });
    bar.finish_and_clear();
    let index = index?;

    index.save(index_path)?;
    info!("Saved index to {}", index_path.display());

    Ok(index)
}

/// Build the index from a record feed using the configured Ollama embedder
#[inline]
pub async fn build_index(config: Config, records_path: &Path) -> Result<()> {
    let records_path = records_path.to_path_buf();

    let index = tokio::task::spawn_blocking(move || -> Result<VectorIndex> {
        let client = OllamaClient::new(&config.embedding)?;
        client.health_check().map_err(|e| {
            RagError::Embedding(format!("Ollama embedding service is not ready: {:#}", e))
        })?;

        build_index_with(
            &records_path,
            &config.index_path(),
            &config.chunking,
            config.index.metric,
            &client,
            true,
        )
    })
    .await
    .context("Index build task failed")??;

    let metadata = index.metadata();
    println!(
        "Indexed {} chunks with {} ({} dimensions, {} distance)",
        metadata.chunk_count, metadata.embedding_model_id, metadata.dimension, metadata.metric
    );
    Ok(())
}

/// Load the configured index and render the prompt for `question`
#[inline]
pub fn prepare_prompt(config: &Config, question: &str) -> Result<String> {
    let client = OllamaClient::new(&config.embedding)?;
    let index = VectorIndex::load(config.index_path(), client.model_id(), client.dimension())?;
    let retriever = Retriever::new(&index, &client, config.index.top_k)?;
    generation::build_prompt(question, &retriever)
}

/// Run a blocking generation job on the blocking pool, failing with the error
/// built by `on_timeout` if it does not finish within `timeout`
#[inline]
pub async fn run_with_timeout<F>(
    timeout: Duration,
    job: F,
    on_timeout: fn(String) -> RagError,
) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(RagError::GenerationRuntime(format!(
            "generation task failed: {}",
            join_error
        ))),
        Err(_) => {
            warn!("Generation did not finish within {:?}", timeout);
            Err(on_timeout(format!(
                "no answer within {} seconds",
                timeout.as_secs()
            )))
        }
    }
}

/// Answer `question` with the remote generation service
#[inline]
pub async fn ask(config: Config, question: String) -> Result<()> {
    let generator = OllamaGenerator::new(&config.generation)?;
    let timeout = config.generation.timeout();

    let answer = run_with_timeout(
        timeout,
        move || {
            let prompt = prepare_prompt(&config, &question)?;
            let mut generator = generator;
            generator.generate(&prompt)
        },
        RagError::GenerationService,
    )
    .await?;

    println!("{}", answer);
    Ok(())
}

/// Answer `question` with the locally loaded model
#[inline]
pub async fn ask_local(config: Config, question: String) -> Result<()> {
    let timeout = config.local_model.timeout();

    let answer = run_with_timeout(
        timeout,
        move || {
            let prompt = prepare_prompt(&config, &question)?;
            generate_locally(&config, &prompt)
        },
        RagError::GenerationRuntime,
    )
    .await?;

    println!("{}", answer);
    Ok(())
}

#[cfg(feature = "local-llm")]
fn generate_locally(config: &Config, prompt: &str) -> Result<String> {
    use crate::generation::{CandleModel, LocalGenerator};

    let model = CandleModel::load(&config.local_model)?;
    LocalGenerator::new(model, config.local_model.max_new_tokens).generate(prompt)
}

#[cfg(not(feature = "local-llm"))]
fn generate_locally(_config: &Config, _prompt: &str) -> Result<String> {
    Err(RagError::GenerationRuntime(
        "field-rag was built without the local-llm feature".to_string(),
    ))
}

/// Print the metadata of the configured index
#[inline]
pub fn show_index_status(config: &Config) -> Result<()> {
    let index_path = config.index_path();

    let metadata = match VectorIndex::read_metadata(&index_path) {
        Ok(metadata) => metadata,
        Err(RagError::IndexNotFound(_)) => {
            println!("No index found at {}", index_path.display());
            println!("Use 'field-rag build <records.json>' to create one.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    println!("Index: {}", index_path.display());
    println!("  Format Version: {}", metadata.format_version);
    println!("  Chunks: {}", metadata.chunk_count);
    println!(
        "  Embedding Model: {} ({} dimensions)",
        metadata.embedding_model_id, metadata.dimension
    );
    println!("  Distance Metric: {}", metadata.metric);
    println!(
        "  Created: {}",
        metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if metadata.embedding_model_id != config.embedding.model
        || metadata.dimension != config.embedding.embedding_dimension as usize
    {
        println!(
            "  ⚠️  Configured embedder is {} ({} dimensions); rebuild the index before asking",
            config.embedding.model, config.embedding.embedding_dimension
        );
    }

    Ok(())
}
