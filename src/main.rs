use clap::{Parser, Subcommand};
use field_rag::Result;
use field_rag::commands::{ask, ask_local, build_index, show_index_status};
use field_rag::config::{Config, get_config_dir, run_interactive_config, show_config};
use field_rag::embeddings::ChunkingConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "field-rag")]
#[command(about = "Question answering over extracted document fields with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embedding, generation and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk and embed a record feed into a persisted index
    Build {
        /// JSON file of extracted field records
        records: PathBuf,
        /// Index directory, overriding the configured location
        #[arg(long)]
        index: Option<PathBuf>,
        /// Maximum characters per chunk
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Characters repeated from the end of the previous chunk
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Answer a question with the remote generation service
    Ask {
        question: String,
        #[arg(long)]
        index: Option<PathBuf>,
        /// Number of chunks to retrieve as context
        #[arg(long)]
        top_k: Option<usize>,
        /// Generation model, overriding the configured one
        #[arg(long)]
        model: Option<String>,
    },
    /// Answer a question with a locally loaded model
    AskLocal {
        question: String,
        #[arg(long)]
        index: Option<PathBuf>,
        /// Number of chunks to retrieve as context
        #[arg(long)]
        top_k: Option<usize>,
        /// Upper bound on generated tokens
        #[arg(long)]
        max_new_tokens: Option<usize>,
    },
    /// Show metadata of the persisted index
    Status {
        #[arg(long)]
        index: Option<PathBuf>,
    },
}

fn apply_index_overrides(
    config: &mut Config,
    index: Option<PathBuf>,
    top_k: Option<usize>,
) -> Result<()> {
    if let Some(index) = index {
        config.index.path = Some(index);
    }
    if let Some(top_k) = top_k {
        config.index.set_top_k(top_k)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&Config::load_default()?)?;
            } else {
                run_interactive_config(&get_config_dir()?)?;
            }
        }
        Commands::Build {
            records,
            index,
            chunk_size,
            chunk_overlap,
        } => {
            let mut config = Config::load_default()?;
            apply_index_overrides(&mut config, index, None)?;
            if chunk_size.is_some() || chunk_overlap.is_some() {
                config.chunking = ChunkingConfig::new(
                    chunk_size.unwrap_or(config.chunking.chunk_size),
                    chunk_overlap.unwrap_or(config.chunking.chunk_overlap),
                )?;
            }
            build_index(config, &records).await?;
        }
        Commands::Ask {
            question,
            index,
            top_k,
            model,
        } => {
            let mut config = Config::load_default()?;
            apply_index_overrides(&mut config, index, top_k)?;
            if let Some(model) = model {
                config.generation.set_model(model)?;
            }
            ask(config, question).await?;
        }
        Commands::AskLocal {
            question,
            index,
            top_k,
            max_new_tokens,
        } => {
            let mut config = Config::load_default()?;
            apply_index_overrides(&mut config, index, top_k)?;
            if let Some(max_new_tokens) = max_new_tokens {
                config.local_model.set_max_new_tokens(max_new_tokens)?;
            }
            ask_local(config, question).await?;
        }
        Commands::Status { index } => {
            let mut config = Config::load_default()?;
            apply_index_overrides(&mut config, index, None)?;
            show_index_status(&config)?;
        }
    }

    Ok(())
}
