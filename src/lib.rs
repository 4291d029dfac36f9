use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("No persisted index found at {0}")]
    IndexNotFound(String),

    #[error("Index mismatch: {0}")]
    IndexVersionMismatch(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Index holds no chunks")]
    EmptyIndex,

    #[error("Generation service error: {0}")]
    GenerationService(String),

    #[error("Generation runtime error: {0}")]
    GenerationRuntime(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index storage error: {0}")]
    Storage(String),

    #[error("Record feed error: {0}")]
    Records(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod http;
pub mod index;
pub mod records;
pub mod retrieval;
