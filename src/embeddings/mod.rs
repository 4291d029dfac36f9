// Embeddings module
// Chunking of field records and the embedding model boundary

pub mod chunking;
pub mod ollama;

pub use chunking::{Chunk, ChunkingConfig, split_records};
pub use ollama::OllamaClient;

use crate::Result;

const DEFAULT_BATCH_SIZE: usize = 16;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for a given `model_id`, and every
/// vector they return must have `dimension()` components.
pub trait Embedder {
    /// Identifier of the embedding model, recorded in persisted indexes
    fn model_id(&self) -> &str;

    /// Number of components in every vector this embedder returns
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in input order
    #[inline]
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Preferred number of texts per `embed_many` call
    #[inline]
    fn batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }
}

impl<E: Embedder + ?Sized> Embedder for &E {
    #[inline]
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    #[inline]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_many(texts)
    }

    #[inline]
    fn batch_size(&self) -> usize {
        (**self).batch_size()
    }
}
