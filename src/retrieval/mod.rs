// Retrieval module
// Embeds questions and looks up the nearest stored chunks


pub mod prompt;

pub use prompt::{PromptEnvelope, RetrievalContext, assemble};

use tracing::debug;

use crate::embeddings::Embedder;
use crate::index::{QueryResult, VectorIndex};
use crate::{RagError, Result};

/// Embed `query` and return the `k` nearest chunks of `index`.
///
/// Every call re-embeds the query; nothing is cached.
#[inline]
pub fn retrieve<E: Embedder + ?Sized>(
    query: &str,
    index: &VectorIndex,
    embedder: &E,
    k: usize,
) -> Result<QueryResult> {
    debug!("Retrieving {} chunks for query: {}", k, query);
    let vector = embedder.embed(query)?;
    index.search(&vector, k)
}

/// A loaded index paired with the embedder its vectors came from
#[derive(Debug)]
pub struct Retriever<'a, E> {
    index: &'a VectorIndex,
    embedder: E,
    top_k: usize,
}

impl<'a, E: Embedder> Retriever<'a, E> {
    /// Fails with [`RagError::IndexVersionMismatch`] when `embedder` is not the
    /// model the index was built with
    #[inline]
    pub fn new(index: &'a VectorIndex, embedder: E, top_k: usize) -> Result<Self> {
        let metadata = index.metadata();

        if embedder.model_id() != metadata.embedding_model_id
            || embedder.dimension() != metadata.dimension
        {
            return Err(RagError::IndexVersionMismatch(format!(
                "index was built with '{}' ({} dimensions), embedder is '{}' ({} dimensions)",
                metadata.embedding_model_id,
                metadata.dimension,
                embedder.model_id(),
                embedder.dimension()
            )));
        }

        Ok(Self {
            index,
            embedder,
            top_k,
        })
    }

    #[inline]
    pub fn retrieve(&self, query: &str) -> Result<QueryResult> {
        retrieve(query, self.index, &self.embedder, self.top_k)
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        self.index
    }
}
