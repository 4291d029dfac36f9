// Vector index
// Flat store of chunk embeddings with exact nearest-neighbour search

#[cfg(test)]
mod tests;

pub mod distance;
mod storage;

pub use distance::DistanceMetric;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::embeddings::{Chunk, Embedder};
use crate::{RagError, Result};

/// Bumped whenever the on-disk layout changes
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Metadata persisted next to the vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub format_version: u32,
    /// Embedding model the vectors were produced with
    pub embedding_model_id: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// A chunk paired with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A stored chunk and its distance from the query vector
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Search hits ordered nearest first
pub type QueryResult = Vec<SearchResult>;

/// Immutable, batch-built vector index.
///
/// Built once from a full chunk set, optionally persisted with [`VectorIndex::save`]
/// and reloaded with [`VectorIndex::load`]. Searching only borrows the index, so a
/// loaded index can be shared between readers.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metadata: IndexMetadata,
    entries: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    /// Create an index with no chunks
    #[inline]
    pub fn empty(embedding_model_id: &str, dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            metadata: IndexMetadata {
                format_version: INDEX_FORMAT_VERSION,
                embedding_model_id: embedding_model_id.to_string(),
                dimension,
                metric,
                chunk_count: 0,
                created_at: Utc::now(),
            },
            entries: Vec::new(),
        }
    }

    /// Embed every chunk and build an index from them, keeping input order
    #[inline]
    pub fn build<E: Embedder + ?Sized>(
        chunks: Vec<Chunk>,
        embedder: &E,
        metric: DistanceMetric,
    ) -> Result<Self> {
        Self::build_with_progress(chunks, embedder, metric, |_| {})
    }

    /// Like [`VectorIndex::build`], calling `on_progress` with the number of
    /// chunks embedded so far after every batch
    pub fn build_with_progress<E, F>(
        chunks: Vec<Chunk>,
        embedder: &E,
        metric: DistanceMetric,
        mut on_progress: F,
    ) -> Result<Self>
    where
        E: Embedder + ?Sized,
        F: FnMut(usize),
    {
        let mut index = Self::empty(embedder.model_id(), embedder.dimension(), metric);
        let dimension = index.metadata.dimension;
        let batch_size = embedder.batch_size().max(1);

        info!(
            "Building index of {} chunks with {} ({} dimensions)",
            chunks.len(),
            embedder.model_id(),
            dimension
        );

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in &chunks.into_iter().chunks(batch_size) {
            let batch: Vec<Chunk> = batch.collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_many(&texts)?;

            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for (chunk, vector) in batch.into_iter().zip(vectors) {
                validate_vector(&vector, dimension, entries.len())?;
                entries.push(EmbeddedChunk { chunk, vector });
            }

            on_progress(entries.len());
        }

        index.metadata.chunk_count = entries.len();
        index.entries = entries;

        debug!("Built index with {} entries", index.entries.len());
        Ok(index)
    }

    /// Persist the index to the directory at `location`.
    ///
    /// The index is written to a staging directory and swapped into place, so a
    /// failed save leaves whatever was at `location` untouched.
    #[inline]
    pub fn save<P: AsRef<Path>>(&self, location: P) -> Result<()> {
        storage::write_index(location.as_ref(), &self.metadata, &self.entries)?;
        info!(
            "Saved index of {} chunks to {}",
            self.entries.len(),
            location.as_ref().display()
        );
        Ok(())
    }

    /// Load a persisted index, refusing one built with a different embedding
    /// model or dimension
    #[inline]
    pub fn load<P: AsRef<Path>>(
        location: P,
        expected_model_id: &str,
        expected_dimension: usize,
    ) -> Result<Self> {
        let location = location.as_ref();
        let metadata = storage::read_metadata(location)?;

        if metadata.embedding_model_id != expected_model_id {
            return Err(RagError::IndexVersionMismatch(format!(
                "index at {} was built with embedding model '{}', but '{}' is configured",
                location.display(),
                metadata.embedding_model_id,
                expected_model_id
            )));
        }

        if metadata.dimension != expected_dimension {
            return Err(RagError::IndexVersionMismatch(format!(
                "index at {} holds {}-dimensional vectors, but the embedder produces {}",
                location.display(),
                metadata.dimension,
                expected_dimension
            )));
        }

        let entries = storage::read_entries(location, &metadata)?;

        info!(
            "Loaded index of {} chunks from {}",
            entries.len(),
            location.display()
        );
        Ok(Self { metadata, entries })
    }

    /// Read only the metadata of a persisted index, without any compatibility checks
    #[inline]
    pub fn read_metadata<P: AsRef<Path>>(location: P) -> Result<IndexMetadata> {
        storage::read_metadata(location.as_ref())
    }

    /// Return the `k` stored chunks nearest to `query`, nearest first.
    ///
    /// Ties keep insertion order. Asking for more chunks than are stored returns
    /// all of them.
    pub fn search(&self, query: &[f32], k: usize) -> Result<QueryResult> {
        if self.entries.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        if query.len() != self.metadata.dimension {
            return Err(RagError::InvalidQuery(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                self.metadata.dimension
            )));
        }

        if query.iter().any(|v| !v.is_finite()) {
            return Err(RagError::InvalidQuery(
                "query vector contains non-finite values".to_string(),
            ));
        }

        let metric = self.metadata.metric;
        let results: QueryResult = self
            .entries
            .iter()
            .map(|entry| (entry, metric.distance(query, &entry.vector)))
            .sorted_by(|(_, a), (_, b)| a.total_cmp(b))
            .take(k)
            .map(|(entry, distance)| SearchResult {
                chunk: entry.chunk.clone(),
                distance,
            })
            .collect();

        debug!(
            "Search returned {} of {} chunks (k = {})",
            results.len(),
            self.entries.len(),
            k
        );
        Ok(results)
    }

    #[inline]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    #[inline]
    pub fn entries(&self) -> &[EmbeddedChunk] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_vector(vector: &[f32], dimension: usize, position: usize) -> Result<()> {
    if vector.len() != dimension {
        return Err(RagError::Embedding(format!(
            "Embedding for chunk {} has {} dimensions, expected {}",
            position,
            vector.len(),
            dimension
        )));
    }

    if vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::Embedding(format!(
            "Embedding for chunk {} contains non-finite values",
            position
        )));
    }

    Ok(())
}
