use serde::{Deserialize, Serialize};
use tracing::warn;

use docsearch_core::types::{Chunk, DistanceMetric, EmbeddingVector, EntryId, QueryResult};
use docsearch_core::{Error, Result};

use crate::distance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: EntryId,
    pub vector: EmbeddingVector,
    pub chunk: Chunk,
}

/// Brute-force (flat) vector index.
///
/// Exact k-NN by scanning every entry. Entry ids are assigned in insertion
/// order starting at 0 and are never reused. The index is not mutated by
/// `search`, so a built or loaded index can be shared across threads.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    pub(crate) metric: DistanceMetric,
    pub(crate) dimension: usize,
    pub(crate) model_id: Option<String>,
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) next_id: EntryId,
}

impl FlatIndex {
    /// Builds a fresh index. Fails with `EmptyIndex` on no entries and
    /// `DimensionMismatch` when vectors disagree in length.
    pub fn build(entries: Vec<(EmbeddingVector, Chunk)>, metric: DistanceMetric) -> Result<Self> {
        let Some((first, _)) = entries.first() else {
            return Err(Error::EmptyIndex);
        };
        let mut index = Self {
            metric,
            dimension: first.len(),
            model_id: None,
            entries: Vec::with_capacity(entries.len()),
            next_id: 0,
        };
        index.append(entries)?;
        Ok(index)
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Appends entries after the existing ones, returning their new ids.
    /// Nothing is inserted if any vector is invalid.
    pub fn append(&mut self, entries: Vec<(EmbeddingVector, Chunk)>) -> Result<Vec<EntryId>> {
        for (vector, _) in &entries {
            self.check_vector(vector)?;
        }
        let mut ids = Vec::with_capacity(entries.len());
        for (vector, chunk) in entries {
            let id = self.next_id;
            self.next_id += 1;
            self.entries.push(IndexEntry { id, vector, chunk });
            ids.push(id);
        }
        Ok(ids)
    }

    /// Returns up to `k` entries by ascending distance; ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>> {
        if k == 0 {
            return Err(Error::InvalidQueryParameter("k must be >= 1".into()));
        }
        self.check_vector(query)?;

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (distance::distance(self.metric, query, &entry.vector), entry))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, entry)| QueryResult { id: entry.id, chunk: entry.chunk.clone(), distance })
            .collect())
    }

    /// Warns when the index was built by a different embedder than `model_id`.
    pub fn check_model(&self, model_id: &str) {
        if let Some(built_with) = &self.model_id {
            if built_with != model_id {
                warn!("Index was built with '{}' but is queried with '{}'", built_with, model_id);
            }
        }
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch { expected: self.dimension, got: vector.len() });
        }
        if self.dimension == 0 {
            return Err(Error::InvalidQueryParameter("vectors must have at least one dimension".into()));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidQueryParameter("vector contains a non-finite value".into()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn dimension(&self) -> usize { self.dimension }
    pub fn metric(&self) -> DistanceMetric { self.metric }
    pub fn model_id(&self) -> Option<&str> { self.model_id.as_deref() }
    pub fn entries(&self) -> &[IndexEntry] { &self.entries }
}
