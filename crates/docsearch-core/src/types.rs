//! Domain types shared by the loader, the vector index and the query path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier of an index entry, assigned in insertion order.
pub type EntryId = u64;

/// Chunk metadata. Ordered so rendering and persistence are deterministic.
pub type Meta = BTreeMap<String, serde_json::Value>;

/// Dense embedding of one chunk or query.
pub type EmbeddingVector = Vec<f32>;

/// A unit of source text that is embedded and indexed on its own.
///
/// - `text`: the payload handed to the embedder
/// - `metadata`: positional information such as `source`, `page`, `chunk_index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Meta::new() }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Renders metadata as a compact JSON object, or `None` when there is none.
    pub fn metadata_display(&self) -> Option<String> {
        if self.metadata.is_empty() {
            return None;
        }
        serde_json::to_string(&self.metadata).ok()
    }
}

/// One k-NN hit. `distance` follows the index metric: lower is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: EntryId,
    pub chunk: Chunk,
    pub distance: f32,
}

/// Distance used by the vector index. Lower is always more similar.
///
/// - `L2`: squared Euclidean distance, range `[0, +inf)`
/// - `Cosine`: `1 - cosine_similarity`, range `[0, 2]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    L2,
    Cosine,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L2 => write!(f, "l2"),
            Self::Cosine => write!(f, "cosine"),
        }
    }
}

/// Which side of the threshold a result must fall on to be kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Keep `distance <= threshold` (distances: lower is better).
    #[default]
    KeepAtOrBelow,
    /// Keep `score >= threshold`, for callers treating the score as a similarity.
    KeepAtOrAbove,
}

impl ThresholdPolicy {
    pub fn keeps(self, score: f32, threshold: f32) -> bool {
        match self {
            Self::KeepAtOrBelow => score <= threshold,
            Self::KeepAtOrAbove => score >= threshold,
        }
    }
}
