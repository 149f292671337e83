use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use docsearch_core::traits::Embedder;
use docsearch_core::types::EmbeddingVector;
use docsearch_core::Result;

pub const HASH_EMBEDDING_DIM: usize = 384;

/// Deterministic bag-of-tokens embedder for tests and offline development.
///
/// Each lowercased token is hashed into a bucket; the vector is L2-normalized.
/// Texts sharing words land close together, which is enough to exercise the
/// index and the query path without model weights.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    /// `dim` is clamped to at least 1.
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hash:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> EmbeddingVector {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self { Self::new(HASH_EMBEDDING_DIM) }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn model_id(&self) -> &str { &self.id }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
