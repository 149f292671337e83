use crate::error::Result;
use crate::types::EmbeddingVector;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for a fixed model and must return
/// exactly one vector of `dim()` floats per input, in input order.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Identifier of the model producing the vectors, e.g. `hash:d384`.
    fn model_id(&self) -> &str;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::Error::EmbedderUnavailable("embedder returned no vector".into()))
    }
}
