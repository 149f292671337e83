//! Sentence embeddings for document chunks and queries.
//!
//! [`MiniLmEmbedder`] runs a local BERT-family sentence-transformer
//! (default `all-MiniLM-L6-v2`) with candle: tokenize, forward, masked mean
//! pooling, L2 normalization. [`HashEmbedder`] is a deterministic stand-in
//! selected with `embedding.use_fake` or `APP_USE_FAKE_EMBEDDINGS=1`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use docsearch_core::config::{expand_path, EmbeddingSettings};
use docsearch_core::traits::Embedder;
use docsearch_core::types::EmbeddingVector;
use docsearch_core::{Error, Result};

pub mod device;
pub mod hash;
pub mod pool;
pub mod tokenize;

pub use hash::{HashEmbedder, HASH_EMBEDDING_DIM};
pub use pool::masked_mean_l2;

pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    batch_size: usize,
    id: String,
}

fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::EmbedderUnavailable(e.to_string())
}

impl MiniLmEmbedder {
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        let device = device::select_device();
        let model_dir = resolve_model_dir(settings)?;
        info!("Loading {} from {}", settings.model, model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| unavailable(format!("failed to load tokenizer from {}: {}", tokenizer_path.display(), e)))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", config_path.display(), e)))?;
        let config: BertConfig = serde_json::from_str(&raw_config).map_err(unavailable)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)
            .map_err(unavailable)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| unavailable("config.json has no hidden_size"))? as usize;

        let weights = load_weights(&model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config).map_err(unavailable)?;
        info!("Embedding model loaded (dim={})", dim);

        Ok(Self {
            model,
            tokenizer,
            device,
            dim,
            max_len: settings.max_len,
            batch_size: settings.batch_size.max(1),
            id: format!("{}:d{}", settings.model, dim),
        })
    }

    fn embed_chunk(&self, texts: &[String]) -> anyhow::Result<Vec<EmbeddingVector>> {
        let (input_ids, attention_mask) = tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        Ok(vectors)
    }
}

impl Embedder for MiniLmEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn model_id(&self) -> &str { &self.id }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(batch).map_err(unavailable)?);
        }
        for v in &out {
            if v.len() != self.dim {
                return Err(Error::DimensionMismatch { expected: self.dim, got: v.len() });
            }
        }
        let elapsed = start.elapsed();
        if texts.len() == 1 && elapsed.as_millis() > 100 {
            warn!("Slow embedding: {:?} for text length {}", elapsed, texts[0].len());
        }
        debug!("Embedded {} texts in {:?}", texts.len(), elapsed);
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return candle_core::safetensors::load(&safetensors, device).map_err(unavailable);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle).map_err(unavailable)?;
        return Ok(weights.into_iter().collect());
    }
    Err(unavailable(format!("no model.safetensors or pytorch_model.bin in {}", model_dir.display())))
}

/// Finds the local model directory.
///
/// An explicitly configured `model_dir` must exist. Otherwise checks
/// `APP_MODEL_DIR`, `MODEL_DIR`, then `models/<name>` and `../models/<name>`
/// where `<name>` is the last path segment of the model id.
fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    if let Some(dir) = &settings.model_dir {
        let p = expand_path(dir);
        if p.is_dir() { return Ok(p); }
        return Err(unavailable(format!("configured model_dir {} does not exist", p.display())));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.is_dir() { debug!("Using {}: {}", var, p.display()); return Ok(p); }
        }
    }
    let name = settings.model.rsplit('/').next().unwrap_or(&settings.model);
    for root in ["models", "../models"] {
        let p = Path::new(root).join(name);
        if p.is_dir() { return Ok(p); }
    }
    Err(unavailable(format!(
        "could not locate model directory for {}; checked embedding.model_dir, APP_MODEL_DIR, MODEL_DIR, models/{name} and ../models/{name}",
        settings.model
    )))
}

fn fake_requested(settings: &EmbeddingSettings) -> bool {
    settings.use_fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
}

pub fn default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if fake_requested(settings) {
        info!("Using HashEmbedder");
        return Ok(Box::new(HashEmbedder::default()));
    }
    Ok(Box::new(MiniLmEmbedder::load(settings)?))
}
