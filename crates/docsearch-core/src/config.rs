//! Configuration loader and path helpers.
//!
//! Uses Figment to merge compiled-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_SEARCH__TOP_K=3`). Configured paths go through [`expand_path`] for `~`
//! and `${VAR}`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{DistanceMetric, ThresholdPolicy};

pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_in(Path::new("."))
    }

    /// Like [`Config::load`], reading the TOML files from `base`.
    pub fn load_in(base: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self::from_figment(figment);
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Extracts and validates the typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub pdf_dir: String,
    pub index_path: String,
    pub workdir: String,
    pub ingest_mode: IngestModeSetting,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            pdf_dir: "doc_search/data".to_string(),
            index_path: "doc_search/index/vector_store".to_string(),
            workdir: "doc_search/data".to_string(),
            ingest_mode: IngestModeSetting::Reference,
        }
    }
}

/// Whether ingestion reads caller files in place or copies them first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestModeSetting {
    #[default]
    Reference,
    Copy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub batch_size: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            model_dir: None,
            max_len: 256,
            batch_size: 32,
            use_fake: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { max_chars: 4000, overlap_chars: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
    pub threshold: f32,
    pub threshold_policy: ThresholdPolicy,
    pub metric: DistanceMetric,
    pub window_size: usize,
    pub highlight_start: String,
    pub highlight_end: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 1.0,
            threshold_policy: ThresholdPolicy::KeepAtOrBelow,
            metric: DistanceMetric::L2,
            window_size: 200,
            highlight_start: "**".to_string(),
            highlight_end: "**".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.search.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be >= 1".into()));
        }
        if self.search.window_size == 0 {
            return Err(Error::InvalidConfig("search.window_size must be >= 1".into()));
        }
        if !self.search.threshold.is_finite() {
            return Err(Error::InvalidConfig("search.threshold must be a finite number".into()));
        }
        if self.chunking.max_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chars must be >= 1".into()));
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                self.chunking.overlap_chars, self.chunking.max_chars
            )));
        }
        if self.embedding.batch_size == 0 || self.embedding.max_len == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size and embedding.max_len must be >= 1".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
