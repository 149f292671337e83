use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use docsearch_core::config::Settings;
use docsearch_core::loader::{DocumentLoader, LoadReport};
use docsearch_core::traits::Embedder;
use docsearch_core::types::Chunk;
use docsearch_core::{Error, Result};
use docsearch_vector::FlatIndex;

use crate::filter::{FormattedAnswer, ResultFilter};

/// Outcome of one indexing run.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummary {
    pub chunks: usize,
    pub files: usize,
    pub skipped: Vec<(PathBuf, String)>,
    pub index_path: PathBuf,
}

pub struct DocSearch {
    settings: Settings,
    embedder: Box<dyn Embedder>,
    loader: DocumentLoader,
    filter: ResultFilter,
}

impl DocSearch {
    pub fn new(settings: Settings, embedder: Box<dyn Embedder>) -> Result<Self> {
        settings.validate()?;
        let loader = DocumentLoader::from_settings(&settings);
        let filter = ResultFilter::from_settings(&settings.search);
        Ok(Self { settings, embedder, loader, filter })
    }

    pub fn with_loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Loads every PDF in `pdf_dir`, builds a fresh index and writes it to
    /// `index_path`, replacing what was there.
    pub fn index_documents(&self, pdf_dir: &Path, index_path: &Path) -> Result<IndexSummary> {
        info!("Loading documents from {}", pdf_dir.display());
        let report = self.loader.load_directory(pdf_dir)?;
        self.index_report(report, index_path)
    }

    pub fn index_files(&self, files: &[PathBuf], index_path: &Path) -> Result<IndexSummary> {
        let report = self.loader.load_files(files)?;
        self.index_report(report, index_path)
    }

    pub fn index_text(&self, text: &str, index_path: &Path) -> Result<IndexSummary> {
        let chunks = self.loader.load_text(text);
        self.index_report(LoadReport { chunks, files_loaded: 0, skipped: Vec::new() }, index_path)
    }

    fn index_report(&self, report: LoadReport, index_path: &Path) -> Result<IndexSummary> {
        let chunks = report.chunks.len();
        let index = self.build_index(report.chunks)?;
        index.persist(index_path)?;
        Ok(IndexSummary {
            chunks,
            files: report.files_loaded,
            skipped: report.skipped,
            index_path: index_path.to_path_buf(),
        })
    }

    /// Embeds `chunks` in batches and builds an in-memory index from them.
    pub fn build_index(&self, chunks: Vec<Chunk>) -> Result<FlatIndex> {
        if chunks.is_empty() {
            return Err(Error::EmptyIndex);
        }
        info!("Embedding {} chunks with {}", chunks.len(), self.embedder.model_id());
        let max_len = self.embedder.max_len();
        let oversized = count_oversized(&chunks, max_len);
        if oversized > 0 {
            warn!("{} chunks have more than {} words and will be truncated by the embedder", oversized, max_len);
        }

        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let batch_size = self.settings.embedding.batch_size.max(1);
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.embedder.embed_batch(&texts)?;
            if embedded.len() != texts.len() {
                pb.abandon();
                return Err(Error::EmbedderUnavailable(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedded");

        let entries = vectors.into_iter().zip(chunks).collect();
        let index = FlatIndex::build(entries, self.settings.search.metric)?.with_model_id(self.embedder.model_id());
        info!("Built {} index with {} entries (dim {})", index.metric(), index.len(), index.dimension());
        Ok(index)
    }

    /// Loads the index at `index_path` and answers `question`.
    ///
    /// Returns either the rendered results or the no-results message.
    pub fn query(&self, index_path: &Path, question: &str, threshold: f32) -> Result<String> {
        let index = FlatIndex::load(index_path)?;
        Ok(self.query_with(&index, question, threshold)?.to_string())
    }

    /// Answers `question` against an already loaded index.
    pub fn query_with(&self, index: &FlatIndex, question: &str, threshold: f32) -> Result<FormattedAnswer> {
        if question.trim().is_empty() {
            return Err(Error::InvalidQueryParameter("question must not be empty".into()));
        }
        if !threshold.is_finite() {
            return Err(Error::InvalidQueryParameter(format!("threshold must be a finite number, got {threshold}")));
        }
        index.check_model(self.embedder.model_id());

        let query = self.embedder.embed(question)?;
        let hits = index.search(&query, self.settings.search.top_k)?;
        debug!("Search returned {} candidates", hits.len());
        self.filter.filter_and_format(&hits, threshold, question)
    }
}

/// Chunks whose word count alone exceeds the embedder's token window.
fn count_oversized(chunks: &[Chunk], max_len: usize) -> usize {
    chunks.iter().filter(|c| c.text.split_whitespace().nth(max_len).is_some()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_chunks_are_counted_by_words() {
        let chunks = vec![Chunk::new("one two three"), Chunk::new("one two three four"), Chunk::new("")];
        assert_eq!(count_oversized(&chunks, 3), 1);
        assert_eq!(count_oversized(&chunks, 4), 0);
        assert_eq!(count_oversized(&chunks, usize::MAX), 0);
    }
}
