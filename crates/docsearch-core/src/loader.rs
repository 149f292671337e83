//! Document loading: PDFs from a directory or an explicit file list, and raw text.
//!
//! Loading never moves or deletes caller files. With [`IngestMode::Copy`] the
//! selected files are copied into a working directory first and read from there.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::chunker::Chunker;
use crate::config::{IngestModeSetting, Settings};
use crate::error::{Error, Result};
use crate::types::Chunk;

pub const TEXT_SOURCE: &str = "text";

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Log and skip unreadable files instead of failing the whole batch.
    pub skip_errors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IngestMode {
    #[default]
    Reference,
    Copy { workdir: PathBuf },
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub chunks: Vec<Chunk>,
    pub files_loaded: usize,
    pub skipped: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    chunker: Chunker,
    options: LoadOptions,
    mode: IngestMode,
}

impl DocumentLoader {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker, ..Self::default() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mode = match settings.data.ingest_mode {
            IngestModeSetting::Reference => IngestMode::Reference,
            IngestModeSetting::Copy => IngestMode::Copy { workdir: PathBuf::from(&settings.data.workdir) },
        };
        Self::new(Chunker::new(&settings.chunking)).with_ingest_mode(mode)
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_ingest_mode(mut self, mode: IngestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Loads every `.pdf` directly inside `dir`.
    pub fn load_directory(&self, dir: &Path) -> Result<LoadReport> {
        let files = list_pdf_files(dir)?;
        if files.is_empty() {
            info!("No .pdf files found under {}", dir.display());
        }
        self.load_files(&files)
    }

    /// Loads the given PDF files in order.
    pub fn load_files(&self, files: &[PathBuf]) -> Result<LoadReport> {
        let staged = self.stage(files)?;
        let mut report = LoadReport::default();
        for (i, path) in staged.iter().enumerate() {
            debug!("Processing file {}/{}: {}", i + 1, staged.len(), path.display());
            match self.load_pdf(path) {
                Ok(chunks) => {
                    report.chunks.extend(chunks);
                    report.files_loaded += 1;
                }
                Err(e) if self.options.skip_errors => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.skipped.push((path.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "Processed {} files into {} chunks ({} skipped)",
            report.files_loaded,
            report.chunks.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Treats `text` as one logical document.
    pub fn load_text(&self, text: &str) -> Vec<Chunk> {
        self.chunker
            .split(text)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| Chunk::new(piece).with_meta("source", TEXT_SOURCE).with_meta("chunk_index", i))
            .collect()
    }

    pub fn load_pdf(&self, path: &Path) -> Result<Vec<Chunk>> {
        let pages = extract_pdf_pages(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        if pages.is_empty() {
            warn!("{} has no extractable text", path.display());
        }
        let mut chunks = Vec::new();
        for (page, text) in pages {
            for piece in self.chunker.split(&text) {
                let chunk_index = chunks.len();
                chunks.push(
                    Chunk::new(piece)
                        .with_meta("source", source.as_str())
                        .with_meta("page", page)
                        .with_meta("chunk_index", chunk_index),
                );
            }
        }
        Ok(chunks)
    }

    /// Copies `files` into the working directory, refusing distinct files
    /// that would land on the same name. Nothing is copied on conflict.
    fn stage(&self, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let IngestMode::Copy { workdir } = &self.mode else {
            return Ok(files.to_vec());
        };
        let mut claimed: HashMap<PathBuf, &PathBuf> = HashMap::new();
        let mut staged = Vec::with_capacity(files.len());
        for src in files {
            let name = src.file_name().ok_or_else(|| Error::load(src, "path has no file name"))?;
            let dest = workdir.join(name);
            if let Some(other) = claimed.get(&dest) {
                if !same_file(src, other) {
                    return Err(Error::load(
                        src,
                        format!("same file name as {}, both cannot be copied into {}", other.display(), workdir.display()),
                    ));
                }
            }
            claimed.insert(dest.clone(), src);
            staged.push(dest);
        }

        fs::create_dir_all(workdir)?;
        for (src, dest) in files.iter().zip(&staged) {
            if !same_file(src, dest) {
                fs::copy(src, dest).map_err(|e| Error::load(src, e))?;
                debug!("Copied {} -> {}", src.display(), dest.display());
            }
        }
        Ok(staged)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Lists `.pdf` files (case-insensitive) directly inside `dir`, sorted.
pub fn list_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::load(dir, "not a directory"));
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::load(dir, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Returns `(page_number, text)` for every non-blank page, 1-based.
fn extract_pdf_pages(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = fs::read(path).map_err(|e| Error::load(path, e))?;
    // pdf-extract panics on some malformed inputs
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .map_err(|_| Error::load(path, "PDF parser panicked"))?
        .map_err(|e| Error::load(path, e))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| (i + 1, page.trim().to_string()))
        .collect())
}
