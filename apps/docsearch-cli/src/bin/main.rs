use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docsearch_core::config::{expand_path, Config, IngestModeSetting, Settings};
use docsearch_core::loader::{DocumentLoader, LoadOptions};
use docsearch_core::traits::Embedder;
use docsearch_embed::default_embedder;
use docsearch_retrieval::{DocSearch, IndexSummary};
use docsearch_vector::FlatIndex;

#[derive(Parser)]
#[command(name = "docsearch", about = "Semantic search over a folder of PDFs")]
struct Cli {
    /// Index file to write or query (overrides data.index_path)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Copy documents into this directory before reading them
    #[arg(long, global = true)]
    copy_to: Option<PathBuf>,

    /// Skip unreadable PDFs instead of aborting
    #[arg(long, global = true)]
    skip_errors: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index every PDF in a directory (defaults to data.pdf_dir)
    Index { dir: Option<PathBuf> },
    /// Index the given PDF files
    IndexFiles {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Index raw text from an argument, a file, or stdin
    IndexText {
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        text: Option<String>,
    },
    /// Answer one question
    Query {
        question: String,
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Ask questions interactively until `exit`
    Ask,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docsearch=info,warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let mut settings = config.settings()?;
    if let Some(dir) = &cli.copy_to {
        settings.data.ingest_mode = IngestModeSetting::Copy;
        settings.data.workdir = dir.to_string_lossy().to_string();
    }
    let index_path = cli.index.clone().unwrap_or_else(|| expand_path(&settings.data.index_path));

    let embedder = default_embedder(&settings.embedding)?;
    let search = engine(settings, embedder, cli.skip_errors)?;

    match cli.command {
        Command::Index { dir } => {
            let dir = dir.unwrap_or_else(|| expand_path(&search.settings().data.pdf_dir));
            report(&search.index_documents(&dir, &index_path)?);
        }
        Command::IndexFiles { files } => {
            report(&search.index_files(&files, &index_path)?);
        }
        Command::IndexText { file, text } => {
            let text = match (file, text) {
                (Some(path), _) => fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?,
                (None, Some(text)) => text,
                (None, None) => read_stdin_text()?,
            };
            report(&search.index_text(&text, &index_path)?);
        }
        Command::Query { question, threshold } => {
            let threshold = threshold.unwrap_or(search.settings().search.threshold);
            println!("{}", search.query(&index_path, &question, threshold)?);
        }
        Command::Ask => ask_loop(&search, &index_path)?,
    }
    Ok(())
}

fn engine(settings: Settings, embedder: Box<dyn Embedder>, skip_errors: bool) -> anyhow::Result<DocSearch> {
    let loader = DocumentLoader::from_settings(&settings).with_options(LoadOptions { skip_errors });
    Ok(DocSearch::new(settings, embedder)?.with_loader(loader))
}

fn report(summary: &IndexSummary) {
    for (path, reason) in &summary.skipped {
        warn!("Skipped {}: {}", path.display(), reason);
    }
    println!(
        "Indexed {} chunks from {} files into {}",
        summary.chunks,
        summary.files,
        summary.index_path.display()
    );
}

/// Reads lines from stdin until the first blank line or EOF.
fn read_stdin_text() -> anyhow::Result<String> {
    eprintln!("Enter text to index, finish with an empty line:");
    let mut lines = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

fn prompt(label: &str) -> anyhow::Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn ask_loop(search: &DocSearch, index_path: &Path) -> anyhow::Result<()> {
    let index = FlatIndex::load(index_path)?;
    info!("Loaded {} chunks from {}", index.len(), index_path.display());
    let default_threshold = search.settings().search.threshold;

    loop {
        let Some(question) = prompt("\nEnter your question (or 'exit' to quit): ")? else { break };
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }
        let Some(raw) = prompt(&format!("Enter threshold (default {default_threshold}): "))? else { break };
        let threshold = if raw.is_empty() {
            default_threshold
        } else {
            match raw.parse::<f32>() {
                Ok(t) => t,
                Err(_) => {
                    eprintln!("'{raw}' is not a number, using {default_threshold}");
                    default_threshold
                }
            }
        };
        match search.query_with(&index, &question, threshold) {
            Ok(answer) => println!("\n{answer}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}
