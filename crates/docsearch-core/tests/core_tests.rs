use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use docsearch_core::chunker::Chunker;
use docsearch_core::config::ChunkingSettings;
use docsearch_core::error::Error;
use docsearch_core::loader::{list_pdf_files, DocumentLoader, IngestMode, LoadOptions, TEXT_SOURCE};

/// Builds a PDF with one Helvetica page per entry of `pages`, with a correct
/// xref table.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let stream = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
            5 + 2 * i
        ));
        objects.push(format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream));
    }
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", objects.len() + 1, xref).as_bytes(),
    );
    out
}

fn minimal_pdf(text: &str) -> Vec<u8> {
    pdf_with_pages(&[text])
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn load_text_single_small_document() {
    let loader = DocumentLoader::default();
    let chunks = loader.load_text("Short text");

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].text, "Short text");
    assert_eq!(chunks[0].metadata["source"], TEXT_SOURCE);
    assert_eq!(chunks[0].metadata["chunk_index"], 0);
}

#[test]
fn load_text_respects_max_chunk_size() {
    let loader = DocumentLoader::new(Chunker::new(&ChunkingSettings { max_chars: 40, overlap_chars: 0 }));
    let text = "The first paragraph is here.\n\nThe second paragraph follows.\n\nA third one closes.";
    let chunks = loader.load_text(text);

    assert!(chunks.len() > 1);
    for (i, c) in chunks.iter().enumerate() {
        assert!(c.text.chars().count() <= 40);
        assert_eq!(c.metadata["chunk_index"], i);
    }
}

#[test]
fn list_pdf_files_filters_and_sorts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write(dir, "b.pdf", b"x");
    write(dir, "A.PDF", b"x");
    write(dir, "notes.txt", b"x");
    fs::create_dir(dir.join("nested")).unwrap();
    write(&dir.join("nested"), "c.pdf", b"x");

    let files = list_pdf_files(dir).expect("list");
    let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect();
    assert_eq!(names, vec!["A.PDF", "b.pdf"]);
}

#[test]
fn missing_directory_is_a_load_error() {
    let tmp = TempDir::new().unwrap();
    let err = DocumentLoader::default().load_directory(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, Error::Load { .. }));
}

#[test]
fn directory_without_pdfs_loads_nothing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "readme.md", b"# hi");
    let report = DocumentLoader::default().load_directory(tmp.path()).expect("load");
    assert!(report.chunks.is_empty());
    assert_eq!(report.files_loaded, 0);
}

#[test]
fn corrupt_pdf_fails_the_batch_by_default() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "broken.pdf", b"definitely not a pdf");
    let err = DocumentLoader::default().load_directory(tmp.path()).unwrap_err();
    match err {
        Error::Load { path, .. } => assert!(path.ends_with("broken.pdf")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn corrupt_pdf_is_skipped_when_requested() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "broken.pdf", b"definitely not a pdf");
    write(tmp.path(), "good.pdf", &minimal_pdf("Hello from the manual"));

    let loader = DocumentLoader::default().with_options(LoadOptions { skip_errors: true });
    let report = loader.load_directory(tmp.path()).expect("load with skip");

    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].0.ends_with("broken.pdf"));
    assert_eq!(report.files_loaded, 1);
    assert!(report.chunks.iter().all(|c| c.metadata["source"] == "good.pdf"));
}

#[test]
fn pdf_chunks_carry_source_and_page() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "guide.pdf", &minimal_pdf("Hello from the manual"));

    let chunks = DocumentLoader::default().load_pdf(&path).expect("pdf");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.contains("Hello"), "extracted: {:?}", chunks[0].text);
    assert_eq!(chunks[0].metadata["source"], "guide.pdf");
    assert_eq!(chunks[0].metadata["page"], 1);
}

#[test]
fn copy_mode_leaves_sources_in_place() {
    let src = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let original = write(src.path(), "broken.pdf", b"not a pdf");

    let loader = DocumentLoader::default()
        .with_ingest_mode(IngestMode::Copy { workdir: work.path().join("data") })
        .with_options(LoadOptions { skip_errors: true });
    let report = loader.load_files(&[original.clone()]).expect("load");

    assert!(original.exists(), "caller file must not be moved");
    assert_eq!(fs::read(&original).unwrap(), b"not a pdf");
    assert!(work.path().join("data/broken.pdf").exists(), "file copied into the working directory");
    assert!(report.skipped[0].0.starts_with(work.path()), "staged copy is what gets parsed");
}

#[test]
fn every_pdf_page_becomes_its_own_chunk() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "field.pdf", &pdf_with_pages(&["Alpha page one", "Bravo page two", "Charlie page three"]));

    let chunks = DocumentLoader::default().load_pdf(&path).expect("pdf");
    assert_eq!(chunks.len(), 3, "chunks: {:?}", chunks.iter().map(|c| &c.text).collect::<Vec<_>>());
    for (i, (chunk, word)) in chunks.iter().zip(["Alpha", "Bravo", "Charlie"]).enumerate() {
        assert!(chunk.text.contains(word), "page {}: {:?}", i + 1, chunk.text);
        assert_eq!(chunk.metadata["page"], i + 1);
        assert_eq!(chunk.metadata["chunk_index"], i);
        assert_eq!(chunk.metadata["source"], "field.pdf");
    }
    assert!(!chunks[0].text.contains("Bravo"), "pages are not glued together");
}

#[test]
fn copy_mode_rejects_distinct_files_with_the_same_name() {
    let src = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    fs::create_dir(src.path().join("a")).unwrap();
    fs::create_dir(src.path().join("b")).unwrap();
    let first = write(&src.path().join("a"), "manual.pdf", &minimal_pdf("Alpha content"));
    let second = write(&src.path().join("b"), "manual.pdf", &minimal_pdf("Bravo content"));
    let files = vec![first, second];

    let by_reference = DocumentLoader::default().load_files(&files).expect("reference mode");
    assert_eq!(by_reference.files_loaded, 2);
    assert!(by_reference.chunks[0].text.contains("Alpha"));
    assert!(by_reference.chunks[1].text.contains("Bravo"));

    let workdir = work.path().join("data");
    let err = DocumentLoader::default()
        .with_ingest_mode(IngestMode::Copy { workdir: workdir.clone() })
        .load_files(&files)
        .unwrap_err();
    match err {
        Error::Load { path, .. } => assert!(path.ends_with("b/manual.pdf")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!workdir.join("manual.pdf").exists(), "nothing is copied when names collide");
}

#[test]
fn copy_mode_accepts_the_same_file_twice() {
    let src = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let path = write(src.path(), "guide.pdf", &minimal_pdf("Hello from the manual"));

    let report = DocumentLoader::default()
        .with_ingest_mode(IngestMode::Copy { workdir: work.path().to_path_buf() })
        .load_files(&[path.clone(), path])
        .expect("load");
    assert_eq!(report.files_loaded, 2);
}
