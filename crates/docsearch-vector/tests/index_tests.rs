use std::fs;
use std::sync::Arc;

use docsearch_core::traits::Embedder;
use docsearch_core::types::{Chunk, DistanceMetric, EmbeddingVector};
use docsearch_core::Error;
use docsearch_embed::HashEmbedder;
use docsearch_vector::{load, persist, FlatIndex};
use tempfile::TempDir;

const TEXTS: &[&str] = &[
    "How to start a fire with flint and steel",
    "Purifying water by boiling it for one minute",
    "Building a lean-to shelter from branches",
    "Identifying edible plants in the forest",
    "Signalling for rescue with a mirror",
];

fn embedded_entries(embedder: &HashEmbedder) -> Vec<(EmbeddingVector, Chunk)> {
    let texts: Vec<String> = TEXTS.iter().map(|s| s.to_string()).collect();
    let vectors = embedder.embed_batch(&texts).expect("embed");
    vectors
        .into_iter()
        .zip(texts)
        .enumerate()
        .map(|(i, (v, t))| (v, Chunk::new(t).with_meta("chunk_index", i)))
        .collect()
}

#[test]
fn own_embedding_is_top_hit_at_zero_distance() {
    let embedder = HashEmbedder::default();
    for metric in [DistanceMetric::L2, DistanceMetric::Cosine] {
        let entries = embedded_entries(&embedder);
        let index = FlatIndex::build(entries.clone(), metric).expect("build");
        for (vector, chunk) in &entries {
            let hits = index.search(vector, 1).expect("search");
            assert_eq!(&hits[0].chunk, chunk, "metric {metric}");
            assert!(hits[0].distance.abs() < 1e-5, "metric {metric}: distance {}", hits[0].distance);
        }
    }
}

#[test]
fn k_larger_than_index_returns_everything_sorted() {
    let embedder = HashEmbedder::default();
    let index = FlatIndex::build(embedded_entries(&embedder), DistanceMetric::L2).expect("build");
    let q = embedder.embed("fire and water").unwrap();
    let hits = index.search(&q, 50).expect("search");

    assert_eq!(hits.len(), TEXTS.len());
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[test]
fn ties_keep_insertion_order() {
    let entries = vec![
        (vec![1.0, 0.0], Chunk::new("first")),
        (vec![0.0, 1.0], Chunk::new("second")),
        (vec![1.0, 0.0], Chunk::new("third")),
    ];
    let index = FlatIndex::build(entries, DistanceMetric::L2).unwrap();
    let hits = index.search(&[1.0, 0.0], 3).unwrap();
    let texts: Vec<_> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "third", "second"]);
    assert_eq!(hits[0].id, 0);
    assert_eq!(hits[1].id, 2);
}

#[test]
fn empty_build_fails() {
    let err = FlatIndex::build(Vec::new(), DistanceMetric::L2).unwrap_err();
    assert!(matches!(err, Error::EmptyIndex));
}

#[test]
fn mixed_dimensions_fail() {
    let entries = vec![(vec![1.0, 0.0], Chunk::new("a")), (vec![1.0], Chunk::new("b"))];
    let err = FlatIndex::build(entries, DistanceMetric::L2).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 1 }));
}

#[test]
fn query_with_wrong_dimension_fails() {
    let index = FlatIndex::build(vec![(vec![1.0, 0.0], Chunk::new("a"))], DistanceMetric::L2).unwrap();
    assert!(matches!(index.search(&[1.0, 0.0, 0.0], 1), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn persist_then_load_gives_identical_results() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("index/vector_store");
    let embedder = HashEmbedder::default();
    let index = FlatIndex::build(embedded_entries(&embedder), DistanceMetric::Cosine)
        .unwrap()
        .with_model_id(embedder.model_id());

    persist(&index, &path).expect("persist");
    let loaded = load(&path).expect("load");

    assert_eq!(loaded.len(), index.len());
    assert_eq!(loaded.metric(), DistanceMetric::Cosine);
    assert_eq!(loaded.model_id(), Some(embedder.model_id()));
    assert_eq!(loaded.entries(), index.entries());

    let q = embedder.embed("shelter in the forest").unwrap();
    let before = index.search(&q, 3).unwrap();
    let after = loaded.search(&q, 3).unwrap();
    assert_eq!(before, after);
}

#[test]
fn loaded_index_keeps_assigning_fresh_ids() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("idx");
    let index = FlatIndex::build(vec![(vec![1.0, 0.0], Chunk::new("a")), (vec![0.0, 1.0], Chunk::new("b"))], DistanceMetric::L2).unwrap();
    index.persist(&path).unwrap();

    let mut loaded = FlatIndex::load(&path).unwrap();
    let ids = loaded.append(vec![(vec![1.0, 1.0], Chunk::new("c"))]).unwrap();
    assert_eq!(ids, vec![2]);
}

#[test]
fn persist_overwrites_previous_index() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("idx");
    FlatIndex::build(vec![(vec![1.0, 0.0], Chunk::new("old"))], DistanceMetric::L2).unwrap().persist(&path).unwrap();
    FlatIndex::build(vec![(vec![0.0, 1.0], Chunk::new("new"))], DistanceMetric::L2).unwrap().persist(&path).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.entries()[0].chunk.text, "new");
    let leftovers: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1, "no temporary files left behind");
}

#[test]
fn missing_index_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = load(&tmp.path().join("nothing")).unwrap_err();
    assert!(matches!(err, Error::IndexNotFound(_)));
}

#[test]
fn garbage_file_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("idx");
    fs::write(&path, b"this is not an index").unwrap();
    assert!(matches!(load(&path), Err(Error::IndexCorrupt { .. })));
}

#[test]
fn flipped_byte_is_detected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("idx");
    FlatIndex::build(vec![(vec![1.0, 0.0], Chunk::new("payload text"))], DistanceMetric::L2)
        .unwrap()
        .persist(&path)
        .unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 5;
    bytes[last] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    match load(&path) {
        Err(Error::IndexCorrupt { reason, .. }) => assert!(reason.contains("checksum")),
        other => panic!("expected corrupt index, got {other:?}"),
    }
}

#[test]
fn truncated_file_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("idx");
    FlatIndex::build(vec![(vec![1.0, 0.0], Chunk::new("x"))], DistanceMetric::L2).unwrap().persist(&path).unwrap();
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(load(&path), Err(Error::IndexCorrupt { .. })));
}

#[test]
fn concurrent_searches_share_one_index() {
    let embedder = HashEmbedder::default();
    let index = Arc::new(FlatIndex::build(embedded_entries(&embedder), DistanceMetric::L2).unwrap());
    let q = embedder.embed("boiling water").unwrap();
    let expected = index.search(&q, 2).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            let q = q.clone();
            std::thread::spawn(move || index.search(&q, 2).unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}
