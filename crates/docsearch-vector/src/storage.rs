//! On-disk format and atomic persistence for [`FlatIndex`].
//!
//! File layout: `MAGIC (8 bytes) | blake3(payload) (32 bytes) | payload`, where
//! the payload is the JSON-encoded snapshot. The file is written to a temporary
//! sibling, fsynced and renamed over `path`, so readers see either the previous
//! index or the new one. `persist` and `load` on the same path are serialized
//! within the process.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use docsearch_core::types::{DistanceMetric, EntryId};
use docsearch_core::{Error, Result};

use crate::index::{FlatIndex, IndexEntry};

const MAGIC: &[u8; 8] = b"DSFLAT\0\n";
const DIGEST_LEN: usize = 32;
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format_version: u32,
    metric: DistanceMetric,
    dimension: usize,
    model_id: Option<&'a str>,
    next_id: EntryId,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct Snapshot {
    format_version: u32,
    metric: DistanceMetric,
    dimension: usize,
    model_id: Option<String>,
    next_id: EntryId,
    entries: Vec<IndexEntry>,
}

/// Absolute, lexically normalized form of `path`, with its deepest existing
/// ancestor canonicalized so aliases of one file share a key.
fn lock_key(path: &Path) -> PathBuf {
    let absolute = std::env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf());
    let mut normal = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other),
        }
    }
    let mut existing = normal.as_path();
    while let Some(parent) = existing.parent() {
        existing = parent;
        if let Ok(canonical) = fs::canonicalize(existing) {
            return match normal.strip_prefix(existing) {
                Ok(rest) => canonical.join(rest),
                Err(_) => normal.clone(),
            };
        }
    }
    normal
}

static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Per-path lock; entries nobody holds are pruned on each call.
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = lock_key(path);
    let mut locks = LOCKS.get_or_init(Default::default).lock();
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    locks.entry(key).or_default().clone()
}

/// Writes `index` to `path`, replacing any previous content.
pub fn persist(index: &FlatIndex, path: &Path) -> Result<()> {
    let lock = path_lock(path);
    let _guard = lock.lock();

    let snapshot = SnapshotRef {
        format_version: FORMAT_VERSION,
        metric: index.metric,
        dimension: index.dimension,
        model_id: index.model_id.as_deref(),
        next_id: index.next_id,
        entries: &index.entries,
    };
    let payload = serde_json::to_vec(&snapshot).map_err(std::io::Error::from)?;
    let digest = blake3::hash(&payload);

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(MAGIC)?;
    tmp.write_all(digest.as_bytes())?;
    tmp.write_all(&payload)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    info!("Index with {} entries saved to {}", index.entries.len(), path.display());
    Ok(())
}

/// Reads an index written by [`persist`].
pub fn load(path: &Path) -> Result<FlatIndex> {
    let lock = path_lock(path);
    let _guard = lock.lock();

    if !path.is_file() {
        return Err(Error::IndexNotFound(path.to_path_buf()));
    }
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::IndexNotFound(path.to_path_buf())),
        Err(e) => return Err(e.into()),
    };
    let index = decode(&bytes).map_err(|reason| Error::corrupt(path, reason))?;
    debug!("Loaded index with {} entries from {}", index.entries.len(), path.display());
    Ok(index)
}

fn decode(bytes: &[u8]) -> std::result::Result<FlatIndex, String> {
    if bytes.len() < MAGIC.len() + DIGEST_LEN {
        return Err("file is truncated".into());
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err("unrecognized file header".into());
    }
    let (digest, payload) = rest.split_at(DIGEST_LEN);
    if blake3::hash(payload).as_bytes() != digest {
        return Err("checksum mismatch".into());
    }
    let snapshot: Snapshot = serde_json::from_slice(payload).map_err(|e| format!("invalid payload: {e}"))?;
    if snapshot.format_version != FORMAT_VERSION {
        return Err(format!("unsupported format version {}", snapshot.format_version));
    }

    let mut previous: Option<EntryId> = None;
    for entry in &snapshot.entries {
        if entry.vector.len() != snapshot.dimension {
            return Err(format!("entry {} has {} dimensions, expected {}", entry.id, entry.vector.len(), snapshot.dimension));
        }
        if previous.is_some_and(|p| entry.id <= p) || entry.id >= snapshot.next_id {
            return Err(format!("entry id {} is out of order", entry.id));
        }
        previous = Some(entry.id);
    }
    if snapshot.entries.is_empty() {
        return Err("index has no entries".into());
    }

    Ok(FlatIndex {
        metric: snapshot.metric,
        dimension: snapshot.dimension,
        model_id: snapshot.model_id,
        entries: snapshot.entries,
        next_id: snapshot.next_id,
    })
}

impl FlatIndex {
    pub fn persist(&self, path: &Path) -> Result<()> {
        persist(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load(path)
    }
}
