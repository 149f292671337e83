//! docsearch-vector
//!
//! Exact (flat) nearest-neighbour index over `(vector, chunk)` entries with
//! atomic, integrity-checked persistence. See `index` for search semantics and
//! `storage` for the on-disk format.

pub mod distance;
pub mod index;
pub mod storage;

pub use index::{FlatIndex, IndexEntry};
pub use storage::{load, persist};
