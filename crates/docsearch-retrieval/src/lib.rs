//! docsearch-retrieval
//!
//! Query-time pipeline: embed the question, search the index, keep results on
//! the right side of the threshold, and render each with a highlighted snippet.
//! [`DocSearch`] also drives index-time ingestion.

pub mod engine;
pub mod filter;
pub mod snippet;

pub use engine::{DocSearch, IndexSummary};
pub use filter::{FormattedAnswer, RenderedResult, ResultFilter, NO_METADATA, NO_RESULTS_MESSAGE};
pub use snippet::SnippetExtractor;
