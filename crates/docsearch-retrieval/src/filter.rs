use std::fmt;

use docsearch_core::config::SearchSettings;
use docsearch_core::types::{QueryResult, ThresholdPolicy};
use docsearch_core::{Error, Result};

use crate::snippet::SnippetExtractor;

pub const NO_RESULTS_MESSAGE: &str = "No satisfactory results found. Try rephrasing your question or using more specific terms. Question has to be a full sentence and in English.";
pub const NO_METADATA: &str = "No metadata provided";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResult {
    /// 1-based position among the surviving results.
    pub rank: usize,
    pub score: f32,
    pub snippet: String,
    pub metadata: Option<String>,
}

impl fmt::Display for RenderedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Result {} (Score: {:.2}):\nSnippet: {}...\nMetadata: {}",
            self.rank,
            self.score,
            self.snippet,
            self.metadata.as_deref().unwrap_or(NO_METADATA)
        )
    }
}

/// Either at least one rendered result or the no-results sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedAnswer {
    Results(Vec<RenderedResult>),
    NoResults,
}

impl FormattedAnswer {
    pub fn from_results(results: Vec<RenderedResult>) -> Self {
        if results.is_empty() { Self::NoResults } else { Self::Results(results) }
    }
}

impl fmt::Display for FormattedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResults => f.write_str(NO_RESULTS_MESSAGE),
            Self::Results(results) => {
                for (i, r) in results.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n\n")?;
                    }
                    write!(f, "{r}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultFilter {
    policy: ThresholdPolicy,
    snippets: SnippetExtractor,
}

impl ResultFilter {
    pub fn new(policy: ThresholdPolicy, snippets: SnippetExtractor) -> Self {
        Self { policy, snippets }
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::new(settings.threshold_policy, SnippetExtractor::from_settings(settings))
    }

    /// Drops results on the wrong side of `threshold` and renders the rest in
    /// input order.
    pub fn filter_and_format(&self, results: &[QueryResult], threshold: f32, query_text: &str) -> Result<FormattedAnswer> {
        if !threshold.is_finite() {
            return Err(Error::InvalidQueryParameter(format!("threshold must be a finite number, got {threshold}")));
        }
        let rendered = results
            .iter()
            .filter(|r| self.policy.keeps(r.distance, threshold))
            .enumerate()
            .map(|(i, r)| RenderedResult {
                rank: i + 1,
                score: r.distance,
                snippet: self.snippets.extract(&r.chunk.text, query_text),
                metadata: r.chunk.metadata_display(),
            })
            .collect();
        Ok(FormattedAnswer::from_results(rendered))
    }
}
