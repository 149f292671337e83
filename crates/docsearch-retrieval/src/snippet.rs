//! Contextual snippets around the literal overlap between a chunk and a query.
//!
//! The locator is the longest common substring under case-insensitive
//! comparison. It only finds shared characters, not semantic relevance, so a
//! paraphrased question highlights whatever literal overlap exists (often a
//! single word). The external contract would not change if it were replaced by
//! a token-alignment highlighter.

use docsearch_core::config::SearchSettings;

/// A maximal common run, in `char` offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonRun {
    pub text_start: usize,
    pub query_start: usize,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct SnippetExtractor {
    window_size: usize,
    mark_start: String,
    mark_end: String,
}

impl SnippetExtractor {
    pub fn new(window_size: usize, mark_start: impl Into<String>, mark_end: impl Into<String>) -> Self {
        Self { window_size, mark_start: mark_start.into(), mark_end: mark_end.into() }
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::new(settings.window_size, settings.highlight_start.as_str(), settings.highlight_end.as_str())
    }

    pub fn extract(&self, full_text: &str, query_text: &str) -> String {
        extract(full_text, query_text, self.window_size, &self.mark_start, &self.mark_end)
    }
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Longest run of characters shared by `text` and `query`, ignoring case.
///
/// Among equally long runs, the one starting earliest in `text` wins, then the
/// one starting earliest in `query`.
pub fn longest_common_run(text: &[char], query: &[char]) -> Option<CommonRun> {
    let query: Vec<char> = query.iter().copied().map(fold).collect();
    let mut prev = vec![0usize; query.len() + 1];
    let mut cur = vec![0usize; query.len() + 1];
    let mut best: Option<CommonRun> = None;
    for (i, &tc) in text.iter().enumerate() {
        let tc = fold(tc);
        for (j, &qc) in query.iter().enumerate() {
            cur[j + 1] = if tc == qc { prev[j] + 1 } else { 0 };
            let len = cur[j + 1];
            if len > best.map_or(0, |b| b.len) {
                best = Some(CommonRun { text_start: i + 1 - len, query_start: j + 1 - len, len });
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

/// Returns at most `window_size` characters of `full_text` around its longest
/// overlap with `query_text`, with the overlap wrapped in the markers.
///
/// Without any overlap the first `window_size` characters are returned
/// unmarked. The window is centered on the match and shifted inward when it
/// would run past either edge. Markers do not count toward the window.
pub fn extract(full_text: &str, query_text: &str, window_size: usize, mark_start: &str, mark_end: &str) -> String {
    let text: Vec<char> = full_text.chars().collect();
    let query: Vec<char> = query_text.chars().collect();

    let Some(run) = longest_common_run(&text, &query) else {
        return text.iter().take(window_size).collect();
    };

    let (start, match_end, end) = if run.len >= window_size {
        let end = run.text_start + window_size;
        (run.text_start, end, end)
    } else {
        let spare = window_size - run.len;
        let left = spare / 2;
        let right = spare - left;
        let match_end = run.text_start + run.len;
        let room_left = run.text_start;
        let room_right = text.len() - match_end;
        let take_left = left.min(room_left) + right.saturating_sub(room_right);
        let take_right = right.min(room_right) + left.saturating_sub(room_left);
        let start = run.text_start - take_left.min(room_left);
        let end = match_end + take_right.min(room_right);
        (start, match_end, end)
    };

    let before: String = text[start..run.text_start].iter().collect();
    let matched: String = text[run.text_start..match_end].iter().collect();
    let after: String = text[match_end..end].iter().collect();
    format!("{before}{mark_start}{matched}{mark_end}{after}").trim().to_string()
}
