//! Boundary-aware text splitting.
//!
//! Paragraphs (blank-line separated) are packed greedily up to `max_chars`.
//! A paragraph that does not fit on its own is split on sentence boundaries,
//! and a sentence that still does not fit is split on whitespace with
//! `overlap_chars` of trailing context repeated at the start of the next piece.
//! Lengths are counted in `char`s.

use crate::config::ChunkingSettings;

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(&ChunkingSettings::default())
    }
}

impl Chunker {
    pub fn new(settings: &ChunkingSettings) -> Self {
        let max_chars = settings.max_chars.max(1);
        Self { max_chars, overlap_chars: settings.overlap_chars.min(max_chars - 1) }
    }

    /// Splits `text` into trimmed, non-empty pieces of at most `max_chars` chars.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        for paragraph in split_paragraphs(text) {
            if char_len(&paragraph) <= self.max_chars {
                pieces.push(paragraph);
            } else {
                pieces.extend(self.split_paragraph(&paragraph));
            }
        }
        self.pack(pieces, "\n\n")
    }

    fn split_paragraph(&self, paragraph: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        for sentence in split_sentences(paragraph) {
            if char_len(sentence) <= self.max_chars {
                pieces.push(sentence.to_string());
            } else {
                pieces.extend(self.split_words_with_overlap(sentence));
            }
        }
        self.pack(pieces, " ")
    }

    /// Greedily joins consecutive pieces while the result stays within bounds.
    fn pack(&self, pieces: Vec<String>, sep: &str) -> Vec<String> {
        let sep_len = char_len(sep);
        let mut out = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        for piece in pieces {
            let piece_len = char_len(&piece);
            if current.is_empty() {
                current = piece;
                current_len = piece_len;
            } else if current_len + sep_len + piece_len <= self.max_chars {
                current.push_str(sep);
                current.push_str(&piece);
                current_len += sep_len + piece_len;
            } else {
                out.push(std::mem::replace(&mut current, piece));
                current_len = piece_len;
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    fn split_words_with_overlap(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let mut end = start;
            let mut len = 0usize;
            while end < words.len() {
                let add = char_len(words[end]) + usize::from(end > start);
                if end > start && len + add > self.max_chars {
                    break;
                }
                len += add;
                end += 1;
            }
            if len > self.max_chars {
                chunks.extend(hard_split(words[start], self.max_chars));
            } else {
                chunks.push(words[start..end].join(" "));
            }
            if end >= words.len() {
                break;
            }
            let mut back = end;
            let mut carried = 0usize;
            while back > start + 1 {
                let w = char_len(words[back - 1]) + 1;
                if carried + w > self.overlap_chars {
                    break;
                }
                carried += w;
                back -= 1;
            }
            start = back;
        }
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn hard_split(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n").trim().to_string());
    }
    paragraphs.retain(|p| !p.is_empty());
    paragraphs
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|&(_, next)| next.is_whitespace()) {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}
