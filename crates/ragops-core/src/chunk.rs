//! Recursive character text splitter.
//!
//! Splits document text into chunks of at most `max_chars` characters.
//! Separators are tried in priority order (paragraph break, line break,
//! space, single character); any piece that is still too long is split
//! again with the next finer separator. Consecutive chunks share up to
//! `overlap_chars` characters of trailing context.
//!
//! Lengths are counted in `char`s, so multi-byte text is never cut inside a
//! UTF-8 sequence. The splitter is deterministic: the same input always
//! produces the same chunks.

use crate::error::{RagError, Result};
use crate::models::{Chunk, Document};

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHARS: usize = 1000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// Separator priority: paragraph, line, word, character.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Greedy splitter that backtracks to finer separators for oversize pieces.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    max_chars: usize,
    overlap_chars: usize,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl RecursiveSplitter {
    /// Create a splitter.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `max_chars` is zero or
    /// `overlap_chars >= max_chars`.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(RagError::Config("chunk max_chars must be > 0".to_string()));
        }
        if overlap_chars >= max_chars {
            return Err(RagError::Config(format!(
                "chunk overlap_chars ({}) must be smaller than max_chars ({})",
                overlap_chars, max_chars
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Split a document into chunks that inherit its source.
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                text,
                source: document.source.clone(),
                index,
            })
            .collect()
    }

    /// Split raw text. Empty or whitespace-only text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator present in the text wins; "" always matches.
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) < self.max_chars {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge(&good, separator));
                good.clear();
            }
            if finer.is_empty() {
                if let Some(trimmed) = non_blank(&piece) {
                    chunks.push(trimmed);
                }
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge(&good, separator));
        }

        chunks
    }

    /// Greedily join pieces into chunks of at most `max_chars`, carrying a
    /// trailing window of at most `overlap_chars` into the next chunk.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut out = Vec::new();
        let mut window: Vec<(&str, usize)> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.max_chars && !window.is_empty() {
                if let Some(chunk) = join_window(&window, separator) {
                    out.push(chunk);
                }
                // Shrink from the front until the window fits the overlap
                // budget and leaves room for the incoming piece.
                while total > self.overlap_chars
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.max_chars)
                {
                    let (_, first_len) = window.remove(0);
                    total -= first_len + if window.is_empty() { 0 } else { sep_len };
                }
            }

            let joiner = if window.is_empty() { 0 } else { sep_len };
            window.push((piece.as_str(), len));
            total += len + joiner;
        }

        if let Some(chunk) = join_window(&window, separator) {
            out.push(chunk);
        }

        out
    }
}

fn join_window(window: &[(&str, usize)], separator: &str) -> Option<String> {
    let joined = window
        .iter()
        .map(|(s, _)| *s)
        .collect::<Vec<_>>()
        .join(separator);
    non_blank(&joined)
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
