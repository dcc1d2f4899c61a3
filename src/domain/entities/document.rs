use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_CHARS: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// One ingested chunk. Its ordinal in the record sequence is its index label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    pub source: String,
}

impl Record {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub source: String,
    pub score: f32,
}

impl SearchHit {
    pub fn from_record(record: &Record, score: f32) -> Self {
        Self {
            text: record.text.clone(),
            source: record.source.clone(),
            score,
        }
    }
}

/// Splits `text` into overlapping windows of at most `max_chars` characters.
///
/// Windows are measured in chars, so multi-byte sequences are never split.
/// Consecutive windows share `overlap` characters. When the overlap would
/// stop the window from moving (`overlap >= max_chars`), the next window starts
/// where the previous one ended. Each window is trimmed and blank windows are
/// dropped.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    if max_chars == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, including the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + max_chars).min(total);
        let window = text[bounds[start]..bounds[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }

        if end == total {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next <= start { end } else { next };
    }

    chunks
}
