use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

/// Upper bound on characters per token, used to cap chunks whose words
/// are unusually long (minified code, base64, whitespace-free data).
const CHARS_PER_TOKEN: usize = 6;

impl ChunkingConfig {
    /// Hard limit on the characters of any one chunk.
    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_tokens.saturating_mul(CHARS_PER_TOKEN).max(1)
    }
}

/// Read a file as UTF-8, falling back to a lossy decode for stray bytes.
pub fn read_lossy(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(path).map_err(|e| Error::extraction(path, e))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// Rough token estimate: one token per 0.75 words.
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f32 / 0.75) as usize
}

/// Pack blank-line separated paragraphs into chunks of at most
/// `max_tokens` and `max_chars`; paragraphs larger than that are split on
/// word windows with overlap, and words too long for a window are cut.
#[must_use]
pub fn split_text(content: &str, config: &ChunkingConfig) -> Vec<String> {
    let max_chars = config.max_chars();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0;

    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let tokens = count_tokens(paragraph);
        let chars = paragraph.chars().count();
        if tokens > config.max_tokens || chars > max_chars {
            flush(&mut chunks, &mut current, &mut current_tokens);
            chunks.extend(split_paragraph_with_overlap(paragraph, config));
            continue;
        }
        if current_tokens + tokens > config.max_tokens || current.chars().count() + chars + 2 > max_chars {
            flush(&mut chunks, &mut current, &mut current_tokens);
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
        current_tokens += tokens;
    }
    flush(&mut chunks, &mut current, &mut current_tokens);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String, tokens: &mut usize) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
    *tokens = 0;
}

fn split_paragraph_with_overlap(paragraph: &str, config: &ChunkingConfig) -> Vec<String> {
    let words: Vec<&str> = paragraph.split_whitespace().collect();
    let words_per_chunk = ((config.max_tokens as f32 * 0.75) as usize).max(1);
    let overlap_words = ((words_per_chunk as f32 * config.overlap_percent) as usize).min(words_per_chunk - 1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + words_per_chunk).min(words.len());
        windows.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start = end - overlap_words;
    }
    cap_chars(windows, config.max_chars())
}

/// Cut every text longer than `max_chars` into consecutive pieces of at
/// most `max_chars` characters. Pieces that are only whitespace are dropped.
#[must_use]
pub fn cap_chars(texts: Vec<String>, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut out = Vec::with_capacity(texts.len());
    for text in texts {
        if text.chars().count() <= max_chars {
            out.push(text);
            continue;
        }
        let chars: Vec<char> = text.chars().collect();
        for piece in chars.chunks(max_chars) {
            let piece: String = piece.iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                out.push(piece.to_string());
            }
        }
    }
    out
}
