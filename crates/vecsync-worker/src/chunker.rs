//! Text splitting.
//!
//! Both splitters are pure functions of (text, config): identical input
//! always yields the identical chunk list, which is what makes
//! re-processing a key idempotent. Lengths are counted in characters,
//! not bytes, so multibyte text never splits mid-codepoint.

use vecsync_config::ChunkingConfig;

/// Splits payload text into chunks per the configured strategy.
#[derive(Clone, Debug)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Build a chunker from a validated config.
    pub fn new(config: &ChunkingConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Split `text` into chunks. Empty and whitespace-only pieces are
    /// dropped, so the result may be empty.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        match &self.config {
            ChunkingConfig::None => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    vec![]
                } else {
                    vec![trimmed.to_string()]
                }
            }
            ChunkingConfig::CharacterTextSplitter { chunk_size, chunk_overlap, separator } => {
                let splits = split_on(text, separator);
                merge_splits(splits, separator, *chunk_size, *chunk_overlap)
            }
            ChunkingConfig::RecursiveCharacterTextSplitter {
                chunk_size,
                chunk_overlap,
                separators,
            } => split_recursive(text, *chunk_size, *chunk_overlap, separators),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on a separator; an empty separator splits into single
/// characters.
fn split_on(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator).map(str::to_string).collect()
    }
}

fn join_chunk(parts: &[String], separator: &str) -> Option<String> {
    let joined = parts.join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Greedily merge splits into chunks near `chunk_size`, carrying
/// `chunk_overlap` characters of trailing context into the next chunk.
fn merge_splits(
    splits: Vec<String>,
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut total = 0usize;

    for split in splits {
        let len = char_len(&split);
        let added = len + if current.is_empty() { 0 } else { sep_len };
        if total + added > chunk_size && !current.is_empty() {
            if let Some(chunk) = join_chunk(&current, separator) {
                chunks.push(chunk);
            }
            // Shed from the front until within the overlap budget and
            // the incoming split fits.
            while !current.is_empty()
                && (total > chunk_overlap
                    || total + len + if current.is_empty() { 0 } else { sep_len } > chunk_size)
            {
                let head = char_len(&current[0])
                    + if current.len() > 1 { sep_len } else { 0 };
                total = total.saturating_sub(head);
                let _ = current.remove(0);
            }
        }
        if !current.is_empty() {
            total += sep_len;
        }
        total += len;
        current.push(split);
    }

    if let Some(chunk) = join_chunk(&current, separator) {
        chunks.push(chunk);
    }
    chunks
}

/// Try separators coarsest-first: split on the first one present, merge
/// the pieces that fit, and recurse into oversized pieces with the
/// remaining separators.
fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[String],
) -> Vec<String> {
    let mut separator = separators.last().map_or("", String::as_str);
    let mut remaining: &[String] = &[];
    for (i, candidate) in separators.iter().enumerate() {
        if candidate.is_empty() || text.contains(candidate.as_str()) {
            separator = candidate;
            remaining = &separators[i + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut fitting: Vec<String> = Vec::new();
    for split in split_on(text, separator) {
        if char_len(&split) < chunk_size {
            fitting.push(split);
        } else {
            if !fitting.is_empty() {
                chunks.extend(merge_splits(
                    std::mem::take(&mut fitting),
                    separator,
                    chunk_size,
                    chunk_overlap,
                ));
            }
            if remaining.is_empty() {
                // No finer separator left; emit oversized as-is.
                chunks.push(split);
            } else {
                chunks.extend(split_recursive(&split, chunk_size, chunk_overlap, remaining));
            }
        }
    }
    if !fitting.is_empty() {
        chunks.extend(merge_splits(fitting, separator, chunk_size, chunk_overlap));
    }
    chunks
}
