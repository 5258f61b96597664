use std::sync::LazyLock;

use regex::Regex;

use common::utils::tokenizer::Tokenizer;

pub const DEFAULT_MAX_TOKENS: usize = 400;
/// Token overlap between consecutive windows when a single sentence
/// exceeds the chunk budget.
pub const SENTENCE_OVERLAP_TOKENS: usize = 50;
/// Fragments at or below this length are treated as abbreviation noise.
const MIN_SENTENCE_CHARS: usize = 10;

static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(\s+|$)").expect("static regex"));

/// A chunk along with its char offsets into the normalized input text.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedChunk {
    pub text: String,
    pub start_char: u64,
    pub end_char: u64,
}

/// Replaces CR/LF with spaces and collapses whitespace runs.
pub fn normalize_whitespace(text: &str) -> String {
    let replaced = text.replace(['\r', '\n'], " ");
    WHITESPACE_RUNS.replace_all(&replaced, " ").trim().to_string()
}

/// Char offsets (into the normalized full text) where each source page
/// starts. Pages joined by blank lines normalize to pages joined by single
/// spaces, so offsets accumulate per normalized page plus one separator.
pub fn page_start_offsets(pages: &[String]) -> Vec<u64> {
    let mut starts = Vec::new();
    let mut cursor: u64 = 0;

    for page in pages {
        let normalized = normalize_whitespace(page);
        if normalized.is_empty() {
            continue;
        }
        starts.push(cursor);
        cursor += normalized.chars().count() as u64 + 1;
    }

    if starts.is_empty() {
        starts.push(0);
    }
    starts
}

/// 1-based page containing the given char offset.
pub fn page_for_offset(page_starts: &[u64], offset: u64) -> u32 {
    match page_starts.binary_search(&offset) {
        Ok(index) => index as u32 + 1,
        Err(0) => 1,
        Err(index) => index as u32,
    }
}

#[derive(Debug)]
struct Sentence {
    text: String,
    start_char: u64,
    end_char: u64,
}

/// Splits normalized text into sentences, keeping terminators attached and
/// dropping short fragments.
fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut last_byte = 0usize;
    let mut last_char = 0u64;

    let mut push_piece = |piece: &str, piece_start_char: u64| {
        let trimmed = piece.trim();
        if trimmed.chars().count() > MIN_SENTENCE_CHARS {
            let leading_ws = piece.chars().take_while(|c| c.is_whitespace()).count() as u64;
            let trimmed_chars = trimmed.chars().count() as u64;
            sentences.push(Sentence {
                text: trimmed.to_string(),
                start_char: piece_start_char + leading_ws,
                end_char: piece_start_char + leading_ws + trimmed_chars,
            });
        }
    };

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        let piece = &text[last_byte..boundary.end()];
        push_piece(piece, last_char);
        last_char += piece.chars().count() as u64;
        last_byte = boundary.end();
    }

    if last_byte < text.len() {
        push_piece(&text[last_byte..], last_char);
    }

    sentences
}

/// Smart sentence-aware chunking with tokenized overlap.
///
/// Sentences are packed greedily up to `max_tokens`; a sentence that alone
/// exceeds the budget is split into token windows with
/// [`SENTENCE_OVERLAP_TOKENS`] of overlap, the first window joining the
/// unflushed buffer when the combined count stays within
/// `max_tokens + overlap`.
pub fn chunk_text_with_spans(
    tokenizer: &Tokenizer,
    text: &str,
    max_tokens: usize,
) -> Vec<SpannedChunk> {
    let max_tokens = if max_tokens == 0 {
        DEFAULT_MAX_TOKENS
    } else {
        max_tokens
    };

    let normalized = normalize_whitespace(text);
    let sentences = split_sentences(&normalized);

    let mut chunks: Vec<SpannedChunk> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;
    let mut current_start = 0u64;
    let mut current_end = 0u64;

    for sentence in sentences {
        let sentence_tokens = tokenizer.count(&sentence.text);

        if sentence_tokens > max_tokens {
            let windows = tokenizer.split_token_windows(
                &sentence.text,
                max_tokens,
                SENTENCE_OVERLAP_TOKENS,
            );
            for (index, window) in windows.into_iter().enumerate() {
                let window_tokens = tokenizer.count(&window);
                if index == 0
                    && !current.is_empty()
                    && current_tokens + window_tokens <= max_tokens + SENTENCE_OVERLAP_TOKENS
                {
                    current.push(' ');
                    current.push_str(&window);
                    chunks.push(SpannedChunk {
                        text: std::mem::take(&mut current),
                        start_char: current_start,
                        end_char: sentence.end_char,
                    });
                    current_tokens = 0;
                } else {
                    if !current.is_empty() {
                        chunks.push(SpannedChunk {
                            text: std::mem::take(&mut current),
                            start_char: current_start,
                            end_char: current_end,
                        });
                        current_tokens = 0;
                    }
                    // Windows share the span of their source sentence.
                    chunks.push(SpannedChunk {
                        text: window,
                        start_char: sentence.start_char,
                        end_char: sentence.end_char,
                    });
                }
            }
            continue;
        }

        if current_tokens + sentence_tokens > max_tokens && !current.is_empty() {
            chunks.push(SpannedChunk {
                text: std::mem::take(&mut current),
                start_char: current_start,
                end_char: current_end,
            });
            current_tokens = 0;
        }

        if current.is_empty() {
            current_start = sentence.start_char;
        } else {
            current.push(' ');
        }
        current.push_str(&sentence.text);
        current_end = sentence.end_char;
        current_tokens += sentence_tokens;
    }

    if !current.trim().is_empty() {
        chunks.push(SpannedChunk {
            text: current,
            start_char: current_start,
            end_char: current_end,
        });
    }

    chunks
}

/// Sentence-aware chunking without span tracking.
pub fn chunk_text(tokenizer: &Tokenizer, text: &str, max_tokens: usize) -> Vec<String> {
    chunk_text_with_spans(tokenizer, text, max_tokens)
        .into_iter()
        .map(|chunk| chunk.text)
        .collect()
}

/// Pure token-windowed chunking without sentence awareness.
pub fn chunk_with_overlap(
    tokenizer: &Tokenizer,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    tokenizer.split_token_windows(text.trim(), chunk_size, overlap)
}
