use tiktoken_rs::{cl100k_base, CoreBPE};

/// BPE tokenizer compatible with the embedding and LLM providers
/// (`cl100k_base` vocabulary). When the vocabulary cannot be loaded the
/// tokenizer degrades to word counts; callers must tolerate either mode.
pub struct Tokenizer {
    bpe: Option<CoreBPE>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            bpe: cl100k_base().ok(),
        }
    }

    pub const fn has_vocabulary(&self) -> bool {
        self.bpe.is_some()
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.split_whitespace().count(),
        }
    }

    /// Raw BPE token ids. Empty when no vocabulary is loaded; use
    /// [`Self::count`] for budget decisions, which works in either mode.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text),
            None => Vec::new(),
        }
    }

    /// Decodes BPE ids back into text. Missing vocabulary decodes to "".
    pub fn decode(&self, tokens: &[u32]) -> String {
        match &self.bpe {
            Some(bpe) if !tokens.is_empty() => Self::decode_span(bpe, tokens, 0, tokens.len()),
            _ => String::new(),
        }
    }

    /// Truncates to at most `max_tokens` tokens, returning the input
    /// unchanged when it already fits.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        match &self.bpe {
            Some(bpe) => {
                let tokens = bpe.encode_with_special_tokens(text);
                if tokens.len() <= max_tokens {
                    return text.to_string();
                }
                Self::decode_span(bpe, &tokens, 0, max_tokens)
            }
            None => {
                let words: Vec<&str> = text.split_whitespace().collect();
                if words.len() <= max_tokens {
                    text.to_string()
                } else {
                    words[..max_tokens].join(" ")
                }
            }
        }
    }

    /// Splits text into windows of at most `window` tokens with `overlap`
    /// tokens shared between consecutive windows. Text that already fits in
    /// one window is returned as-is.
    pub fn split_token_windows(&self, text: &str, window: usize, overlap: usize) -> Vec<String> {
        if window == 0 {
            return vec![text.to_string()];
        }

        match &self.bpe {
            Some(bpe) => {
                let tokens = bpe.encode_with_special_tokens(text);
                if tokens.len() <= window {
                    return vec![text.to_string()];
                }

                let mut chunks = Vec::new();
                let mut start = 0usize;
                loop {
                    let end = (start + window).min(tokens.len());
                    let piece = Self::decode_span(bpe, &tokens, start, end);
                    let piece = piece.trim();
                    if !piece.is_empty() {
                        chunks.push(piece.to_string());
                    }
                    if end == tokens.len() {
                        break;
                    }
                    let next = end.saturating_sub(overlap);
                    start = if next <= start { start + 1 } else { next };
                }
                chunks
            }
            None => {
                let words: Vec<&str> = text.split_whitespace().collect();
                if words.len() <= window {
                    return vec![text.to_string()];
                }

                let mut chunks = Vec::new();
                let mut start = 0usize;
                loop {
                    let end = (start + window).min(words.len());
                    chunks.push(words[start..end].join(" "));
                    if end == words.len() {
                        break;
                    }
                    let next = end.saturating_sub(overlap);
                    start = if next <= start { start + 1 } else { next };
                }
                chunks
            }
        }
    }

    /// Decodes `tokens[start..end]`, widening the slice when a boundary
    /// lands inside a multi-byte sequence.
    fn decode_span(bpe: &CoreBPE, tokens: &[u32], mut start: usize, mut end: usize) -> String {
        loop {
            match bpe.decode(tokens[start..end].to_vec()) {
                Ok(text) => return text,
                Err(_) if end < tokens.len() => end += 1,
                Err(_) if start > 0 => start -= 1,
                Err(_) => return String::new(),
            }
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
