//! Word-count chunking.

/// Default words per chunk; also the threshold above which documents are summarized.
pub const DEFAULT_MAX_WORDS: usize = 6000;

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split `text` into chunks of at most `max_words` words.
///
/// Text within the limit is returned unchanged as a single chunk; blank text
/// yields no chunks. Longer text is split on word boundaries into
/// `max_words`-sized groups (joined by single spaces), the last one possibly
/// shorter. A `max_words` of zero is treated as one.
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let total = word_count(text);
    if total == 0 {
        return Vec::new();
    }
    if total <= max_words {
        return vec![text.to_string()];
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(max_words).map(|group| group.join(" ")).collect()
}

/// Chunker with a fixed word limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    max_words: usize,
}

impl TextChunker {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words: max_words.max(1),
        }
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }

    /// Whether `text` fits in one chunk.
    pub fn fits(&self, text: &str) -> bool {
        word_count(text) <= self.max_words
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.max_words)
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORDS)
    }
}
