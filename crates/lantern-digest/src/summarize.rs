//! Chunk-and-combine summarization over the inference client.

use std::sync::Arc;

use lantern_llm::{ChatMessage, ChatRequest, GenerationOptions, InferenceClient};

use crate::chunker::{DEFAULT_MAX_WORDS, TextChunker};
use crate::error::Result;

/// Separator placed between chunk summaries and between attached documents.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

const SUMMARY_PROMPT: &str = "Summarize the following text concisely, preserving key information:\n\n";

/// Tuning for summarization calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryOptions {
    /// Word threshold for summarizing a document, and the chunk size.
    pub max_words: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

impl SummaryOptions {
    fn generation(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// A named document whose text can be attached to a chat message.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub text: Arc<str>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Reduces oversized text to a digest that fits in one request.
#[derive(Clone)]
pub struct SummarizationPipeline {
    client: InferenceClient,
    options: SummaryOptions,
}

impl SummarizationPipeline {
    pub fn new(client: InferenceClient) -> Self {
        Self {
            client,
            options: SummaryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SummaryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SummaryOptions {
        &self.options
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    fn chunker(&self) -> TextChunker {
        TextChunker::new(self.options.max_words)
    }

    /// Whether `text` is over the word threshold.
    pub fn needs_digest(&self, text: &str) -> bool {
        !self.chunker().fits(text)
    }

    /// Summarize `text` with `model`.
    ///
    /// Text that fits one chunk is summarized with a single call and its
    /// failure is returned. Longer text is summarized chunk by chunk, in
    /// order; a failed chunk becomes an inline placeholder and the rest
    /// still run.
    pub async fn summarize(&self, text: &str, model: &str) -> Result<String> {
        let chunks = self.chunker().chunk(text);
        match chunks.as_slice() {
            [] => Ok(String::new()),
            [only] => Ok(self.summarize_chunk(only, model).await?),
            _ => {
                tracing::info!(chunks = chunks.len(), model, "Summarizing document in chunks");
                let mut summaries = Vec::with_capacity(chunks.len());
                for (i, chunk) in chunks.iter().enumerate() {
                    match self.summarize_chunk(chunk, model).await {
                        Ok(summary) => summaries.push(summary),
                        Err(e) => {
                            tracing::warn!(chunk = i + 1, error = %e, "Chunk summary failed");
                            summaries.push(format!("[Chunk {} summary failed: {}]", i + 1, e));
                        }
                    }
                }
                Ok(summaries.join(CHUNK_SEPARATOR))
            }
        }
    }

    async fn summarize_chunk(&self, chunk: &str, model: &str) -> lantern_llm::Result<String> {
        let request = ChatRequest::new(
            model,
            vec![ChatMessage::user(format!("{SUMMARY_PROMPT}{chunk}"))],
        )
        .with_options(self.options.generation());
        let output = self.client.complete(request).await?;
        Ok(output.trim().to_string())
    }

    /// Build the user message for a chat turn with attached documents.
    ///
    /// Documents over the word threshold are replaced by their digest.
    /// With no documents the question is returned unchanged.
    pub async fn compose_message(
        &self,
        question: &str,
        documents: &[SourceDocument],
        model: &str,
    ) -> Result<String> {
        let mut blocks = Vec::with_capacity(documents.len());
        for doc in documents {
            blocks.push(self.document_block(doc, model).await?);
        }

        Ok(match blocks.len() {
            0 => question.to_string(),
            1 => format!("{}\n\nUser question: {}", blocks[0], question),
            _ => {
                let joined = blocks.join(CHUNK_SEPARATOR);
                if question.trim().is_empty() {
                    joined
                } else {
                    format!("{joined}\n\nUser question: {question}")
                }
            }
        })
    }

    async fn document_block(&self, doc: &SourceDocument, model: &str) -> Result<String> {
        if self.needs_digest(&doc.text) {
            let digest = self.summarize(&doc.text, model).await?;
            Ok(format!("[File: {} (summarized)]\n{}", doc.name, digest))
        } else {
            Ok(format!("[File: {}]\n{}", doc.name, doc.text))
        }
    }
}
