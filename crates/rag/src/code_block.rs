//! Code block processor.

use async_trait::async_trait;
use lp_domain::ContentType;

use crate::chunking::RawChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeBlockStrategy {
    Preserve,
    Summarize,
    Hybrid { threshold_bytes: usize },
}

impl Default for CodeBlockStrategy {
    fn default() -> Self {
        CodeBlockStrategy::Hybrid {
            threshold_bytes: 500,
        }
    }
}

/// Narrow seam onto the LLM gateway: the code processor only ever needs a
/// one-shot summarization call, never the full chat/stream contract.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize_code(&self, code: &str) -> anyhow::Result<String>;
}

pub struct CodeBlockProcessor<S: Summarizer> {
    strategy: CodeBlockStrategy,
    summarizer: S,
}

/// Outcome of processing one code chunk: the chunk to index, plus whether a
/// fallback occurred (feeds `ChunkMetadata::summary_failed`).
pub struct ProcessedCodeBlock {
    pub chunk: RawChunk,
    pub original_code: Option<String>,
    pub summary_failed: bool,
}

impl<S: Summarizer> CodeBlockProcessor<S> {
    pub fn new(strategy: CodeBlockStrategy, summarizer: S) -> Self {
        Self {
            strategy,
            summarizer,
        }
    }

    /// Given a code chunk, emit it unchanged (`preserve`), replace it with
    /// an LLM summary (`summarize`), or choose based on byte length
    /// (`hybrid`). LLM failure always falls back to `preserve` so the
    /// original source is never lost from the index.
    pub async fn process(&self, raw: RawChunk) -> ProcessedCodeBlock {
        debug_assert_eq!(raw.content_type, ContentType::CodeBlock);

        let should_summarize = match self.strategy {
            CodeBlockStrategy::Preserve => false,
            CodeBlockStrategy::Summarize => true,
            CodeBlockStrategy::Hybrid { threshold_bytes } => raw.text.len() >= threshold_bytes,
        };

        if !should_summarize {
            return ProcessedCodeBlock {
                chunk: raw,
                original_code: None,
                summary_failed: false,
            };
        }

        match self.summarizer.summarize_code(&raw.text).await {
            Ok(summary) => ProcessedCodeBlock {
                chunk: RawChunk {
                    text: summary,
                    content_type: ContentType::CodeSummary,
                    position: raw.position,
                },
                original_code: Some(raw.text),
                summary_failed: false,
            },
            Err(_) => ProcessedCodeBlock {
                chunk: raw.clone(),
                original_code: None,
                summary_failed: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;
    #[async_trait]
    impl Summarizer for AlwaysFails {
        async fn summarize_code(&self, _code: &str) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("llm unavailable"))
        }
    }

    struct Echo;
    #[async_trait]
    impl Summarizer for Echo {
        async fn summarize_code(&self, code: &str) -> anyhow::Result<String> {
            Ok(format!("summary of {} bytes", code.len()))
        }
    }

    fn code_chunk(text: &str) -> RawChunk {
        RawChunk {
            text: text.to_string(),
            content_type: ContentType::CodeBlock,
            position: 0,
        }
    }

    #[tokio::test]
    async fn preserve_never_calls_summarizer() {
        let processor = CodeBlockProcessor::new(CodeBlockStrategy::Preserve, AlwaysFails);
        let out = processor.process(code_chunk("fn x() {}")).await;
        assert!(!out.summary_failed);
        assert_eq!(out.chunk.content_type, ContentType::CodeBlock);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_preserve_and_marks_summary_failed() {
        let processor = CodeBlockProcessor::new(CodeBlockStrategy::Summarize, AlwaysFails);
        let out = processor.process(code_chunk("fn x() {}")).await;
        assert!(out.summary_failed);
        assert_eq!(out.chunk.content_type, ContentType::CodeBlock);
        assert_eq!(out.chunk.text, "fn x() {}");
    }

    #[tokio::test]
    async fn hybrid_below_threshold_preserves() {
        let processor = CodeBlockProcessor::new(
            CodeBlockStrategy::Hybrid {
                threshold_bytes: 500,
            },
            Echo,
        );
        let out = processor.process(code_chunk("short")).await;
        assert_eq!(out.chunk.content_type, ContentType::CodeBlock);
    }

    #[tokio::test]
    async fn hybrid_above_threshold_summarizes_and_retains_original() {
        let processor = CodeBlockProcessor::new(
            CodeBlockStrategy::Hybrid { threshold_bytes: 5 },
            Echo,
        );
        let out = processor.process(code_chunk("long enough code")).await;
        assert_eq!(out.chunk.content_type, ContentType::CodeSummary);
        assert!(out.original_code.is_some());
    }
}
