//! LLM gateway: the sole path LLM traffic may take through the
//! system. Direct use of a model SDK anywhere else is out of contract.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use lp_domain::{CoreError, ErrorCode};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// A non-streamed reply, or a channel of token deltas` / §4.12 "on stream, yields token deltas").
pub enum ChatOutput {
    Text(String),
    Tokens(mpsc::Receiver<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("rate limited")]
    RateLimited,
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("context too large")]
    ContextTooLarge,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<ChatOutput, LlmError>;
}

const MAX_RATE_LIMIT_RETRIES: u32 = 3;

pub struct LlmGateway<P: LlmProvider> {
    provider: P,
}

impl<P: LlmProvider> LlmGateway<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// `chat(messages, model?, temperature?, stream?)`.
    /// `LLM_RATE_LIMITED` is retried with jitter up to
    /// `MAX_RATE_LIMIT_RETRIES` times before surfacing; the other failure
    /// kinds propagate immediately, untranslated in meaning.
    #[instrument(skip(self, messages))]
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
        stream: bool,
    ) -> Result<ChatOutput, CoreError> {
        let mut attempt = 0;
        loop {
            match self.provider.chat(messages, &options, stream).await {
                Ok(out) => return Ok(out),
                Err(LlmError::RateLimited) => {
                    attempt += 1;
                    if attempt >= MAX_RATE_LIMIT_RETRIES {
                        return Err(CoreError::new(
                                ErrorCode::LlmRateLimited,
                                format!("rate limited after {attempt} attempts"),
                        ));
                    }
                    sleep(jittered_backoff(attempt)).await;
                }
                Err(LlmError::Unavailable(message)) => {
                    return Err(CoreError::new(ErrorCode::LlmUnavailable, message));
                }
                Err(LlmError::ContextTooLarge) => {
                    return Err(CoreError::new(
                            ErrorCode::LlmContextTooLarge,
                            "request exceeds the model's context window",
                    ));
                }
            }
        }
    }
}

/// Exponential backoff with a small jitter term so concurrent callers
/// retrying the same rate limit don't all wake up in lockstep.
fn jittered_backoff(attempt: u32) -> Duration {
    let base_ms = 100u64 * 2u64.pow(attempt - 1);
    let jitter_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % 50)
        .unwrap_or(0);
    Duration::from_millis(base_ms + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        fail_first_n: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
            _stream: bool,
        ) -> Result<ChatOutput, LlmError> {
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                return Err(LlmError::RateLimited);
            }
            Ok(ChatOutput::Text("hello".to_string()))
        }
    }

    struct AlwaysUnavailable;
    #[async_trait]
    impl LlmProvider for AlwaysUnavailable {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
            _stream: bool,
        ) -> Result<ChatOutput, LlmError> {
            Err(LlmError::Unavailable("provider down".to_string()))
        }
    }

    struct TooLarge;
    #[async_trait]
    impl LlmProvider for TooLarge {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
            _stream: bool,
        ) -> Result<ChatOutput, LlmError> {
            Err(LlmError::ContextTooLarge)
        }
    }

    fn msgs() -> Vec<ChatMessage> {
        vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
        }]
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let gw = LlmGateway::new(FlakyProvider {
                fail_first_n: AtomicU32::new(2),
        });
        let out = gw.chat(&msgs(), ChatOptions::default(), false).await.unwrap();
        assert!(matches!(out, ChatOutput::Text(t) if t == "hello"));
    }

    #[tokio::test]
    async fn exhausting_rate_limit_retries_surfaces_llm_rate_limited() {
        let gw = LlmGateway::new(FlakyProvider {
                fail_first_n: AtomicU32::new(10),
        });
        let err = gw.chat(&msgs(), ChatOptions::default(), false).await.unwrap_err();
        assert_eq!(err.code, lp_domain::ErrorCode::LlmRateLimited);
    }

    #[tokio::test]
    async fn unavailable_propagates_immediately() {
        let gw = LlmGateway::new(AlwaysUnavailable);
        let err = gw.chat(&msgs(), ChatOptions::default(), false).await.unwrap_err();
        assert_eq!(err.code, lp_domain::ErrorCode::LlmUnavailable);
    }

    #[tokio::test]
    async fn context_too_large_propagates_immediately() {
        let gw = LlmGateway::new(TooLarge);
        let err = gw.chat(&msgs(), ChatOptions::default(), false).await.unwrap_err();
        assert_eq!(err.code, lp_domain::ErrorCode::LlmContextTooLarge);
    }
}
