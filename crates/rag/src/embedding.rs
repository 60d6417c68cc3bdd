//! Embedding gateway: a uniform interface over one configured
//! embedding provider, with batching and bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use lp_domain::{CoreError, ErrorCode};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub provider: String,
    pub model: String,
}

/// The low-level provider call; implementations wrap a specific vendor SDK.
/// `encode` may be called with more texts than the provider's batch limit —
/// the gateway itself chunks requests to respect it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn identity(&self) -> ProviderIdentity;
    fn batch_limit(&self) -> usize;
    async fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
    /// Startup probe: cheap call used to decide availability.
    async fn probe(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct EmbeddingStatus {
    pub available: bool,
    pub provider: String,
    pub model: String,
    pub message: String,
}

/// Embedding gateway: batches, retries, and caches the availability probe.
///
/// Availability is probed once on startup and cached — the
/// cached value, not a live re-probe, is what `system-status` reports.
pub struct EmbeddingGateway<P: EmbeddingProvider> {
    provider: P,
    cached_available: std::sync::atomic::AtomicBool,
}

const MAX_RETRY_ATTEMPTS: u32 = 3;

impl<P: EmbeddingProvider> EmbeddingGateway<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cached_available: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Runs the startup probe and caches the result.
    pub async fn probe_startup(&self) -> EmbeddingStatus {
        let available = self.provider.probe().await;
        self.cached_available
            .store(available, std::sync::atomic::Ordering::SeqCst);
        self.status()
    }

    pub fn status(&self) -> EmbeddingStatus {
        let identity = self.provider.identity();
        let available = self.cached_available.load(std::sync::atomic::Ordering::SeqCst);
        EmbeddingStatus {
            available,
            provider: identity.provider,
            model: identity.model,
            message: if available {
                "ready".to_string()
            } else {
                "embedding provider unavailable".to_string()
            },
        }
    }

    /// `encode(List[str]) -> List[vector]`: batches requests up
    /// to the provider limit, retries transient failures with bounded
    /// exponential backoff, and propagates fatal failure as
    /// `EMBEDDING_UNAVAILABLE`.
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        if !self.cached_available.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CoreError::embedding_unavailable(
                    "embedding provider is not ready",
            ));
        }

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.provider.batch_limit().max(1)) {
            out.extend(self.encode_batch_with_retry(batch).await?);
        }
        Ok(out)
    }

    async fn encode_batch_with_retry(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        let mut attempt = 0;
        loop {
            match self.provider.encode_batch(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) => {
                    attempt += 1;
                    if attempt >= MAX_RETRY_ATTEMPTS {
                        return Err(CoreError::new(
                                ErrorCode::EmbeddingUnavailable,
                                format!("embedding failed after {attempt} attempts: {err}"),
                        ));
                    }
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                    sleep(backoff).await;
                }
            }
        }
    }
}

/// L2-normalizes a vector in place; normalization is caller's choice, exposed as a free function so callers opt in explicitly.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        fail_first_n: AtomicU32,
        available: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn identity(&self) -> ProviderIdentity {
            ProviderIdentity {
                provider: "test".into(),
                model: "test-embed".into(),
            }
        }
        fn batch_limit(&self) -> usize {
            2
        }
        async fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("transient");
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        async fn probe(&self) -> bool {
            self.available
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let gw = EmbeddingGateway::new(FlakyProvider {
                fail_first_n: AtomicU32::new(2),
                available: true,
        });
        gw.probe_startup().await;
        let result = gw.encode(&["a".to_string()]).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_embedding_unavailable() {
        let gw = EmbeddingGateway::new(FlakyProvider {
                fail_first_n: AtomicU32::new(10),
                available: true,
        });
        gw.probe_startup().await;
        let err = gw.encode(&["a".to_string()]).await.unwrap_err();
        assert_eq!(err.code, lp_domain::ErrorCode::EmbeddingUnavailable);
    }

    #[tokio::test]
    async fn unavailable_provider_refuses_immediately() {
        let gw = EmbeddingGateway::new(FlakyProvider {
                fail_first_n: AtomicU32::new(0),
                available: false,
        });
        gw.probe_startup().await;
        let err = gw.encode(&["a".to_string()]).await.unwrap_err();
        assert_eq!(err.code, lp_domain::ErrorCode::EmbeddingUnavailable);
    }

    #[test]
    fn l2_normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
