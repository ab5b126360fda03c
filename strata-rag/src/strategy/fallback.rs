//! Fallback decorator that degrades a failing strategy to the baseline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::document::{DegradationReason, RetrievalResult};
use crate::error::Result;
use crate::strategy::{BaselineRetriever, Retriever};

/// Degrade a strategy to the baseline when it fails.
///
/// On an error (or when the optional timeout expires) the baseline is run
/// once with the original query and its result is reported under the inner
/// strategy's name with `degraded` set and a reason code. There are no
/// retries. Results the inner strategy already marked as degraded, such as
/// `PARENT_STORE_EMPTY`, pass through untouched.
///
/// Errors from the baseline itself are returned: there is nothing left to
/// fall back to.
///
/// ```rust,ignore
/// let strategy = Fallback::new(multi_query, Arc::clone(&baseline))
///     .with_timeout(Some(Duration::from_secs(30)));
/// let result = strategy.retrieve("vector storage", 3, "demo_index").await?;
/// if result.degraded {
///     println!("fell back: {}", result.reason.unwrap());
/// }
/// ```
pub struct Fallback<R> {
    inner: R,
    baseline: Arc<BaselineRetriever>,
    timeout: Option<Duration>,
}

impl<R: Retriever> Fallback<R> {
    pub fn new(inner: R, baseline: Arc<BaselineRetriever>) -> Self {
        Self { inner, baseline, timeout: None }
    }

    /// Bound each call to the inner strategy. Expiry degrades with `TIMEOUT`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn attempt(&self, query: &str, k: usize, collection: &str) -> std::result::Result<RetrievalResult, DegradationReason> {
        let call = self.inner.retrieve(query, k, collection);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        strategy = self.inner.name(),
                        reason = %DegradationReason::Timeout,
                        timeout_ms = limit.as_millis() as u64,
                        "strategy timed out; falling back to baseline"
                    );
                    return Err(DegradationReason::Timeout);
                }
            },
            None => call.await,
        };

        outcome.map_err(|e| {
            let reason = e.degradation_reason();
            warn!(
                strategy = self.inner.name(),
                reason = %reason,
                error = %e,
                "strategy failed; falling back to baseline"
            );
            reason
        })
    }
}

#[async_trait]
impl<R: Retriever> Retriever for Fallback<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn retrieve(&self, query: &str, k: usize, collection: &str) -> Result<RetrievalResult> {
        match self.attempt(query, k, collection).await {
            Ok(result) => Ok(result),
            Err(reason) => {
                let baseline = self.baseline.retrieve(query, k, collection).await?;
                Ok(baseline.degrade(self.inner.name(), reason))
            }
        }
    }
}
