//! Comparison harness.
//!
//! Runs the baseline and a set of other strategies against the same query,
//! times each call independently, and assembles a [`ComparisonReport`].
//! Classifying ratios ("fast", "too slow") is left to the presentation layer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Serialize, Serializer};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::document::RetrievalResult;
use crate::error::Result;
use crate::strategy::{BaselineRetriever, Retriever};

/// How the harness schedules strategies for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One strategy after another, baseline first.
    #[default]
    Sequential,
    /// All strategies at once. Each is still timed around its own call.
    Concurrent,
}

/// One strategy's result and timing.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyRun {
    pub result: RetrievalResult,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// `elapsed / baseline elapsed`; `None` when the baseline took no measurable time.
    pub ratio_to_baseline: Option<f64>,
}

impl StrategyRun {
    pub fn strategy(&self) -> &str {
        &self.result.strategy
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64() * 1000.0)
}

/// Results and timings of every strategy for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub query: String,
    pub k: usize,
    pub collection: String,
    pub generated_at: DateTime<Utc>,
    pub baseline: StrategyRun,
    /// Non-baseline strategies in registration order.
    pub strategies: Vec<StrategyRun>,
}

impl ComparisonReport {
    /// Look up a run by strategy name, baseline included.
    pub fn run(&self, strategy: &str) -> Option<&StrategyRun> {
        std::iter::once(&self.baseline).chain(&self.strategies).find(|run| run.strategy() == strategy)
    }

    /// Baseline followed by the other strategies.
    pub fn runs(&self) -> impl Iterator<Item = &StrategyRun> {
        std::iter::once(&self.baseline).chain(&self.strategies)
    }
}

/// Runs strategies side by side against the baseline.
///
/// ```rust,ignore
/// let harness = ComparisonHarness::new(Arc::clone(&baseline))
///     .with_strategy(Arc::new(Fallback::new(multi_query, Arc::clone(&baseline))))
///     .mode(ExecutionMode::Concurrent);
/// let report = harness.compare("vector storage", 3, "demo_index").await?;
/// ```
pub struct ComparisonHarness {
    baseline: Arc<BaselineRetriever>,
    strategies: Vec<Arc<dyn Retriever>>,
    mode: ExecutionMode,
}

impl ComparisonHarness {
    pub fn new(baseline: Arc<BaselineRetriever>) -> Self {
        Self { baseline, strategies: Vec::new(), mode: ExecutionMode::default() }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn Retriever>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Names of the registered strategies, baseline first.
    pub fn strategy_names(&self) -> Vec<&str> {
        std::iter::once(self.baseline.name()).chain(self.strategies.iter().map(|s| s.name())).collect()
    }

    /// Run every strategy for `query` and build the report.
    ///
    /// # Errors
    ///
    /// Returns the first error a strategy surfaces. Strategies wrapped in
    /// [`Fallback`](crate::Fallback) only fail when the baseline does.
    pub async fn compare(&self, query: &str, k: usize, collection: &str) -> Result<ComparisonReport> {
        let generated_at = Utc::now();

        let (baseline, others) = match self.mode {
            ExecutionMode::Sequential => {
                let baseline = timed(self.baseline.as_ref(), query, k, collection).await?;
                let mut timed_runs = Vec::with_capacity(self.strategies.len());
                for strategy in &self.strategies {
                    timed_runs.push(timed(strategy.as_ref(), query, k, collection).await?);
                }
                (baseline, timed_runs)
            }
            ExecutionMode::Concurrent => {
                let others = try_join_all(self.strategies.iter().map(|s| timed(s.as_ref(), query, k, collection)));
                futures::try_join!(timed(self.baseline.as_ref(), query, k, collection), others)?
            }
        };

        let baseline_elapsed = baseline.1;
        let baseline = StrategyRun { result: baseline.0, elapsed: baseline_elapsed, ratio_to_baseline: Some(1.0) };
        let strategies = others
            .into_iter()
            .map(|(result, elapsed)| StrategyRun { result, elapsed, ratio_to_baseline: ratio(elapsed, baseline_elapsed) })
            .collect::<Vec<_>>();

        for run in std::iter::once(&baseline).chain(&strategies) {
            info!(
                strategy = run.strategy(),
                documents = run.result.len(),
                degraded = run.result.degraded,
                reason = run.result.reason.map(|r| r.as_str()),
                elapsed_ms = run.elapsed_ms(),
                ratio = run.ratio_to_baseline,
                "strategy finished"
            );
        }

        Ok(ComparisonReport {
            query: query.to_string(),
            k,
            collection: collection.to_string(),
            generated_at,
            baseline,
            strategies,
        })
    }

    /// [`compare`](Self::compare) each query in order.
    ///
    /// # Errors
    ///
    /// Stops at the first query whose comparison fails.
    pub async fn compare_all<S: AsRef<str>>(&self, queries: &[S], k: usize, collection: &str) -> Result<Vec<ComparisonReport>> {
        let mut reports = Vec::with_capacity(queries.len());
        for query in queries {
            reports.push(self.compare(query.as_ref(), k, collection).await?);
        }
        info!(queries = reports.len(), mode = ?self.mode, "comparison finished");
        Ok(reports)
    }
}

async fn timed(strategy: &dyn Retriever, query: &str, k: usize, collection: &str) -> Result<(RetrievalResult, Duration)> {
    let start = Instant::now();
    let result = strategy.retrieve(query, k, collection).await?;
    let elapsed = start.elapsed();
    debug!(strategy = strategy.name(), elapsed_ms = elapsed.as_secs_f64() * 1000.0, "timed retrieve");
    Ok((result, elapsed))
}

fn ratio(elapsed: Duration, baseline: Duration) -> Option<f64> {
    if baseline.is_zero() {
        return None;
    }
    Some(elapsed.as_secs_f64() / baseline.as_secs_f64())
}
