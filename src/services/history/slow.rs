//! Slow history backend
//!
//! Wraps any [`HistoryBackend`] and adds configurable delays to simulate the
//! latency of the history-data endpoint. Individual parts can also be marked
//! as failing, which makes their children fetch reject with `FetchFailed`.

use super::backend::{HistoryBackend, HistoryEntry};
use super::error::{HistoryError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Configuration for latency simulation
#[derive(Debug, Clone)]
pub struct SlowHistoryConfig {
    /// Delay for roots calls
    pub roots_delay: Duration,
    /// Delay for children calls
    pub children_delay: Duration,
    /// Delay for is_expandable calls
    pub expandable_delay: Duration,
    /// Parts whose children fetch is rejected after the delay
    pub fail_items: HashSet<String>,
}

impl SlowHistoryConfig {
    /// Create a config with uniform delay for all operations
    pub fn uniform(delay: Duration) -> Self {
        Self {
            roots_delay: delay,
            children_delay: delay,
            expandable_delay: delay,
            fail_items: HashSet::new(),
        }
    }

    /// Create a config with no delays
    pub fn none() -> Self {
        Self::uniform(Duration::ZERO)
    }

    /// One second per children fetch, as the dashboard's demo data source does
    pub fn reference() -> Self {
        Self {
            children_delay: Duration::from_secs(1),
            ..Self::none()
        }
    }

    pub fn failing(mut self, item: impl Into<String>) -> Self {
        self.fail_items.insert(item.into());
        self
    }
}

impl Default for SlowHistoryConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// Metrics tracking for backend calls
#[derive(Debug, Clone, Default)]
pub struct BackendMetrics {
    pub roots_calls: usize,
    pub children_calls: usize,
    pub expandable_calls: usize,
    /// Number of children calls rejected through `fail_items`
    pub failed_calls: usize,
    /// Total time spent in artificial delays
    pub total_delay_time: Duration,
}

impl BackendMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total_calls(&self) -> usize {
        self.roots_calls + self.children_calls + self.expandable_calls
    }
}

/// Latency-simulating backend wrapper
pub struct SlowHistoryBackend {
    inner: Arc<dyn HistoryBackend>,
    config: SlowHistoryConfig,
    metrics: Arc<Mutex<BackendMetrics>>,
}

impl SlowHistoryBackend {
    pub fn new(inner: Arc<dyn HistoryBackend>, config: SlowHistoryConfig) -> Self {
        Self {
            inner,
            config,
            metrics: Arc::new(Mutex::new(BackendMetrics::new())),
        }
    }

    /// Get a snapshot of current metrics
    pub async fn metrics(&self) -> BackendMetrics {
        self.metrics.lock().await.clone()
    }

    pub async fn reset_metrics(&self) {
        self.metrics.lock().await.reset();
    }

    async fn add_delay(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
            self.metrics.lock().await.total_delay_time += delay;
        }
    }
}

#[async_trait]
impl HistoryBackend for SlowHistoryBackend {
    async fn roots(&self) -> Result<Vec<HistoryEntry>> {
        self.add_delay(self.config.roots_delay).await;
        self.metrics.lock().await.roots_calls += 1;
        self.inner.roots().await
    }

    async fn children(&self, item: &str) -> Result<Option<Vec<HistoryEntry>>> {
        self.add_delay(self.config.children_delay).await;
        let mut metrics = self.metrics.lock().await;
        metrics.children_calls += 1;
        if self.config.fail_items.contains(item) {
            metrics.failed_calls += 1;
            return Err(HistoryError::fetch_failed(item, "backend unavailable"));
        }
        drop(metrics);

        self.inner.children(item).await
    }

    async fn is_expandable(&self, item: &str) -> Result<bool> {
        self.add_delay(self.config.expandable_delay).await;
        self.metrics.lock().await.expandable_calls += 1;
        self.inner.is_expandable(item).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::history::HierarchySource;
    use std::time::Instant;

    fn sample() -> Arc<dyn HistoryBackend> {
        Arc::new(HierarchySource::sample())
    }

    #[tokio::test]
    async fn test_slow_backend_adds_delay() {
        let slow = SlowHistoryBackend::new(
            sample(),
            SlowHistoryConfig {
                children_delay: Duration::from_millis(50),
                ..SlowHistoryConfig::none()
            },
        );

        let start = Instant::now();
        let kids = slow.children("Fruits").await.unwrap().unwrap();
        let elapsed = start.elapsed();

        assert_eq!(kids.len(), 3);
        assert!(
            elapsed >= Duration::from_millis(50),
            "Expected at least 50ms delay, got {:?}",
            elapsed
        );

        let metrics = slow.metrics().await;
        assert_eq!(metrics.children_calls, 1);
        assert!(metrics.total_delay_time >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_metrics_tracking() {
        let slow = SlowHistoryBackend::new(sample(), SlowHistoryConfig::none());

        let _ = slow.roots().await;
        let _ = slow.children("Apple").await;
        let _ = slow.is_expandable("Apple").await;

        let metrics = slow.metrics().await;
        assert_eq!(metrics.roots_calls, 1);
        assert_eq!(metrics.children_calls, 1);
        assert_eq!(metrics.expandable_calls, 1);
        assert_eq!(metrics.total_calls(), 3);
        assert_eq!(metrics.total_delay_time, Duration::ZERO);

        slow.reset_metrics().await;
        assert_eq!(slow.metrics().await.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_item() {
        let slow = SlowHistoryBackend::new(sample(), SlowHistoryConfig::none().failing("Apple"));

        let err = slow.children("Apple").await.unwrap_err();
        assert!(err.is_fetch_failure());
        assert_eq!(err.item(), "Apple");

        // Other parts are unaffected
        assert!(slow.children("Fruits").await.unwrap().is_some());
        assert_eq!(slow.metrics().await.failed_calls, 1);
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(
            SlowHistoryConfig::reference().children_delay,
            Duration::from_secs(1)
        );
        assert_eq!(SlowHistoryConfig::reference().roots_delay, Duration::ZERO);
        assert_eq!(SlowHistoryConfig::default().children_delay, Duration::ZERO);
        assert_eq!(
            SlowHistoryConfig::uniform(Duration::from_millis(7)).expandable_delay,
            Duration::from_millis(7)
        );
    }
}
