//! Metrics for the config cache.
//!
//! Counters and gauges are emitted through the `metrics` facade, so any
//! installed recorder (Prometheus or otherwise) picks them up:
//!
//! - `svcmon_notifications_total` by operation, kind, and outcome
//! - `svcmon_notification_failures_total` by operation and kind
//! - `svcmon_notification_duration_seconds` by kind
//! - `svcmon_provision_calls_total` by agent operation and kind
//! - `svcmon_provision_skipped_total` by kind
//! - `svcmon_entities` gauge by kind
//!
//! # Example
//!
//! ```rust
//! use svcmon_cache::ManagerMetrics;
//! use svcmon_core::EntityKind;
//!
//! let metrics = ManagerMetrics::new();
//! metrics.record_provision_call("add", EntityKind::LoadBalancerPool);
//! assert_eq!(metrics.provision_calls(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use svcmon_core::EntityKind;

/// Metrics for the config manager.
///
/// Cheap to clone; clones share the same local totals.
#[derive(Debug, Clone)]
pub struct ManagerMetrics {
    inner: Arc<ManagerMetricsInner>,
}

#[derive(Debug, Default)]
struct ManagerMetricsInner {
    /// Notifications handled successfully.
    notifications: AtomicU64,
    /// Notifications that returned an error.
    failures: AtomicU64,
    /// Calls made to the service agent.
    provision_calls: AtomicU64,
    /// Agent adds skipped because the snapshot was unchanged.
    provision_skipped: AtomicU64,
}

impl Default for ManagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ManagerMetricsInner::default()),
        }
    }

    /// Record a handled notification.
    pub fn record_notification(
        &self,
        operation: &'static str,
        kind: EntityKind,
        outcome: &'static str,
        elapsed: Duration,
    ) {
        self.inner.notifications.fetch_add(1, Ordering::Relaxed);
        counter!(
            "svcmon_notifications_total",
            "operation" => operation,
            "kind" => kind.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("svcmon_notification_duration_seconds", "kind" => kind.as_str())
            .record(elapsed.as_secs_f64());
    }

    /// Record a notification that failed.
    pub fn record_failure(&self, operation: &'static str, kind: EntityKind) {
        self.inner.failures.fetch_add(1, Ordering::Relaxed);
        counter!(
            "svcmon_notification_failures_total",
            "operation" => operation,
            "kind" => kind.as_str()
        )
        .increment(1);
    }

    /// Record a call to the service agent.
    pub fn record_provision_call(&self, operation: &'static str, kind: EntityKind) {
        self.inner.provision_calls.fetch_add(1, Ordering::Relaxed);
        counter!(
            "svcmon_provision_calls_total",
            "operation" => operation,
            "kind" => kind.as_str()
        )
        .increment(1);
    }

    /// Record an agent add skipped for an unchanged snapshot.
    pub fn record_provision_skipped(&self, kind: EntityKind) {
        self.inner.provision_skipped.fetch_add(1, Ordering::Relaxed);
        counter!("svcmon_provision_skipped_total", "kind" => kind.as_str()).increment(1);
    }

    /// Publish the number of live entities of a kind.
    pub fn set_entity_count(&self, kind: EntityKind, count: usize) {
        gauge!("svcmon_entities", "kind" => kind.as_str()).set(count as f64);
    }

    /// Get total notifications handled.
    pub fn notifications(&self) -> u64 {
        self.inner.notifications.load(Ordering::Relaxed)
    }

    /// Get total failed notifications.
    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    /// Get total calls made to the service agent.
    pub fn provision_calls(&self) -> u64 {
        self.inner.provision_calls.load(Ordering::Relaxed)
    }

    /// Get total agent adds skipped.
    pub fn provision_skipped(&self) -> u64 {
        self.inner.provision_skipped.load(Ordering::Relaxed)
    }
}
