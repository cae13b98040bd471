/// Metrics and monitoring for the live relay
///
/// Tracks stream counts, relayed-event volume, and last errors per target
/// identifier.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub target: String,
    pub streams_started: u64,
    pub streams_failed: u64,
    pub streams_closed: u64,
    pub events_relayed: u64,
    pub last_connected: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl TargetMetrics {
    pub fn new(target: String) -> Self {
        Self {
            target,
            streams_started: 0,
            streams_failed: 0,
            streams_closed: 0,
            events_relayed: 0,
            last_connected: None,
            last_failure: None,
            last_error: None,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.streams_started == 0 {
            0.0
        } else {
            (self.streams_failed as f64 / self.streams_started as f64) * 100.0
        }
    }
}

/// Global relay metrics, shared across all stream pumps.
#[derive(Clone)]
pub struct RelayMetrics {
    metrics: Arc<Mutex<HashMap<String, TargetMetrics>>>,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn record_stream_started(&self, target: &str) {
        let mut metrics = self.metrics.lock().unwrap();
        let entry = metrics
            .entry(target.to_string())
            .or_insert_with(|| TargetMetrics::new(target.to_string()));
        entry.streams_started += 1;
        entry.last_connected = Some(Utc::now());
    }

    pub fn record_stream_failed(&self, target: &str, error: &str) {
        let mut metrics = self.metrics.lock().unwrap();
        let entry = metrics
            .entry(target.to_string())
            .or_insert_with(|| TargetMetrics::new(target.to_string()));
        entry.streams_failed += 1;
        entry.last_failure = Some(Utc::now());
        entry.last_error = Some(error.to_string());

        log::warn!(
            "[@{}] Stream failure - {} - failure rate: {:.2}%",
            target,
            error,
            entry.failure_rate()
        );
    }

    pub fn record_stream_closed(&self, target: &str) {
        let mut metrics = self.metrics.lock().unwrap();
        let entry = metrics
            .entry(target.to_string())
            .or_insert_with(|| TargetMetrics::new(target.to_string()));
        entry.streams_closed += 1;
    }

    pub fn record_events_relayed(&self, target: &str, count: u64) {
        if count == 0 {
            return;
        }
        let mut metrics = self.metrics.lock().unwrap();
        let entry = metrics
            .entry(target.to_string())
            .or_insert_with(|| TargetMetrics::new(target.to_string()));
        entry.events_relayed += count;
    }

    #[allow(dead_code)]
    pub fn get(&self, target: &str) -> Option<TargetMetrics> {
        let metrics = self.metrics.lock().unwrap();
        metrics.get(target).cloned()
    }

    pub fn get_all(&self) -> Vec<TargetMetrics> {
        let metrics = self.metrics.lock().unwrap();
        metrics.values().cloned().collect()
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = TargetMetrics::new("someone".to_string());
        assert_eq!(metrics.target, "someone");
        assert_eq!(metrics.streams_started, 0);
        assert_eq!(metrics.failure_rate(), 0.0);
    }

    #[test]
    fn test_record_stream_lifecycle() {
        let tracker = RelayMetrics::new();
        tracker.record_stream_started("someone");
        tracker.record_events_relayed("someone", 12);
        tracker.record_stream_closed("someone");

        let m = tracker.get("someone").unwrap();
        assert_eq!(m.streams_started, 1);
        assert_eq!(m.events_relayed, 12);
        assert_eq!(m.streams_closed, 1);
        assert!(m.last_connected.is_some());
        assert!(m.last_error.is_none());
    }

    #[test]
    fn test_record_failure_keeps_last_error() {
        let tracker = RelayMetrics::new();
        tracker.record_stream_started("someone");
        tracker.record_stream_failed("someone", "navigation failed: timeout");

        let m = tracker.get("someone").unwrap();
        assert_eq!(m.streams_failed, 1);
        assert_eq!(m.last_error.as_deref(), Some("navigation failed: timeout"));
        assert_eq!(m.failure_rate(), 100.0);
    }

    #[test]
    fn test_targets_are_tracked_independently() {
        let tracker = RelayMetrics::new();
        tracker.record_stream_started("alpha");
        tracker.record_stream_started("beta");
        tracker.record_stream_failed("beta", "not live");

        assert_eq!(tracker.get("alpha").unwrap().streams_failed, 0);
        assert_eq!(tracker.get("beta").unwrap().streams_failed, 1);
        assert_eq!(tracker.get_all().len(), 2);
    }

    #[test]
    fn test_zero_relayed_events_do_not_create_entries() {
        let tracker = RelayMetrics::new();
        tracker.record_events_relayed("ghost", 0);
        assert!(tracker.get("ghost").is_none());
    }
}
