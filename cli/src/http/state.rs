//! Shared state for HTTP handlers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use overwatch_core::config::AppConfig;
use overwatch_core::scheduler::ScanScheduler;
use overwatch_core::store::JobRunStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: ScanScheduler,
    pub config: Arc<AppConfig>,
    pub stats: Arc<RwLock<ServerStats>>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(
        scheduler: ScanScheduler,
        config: Arc<AppConfig>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            scheduler,
            config,
            stats: Arc::new(RwLock::new(ServerStats::new())),
            shutdown_tx,
        }
    }

    pub fn store(&self) -> &JobRunStore {
        self.scheduler.store()
    }

    pub fn count_request(&self, endpoint: &str) {
        if let Ok(mut stats) = self.stats.write() {
            stats.increment_request(endpoint);
        }
    }

    pub fn count_error(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.increment_error();
        }
    }
}

/// Request counters surfaced by `/health`.
pub struct ServerStats {
    pub requests_total: u64,
    pub requests_by_endpoint: HashMap<String, u64>,
    pub errors_total: u64,
    pub start_time: DateTime<Utc>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            requests_total: 0,
            requests_by_endpoint: HashMap::new(),
            errors_total: 0,
            start_time: Utc::now(),
        }
    }

    pub fn increment_request(&mut self, endpoint: &str) {
        self.requests_total += 1;
        *self
            .requests_by_endpoint
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    pub fn increment_error(&mut self) {
        self.errors_total += 1;
    }

    pub fn uptime_seconds(&self) -> f64 {
        let now = Utc::now();
        (now - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_stats_counters() {
        let mut stats = ServerStats::new();
        assert_eq!(stats.requests_total, 0);
        stats.increment_request("/api/v1/scans");
        stats.increment_request("/api/v1/scans");
        stats.increment_error();
        assert_eq!(stats.requests_total, 2);
        assert_eq!(stats.requests_by_endpoint["/api/v1/scans"], 2);
        assert_eq!(stats.errors_total, 1);
        assert!(stats.uptime_seconds() < 1.0);
    }
}
