//! Session-wide request accounting for the remote API

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error};

/// Maximum number of log lines retained; older lines are evicted first.
pub const LOG_CAPACITY: usize = 100;
/// Tracing target for request log lines.
pub const API_LOG_TARGET: &str = "quaiwatch::api";

/// Immutable copy of the tracker counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackerStats {
    pub requests: u64,
    pub errors: u64,
    pub last_request_time: Option<DateTime<Utc>>,
    pub logs: Vec<String>,
}

#[derive(Default)]
struct TrackerInner {
    requests: u64,
    errors: u64,
    last_request_time: Option<DateTime<Utc>>,
    logs: VecDeque<String>,
}

impl TrackerInner {
    fn push_log(&mut self, message: &str, is_error: bool) {
        let line = format!(
            "[API {}] {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message
        );
        if is_error {
            error!(target: API_LOG_TARGET, "{line}");
        } else {
            debug!(target: API_LOG_TARGET, "{line}");
        }

        if self.logs.len() == LOG_CAPACITY {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }
}

/// Counts attempted and failed calls and keeps a bounded log of recent
/// events. Written by the fetch gateway only; everyone else reads
/// [`RequestTracker::snapshot`].
#[derive(Default)]
pub struct RequestTracker {
    inner: Mutex<TrackerInner>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        // Counters stay meaningful even if a holder panicked mid-update.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Called before dispatching a request.
    pub fn record_attempt(&self, query: &str) {
        let mut inner = self.lock();
        inner.requests = inner.requests.saturating_add(1);
        inner.last_request_time = Some(Utc::now());
        inner.push_log(&format!("REQ -> {query}"), false);
    }

    /// Called once a response arrived, whatever its status.
    pub fn record_success(&self, status: u16, elapsed: Duration) {
        self.lock()
            .push_log(&format!("RES <- {status} ({}ms)", elapsed.as_millis()), false);
    }

    /// Called when a call failed hard; counts as an error.
    pub fn record_failure(&self, message: &str) {
        let mut inner = self.lock();
        inner.errors = inner.errors.saturating_add(1);
        inner.push_log(&format!("ERR !! {message}"), true);
    }

    /// API-level soft error (`status: "0"`). Logged as an error line but not
    /// counted in `errors`.
    pub fn record_soft_error(&self, message: &str) {
        self.lock().push_log(&format!("API Error: {message}"), true);
    }

    pub fn snapshot(&self) -> TrackerStats {
        let inner = self.lock();
        TrackerStats {
            requests: inner.requests,
            errors: inner.errors,
            last_request_time: inner.last_request_time,
            logs: inner.logs.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_attempts_and_failures() {
        let tracker = RequestTracker::new();
        assert_eq!(tracker.snapshot(), TrackerStats::default());

        for i in 0..5 {
            tracker.record_attempt("?action=balance");
            if i % 2 == 0 {
                tracker.record_success(200, Duration::from_millis(12));
            } else {
                tracker.record_failure("HTTP Status 500");
            }
        }

        let stats = tracker.snapshot();
        assert_eq!(stats.requests, 5);
        assert_eq!(stats.errors, 2);
        assert!(stats.last_request_time.is_some());
        assert_eq!(stats.logs.len(), 10);
        assert!(stats.logs[0].starts_with("[API "));
        assert!(stats.logs[0].ends_with("REQ -> ?action=balance"));
        assert!(stats.logs[1].ends_with("RES <- 200 (12ms)"));
        assert!(stats.logs[3].ends_with("ERR !! HTTP Status 500"));
    }

    #[test]
    fn test_soft_error_is_logged_but_not_counted() {
        let tracker = RequestTracker::new();
        tracker.record_attempt("?action=txlist");
        tracker.record_success(200, Duration::from_millis(3));
        tracker.record_soft_error("No transactions found");

        let stats = tracker.snapshot();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.errors, 0);
        assert!(stats.logs[2].ends_with("API Error: No transactions found"));
    }

    #[test]
    fn test_log_buffer_keeps_most_recent_lines() {
        let tracker = RequestTracker::new();
        for i in 0..(LOG_CAPACITY + 25) {
            tracker.record_failure(&format!("failure {i}"));
        }

        let stats = tracker.snapshot();
        assert_eq!(stats.errors, (LOG_CAPACITY + 25) as u64);
        assert_eq!(stats.logs.len(), LOG_CAPACITY);
        assert!(stats.logs[0].ends_with("ERR !! failure 25"));
        assert!(
            stats
                .logs
                .last()
                .unwrap()
                .ends_with(&format!("ERR !! failure {}", LOG_CAPACITY + 24))
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let tracker = RequestTracker::new();
        tracker.record_attempt("?a=1");
        let mut stats = tracker.snapshot();
        stats.requests = 99;
        stats.logs.clear();

        let fresh = tracker.snapshot();
        assert_eq!(fresh.requests, 1);
        assert_eq!(fresh.logs.len(), 1);
    }
}
