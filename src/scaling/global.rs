//! Process-wide request metrics. Ephemeral: rebuilt from zero on restart.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;

use crate::load_balancer::ewma::{Ewma, SMOOTHING_WEIGHT};

#[derive(Debug)]
pub struct GlobalMetrics {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    avg_response: Ewma,
    window: Duration,
    started: Instant,
    /// (second since start, requests in that second), oldest first.
    buckets: Mutex<VecDeque<(u64, u64)>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub avg_response_ms: f64,
    pub requests_per_second: f64,
}

impl GlobalMetrics {
    pub fn new(window: Duration) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            avg_response: Ewma::new(SMOOTHING_WEIGHT),
            window: window.max(Duration::from_secs(1)),
            started: Instant::now(),
            buckets: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, elapsed: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.avg_response.observe(elapsed.as_secs_f64() * 1000.0);

        let now = self.now_secs();
        let mut buckets = self.buckets();
        self.prune(&mut buckets, now);
        match buckets.back_mut() {
            Some((second, count)) if *second == now => *count += 1,
            _ => buckets.push_back((now, 1)),
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn avg_response_ms(&self) -> f64 {
        self.avg_response.get()
    }

    /// Requests per second over the sliding window. While the process is
    /// younger than the window, divides by its age instead.
    pub fn requests_per_second(&self) -> f64 {
        let now = self.now_secs();
        let mut buckets = self.buckets();
        self.prune(&mut buckets, now);
        let requests: u64 = buckets.iter().map(|(_, count)| count).sum();
        let span = self.window.as_secs().min(now + 1);
        requests as f64 / span as f64
    }

    pub fn snapshot(&self) -> GlobalSnapshot {
        let total_requests = self.total_requests();
        let total_errors = self.total_errors();
        GlobalSnapshot {
            total_requests,
            total_errors,
            error_rate: if total_requests == 0 { 0.0 } else { total_errors as f64 / total_requests as f64 },
            avg_response_ms: self.avg_response_ms(),
            requests_per_second: self.requests_per_second(),
        }
    }

    fn now_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    fn prune(&self, buckets: &mut VecDeque<(u64, u64)>, now: u64) {
        let window = self.window.as_secs();
        while matches!(buckets.front(), Some((second, _)) if second + window <= now) {
            buckets.pop_front();
        }
    }

    fn buckets(&self) -> MutexGuard<'_, VecDeque<(u64, u64)>> {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for GlobalMetrics {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn counts_and_smooths() {
        let metrics = GlobalMetrics::default();
        metrics.record(Duration::from_millis(100), true);
        metrics.record(Duration::from_millis(200), false);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.total_errors, 1);
        assert!((snap.error_rate - 0.5).abs() < 1e-9);
        assert!((snap.avg_response_ms - 110.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn rps_slides_with_the_window() {
        let metrics = GlobalMetrics::new(Duration::from_secs(10));
        time::advance(Duration::from_secs(20)).await;
        for _ in 0..50 {
            metrics.record(Duration::from_millis(1), true);
        }
        assert!((metrics.requests_per_second() - 5.0).abs() < 1e-9);

        time::advance(Duration::from_secs(10)).await;
        assert_eq!(metrics.requests_per_second(), 0.0);
        assert_eq!(metrics.total_requests(), 50, "totals outlive the window");
    }

    #[tokio::test(start_paused = true)]
    async fn young_process_divides_by_age() {
        let metrics = GlobalMetrics::new(Duration::from_secs(60));
        for _ in 0..4 {
            metrics.record(Duration::from_millis(1), true);
        }
        time::advance(Duration::from_secs(1)).await;
        assert!((metrics.requests_per_second() - 2.0).abs() < 1e-9);
    }
}
