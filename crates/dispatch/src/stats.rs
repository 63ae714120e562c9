//! Per-handler health counters and the optional circuit breaker built on them.

use std::{
    fmt,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {tokio::time::Instant, tracing::info};

// ── HookStats ───────────────────────────────────────────────────────────────

/// Call statistics for one hook binding.
pub struct HookStats {
    pub call_count: AtomicU64,
    pub failure_count: AtomicU64,
    pub consecutive_failures: AtomicU64,
    pub total_latency_us: AtomicU64,
    pub disabled: AtomicBool,
    pub disabled_at: Mutex<Option<Instant>>,
}

impl HookStats {
    pub fn new() -> Self {
        Self {
            call_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            disabled: AtomicBool::new(false),
            disabled_at: Mutex::new(None),
        }
    }

    pub fn record_success(&self, latency: Duration) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.add_latency(latency);
    }

    pub fn record_failure(&self, latency: Duration) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.add_latency(latency);
    }

    fn add_latency(&self, latency: Duration) {
        let us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.total_latency_us.fetch_add(us, Ordering::Relaxed);
    }

    pub fn calls(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn avg_latency(&self) -> Duration {
        let calls = self.call_count.load(Ordering::Relaxed);
        if calls == 0 {
            return Duration::ZERO;
        }
        let total = self.total_latency_us.load(Ordering::Relaxed);
        Duration::from_micros(total / calls)
    }
}

impl Default for HookStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HookStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookStats")
            .field("calls", &self.calls())
            .field("failures", &self.failures())
            .field(
                "consecutive_failures",
                &self.consecutive_failures.load(Ordering::Relaxed),
            )
            .field("avg_latency", &self.avg_latency())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}

// ── CircuitBreaker ──────────────────────────────────────────────────────────

/// Verdict of [`CircuitBreaker::check`] for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerCheck {
    /// Run the handler.
    Closed,
    /// The failure threshold was just reached; skip and report.
    Tripped,
    /// Still cooling down; skip quietly.
    Open,
}

impl BreakerCheck {
    pub fn skips(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Disables a handler after `threshold` consecutive faults until `cooldown`
/// has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    pub threshold: u64,
    pub cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
        }
    }

    /// Decide whether the handler behind `stats` may run, tripping or
    /// resetting the breaker as a side effect. A zero threshold never trips.
    pub fn check(&self, handler: &str, stats: &HookStats) -> BreakerCheck {
        if self.threshold == 0 {
            return BreakerCheck::Closed;
        }
        if !stats.disabled.load(Ordering::Relaxed) {
            let failures = stats.consecutive_failures.load(Ordering::Relaxed);
            if failures >= self.threshold {
                stats.disabled.store(true, Ordering::Relaxed);
                *stats.disabled_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
                return BreakerCheck::Tripped;
            }
            return BreakerCheck::Closed;
        }

        let disabled_at = stats.disabled_at.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(at) = *disabled_at
            && at.elapsed() >= self.cooldown
        {
            drop(disabled_at);
            stats.disabled.store(false, Ordering::Relaxed);
            stats.consecutive_failures.store(0, Ordering::Relaxed);
            info!(handler, "circuit breaker reset after cooldown");
            return BreakerCheck::Closed;
        }
        BreakerCheck::Open
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_stats_tracking() {
        let stats = HookStats::new();
        stats.record_success(Duration::from_millis(10));
        stats.record_success(Duration::from_millis(20));
        stats.record_failure(Duration::from_millis(30));
        assert_eq!(stats.calls(), 3);
        assert_eq!(stats.failures(), 1);
        assert_eq!(stats.consecutive_failures.load(Ordering::Relaxed), 1);
        assert_eq!(stats.avg_latency(), Duration::from_millis(20));

        stats.record_success(Duration::ZERO);
        assert_eq!(stats.consecutive_failures.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn breaker_trips_then_resets_after_cooldown() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        let stats = HookStats::new();

        assert_eq!(breaker.check("h", &stats), BreakerCheck::Closed);
        stats.record_failure(Duration::ZERO);
        assert_eq!(breaker.check("h", &stats), BreakerCheck::Closed);
        stats.record_failure(Duration::ZERO);

        assert_eq!(breaker.check("h", &stats), BreakerCheck::Tripped);
        assert!(stats.is_disabled());
        assert_eq!(breaker.check("h", &stats), BreakerCheck::Open);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(breaker.check("h", &stats), BreakerCheck::Closed);
        assert!(!stats.is_disabled());
    }

    #[test]
    fn zero_threshold_never_trips() {
        let breaker = CircuitBreaker::new(0, Duration::from_secs(60));
        let stats = HookStats::new();
        assert_eq!(breaker.check("h", &stats), BreakerCheck::Closed);
        stats.record_failure(Duration::ZERO);
        stats.record_failure(Duration::ZERO);
        assert_eq!(breaker.check("h", &stats), BreakerCheck::Closed);
        assert!(!stats.is_disabled());
    }
}
