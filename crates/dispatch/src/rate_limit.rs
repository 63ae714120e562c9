//! Per-plugin invocation quota.
//!
//! Each plugin's window lives in its own `DashMap` entry, so plugins never
//! contend on a shared lock.

use std::{collections::VecDeque, time::Duration};

use {
    dashmap::DashMap,
    parley_config::{RateLimitConfig, RateLimitPolicy},
    tokio::time::Instant,
};

#[derive(Debug)]
enum RateWindow {
    Fixed { started: Instant, count: u32 },
    Sliding { hits: VecDeque<Instant> },
}

/// Counts invocations per plugin against `quota` per `window`.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    quota: u32,
    window: Duration,
    policy: RateLimitPolicy,
    exempt: Vec<String>,
    windows: DashMap<String, RateWindow>,
}

impl RateLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            enabled: true,
            quota,
            window,
            policy: RateLimitPolicy::Fixed,
            exempt: Vec::new(),
            windows: DashMap::new(),
        }
    }

    /// A limiter that allows everything.
    pub fn unlimited() -> Self {
        Self {
            enabled: false,
            ..Self::new(u32::MAX, Duration::ZERO)
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            quota: config.quota,
            window: config.window(),
            policy: config.policy,
            exempt: config.exempt.clone(),
            windows: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_exempt(mut self, plugin: impl Into<String>) -> Self {
        self.exempt.push(plugin.into());
        self
    }

    pub fn quota(&self) -> u32 {
        self.quota
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    fn applies_to(&self, plugin: &str) -> bool {
        self.enabled && !self.exempt.iter().any(|p| p == plugin)
    }

    /// Record one invocation for `plugin`; `false` means the quota for the
    /// current window is spent and the invocation must be skipped.
    pub fn try_consume(&self, plugin: &str) -> bool {
        if !self.applies_to(plugin) {
            return true;
        }
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(plugin.to_string())
            .or_insert_with(|| self.fresh_window(now));

        match &mut *entry {
            RateWindow::Fixed { started, count } => {
                if now.duration_since(*started) >= self.window {
                    *started = now;
                    *count = 1;
                } else if *count <= self.quota {
                    // Saturates at quota + 1.
                    *count = count.saturating_add(1);
                }
                *count <= self.quota
            },
            RateWindow::Sliding { hits } => {
                prune(hits, now, self.window);
                if hits.len() < self.quota as usize {
                    hits.push_back(now);
                    true
                } else {
                    false
                }
            },
        }
    }

    fn fresh_window(&self, now: Instant) -> RateWindow {
        match self.policy {
            // `try_consume` counts the first hit.
            RateLimitPolicy::Fixed => RateWindow::Fixed {
                started: now,
                count: 0,
            },
            RateLimitPolicy::Sliding => RateWindow::Sliding {
                hits: VecDeque::new(),
            },
        }
    }

    /// Invocations left for `plugin` in the current window.
    pub fn remaining(&self, plugin: &str) -> u32 {
        if !self.applies_to(plugin) {
            return self.quota;
        }
        let now = Instant::now();
        match self.windows.get_mut(plugin) {
            None => self.quota,
            Some(mut entry) => match &mut *entry {
                RateWindow::Fixed { started, count } => {
                    if now.duration_since(*started) >= self.window {
                        self.quota
                    } else {
                        self.quota.saturating_sub(*count)
                    }
                },
                RateWindow::Sliding { hits } => {
                    prune(hits, now, self.window);
                    let used = u32::try_from(hits.len()).unwrap_or(u32::MAX);
                    self.quota.saturating_sub(used)
                },
            },
        }
    }

    /// Forget the window of one plugin.
    pub fn reset(&self, plugin: &str) {
        self.windows.remove(plugin);
    }

    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Number of plugins with live window state.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

fn prune(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while hits
        .front()
        .is_some_and(|at| now.duration_since(*at) >= window)
    {
        hits.pop_front();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixed_window_allows_quota_then_blocks_until_elapsed() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.try_consume("p"));
        }
        assert!(!limiter.try_consume("p"));
        assert!(!limiter.try_consume("p"));
        assert_eq!(limiter.remaining("p"), 0);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!limiter.try_consume("p"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(limiter.remaining("p"), 10);
        assert!(limiter.try_consume("p"));
        assert_eq!(limiter.remaining("p"), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn count_saturates_at_maximum_quota() {
        let limiter = RateLimiter::new(u32::MAX, Duration::from_secs(60));
        limiter.windows.insert("p".into(), RateWindow::Fixed {
            started: Instant::now(),
            count: u32::MAX,
        });
        assert!(limiter.try_consume("p"));
        assert!(limiter.try_consume("p"));
        assert_eq!(limiter.remaining("p"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn plugins_are_counted_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_consume("a"));
        assert!(!limiter.try_consume("a"));
        assert!(limiter.try_consume("b"));
        assert_eq!(limiter.tracked(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sliding_window_frees_slots_one_by_one() {
        let limiter =
            RateLimiter::new(2, Duration::from_secs(10)).with_policy(RateLimitPolicy::Sliding);
        assert!(limiter.try_consume("p"));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(limiter.try_consume("p"));
        assert!(!limiter.try_consume("p"));

        // First hit ages out; second is still inside the window.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(limiter.remaining("p"), 1);
        assert!(limiter.try_consume("p"));
        assert!(!limiter.try_consume("p"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_and_exemptions() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).with_exempt("admin");
        assert!(limiter.try_consume("p"));
        assert!(!limiter.try_consume("p"));
        limiter.reset("p");
        assert!(limiter.try_consume("p"));

        for _ in 0..5 {
            assert!(limiter.try_consume("admin"));
        }
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let limiter = RateLimiter::unlimited();
        for _ in 0..100 {
            assert!(limiter.try_consume("p"));
        }

        let cfg = RateLimitConfig {
            enabled: false,
            quota: 1,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::from_config(&cfg);
        assert!(limiter.try_consume("p"));
        assert!(limiter.try_consume("p"));
    }
}
