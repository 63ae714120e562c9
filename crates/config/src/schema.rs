/// Config schema types (dispatch, rate limiting, logging, per-plugin overrides).
use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub dispatch: DispatchConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    /// Per-plugin overrides keyed by plugin name.
    pub plugins: BTreeMap<String, PluginOverride>,
}

impl ParleyConfig {
    /// Override entry for `plugin`, if any.
    pub fn plugin(&self, plugin: &str) -> Option<&PluginOverride> {
        self.plugins.get(plugin)
    }
}

/// Dispatch engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Wall-clock budget for a single handler invocation. Defaults to 5000.
    pub handler_timeout_ms: u64,
    /// Consecutive faults before a handler is skipped for the cooldown.
    /// `0` disables the circuit breaker (default).
    pub circuit_breaker_threshold: u64,
    /// Seconds a tripped handler stays disabled. Defaults to 60.
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: 5_000,
            circuit_breaker_threshold: 0,
            circuit_breaker_cooldown_secs: 60,
        }
    }
}

impl DispatchConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    /// `(threshold, cooldown)` when the circuit breaker is enabled.
    pub fn circuit_breaker(&self) -> Option<(u64, Duration)> {
        (self.circuit_breaker_threshold > 0).then(|| {
            (
                self.circuit_breaker_threshold,
                Duration::from_secs(self.circuit_breaker_cooldown_secs),
            )
        })
    }
}

/// How invocations are counted against the quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// The counter resets once `window` has elapsed since the first
    /// invocation of the current window.
    #[default]
    #[serde(alias = "fixed_window")]
    Fixed,
    /// At most `quota` invocations within any trailing `window`.
    #[serde(alias = "sliding_window")]
    Sliding,
}

/// Per-plugin invocation quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Invocations allowed per window. Defaults to 10.
    pub quota: u32,
    /// Window length in seconds. Defaults to 60.
    pub window_secs: u64,
    pub policy: RateLimitPolicy,
    /// Plugins that are never rate limited.
    pub exempt: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quota: 10,
            window_secs: 60,
            policy: RateLimitPolicy::Fixed,
            exempt: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset. Defaults to "info".
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Operator overrides applied when a plugin is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginOverride {
    /// Replaces the priority declared in the plugin manifest.
    pub priority: Option<i32>,
    /// When false the plugin is refused at load time.
    pub enabled: bool,
}

impl Default for PluginOverride {
    fn default() -> Self {
        Self {
            priority: None,
            enabled: true,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ParleyConfig::default();
        assert_eq!(cfg.rate_limit.quota, 10);
        assert_eq!(cfg.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(cfg.rate_limit.policy, RateLimitPolicy::Fixed);
        assert_eq!(cfg.dispatch.handler_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.dispatch.circuit_breaker(), None);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: ParleyConfig = toml::from_str(
            r#"
[rate_limit]
quota = 3
policy = "sliding"

[plugins.weather]
priority = 5

[plugins.legacy]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.rate_limit.quota, 3);
        assert_eq!(cfg.rate_limit.window_secs, 60);
        assert_eq!(cfg.rate_limit.policy, RateLimitPolicy::Sliding);
        assert_eq!(cfg.plugin("weather").unwrap().priority, Some(5));
        assert!(cfg.plugin("weather").unwrap().enabled);
        assert!(!cfg.plugin("legacy").unwrap().enabled);
        assert!(cfg.plugin("missing").is_none());
    }

    #[test]
    fn policy_accepts_long_aliases() {
        let cfg: RateLimitConfig = toml::from_str(r#"policy = "sliding_window""#).unwrap();
        assert_eq!(cfg.policy, RateLimitPolicy::Sliding);
    }

    #[test]
    fn circuit_breaker_enabled_by_threshold() {
        let cfg = DispatchConfig {
            circuit_breaker_threshold: 3,
            circuit_breaker_cooldown_secs: 10,
            ..DispatchConfig::default()
        };
        assert_eq!(cfg.circuit_breaker(), Some((3, Duration::from_secs(10))));
    }
}
