//! Semantic validation of a loaded [`ParleyConfig`].

use std::{collections::HashSet, fmt};

use crate::schema::ParleyConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "rate_limit.quota".
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Check value ranges and cross-field consistency.
pub fn validate(config: &ParleyConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let rl = &config.rate_limit;

    if rl.enabled && rl.quota == 0 {
        result.push(
            Severity::Error,
            "rate_limit.quota",
            "quota must be at least 1 while rate limiting is enabled",
        );
    }
    if rl.enabled && rl.window_secs == 0 {
        result.push(
            Severity::Error,
            "rate_limit.window_secs",
            "window must be at least one second",
        );
    }

    let mut seen = HashSet::new();
    for name in &rl.exempt {
        if !seen.insert(name.as_str()) {
            result.push(
                Severity::Warning,
                "rate_limit.exempt",
                format!("plugin '{name}' is listed more than once"),
            );
        }
    }

    if config.dispatch.handler_timeout_ms == 0 {
        result.push(
            Severity::Error,
            "dispatch.handler_timeout_ms",
            "handler timeout must be greater than zero",
        );
    }
    if config.dispatch.circuit_breaker_threshold > 0
        && config.dispatch.circuit_breaker_cooldown_secs == 0
    {
        result.push(
            Severity::Warning,
            "dispatch.circuit_breaker_cooldown_secs",
            "a zero cooldown re-enables tripped handlers immediately",
        );
    }

    for (name, plugin) in &config.plugins {
        if !plugin.enabled && plugin.priority.is_some() {
            result.push(
                Severity::Warning,
                format!("plugins.{name}.priority"),
                "priority is ignored for a disabled plugin",
            );
        }
    }

    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PluginOverride;

    #[test]
    fn default_config_is_clean() {
        let result = validate(&ParleyConfig::default());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn zero_quota_and_timeout_are_errors() {
        let mut cfg = ParleyConfig::default();
        cfg.rate_limit.quota = 0;
        cfg.dispatch.handler_timeout_ms = 0;
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert_eq!(result.count(Severity::Error), 2);
        assert_eq!(result.diagnostics[0].path, "rate_limit.quota");
    }

    #[test]
    fn zero_quota_is_fine_when_disabled() {
        let mut cfg = ParleyConfig::default();
        cfg.rate_limit.enabled = false;
        cfg.rate_limit.quota = 0;
        assert!(!validate(&cfg).has_errors());
    }

    #[test]
    fn duplicate_exemptions_and_disabled_priority_warn() {
        let mut cfg = ParleyConfig::default();
        cfg.rate_limit.exempt = vec!["admin".into(), "admin".into()];
        cfg.plugins.insert("old".into(), PluginOverride {
            priority: Some(1),
            enabled: false,
        });
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 2);
        assert_eq!(
            result.diagnostics[1].to_string(),
            "warning: plugins.old.priority: priority is ignored for a disabled plugin"
        );
    }
}
