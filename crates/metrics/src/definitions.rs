//! Metric name and label definitions.

/// Dispatch engine metrics
pub mod dispatch {
    /// Total number of events dispatched, labelled by event kind
    pub const EVENTS_TOTAL: &str = "parley_dispatch_events_total";
    /// Events that ended without any handler claiming them
    pub const UNHANDLED_TOTAL: &str = "parley_dispatch_unhandled_total";
    /// Responses produced per dispatch
    pub const RESPONSES_TOTAL: &str = "parley_dispatch_responses_total";
    /// Total handler invocations
    pub const HANDLER_INVOCATIONS_TOTAL: &str = "parley_handler_invocations_total";
    /// Handler invocation duration in seconds
    pub const HANDLER_DURATION_SECONDS: &str = "parley_handler_duration_seconds";
    /// Handler faults (error, panic, timeout)
    pub const HANDLER_FAULTS_TOTAL: &str = "parley_handler_faults_total";
    /// Invocations skipped by the rate limiter
    pub const RATE_LIMITED_TOTAL: &str = "parley_rate_limited_total";
    /// Invocations skipped by an open circuit breaker
    pub const CIRCUIT_OPEN_SKIPS_TOTAL: &str = "parley_circuit_open_skips_total";
}

/// Plugin loader metrics
pub mod plugins {
    /// Number of currently loaded plugins
    pub const LOADED: &str = "parley_plugins_loaded";
    /// Hook bindings rejected at load time
    pub const REJECTED_BINDINGS_TOTAL: &str = "parley_plugin_rejected_bindings_total";
}

/// Common label keys
pub mod labels {
    pub const EVENT: &str = "event";
    pub const PLUGIN: &str = "plugin";
    pub const FAULT: &str = "fault";
}
