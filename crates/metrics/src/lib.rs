//! Metric names shared across parley crates.
//!
//! Crates record through the `metrics` facade behind their own `metrics`
//! feature; installing an exporter is left to the host process.
//!
//! ```rust,ignore
//! use parley_metrics::{counter, dispatch};
//!
//! counter!(dispatch::EVENTS_TOTAL, "event" => "message_received").increment(1);
//! ```

mod definitions;

pub use definitions::*;

pub use metrics::{counter, gauge, histogram};
