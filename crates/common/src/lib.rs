//! Shared error type and telemetry setup used across all parley crates.

pub mod error;
pub mod telemetry;

pub use {
    error::{Error, Result},
    telemetry::init_telemetry,
};
