//! Configuration loading, validation and env substitution.
//!
//! Config files: `parley.toml`, `parley.yaml`, `parley.yml` or `parley.json`,
//! searched in `./` then `~/.config/parley/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config, parse_config},
    schema::{
        DispatchConfig, LoggingConfig, ParleyConfig, PluginOverride, RateLimitConfig,
        RateLimitPolicy,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
