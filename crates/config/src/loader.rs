use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::ParleyConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["parley.toml", "parley.yaml", "parley.yml", "parley.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ParleyConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./parley.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/parley/parley.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `ParleyConfig::default()` when no file is found or the file
/// fails to parse.
pub fn discover_and_load() -> ParleyConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                ParleyConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            ParleyConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Returns the user-global config directory (`~/.config/parley/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "parley").map(|d| d.config_dir().to_path_buf())
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Parse raw config text, choosing the format from the file extension.
pub fn parse_config(raw: &str, path: &Path) -> Result<ParleyConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

/// Apply `PARLEY_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut ParleyConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut ParleyConfig, lookup: impl Fn(&str) -> Option<String>) {
    fn parsed<T: std::str::FromStr>(
        lookup: &impl Fn(&str) -> Option<String>,
        name: &str,
    ) -> Option<T> {
        let raw = lookup(name)?;
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(var = name, value = %raw, "ignoring unparsable env override");
                None
            },
        }
    }

    if let Some(quota) = parsed(&lookup, "PARLEY_RATE_LIMIT_QUOTA") {
        config.rate_limit.quota = quota;
    }
    if let Some(window) = parsed(&lookup, "PARLEY_RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = window;
    }
    if let Some(timeout) = parsed(&lookup, "PARLEY_HANDLER_TIMEOUT_MS") {
        config.dispatch.handler_timeout_ms = timeout;
    }
    if let Some(level) = lookup("PARLEY_LOG_LEVEL").filter(|l| !l.trim().is_empty()) {
        config.logging.level = level;
    }
}
