//! Plugin manifests.
//!
//! A manifest is plain TOML, or TOML frontmatter at the top of a
//! `PLUGIN.md` whose body becomes the long-form help text:
//! ```text
//! +++
//! name = "weather"
//! description = "Forecasts on demand"
//! version = "1.2.0"
//! priority = 20
//!
//! [[commands]]
//! name = "weather"
//! usage = "/weather <city>"
//! description = "Current conditions for a city"
//! aliases = ["w"]
//! +++
//!
//! # Weather
//! Extended docs go here.
//! ```

use std::path::Path;

use {
    parley_dispatch::DEFAULT_PRIORITY,
    serde::{Deserialize, Serialize},
};

use crate::error::{Error, Result};

/// A user-facing command a plugin answers to. Opaque to the dispatch engine;
/// only the help surface reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Usage line shown in help, e.g. `/weather <city>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Whether `word` names this command (case-insensitive, leading `/` ignored).
    pub fn matches(&self, word: &str) -> bool {
        let word = word.trim_start_matches('/');
        self.name.eq_ignore_ascii_case(word) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(word))
    }

    /// What help shows for this command.
    pub fn display_usage(&self) -> String {
        self.usage
            .clone()
            .unwrap_or_else(|| format!("/{}", self.name))
    }
}

/// Metadata describing one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Lower runs earlier.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub commands: Vec<CommandDescriptor>,
    /// Long-form help (the body of a `PLUGIN.md`).
    #[serde(skip)]
    pub details: String,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl PluginManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: None,
            author: None,
            priority: DEFAULT_PRIORITY,
            commands: Vec::new(),
            details: String::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn command(mut self, command: CommandDescriptor) -> Self {
        self.commands.push(command);
        self
    }

    /// Parse and validate a TOML manifest.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let manifest: Self =
            toml::from_str(raw).map_err(|e| Error::invalid_manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a `PLUGIN.md`: `+++`-delimited TOML frontmatter, then markdown.
    pub fn from_markdown(content: &str) -> Result<Self> {
        let trimmed = content.trim_start();
        let Some(after_first) = trimmed.strip_prefix("+++") else {
            return Err(Error::invalid_manifest("PLUGIN.md must start with +++ TOML frontmatter"));
        };
        let end = after_first
            .find("\n+++")
            .ok_or_else(|| Error::invalid_manifest("missing closing +++ in PLUGIN.md frontmatter"))?;

        let mut manifest = Self::from_toml(after_first[..end].trim())?;
        manifest.details = after_first
            .get(end + 4..)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        Ok(manifest)
    }

    /// Load a manifest file; `.md` files are read as `PLUGIN.md`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") => Self::from_markdown(&raw),
            _ => Self::from_toml(&raw),
        }
    }

    /// Reject names the registry and help surface cannot address.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_manifest("plugin name must not be empty"));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(Error::invalid_manifest(format!(
                "plugin name '{}' must not contain whitespace",
                self.name
            )));
        }
        if let Some(cmd) = self.commands.iter().find(|c| c.name.trim().is_empty()) {
            return Err(Error::invalid_manifest(format!(
                "plugin '{}' declares a command without a name ({:?})",
                self.name, cmd.description
            )));
        }
        Ok(())
    }
}
