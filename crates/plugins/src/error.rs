use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("plugin '{name}' is already loaded")]
    AlreadyLoaded { name: String },

    #[error("unknown plugin: {name}")]
    UnknownPlugin { name: String },

    #[error("plugin '{name}' is disabled by configuration")]
    Disabled { name: String },

    #[error("invalid plugin manifest: {reason}")]
    InvalidManifest { reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Dispatch(#[from] parley_dispatch::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_manifest(reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn unknown_plugin(name: impl Into<String>) -> Self {
        Self::UnknownPlugin { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
