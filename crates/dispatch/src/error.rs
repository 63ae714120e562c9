use std::time::Duration;

use crate::event::EventKind;

/// Errors surfaced to callers of the registry API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identical (plugin, event kind, handler) binding already exists.
    #[error("plugin '{plugin}' already registered handler '{handler}' for {event}")]
    DuplicateHandler {
        plugin: String,
        event: EventKind,
        handler: String,
    },

    #[error("unknown plugin: {name}")]
    UnknownPlugin { name: String },

    /// Configuration failed validation; one entry per error diagnostic.
    #[error("invalid dispatch configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),
}

impl Error {
    #[must_use]
    pub fn unknown_plugin(name: impl Into<String>) -> Self {
        Self::UnknownPlugin { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single handler invocation produced no result.
///
/// Faults never escape the dispatch loop; they are logged, reported to the
/// [`DispatchEventSink`](crate::DispatchEventSink) and treated as unhandled.
#[derive(Debug, thiserror::Error)]
pub enum HandlerFault {
    #[error("handler returned an error: {0:#}")]
    Failed(anyhow::Error),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("handler timed out after {0:?}")]
    TimedOut(Duration),
}

impl HandlerFault {
    /// Short label used in logs and metric labels.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Failed(_) => "error",
            Self::Panicked(_) => "panic",
            Self::TimedOut(_) => "timeout",
        }
    }
}
