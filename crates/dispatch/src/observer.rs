//! Structured dispatch records for whoever wants more than log lines.

use std::sync::Mutex;

use crate::event::EventKind;

/// A notable occurrence during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A handler was skipped because its plugin exhausted its quota.
    RateLimited { plugin: String, event: EventKind },
    /// A handler errored, panicked or timed out.
    HandlerFailed {
        plugin: String,
        handler: String,
        event: EventKind,
        /// `error`, `panic` or `timeout`.
        fault: &'static str,
        detail: String,
    },
    /// A handler returned output the normalizer could not interpret.
    MalformedResult {
        plugin: String,
        handler: String,
        event: EventKind,
        reason: String,
    },
    /// A handler was disabled after too many consecutive faults.
    CircuitOpened {
        plugin: String,
        handler: String,
        failures: u64,
    },
    /// Status line reported by a lifecycle hook.
    LifecycleStatus {
        plugin: String,
        event: EventKind,
        message: String,
    },
}

/// Receives [`DispatchEvent`]s. Implementations must not block; `emit` has
/// no error channel so a failing sink cannot affect dispatch.
pub trait DispatchEventSink: Send + Sync {
    fn emit(&self, event: DispatchEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DispatchEventSink for NoopSink {
    fn emit(&self, _event: DispatchEvent) {}
}

/// Keeps every event in memory. Handy for tests and diagnostics endpoints.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DispatchEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<DispatchEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl DispatchEventSink for MemorySink {
    fn emit(&self, event: DispatchEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_and_drains() {
        let sink = MemorySink::new();
        sink.emit(DispatchEvent::RateLimited {
            plugin: "weather".into(),
            event: EventKind::MessageReceived,
        });
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }
}
