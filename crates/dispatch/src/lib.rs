//! Hook dispatch engine.
//!
//! Plugins bind handlers to event kinds through the [`HandlerRegistry`]; the
//! [`Dispatcher`] runs them in priority order with per-plugin rate limiting,
//! a failure boundary around every invocation, and two-phase resolution for
//! inbound messages (`message_received`, then `message_not_handled` when no
//! handler claimed the event).

pub mod engine;
pub mod error;
pub mod event;
pub mod handler;
pub mod observer;
pub mod rate_limit;
pub mod registry;
pub mod result;
pub mod stats;
pub mod transport;

pub use {
    engine::{
        DispatchOutcome, Dispatcher, DispatcherBuilder, HandlerTrace, LifecycleStatus, Phase,
        TraceStatus, TriggerOutput,
    },
    error::{Error, HandlerFault, Result},
    event::{
        Author, BotLifecycle, ChatType, EventEnvelope, EventKind, EventPayload, InboundMessage,
        LifecyclePhase, NoticeEvent, RequestEvent,
    },
    handler::{HandlerOutput, HookContext, HookHandler, handler_fn},
    observer::{DispatchEvent, DispatchEventSink, MemorySink, NoopSink},
    rate_limit::RateLimiter,
    registry::{DEFAULT_PRIORITY, HandlerRegistry, HookBinding, PluginBinding, PluginState},
    result::{DispatchResult, MalformedResult, normalize, try_normalize},
    stats::{BreakerCheck, CircuitBreaker, HookStats},
    transport::Transport,
};

pub use parley_messages::Message;
