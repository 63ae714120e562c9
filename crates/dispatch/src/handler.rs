//! The handler trait plugins implement, and the context each call receives.

use std::{
    fmt,
    future::Future,
    sync::{Arc, Weak},
};

use {anyhow::Result, async_trait::async_trait, parley_messages::Message, serde_json::Value};

use crate::{
    engine::{Dispatcher, Inner, TriggerOutput},
    event::{EventEnvelope, EventKind},
    result::DispatchResult,
    transport::Transport,
};

// ── HandlerOutput ───────────────────────────────────────────────────────────

/// What a handler hands back to the engine.
///
/// Typed handlers return [`HandlerOutput::Result`]; anything looser goes
/// through [`normalize`](crate::normalize) before the engine looks at it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HandlerOutput {
    Result(DispatchResult),
    /// A single reply; claims the event.
    Message(Message),
    /// Ordered replies; claims the event unless empty.
    Messages(Vec<Message>),
    /// Loosely shaped output (mappings with `response`/`handled`/`continue`,
    /// bare strings, legacy message objects). Also the raw value returned to
    /// callers of custom-event triggers.
    Value(Value),
    #[default]
    Nothing,
}

impl From<DispatchResult> for HandlerOutput {
    fn from(result: DispatchResult) -> Self {
        Self::Result(result)
    }
}

impl From<Message> for HandlerOutput {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Vec<Message>> for HandlerOutput {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<()> for HandlerOutput {
    fn from(_: ()) -> Self {
        Self::Nothing
    }
}

// ── HookContext ─────────────────────────────────────────────────────────────

/// Per-invocation context: who is running, for which bot, and a way back
/// into the engine for plugin-to-plugin events.
#[derive(Clone)]
pub struct HookContext {
    plugin: String,
    bot_id: String,
    engine: Weak<Inner>,
    transport: Option<Arc<dyn Transport>>,
}

impl HookContext {
    pub(crate) fn new(
        plugin: &str,
        bot_id: &str,
        engine: Weak<Inner>,
        transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            plugin: plugin.to_string(),
            bot_id: bot_id.to_string(),
            engine,
            transport,
        }
    }

    /// Context that is not attached to any engine; `trigger` returns nothing.
    pub fn detached(plugin: impl Into<String>, bot_id: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            bot_id: bot_id.into(),
            engine: Weak::new(),
            transport: None,
        }
    }

    /// Name of the plugin that owns the running handler.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// Fire a custom event for the same bot and collect the raw outputs of
    /// every handler bound to it, in priority order.
    ///
    /// Returns an empty list if the engine has been dropped.
    pub async fn trigger(&self, kind: impl Into<EventKind>, payload: Value) -> Vec<TriggerOutput> {
        match self.engine.upgrade() {
            Some(inner) => {
                Dispatcher::from_inner(inner)
                    .trigger(kind, &self.bot_id, payload)
                    .await
            },
            None => Vec::new(),
        }
    }

    /// Withdraw a previously sent message through the transport.
    pub async fn recall(&self, message_id: &str) -> Result<bool> {
        match &self.transport {
            Some(transport) => transport.recall(message_id, &self.bot_id).await,
            None => anyhow::bail!("no transport attached; cannot recall message {message_id}"),
        }
    }
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("plugin", &self.plugin)
            .field("bot_id", &self.bot_id)
            .field("attached", &(self.engine.strong_count() > 0))
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

// ── HookHandler trait ───────────────────────────────────────────────────────

/// A plugin-owned callable bound to one or more event kinds.
///
/// The name identifies the handler within its plugin; registering two
/// handlers with the same name for the same kind is rejected.
#[async_trait]
pub trait HookHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, ctx: &HookContext, event: &EventEnvelope) -> Result<HandlerOutput>;
}

struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut, O> HookHandler for FnHandler<F>
where
    F: Fn(HookContext, EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    O: Into<HandlerOutput> + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &HookContext, event: &EventEnvelope) -> Result<HandlerOutput> {
        (self.f)(ctx.clone(), event.clone()).await.map(Into::into)
    }
}

/// Wrap an async closure as a handler.
///
/// ```rust,ignore
/// let echo = handler_fn("echo", |_ctx, event| async move {
///     Ok(DispatchResult::reply(event.plaintext().to_string()))
/// });
/// ```
pub fn handler_fn<F, Fut, O>(name: impl Into<String>, f: F) -> Arc<dyn HookHandler>
where
    F: Fn(HookContext, EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    O: Into<HandlerOutput> + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::event::InboundMessage, serde_json::json};

    #[tokio::test]
    async fn closure_handler_converts_output() {
        let handler = handler_fn("echo", |_ctx, event| async move {
            Ok(DispatchResult::reply(event.plaintext().to_string()))
        });
        assert_eq!(handler.name(), "echo");

        let ctx = HookContext::detached("echo-plugin", "bot");
        let env = EventEnvelope::message("bot", InboundMessage::new("1", "u", " hi "));
        let out = handler.handle(&ctx, &env).await.unwrap();
        assert_eq!(out, HandlerOutput::Result(DispatchResult::reply("hi")));
    }

    #[tokio::test]
    async fn detached_context_has_no_engine_or_transport() {
        let ctx = HookContext::detached("p", "bot");
        assert_eq!(ctx.plugin(), "p");
        assert!(ctx.trigger("ping", json!({})).await.is_empty());
        assert!(ctx.recall("m1").await.is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(HandlerOutput::from(()), HandlerOutput::Nothing);
        assert_eq!(
            HandlerOutput::from(Message::text("a")),
            HandlerOutput::Message(Message::text("a"))
        );
        assert_eq!(HandlerOutput::from(json!(1)), HandlerOutput::Value(json!(1)));
    }
}
