//! The dispatch engine: ordered, isolated, rate-limited handler execution.
//!
//! Inbound messages use two-phase resolution: every `message_received`
//! handler runs in priority order until one claims the event without asking
//! to continue; if none claimed it, `message_not_handled` handlers get the
//! same treatment. Lifecycle hooks run every handler and collect status
//! lines. Custom kinds return each handler's raw output to the caller.

use std::{
    any::Any,
    fmt,
    panic::AssertUnwindSafe,
    sync::{Arc, RwLock},
    time::Duration,
};

use {
    futures::FutureExt,
    parley_config::{ParleyConfig, Severity, validate},
    parley_messages::Message,
    serde_json::Value,
    tokio::time::Instant,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, dispatch as dispatch_metrics, histogram, labels};

use crate::{
    error::{Error, HandlerFault, Result},
    event::{EventEnvelope, EventKind},
    handler::{HandlerOutput, HookContext, HookHandler},
    observer::{DispatchEvent, DispatchEventSink, NoopSink},
    rate_limit::RateLimiter,
    registry::{HandlerRegistry, HookBinding, PluginBinding},
    result::{DispatchResult, try_normalize},
    stats::{BreakerCheck, CircuitBreaker, HookStats},
    transport::Transport,
};

// ── Outcome types ───────────────────────────────────────────────────────────

/// Which handler pass a dispatch ended in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Handlers bound to the envelope's own kind.
    #[default]
    Primary,
    /// `message_not_handled` handlers, after nothing claimed the message.
    Fallback,
}

/// What happened to one handler during a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStatus {
    /// Claimed the event and stopped the chain.
    Handled,
    /// Claimed the event and let the chain continue.
    Continued,
    /// Ran without claiming the event.
    Passed,
    /// Ran but returned output that could not be interpreted.
    Malformed,
    /// Errored, panicked or timed out (the fault label).
    Failed(&'static str),
    /// Skipped: plugin over its quota.
    RateLimited,
    /// Skipped: circuit breaker open.
    CircuitOpen,
}

impl TraceStatus {
    /// Whether the handler body was entered.
    pub fn invoked(self) -> bool {
        !matches!(self, Self::RateLimited | Self::CircuitOpen)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerTrace {
    pub plugin: String,
    pub handler: String,
    pub event: EventKind,
    pub status: TraceStatus,
}

impl HandlerTrace {
    fn new(binding: &HookBinding, status: TraceStatus) -> Self {
        Self {
            plugin: binding.plugin().to_string(),
            handler: binding.handler_name().to_string(),
            event: binding.kind().clone(),
            status,
        }
    }
}

/// A status line from a lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleStatus {
    pub plugin: String,
    pub handler: String,
    pub message: String,
}

/// Raw output of one handler for a custom event.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerOutput {
    pub plugin: String,
    pub handler: String,
    pub output: HandlerOutput,
}

/// Everything a single dispatch produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// Accumulated replies in delivery order.
    pub responses: Vec<Message>,
    /// Some handler claimed the event.
    pub handled: bool,
    pub phase: Phase,
    /// Lifecycle status lines, in handler order.
    pub statuses: Vec<LifecycleStatus>,
    /// Raw handler outputs for custom events.
    pub outputs: Vec<TriggerOutput>,
    /// One entry per handler considered, in order.
    pub trace: Vec<HandlerTrace>,
}

impl DispatchOutcome {
    /// Handlers whose body actually ran.
    pub fn invoked(&self) -> impl Iterator<Item = &HandlerTrace> {
        self.trace.iter().filter(|t| t.status.invoked())
    }

    /// Handlers skipped by the rate limiter or circuit breaker.
    pub fn skipped(&self) -> impl Iterator<Item = &HandlerTrace> {
        self.trace.iter().filter(|t| !t.status.invoked())
    }

    /// Plugin names in the order their handlers ran.
    pub fn invoked_plugins(&self) -> Vec<&str> {
        self.invoked().map(|t| t.plugin.as_str()).collect()
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────────────

pub(crate) struct Inner {
    registry: RwLock<HandlerRegistry>,
    limiter: RateLimiter,
    handler_timeout: Duration,
    breaker: Option<CircuitBreaker>,
    sink: Arc<dyn DispatchEventSink>,
    transport: Option<Arc<dyn Transport>>,
}

/// Cheaply cloneable handle to the engine. Safe to use from many tasks at
/// once; one dispatch runs its handlers strictly in sequence.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    // ── Registry access ─────────────────────────────────────────────────────

    pub fn register(
        &self,
        kind: impl Into<EventKind>,
        plugin: &PluginBinding,
        handler: Arc<dyn HookHandler>,
    ) -> Result<()> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register(kind.into(), plugin, handler)
    }

    /// Remove every handler of `plugin` and forget its rate-limit window.
    pub fn unregister_all(&self, plugin: &str) -> Option<PluginBinding> {
        let removed = self
            .inner
            .registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .unregister_all(plugin);
        self.inner.limiter.reset(plugin);
        removed
    }

    pub fn set_priority(&self, plugin: &str, priority: i32) -> Result<()> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .set_priority(plugin, priority)
    }

    pub fn handlers_for(&self, kind: &EventKind) -> Vec<HookBinding> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .handlers_for(kind)
    }

    pub fn plugin(&self, name: &str) -> Option<PluginBinding> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .plugin(name)
            .cloned()
    }

    pub fn plugins(&self) -> Vec<PluginBinding> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .plugins()
    }

    pub fn handler_stats(
        &self,
        kind: &EventKind,
        plugin: &str,
        handler: &str,
    ) -> Option<Arc<HookStats>> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .handler_stats(kind, plugin, handler)
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn handler_timeout(&self) -> Duration {
        self.inner.handler_timeout
    }

    // ── Dispatch ────────────────────────────────────────────────────────────

    /// Route `event` by kind and run the matching handlers.
    pub async fn dispatch(&self, event: &EventEnvelope) -> DispatchOutcome {
        let kind = event.kind();
        debug!(event = %kind, bot = event.bot_id(), "dispatching event");

        #[cfg(feature = "metrics")]
        counter!(dispatch_metrics::EVENTS_TOTAL, labels::EVENT => kind.to_string()).increment(1);

        let mut outcome = DispatchOutcome::default();
        match kind {
            EventKind::MessageReceived => {
                self.run_message_phase(event, &mut outcome).await;
                if !outcome.handled {
                    outcome.phase = Phase::Fallback;
                    let fallback = event.with_kind(EventKind::MessageNotHandled);
                    self.run_message_phase(&fallback, &mut outcome).await;
                }
            },
            k if k.produces_messages() => self.run_message_phase(event, &mut outcome).await,
            k if k.is_lifecycle() => self.run_lifecycle(event, &mut outcome).await,
            _ => self.run_trigger(event, &mut outcome).await,
        }

        if kind.produces_messages() {
            debug!(
                event = %kind,
                handled = outcome.handled,
                phase = ?outcome.phase,
                responses = outcome.responses.len(),
                "dispatch complete"
            );
            #[cfg(feature = "metrics")]
            {
                if !outcome.handled {
                    counter!(dispatch_metrics::UNHANDLED_TOTAL, labels::EVENT => kind.to_string())
                        .increment(1);
                }
                counter!(dispatch_metrics::RESPONSES_TOTAL, labels::EVENT => kind.to_string())
                    .increment(outcome.responses.len() as u64);
            }
        }
        outcome
    }

    /// Fire a custom event and collect every handler's raw output in order.
    ///
    /// Any kind name is accepted; the handlers bound to it run once each
    /// with the same isolation and rate limiting as message handlers.
    pub async fn trigger(
        &self,
        kind: impl Into<EventKind>,
        bot_id: &str,
        payload: Value,
    ) -> Vec<TriggerOutput> {
        let event = EventEnvelope::custom(kind, bot_id, payload);
        let mut outcome = DispatchOutcome::default();
        self.run_trigger(&event, &mut outcome).await;
        outcome.outputs
    }

    /// Dispatch `event` and hand any replies to the configured transport.
    ///
    /// Delivery failures are logged and do not change the outcome.
    pub async fn handle_inbound(&self, event: &EventEnvelope) -> DispatchOutcome {
        let outcome = self.dispatch(event).await;
        if outcome.responses.is_empty() {
            return outcome;
        }
        match &self.inner.transport {
            Some(transport) => {
                if let Err(e) = transport.send(event, &outcome.responses).await {
                    warn!(
                        event = %event.kind(),
                        bot = event.bot_id(),
                        error = %e,
                        "failed to deliver responses"
                    );
                }
            },
            None => warn!(
                event = %event.kind(),
                responses = outcome.responses.len(),
                "no transport configured, responses dropped"
            ),
        }
        outcome
    }

    // ── Loops ───────────────────────────────────────────────────────────────

    async fn run_message_phase(&self, event: &EventEnvelope, outcome: &mut DispatchOutcome) {
        for binding in self.handlers_for(event.kind()) {
            let output = match self.invoke(&binding, event, true).await {
                Ok(output) => output,
                Err(status) => {
                    outcome.trace.push(HandlerTrace::new(&binding, status));
                    continue;
                },
            };

            let (result, status) = match self.normalize(&binding, event, output) {
                Some(result) if !result.handled => (result, TraceStatus::Passed),
                Some(result) if result.continue_chain => (result, TraceStatus::Continued),
                Some(result) => (result, TraceStatus::Handled),
                None => (DispatchResult::pass(), TraceStatus::Malformed),
            };
            outcome.trace.push(HandlerTrace::new(&binding, status));
            outcome.responses.extend(result.responses);

            if result.handled {
                outcome.handled = true;
                if !result.continue_chain {
                    debug!(
                        plugin = binding.plugin(),
                        event = %event.kind(),
                        "event claimed, stopping chain"
                    );
                    break;
                }
            }
        }
    }

    async fn run_lifecycle(&self, event: &EventEnvelope, outcome: &mut DispatchOutcome) {
        for binding in self.handlers_for(event.kind()) {
            let output = match self.invoke(&binding, event, false).await {
                Ok(output) => output,
                Err(status) => {
                    outcome.trace.push(HandlerTrace::new(&binding, status));
                    continue;
                },
            };

            let Some(result) = self.normalize(&binding, event, output) else {
                outcome
                    .trace
                    .push(HandlerTrace::new(&binding, TraceStatus::Malformed));
                continue;
            };
            outcome
                .trace
                .push(HandlerTrace::new(&binding, TraceStatus::Passed));

            let status = result.status_message.or_else(|| {
                result
                    .responses
                    .iter()
                    .find_map(|m| m.plain_text().map(str::to_string))
            });
            if let Some(message) = status {
                info!(plugin = binding.plugin(), event = %event.kind(), status = %message, "lifecycle status");
                self.inner.sink.emit(DispatchEvent::LifecycleStatus {
                    plugin: binding.plugin().to_string(),
                    event: event.kind().clone(),
                    message: message.clone(),
                });
                outcome.statuses.push(LifecycleStatus {
                    plugin: binding.plugin().to_string(),
                    handler: binding.handler_name().to_string(),
                    message,
                });
            }
        }
    }

    async fn run_trigger(&self, event: &EventEnvelope, outcome: &mut DispatchOutcome) {
        for binding in self.handlers_for(event.kind()) {
            match self.invoke(&binding, event, true).await {
                Ok(output) => {
                    outcome
                        .trace
                        .push(HandlerTrace::new(&binding, TraceStatus::Passed));
                    outcome.outputs.push(TriggerOutput {
                        plugin: binding.plugin().to_string(),
                        handler: binding.handler_name().to_string(),
                        output,
                    });
                },
                Err(status) => outcome.trace.push(HandlerTrace::new(&binding, status)),
            }
        }
    }

    // ── Single invocation ───────────────────────────────────────────────────

    /// Run one handler inside the failure boundary. `Err` carries the reason
    /// it produced nothing.
    async fn invoke(
        &self,
        binding: &HookBinding,
        event: &EventEnvelope,
        rate_limited: bool,
    ) -> std::result::Result<HandlerOutput, TraceStatus> {
        let plugin = binding.plugin();
        let handler = binding.handler_name();
        let kind = event.kind();

        if let Some(breaker) = &self.inner.breaker {
            match breaker.check(handler, binding.stats()) {
                BreakerCheck::Closed => {},
                check => {
                    if check == BreakerCheck::Tripped {
                        let failures = breaker.threshold;
                        warn!(plugin, handler, failures, "circuit breaker tripped, handler disabled");
                        self.inner.sink.emit(DispatchEvent::CircuitOpened {
                            plugin: plugin.to_string(),
                            handler: handler.to_string(),
                            failures,
                        });
                    } else {
                        debug!(plugin, handler, "circuit open, skipping handler");
                    }
                    #[cfg(feature = "metrics")]
                    counter!(dispatch_metrics::CIRCUIT_OPEN_SKIPS_TOTAL, labels::PLUGIN => plugin.to_string())
                        .increment(1);
                    return Err(TraceStatus::CircuitOpen);
                },
            }
        }

        if rate_limited && !self.inner.limiter.try_consume(plugin) {
            warn!(plugin, event = %kind, "rate limit exceeded, skipping handler");
            self.inner.sink.emit(DispatchEvent::RateLimited {
                plugin: plugin.to_string(),
                event: kind.clone(),
            });
            #[cfg(feature = "metrics")]
            counter!(dispatch_metrics::RATE_LIMITED_TOTAL, labels::PLUGIN => plugin.to_string())
                .increment(1);
            return Err(TraceStatus::RateLimited);
        }

        let ctx = HookContext::new(
            plugin,
            event.bot_id(),
            Arc::downgrade(&self.inner),
            self.inner.transport.clone(),
        );
        let timeout = self.inner.handler_timeout;
        let start = Instant::now();
        let call = AssertUnwindSafe(binding.handler().handle(&ctx, event)).catch_unwind();
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(HandlerFault::Failed(e)),
            Ok(Err(panic)) => Err(HandlerFault::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(HandlerFault::TimedOut(timeout)),
        };
        let latency = start.elapsed();

        #[cfg(feature = "metrics")]
        {
            counter!(dispatch_metrics::HANDLER_INVOCATIONS_TOTAL, labels::PLUGIN => plugin.to_string(), labels::EVENT => kind.to_string())
                .increment(1);
            histogram!(dispatch_metrics::HANDLER_DURATION_SECONDS, labels::PLUGIN => plugin.to_string())
                .record(latency.as_secs_f64());
        }

        match result {
            Ok(output) => {
                binding.stats().record_success(latency);
                Ok(output)
            },
            Err(fault) => {
                binding.stats().record_failure(latency);
                warn!(
                    plugin,
                    handler,
                    event = %kind,
                    fault = fault.label(),
                    error = %fault,
                    "hook handler failed"
                );
                #[cfg(feature = "metrics")]
                counter!(dispatch_metrics::HANDLER_FAULTS_TOTAL, labels::PLUGIN => plugin.to_string(), labels::FAULT => fault.label())
                    .increment(1);
                self.inner.sink.emit(DispatchEvent::HandlerFailed {
                    plugin: plugin.to_string(),
                    handler: handler.to_string(),
                    event: kind.clone(),
                    fault: fault.label(),
                    detail: fault.to_string(),
                });
                Err(TraceStatus::Failed(fault.label()))
            },
        }
    }

    /// `None` when the output was malformed (already logged and reported).
    fn normalize(
        &self,
        binding: &HookBinding,
        event: &EventEnvelope,
        output: HandlerOutput,
    ) -> Option<DispatchResult> {
        match try_normalize(output) {
            Ok(result) => Some(result),
            Err(malformed) => {
                warn!(
                    plugin = binding.plugin(),
                    handler = binding.handler_name(),
                    event = %event.kind(),
                    reason = %malformed.reason,
                    "ignoring malformed handler result"
                );
                self.inner.sink.emit(DispatchEvent::MalformedResult {
                    plugin: binding.plugin().to_string(),
                    handler: binding.handler_name().to_string(),
                    event: event.kind().clone(),
                    reason: malformed.reason,
                });
                None
            },
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler_timeout", &self.inner.handler_timeout)
            .field("limiter", &self.inner.limiter)
            .field("breaker", &self.inner.breaker)
            .field("transport", &self.inner.transport.is_some())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── DispatcherBuilder ───────────────────────────────────────────────────────

pub struct DispatcherBuilder {
    limiter: RateLimiter,
    handler_timeout: Duration,
    breaker: Option<CircuitBreaker>,
    sink: Arc<dyn DispatchEventSink>,
    transport: Option<Arc<dyn Transport>>,
}

impl DispatcherBuilder {
    /// Defaults: 10 invocations per plugin per 60 s, 5 s handler timeout,
    /// no circuit breaker, no transport.
    pub fn new() -> Self {
        let config = ParleyConfig::default();
        Self {
            limiter: RateLimiter::from_config(&config.rate_limit),
            handler_timeout: config.dispatch.handler_timeout(),
            breaker: None,
            sink: Arc::new(NoopSink),
            transport: None,
        }
    }

    /// Take limits from a loaded config. Warnings are logged; errors reject it.
    pub fn from_config(config: &ParleyConfig) -> Result<Self> {
        let report = validate(config);
        for diagnostic in &report.diagnostics {
            if diagnostic.severity == Severity::Warning {
                warn!(path = %diagnostic.path, "{}", diagnostic.message);
            }
        }
        if report.has_errors() {
            return Err(Error::InvalidConfig(
                report
                    .diagnostics
                    .iter()
                    .filter(|d| d.severity == Severity::Error)
                    .map(ToString::to_string)
                    .collect(),
            ));
        }

        Ok(Self {
            limiter: RateLimiter::from_config(&config.rate_limit),
            handler_timeout: config.dispatch.handler_timeout(),
            breaker: config
                .dispatch
                .circuit_breaker()
                .map(|(threshold, cooldown)| CircuitBreaker::new(threshold, cooldown)),
            ..Self::new()
        })
    }

    #[must_use]
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Skip a handler after `threshold` consecutive faults. `0` turns the
    /// breaker off, as in configuration.
    #[must_use]
    pub fn circuit_breaker(mut self, threshold: u64, cooldown: Duration) -> Self {
        self.breaker = (threshold > 0).then(|| CircuitBreaker::new(threshold, cooldown));
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn DispatchEventSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            inner: Arc::new(Inner {
                registry: RwLock::new(HandlerRegistry::new()),
                limiter: self.limiter,
                handler_timeout: self.handler_timeout,
                breaker: self.breaker,
                sink: self.sink,
                transport: self.transport,
            }),
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        DispatcherBuilder::new().build()
    }
}
