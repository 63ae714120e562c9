//! Per-event-kind handler lists kept in (priority, registration order).

use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    event::EventKind,
    handler::HookHandler,
    stats::HookStats,
};

/// Priority given to plugins that do not declare one. Lower runs earlier.
pub const DEFAULT_PRIORITY: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Loaded,
    Unloaded,
}

/// A registered plugin as the registry sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginBinding {
    pub name: String,
    pub priority: i32,
    pub state: PluginState,
}

impl PluginBinding {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            state: PluginState::Loaded,
        }
    }

    pub fn with_default_priority(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_PRIORITY)
    }
}

/// One handler bound to one event kind on behalf of one plugin.
#[derive(Clone)]
pub struct HookBinding {
    kind: EventKind,
    plugin: String,
    priority: i32,
    handler: Arc<dyn HookHandler>,
    seq: u64,
    stats: Arc<HookStats>,
}

impl HookBinding {
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn handler(&self) -> &Arc<dyn HookHandler> {
        &self.handler
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }

    /// Global registration sequence number; breaks priority ties.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn stats(&self) -> &Arc<HookStats> {
        &self.stats
    }

    fn sort_key(&self) -> (i32, u64) {
        (self.priority, self.seq)
    }
}

impl fmt::Debug for HookBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBinding")
            .field("kind", &self.kind)
            .field("plugin", &self.plugin)
            .field("handler", &self.handler.name())
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Owns every plugin and hook binding. Only `register`, `unregister_all` and
/// `set_priority` mutate it.
#[derive(Default)]
pub struct HandlerRegistry {
    plugins: HashMap<String, PluginBinding>,
    hooks: HashMap<EventKind, Vec<HookBinding>>,
    next_seq: u64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `kind` for `plugin`.
    ///
    /// The first registration for a plugin records its binding; later ones
    /// reuse the recorded priority. Fails if the plugin already bound a
    /// handler with the same name to the same kind.
    pub fn register(
        &mut self,
        kind: EventKind,
        plugin: &PluginBinding,
        handler: Arc<dyn HookHandler>,
    ) -> Result<()> {
        let list = self.hooks.entry(kind.clone()).or_default();
        if list
            .iter()
            .any(|b| b.plugin == plugin.name && b.handler.name() == handler.name())
        {
            return Err(Error::DuplicateHandler {
                plugin: plugin.name.clone(),
                event: kind,
                handler: handler.name().to_string(),
            });
        }

        let priority = self
            .plugins
            .entry(plugin.name.clone())
            .or_insert_with(|| PluginBinding {
                state: PluginState::Loaded,
                ..plugin.clone()
            })
            .priority;

        let seq = self.next_seq;
        self.next_seq += 1;

        info!(
            plugin = %plugin.name,
            event = %kind,
            handler = handler.name(),
            priority,
            "hook handler registered"
        );

        list.push(HookBinding {
            kind,
            plugin: plugin.name.clone(),
            priority,
            handler,
            seq,
            stats: Arc::new(HookStats::new()),
        });
        list.sort_by_key(HookBinding::sort_key);
        Ok(())
    }

    /// Remove every binding owned by `plugin`. Unknown plugins are a no-op.
    ///
    /// Returns the plugin record, marked unloaded, if it was registered.
    pub fn unregister_all(&mut self, plugin: &str) -> Option<PluginBinding> {
        let mut removed = 0usize;
        self.hooks.retain(|_, list| {
            let before = list.len();
            list.retain(|b| b.plugin != plugin);
            removed += before - list.len();
            !list.is_empty()
        });

        let binding = self.plugins.remove(plugin).map(|mut b| {
            b.state = PluginState::Unloaded;
            b
        });
        if binding.is_some() {
            info!(plugin, removed, "plugin unregistered");
        } else {
            debug!(plugin, "unregister of unknown plugin ignored");
        }
        binding
    }

    /// Change a plugin's priority and re-sort every list it appears in.
    pub fn set_priority(&mut self, plugin: &str, priority: i32) -> Result<()> {
        let binding = self
            .plugins
            .get_mut(plugin)
            .ok_or_else(|| Error::unknown_plugin(plugin))?;
        let previous = binding.priority;
        binding.priority = priority;

        for list in self.hooks.values_mut() {
            let mut touched = false;
            for hook in list.iter_mut().filter(|b| b.plugin == plugin) {
                hook.priority = priority;
                touched = true;
            }
            if touched {
                list.sort_by_key(HookBinding::sort_key);
            }
        }

        info!(plugin, previous, priority, "plugin priority changed");
        Ok(())
    }

    /// Ordered snapshot of the handlers bound to `kind`.
    pub fn handlers_for(&self, kind: &EventKind) -> Vec<HookBinding> {
        self.hooks.get(kind).cloned().unwrap_or_default()
    }

    pub fn has_handlers(&self, kind: &EventKind) -> bool {
        self.hooks.get(kind).is_some_and(|v| !v.is_empty())
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginBinding> {
        self.plugins.get(name)
    }

    /// Registered plugins ordered by (priority, name).
    pub fn plugins(&self) -> Vec<PluginBinding> {
        let mut plugins: Vec<PluginBinding> = self.plugins.values().cloned().collect();
        plugins.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        plugins
    }

    /// Event kinds that currently have at least one handler.
    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self.hooks.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Stats for the named handler of `plugin` bound to `kind`.
    pub fn handler_stats(
        &self,
        kind: &EventKind,
        plugin: &str,
        handler: &str,
    ) -> Option<Arc<HookStats>> {
        self.hooks
            .get(kind)?
            .iter()
            .find(|b| b.plugin == plugin && b.handler.name() == handler)
            .map(|b| Arc::clone(&b.stats))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("plugins", &self.plugins.len())
            .field("kinds", &self.hooks.len())
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{handler::handler_fn, result::DispatchResult},
    };

    fn noop(name: &str) -> Arc<dyn HookHandler> {
        handler_fn(name.to_string(), |_ctx, _event| async {
            Ok(DispatchResult::pass())
        })
    }

    fn order(registry: &HandlerRegistry, kind: &EventKind) -> Vec<String> {
        registry
            .handlers_for(kind)
            .iter()
            .map(|b| format!("{}:{}", b.plugin(), b.handler_name()))
            .collect()
    }

    #[test]
    fn sorted_by_priority_then_registration() {
        let mut reg = HandlerRegistry::new();
        let kind = EventKind::MessageReceived;
        reg.register(kind.clone(), &PluginBinding::new("late", 10), noop("a"))
            .unwrap();
        reg.register(kind.clone(), &PluginBinding::new("early", 1), noop("a"))
            .unwrap();
        reg.register(kind.clone(), &PluginBinding::new("mid", 5), noop("a"))
            .unwrap();
        reg.register(kind.clone(), &PluginBinding::new("early", 1), noop("b"))
            .unwrap();
        reg.register(kind.clone(), &PluginBinding::new("peer", 5), noop("a"))
            .unwrap();

        assert_eq!(order(&reg, &kind), vec![
            "early:a", "early:b", "mid:a", "peer:a", "late:a"
        ]);
    }

    #[test]
    fn duplicate_triple_is_rejected() {
        let mut reg = HandlerRegistry::new();
        let p = PluginBinding::with_default_priority("echo");
        reg.register(EventKind::MessageReceived, &p, noop("h")).unwrap();
        let err = reg
            .register(EventKind::MessageReceived, &p, noop("h"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateHandler { .. }));

        // Same handler name on another kind is fine.
        reg.register(EventKind::MessageNotHandled, &p, noop("h"))
            .unwrap();
        assert_eq!(reg.handlers_for(&EventKind::MessageReceived).len(), 1);
    }

    #[test]
    fn later_registrations_keep_recorded_priority() {
        let mut reg = HandlerRegistry::new();
        reg.register(EventKind::MessageReceived, &PluginBinding::new("p", 3), noop("a"))
            .unwrap();
        reg.register(EventKind::NoticeReceived, &PluginBinding::new("p", 99), noop("b"))
            .unwrap();
        assert_eq!(reg.handlers_for(&EventKind::NoticeReceived)[0].priority(), 3);
        assert_eq!(reg.plugin("p").unwrap().priority, 3);
    }

    #[test]
    fn set_priority_resorts_every_list() {
        let mut reg = HandlerRegistry::new();
        for (name, prio) in [("a", 1), ("b", 2), ("c", 3)] {
            let p = PluginBinding::new(name, prio);
            reg.register(EventKind::MessageReceived, &p, noop("h")).unwrap();
            reg.register(EventKind::AfterBotStart, &p, noop("h")).unwrap();
        }

        reg.set_priority("c", 0).unwrap();
        assert_eq!(order(&reg, &EventKind::MessageReceived), vec!["c:h", "a:h", "b:h"]);
        assert_eq!(order(&reg, &EventKind::AfterBotStart), vec!["c:h", "a:h", "b:h"]);

        // Ties fall back to registration order.
        reg.set_priority("c", 2).unwrap();
        assert_eq!(order(&reg, &EventKind::MessageReceived), vec!["a:h", "b:h", "c:h"]);
    }

    #[test]
    fn unregister_all_removes_everything_and_is_idempotent() {
        let mut reg = HandlerRegistry::new();
        let gone = PluginBinding::new("gone", 1);
        let kept = PluginBinding::new("kept", 2);
        reg.register(EventKind::MessageReceived, &gone, noop("h")).unwrap();
        reg.register(EventKind::from("custom.ping"), &gone, noop("h")).unwrap();
        reg.register(EventKind::MessageReceived, &kept, noop("h")).unwrap();

        let removed = reg.unregister_all("gone").unwrap();
        assert_eq!(removed.state, PluginState::Unloaded);
        assert!(reg.unregister_all("gone").is_none());

        for kind in reg.kinds() {
            assert!(reg.handlers_for(&kind).iter().all(|b| b.plugin() != "gone"));
        }
        assert!(!reg.has_handlers(&EventKind::from("custom.ping")));
        assert!(matches!(
            reg.set_priority("gone", 9),
            Err(Error::UnknownPlugin { .. })
        ));
        assert_eq!(reg.handlers_for(&EventKind::MessageReceived)[0].priority(), 2);
    }

    #[test]
    fn snapshot_is_detached_from_registry() {
        let mut reg = HandlerRegistry::new();
        reg.register(EventKind::MessageReceived, &PluginBinding::new("a", 1), noop("h"))
            .unwrap();
        let snapshot = reg.handlers_for(&EventKind::MessageReceived);
        reg.unregister_all("a");
        assert_eq!(snapshot.len(), 1);
        assert!(reg.handlers_for(&EventKind::MessageReceived).is_empty());
    }

    #[test]
    fn stats_lookup() {
        let mut reg = HandlerRegistry::new();
        reg.register(EventKind::MessageReceived, &PluginBinding::new("a", 1), noop("h"))
            .unwrap();
        assert!(reg.handler_stats(&EventKind::MessageReceived, "a", "h").is_some());
        assert!(reg.handler_stats(&EventKind::MessageReceived, "a", "x").is_none());
    }
}
