//! Loads plugins into a [`Dispatcher`] and keeps their metadata.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use {
    parley_config::{ParleyConfig, PluginOverride},
    parley_dispatch::{Dispatcher, EventKind, PluginBinding},
    tracing::{info, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, gauge, labels, plugins as plugin_metrics};

use crate::{
    catalog::CommandCatalog,
    error::{Error, Result},
    manifest::PluginManifest,
    plugin::Plugin,
};

/// A hook binding the registry refused during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedBinding {
    pub kind: EventKind,
    pub handler: String,
    pub reason: String,
}

/// Outcome of [`PluginManager::load`]. Rejected bindings do not undo the
/// bindings that registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub plugin: String,
    pub priority: i32,
    pub registered: Vec<(EventKind, String)>,
    pub rejected: Vec<RejectedBinding>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// A loaded plugin as the manager tracks it.
#[derive(Clone)]
pub struct PluginInfo {
    pub manifest: PluginManifest,
    pub priority: i32,
    pub hooks: Vec<(EventKind, String)>,
    plugin: Arc<dyn Plugin>,
}

impl PluginInfo {
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }
}

impl std::fmt::Debug for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInfo")
            .field("name", &self.manifest.name)
            .field("priority", &self.priority)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Plugin loader: registers declared hooks, applies operator overrides and
/// maintains the [`CommandCatalog`].
pub struct PluginManager {
    dispatcher: Dispatcher,
    overrides: BTreeMap<String, PluginOverride>,
    loaded: RwLock<BTreeMap<String, PluginInfo>>,
    catalog: CommandCatalog,
}

impl PluginManager {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            overrides: BTreeMap::new(),
            loaded: RwLock::new(BTreeMap::new()),
            catalog: CommandCatalog::new(),
        }
    }

    /// Apply `[plugins.<name>]` overrides at load time.
    #[must_use]
    pub fn with_overrides(mut self, config: &ParleyConfig) -> Self {
        self.overrides = config.plugins.clone();
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Shared handle to the command listing.
    pub fn catalog(&self) -> CommandCatalog {
        self.catalog.clone()
    }

    /// Register every hook the plugin declares.
    ///
    /// Fails without side effects if the manifest is invalid, the plugin is
    /// disabled by configuration, or a plugin with the same name is loaded.
    pub fn load(&self, plugin: Arc<dyn Plugin>) -> Result<LoadReport> {
        let manifest = plugin.manifest().clone();
        manifest.validate()?;
        let name = manifest.name.clone();

        let overrides = self.overrides.get(&name);
        if overrides.is_some_and(|o| !o.enabled) {
            info!(plugin = %name, "plugin disabled by configuration, not loading");
            return Err(Error::Disabled { name });
        }

        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        if loaded.contains_key(&name) {
            return Err(Error::AlreadyLoaded { name });
        }

        let priority = overrides
            .and_then(|o| o.priority)
            .unwrap_or(manifest.priority);
        let binding = PluginBinding::new(name.clone(), priority);

        let mut report = LoadReport {
            plugin: name.clone(),
            priority,
            registered: Vec::new(),
            rejected: Vec::new(),
        };
        for hook in plugin.hooks() {
            let handler = hook.handler.name().to_string();
            match self
                .dispatcher
                .register(hook.kind.clone(), &binding, hook.handler)
            {
                Ok(()) => report.registered.push((hook.kind, handler)),
                Err(e) => {
                    warn!(plugin = %name, event = %hook.kind, handler = %handler, error = %e, "hook binding rejected");
                    #[cfg(feature = "metrics")]
                    counter!(plugin_metrics::REJECTED_BINDINGS_TOTAL, labels::PLUGIN => name.clone())
                        .increment(1);
                    report.rejected.push(RejectedBinding {
                        kind: hook.kind,
                        handler,
                        reason: e.to_string(),
                    });
                },
            }
        }

        self.catalog.insert(&manifest, priority);
        info!(
            plugin = %name,
            priority,
            hooks = report.registered.len(),
            rejected = report.rejected.len(),
            commands = manifest.commands.len(),
            "plugin loaded"
        );
        loaded.insert(name, PluginInfo {
            manifest,
            priority,
            hooks: report.registered.clone(),
            plugin,
        });

        #[cfg(feature = "metrics")]
        gauge!(plugin_metrics::LOADED).set(loaded.len() as f64);

        Ok(report)
    }

    /// Remove the plugin's hooks, rate-limit state and catalog entry.
    pub fn unload(&self, name: &str) -> Result<PluginInfo> {
        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        let info = loaded
            .remove(name)
            .ok_or_else(|| Error::unknown_plugin(name))?;

        self.dispatcher.unregister_all(name);
        self.catalog.remove(name);
        info!(plugin = name, "plugin unloaded");

        #[cfg(feature = "metrics")]
        gauge!(plugin_metrics::LOADED).set(loaded.len() as f64);

        Ok(info)
    }

    /// Change a loaded plugin's priority; its hooks are re-sorted.
    pub fn set_priority(&self, name: &str, priority: i32) -> Result<()> {
        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        let info = loaded
            .get_mut(name)
            .ok_or_else(|| Error::unknown_plugin(name))?;

        // A plugin whose hooks were all rejected has no registry entry.
        if !info.hooks.is_empty() {
            self.dispatcher.set_priority(name, priority)?;
        }
        info.priority = priority;
        self.catalog.set_priority(name, priority);
        Ok(())
    }

    /// Loaded plugins in dispatch order.
    pub fn list(&self) -> Vec<PluginInfo> {
        let mut plugins: Vec<PluginInfo> = self
            .loaded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        plugins.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.manifest.name.cmp(&b.manifest.name))
        });
        plugins
    }

    pub fn get(&self, name: &str) -> Option<PluginInfo> {
        self.loaded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("dispatcher", &self.dispatcher)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{manifest::CommandDescriptor, plugin::StaticPlugin},
        parley_dispatch::{DispatchResult, handler_fn},
    };

    fn echo_plugin(name: &str, priority: i32) -> Arc<dyn Plugin> {
        Arc::new(
            StaticPlugin::new(
                PluginManifest::new(name)
                    .priority(priority)
                    .command(CommandDescriptor::new("echo", "Repeat a message")),
            )
            .hook(
                EventKind::MessageReceived,
                handler_fn("echo", |_ctx, event| async move {
                    Ok(DispatchResult::reply(event.plaintext().to_string()))
                }),
            ),
        )
    }

    #[test]
    fn load_registers_hooks_and_catalog() {
        let manager = PluginManager::new(Dispatcher::default());
        let report = manager.load(echo_plugin("echo", 10)).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.registered, vec![(EventKind::MessageReceived, "echo".to_string())]);
        assert_eq!(manager.dispatcher().handlers_for(&EventKind::MessageReceived).len(), 1);
        assert!(manager.catalog().find_command("echo").is_some());
        assert!(manager.is_loaded("echo"));
    }

    #[test]
    fn double_load_is_rejected() {
        let manager = PluginManager::new(Dispatcher::default());
        manager.load(echo_plugin("echo", 10)).unwrap();
        let err = manager.load(echo_plugin("echo", 10)).unwrap_err();
        assert!(matches!(err, Error::AlreadyLoaded { .. }));
        assert_eq!(manager.dispatcher().handlers_for(&EventKind::MessageReceived).len(), 1);
    }

    #[test]
    fn duplicate_binding_is_reported_not_fatal() {
        let manager = PluginManager::new(Dispatcher::default());
        let handler = handler_fn("same", |_ctx, _event| async { Ok(DispatchResult::pass()) });
        let plugin = StaticPlugin::new(PluginManifest::new("twice"))
            .hook(EventKind::MessageReceived, handler.clone())
            .hook(EventKind::MessageReceived, handler.clone())
            .hook(EventKind::AfterBotStart, handler);
        let report = manager.load(Arc::new(plugin)).unwrap();
        assert_eq!(report.registered.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].kind, EventKind::MessageReceived);
    }

    #[test]
    fn overrides_apply_priority_and_enabled() {
        let mut config = ParleyConfig::default();
        config.plugins.insert("echo".into(), PluginOverride {
            priority: Some(1),
            enabled: true,
        });
        config.plugins.insert("off".into(), PluginOverride {
            priority: None,
            enabled: false,
        });
        let manager = PluginManager::new(Dispatcher::default()).with_overrides(&config);

        let report = manager.load(echo_plugin("echo", 10)).unwrap();
        assert_eq!(report.priority, 1);
        assert_eq!(manager.dispatcher().plugin("echo").unwrap().priority, 1);

        let err = manager.load(echo_plugin("off", 10)).unwrap_err();
        assert!(matches!(err, Error::Disabled { .. }));
        assert!(!manager.is_loaded("off"));
    }

    #[test]
    fn unload_and_set_priority() {
        let manager = PluginManager::new(Dispatcher::default());
        manager.load(echo_plugin("a", 10)).unwrap();
        manager.load(echo_plugin("b", 20)).unwrap();

        manager.set_priority("b", 0).unwrap();
        let order: Vec<_> = manager.list().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(
            manager.dispatcher().handlers_for(&EventKind::MessageReceived)[0].plugin(),
            "b"
        );

        let info = manager.unload("b").unwrap();
        assert_eq!(info.priority, 0);
        assert!(manager.catalog().get("b").is_none());
        assert!(matches!(manager.unload("b"), Err(Error::UnknownPlugin { .. })));
        assert!(matches!(manager.set_priority("b", 3), Err(Error::UnknownPlugin { .. })));
        assert_eq!(manager.get("a").unwrap().priority, 10);
    }

    #[test]
    fn invalid_manifest_is_refused() {
        let manager = PluginManager::new(Dispatcher::default());
        let err = manager
            .load(Arc::new(StaticPlugin::new(PluginManifest::new(""))))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidManifest { .. }));
    }
}
