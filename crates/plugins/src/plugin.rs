//! What a plugin hands the loader: its manifest and the hooks it declares.

use std::sync::Arc;

use parley_dispatch::{EventKind, HookHandler};

use crate::manifest::PluginManifest;

/// One handler a plugin wants bound to one event kind.
#[derive(Clone)]
pub struct HookDeclaration {
    pub kind: EventKind,
    pub handler: Arc<dyn HookHandler>,
}

impl HookDeclaration {
    pub fn new(kind: impl Into<EventKind>, handler: Arc<dyn HookHandler>) -> Self {
        Self {
            kind: kind.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for HookDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDeclaration")
            .field("kind", &self.kind)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// A loadable unit of bot behaviour.
pub trait Plugin: Send + Sync {
    fn manifest(&self) -> &PluginManifest;

    /// Hooks to register, in the order they should run within the plugin's
    /// priority slot.
    fn hooks(&self) -> Vec<HookDeclaration>;
}

/// A plugin assembled from a manifest and closures, for plugins that need no
/// state of their own.
#[derive(Debug, Clone)]
pub struct StaticPlugin {
    manifest: PluginManifest,
    hooks: Vec<HookDeclaration>,
}

impl StaticPlugin {
    pub fn new(manifest: PluginManifest) -> Self {
        Self {
            manifest,
            hooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn hook(mut self, kind: impl Into<EventKind>, handler: Arc<dyn HookHandler>) -> Self {
        self.hooks.push(HookDeclaration::new(kind, handler));
        self
    }
}

impl Plugin for StaticPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn hooks(&self) -> Vec<HookDeclaration> {
        self.hooks.clone()
    }
}
