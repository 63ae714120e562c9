//! Plugin loader for the parley dispatch engine.
//!
//! A [`Plugin`] declares a [`PluginManifest`] (name, priority, command
//! descriptors) and a set of hooks. The [`PluginManager`] registers those
//! hooks with a [`Dispatcher`](parley_dispatch::Dispatcher), applies
//! `[plugins.<name>]` overrides from configuration, and keeps the
//! [`CommandCatalog`] the bundled `help` plugin renders.

pub mod bootstrap;
pub mod bundled;
pub mod catalog;
pub mod error;
pub mod manager;
pub mod manifest;
pub mod plugin;

pub use {
    bootstrap::bootstrap,
    catalog::{CatalogEntry, CommandCatalog},
    error::{Error, Result},
    manager::{LoadReport, PluginInfo, PluginManager, RejectedBinding},
    manifest::{CommandDescriptor, PluginManifest},
    plugin::{HookDeclaration, Plugin, StaticPlugin},
};
