use std::sync::Arc;

use {
    parley_config::ParleyConfig,
    parley_dispatch::{DispatcherBuilder, Transport},
    tracing::debug,
};

use crate::{bundled::HelpPlugin, error::Result, manager::PluginManager};

/// Build a ready-to-use plugin manager from configuration: installs the
/// tracing subscriber, builds the dispatcher and loads the bundled `help`
/// plugin (unless disabled under `[plugins.help]`).
pub fn bootstrap(config: &ParleyConfig, transport: Option<Arc<dyn Transport>>) -> Result<PluginManager> {
    if let Err(e) = parley_common::init_telemetry(&config.logging.level, config.logging.json) {
        debug!(error = %e, "tracing subscriber already installed");
    }

    let mut builder = DispatcherBuilder::from_config(config)?;
    if let Some(transport) = transport {
        builder = builder.transport(transport);
    }
    let manager = PluginManager::new(builder.build()).with_overrides(config);

    if config.plugin("help").is_none_or(|o| o.enabled) {
        manager.load(Arc::new(HelpPlugin::new(manager.catalog())))?;
    }
    Ok(manager)
}
