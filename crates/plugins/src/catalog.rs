//! Command listing for loaded plugins, read by the help surface.

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    sync::{Arc, RwLock},
};

use crate::manifest::{CommandDescriptor, PluginManifest};

/// Help-relevant view of one loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub plugin: String,
    pub description: String,
    pub priority: i32,
    pub commands: Vec<CommandDescriptor>,
    pub details: String,
}

impl CatalogEntry {
    fn from_manifest(manifest: &PluginManifest, priority: i32) -> Self {
        Self {
            plugin: manifest.name.clone(),
            description: manifest.description.clone(),
            priority,
            commands: manifest.commands.clone(),
            details: manifest.details.clone(),
        }
    }
}

/// Shared, cloneable handle; the plugin manager writes, help plugins read.
#[derive(Debug, Clone, Default)]
pub struct CommandCatalog {
    entries: Arc<RwLock<BTreeMap<String, CatalogEntry>>>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, manifest: &PluginManifest, priority: i32) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(manifest.name.clone(), CatalogEntry::from_manifest(manifest, priority));
    }

    pub(crate) fn remove(&self, plugin: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(plugin);
    }

    pub(crate) fn set_priority(&self, plugin: &str, priority: i32) {
        if let Some(entry) = self
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(plugin)
        {
            entry.priority = priority;
        }
    }

    /// Entries in dispatch order: (priority, name).
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<CatalogEntry> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.plugin.cmp(&b.plugin)));
        entries
    }

    pub fn get(&self, plugin: &str) -> Option<CatalogEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(plugin)
            .cloned()
    }

    /// Plugin and descriptor answering to `word` (name or alias). The
    /// earliest plugin in dispatch order wins.
    pub fn find_command(&self, word: &str) -> Option<(String, CommandDescriptor)> {
        self.entries().into_iter().find_map(|entry| {
            entry
                .commands
                .iter()
                .find(|c| c.matches(word))
                .map(|c| (entry.plugin.clone(), c.clone()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// Markdown listing of every plugin's commands.
    pub fn render_markdown(&self) -> String {
        let mut out = String::from("## Commands\n");
        let entries = self.entries();
        if entries.iter().all(|e| e.commands.is_empty()) {
            out.push_str("\nNo commands available.\n");
            return out;
        }
        for entry in entries.iter().filter(|e| !e.commands.is_empty()) {
            out.push('\n');
            if entry.description.is_empty() {
                let _ = writeln!(out, "**{}**", entry.plugin);
            } else {
                let _ = writeln!(out, "**{}**: {}", entry.plugin, entry.description);
            }
            for command in &entry.commands {
                render_command(&mut out, command);
            }
        }
        out
    }

    /// Markdown detail page for one plugin.
    pub fn render_plugin(&self, plugin: &str) -> Option<String> {
        let entry = self.get(plugin)?;
        let mut out = format!("## {}\n", entry.plugin);
        if !entry.description.is_empty() {
            let _ = writeln!(out, "\n{}", entry.description);
        }
        if !entry.commands.is_empty() {
            out.push('\n');
            for command in &entry.commands {
                render_command(&mut out, command);
            }
        }
        if !entry.details.is_empty() {
            let _ = writeln!(out, "\n{}", entry.details);
        }
        Some(out)
    }
}

fn render_command(out: &mut String, command: &CommandDescriptor) {
    let _ = write!(out, "- `{}`", command.display_usage());
    if !command.description.is_empty() {
        let _ = write!(out, " {}", command.description);
    }
    if !command.aliases.is_empty() {
        let _ = write!(out, " (aliases: {})", command.aliases.join(", "));
    }
    out.push('\n');
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn weather() -> PluginManifest {
        PluginManifest::new("weather")
            .description("Forecasts")
            .command(
                CommandDescriptor::new("weather", "Current conditions")
                    .usage("/weather <city>")
                    .alias("w"),
            )
    }

    #[test]
    fn render_lists_plugins_in_priority_order() {
        let catalog = CommandCatalog::new();
        catalog.insert(&weather(), 20);
        catalog.insert(
            &PluginManifest::new("dice").command(CommandDescriptor::new("roll", "Roll a die")),
            5,
        );
        catalog.insert(&PluginManifest::new("silent"), 1);

        assert_eq!(
            catalog.render_markdown(),
            "## Commands\n\n**dice**\n- `/roll` Roll a die\n\n**weather**: Forecasts\n- `/weather <city>` Current conditions (aliases: w)\n"
        );
    }

    #[test]
    fn empty_catalog_says_so() {
        let catalog = CommandCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.render_markdown().contains("No commands available."));
    }

    #[test]
    fn find_command_by_alias_and_remove() {
        let catalog = CommandCatalog::new();
        catalog.insert(&weather(), 20);
        let (plugin, cmd) = catalog.find_command("/w").unwrap();
        assert_eq!(plugin, "weather");
        assert_eq!(cmd.name, "weather");

        catalog.set_priority("weather", 1);
        assert_eq!(catalog.get("weather").unwrap().priority, 1);

        catalog.remove("weather");
        assert!(catalog.find_command("weather").is_none());
    }

    #[test]
    fn render_plugin_includes_details() {
        let catalog = CommandCatalog::new();
        let mut manifest = weather();
        manifest.details = "Ask for any city.".into();
        catalog.insert(&manifest, 20);
        let page = catalog.render_plugin("weather").unwrap();
        assert!(page.starts_with("## weather\n\nForecasts\n"));
        assert!(page.ends_with("Ask for any city.\n"));
        assert!(catalog.render_plugin("nope").is_none());
    }
}
