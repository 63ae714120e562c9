//! `help` plugin: answers `/help` with the command catalog and
//! `/help <plugin|command>` with a detail page.

use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    parley_dispatch::{
        DispatchResult, EventEnvelope, EventKind, HandlerOutput, HookContext, HookHandler,
    },
    parley_messages::Message,
    tracing::debug,
};

use crate::{
    catalog::CommandCatalog,
    manifest::{CommandDescriptor, PluginManifest},
    plugin::{HookDeclaration, Plugin},
};

/// Runs ahead of ordinary plugins so `/help` is never swallowed.
const HELP_PRIORITY: i32 = 0;

/// Replies to help commands using a shared [`CommandCatalog`].
pub struct HelpHandler {
    catalog: CommandCatalog,
    triggers: Vec<String>,
}

impl HelpHandler {
    pub fn new(catalog: CommandCatalog, triggers: Vec<String>) -> Self {
        Self { catalog, triggers }
    }

    /// `Some(topic)` when `text` is a help command; the topic may be empty.
    /// Only slash commands count, so "help me with my order" passes through.
    fn parse<'a>(&self, text: &'a str) -> Option<&'a str> {
        let mut parts = text.strip_prefix('/')?.splitn(2, char::is_whitespace);
        let head = parts.next()?;
        self.triggers
            .iter()
            .any(|t| t.eq_ignore_ascii_case(head))
            .then(|| parts.next().unwrap_or("").trim())
    }

    fn answer(&self, topic: &str) -> String {
        if topic.is_empty() {
            return self.catalog.render_markdown();
        }
        let topic = topic.trim_start_matches('/');
        if let Some(page) = self.catalog.render_plugin(topic) {
            return page;
        }
        if let Some((plugin, command)) = self.catalog.find_command(topic) {
            return self
                .catalog
                .render_plugin(&plugin)
                .unwrap_or_else(|| command.display_usage());
        }
        format!("No plugin or command named `{topic}`. Send /help for the full list.")
    }
}

#[async_trait]
impl HookHandler for HelpHandler {
    fn name(&self) -> &str {
        "help"
    }

    async fn handle(&self, _ctx: &HookContext, event: &EventEnvelope) -> Result<HandlerOutput> {
        let Some(topic) = self.parse(event.plaintext()) else {
            return Ok(DispatchResult::pass().into());
        };
        debug!(topic, "answering help request");
        Ok(DispatchResult::reply(Message::markdown(self.answer(topic))).into())
    }
}

/// The bundled help plugin.
pub struct HelpPlugin {
    manifest: PluginManifest,
    handler: Arc<HelpHandler>,
}

impl HelpPlugin {
    pub fn new(catalog: CommandCatalog) -> Self {
        Self::with_aliases(catalog, Vec::<String>::new())
    }

    /// Also answer to each alias as a slash command (e.g. `/commands`, `/?`).
    pub fn with_aliases<I, S>(catalog: CommandCatalog, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases: Vec<String> = aliases.into_iter().map(Into::into).collect();
        let mut command = CommandDescriptor::new("help", "List commands, or describe one plugin")
            .usage("/help [plugin]");
        command.aliases = aliases.clone();

        let mut triggers = vec!["help".to_string()];
        triggers.extend(aliases);

        Self {
            manifest: PluginManifest::new("help")
                .description("Built-in command reference")
                .priority(HELP_PRIORITY)
                .command(command),
            handler: Arc::new(HelpHandler::new(catalog, triggers)),
        }
    }
}

impl Plugin for HelpPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn hooks(&self) -> Vec<HookDeclaration> {
        vec![HookDeclaration::new(
            EventKind::MessageReceived,
            self.handler.clone(),
        )]
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        parley_dispatch::InboundMessage,
    };

    fn catalog() -> CommandCatalog {
        let catalog = CommandCatalog::new();
        catalog.insert(
            &PluginManifest::new("dice")
                .description("Random numbers")
                .command(CommandDescriptor::new("roll", "Roll a die").alias("r")),
            10,
        );
        catalog
    }

    async fn ask(handler: &HelpHandler, text: &str) -> HandlerOutput {
        let ctx = HookContext::detached("help", "bot");
        let event = EventEnvelope::message("bot", InboundMessage::new("1", "u", text));
        handler.handle(&ctx, &event).await.unwrap()
    }

    fn reply_text(output: HandlerOutput) -> String {
        match output {
            HandlerOutput::Result(r) => {
                assert!(r.handled);
                match &r.responses[..] {
                    [Message::Markdown { content, .. }] => content.clone(),
                    other => panic!("unexpected responses: {other:?}"),
                }
            },
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_commands() {
        let handler = HelpHandler::new(catalog(), vec!["help".into()]);
        let text = reply_text(ask(&handler, "/help").await);
        assert!(text.contains("`/roll` Roll a die"));
    }

    #[tokio::test]
    async fn describes_plugin_or_command() {
        let handler = HelpHandler::new(catalog(), vec!["help".into()]);
        assert!(reply_text(ask(&handler, "/help dice").await).starts_with("## dice"));
        assert!(reply_text(ask(&handler, "/help /r").await).starts_with("## dice"));
        assert!(reply_text(ask(&handler, "/help nothing").await).contains("No plugin or command"));
    }

    #[tokio::test]
    async fn plain_words_are_not_commands() {
        let handler = HelpHandler::new(catalog(), vec!["help".into()]);
        for text in ["help", "help me with my order", "Help dice"] {
            assert_eq!(
                ask(&handler, text).await,
                HandlerOutput::Result(DispatchResult::pass()),
                "{text}"
            );
        }
    }

    #[tokio::test]
    async fn aliases_and_non_help_text() {
        let plugin = HelpPlugin::with_aliases(catalog(), ["commands"]);
        assert_eq!(plugin.manifest().commands[0].aliases, vec!["commands"]);
        let handler = &plugin.handler;
        assert!(reply_text(ask(handler, "/commands").await).contains("dice"));
        assert_eq!(
            ask(handler, "commands").await,
            HandlerOutput::Result(DispatchResult::pass())
        );
        assert_eq!(
            ask(handler, "/helpful tips").await,
            HandlerOutput::Result(DispatchResult::pass())
        );
        assert_eq!(
            ask(handler, "roll the dice").await,
            HandlerOutput::Result(DispatchResult::pass())
        );
    }
}
