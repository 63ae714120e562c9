use {async_trait::async_trait, parley_messages::Message};

use crate::event::EventEnvelope;

/// The platform side of the bot: delivers replies and withdraws messages.
///
/// The engine never calls `send` with an empty list.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `messages` in order as the reply to `event`.
    async fn send(&self, event: &EventEnvelope, messages: &[Message]) -> anyhow::Result<()>;

    /// Withdraw a sent message. Returns `false` when the platform refused.
    async fn recall(&self, message_id: &str, bot_id: &str) -> anyhow::Result<bool>;
}
