//! Outbound message model produced by plugin handlers.
//!
//! A [`Message`] is immutable once built and is handed unchanged to the
//! transport for delivery. The serde representation (`{"type": "text", ...}`)
//! is also the loose JSON shape handlers may return inside `response`.

pub mod card;
pub mod media;
pub mod message;

pub use {
    card::{Button, ButtonAction, TemplateCard},
    media::{Media, MediaKind, MediaSource},
    message::{Embed, EmbedField, Message},
};
