//! Templated cards and interactive buttons.

use serde::{Deserialize, Serialize};

/// What happens when a user presses a [`Button`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ButtonAction {
    /// Deliver `data` back to the bot as a callback event.
    Callback { data: String },
    /// Open a URL.
    Link { url: String },
    /// Insert `text` into the user's input box as a command.
    Command { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback { data: data.into() },
        }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Link { url: url.into() },
        }
    }

    pub fn command(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Command { text: text.into() },
        }
    }
}

/// Platform card templates. Each variant carries only the fields its layout uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum TemplateCard {
    Text {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Short preview shown in the conversation list.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    TextWithLink {
        content: String,
        link_text: String,
        url: String,
    },
    Link {
        title: String,
        description: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
    },
    Small {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        image_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    LargeImage {
        title: String,
        subtitle: String,
        image_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Button {
        title: String,
        content: String,
        buttons: Vec<Button>,
    },
}

impl TemplateCard {
    /// Stable name of the layout, for logs.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::TextWithLink { .. } => "text_with_link",
            Self::Link { .. } => "link",
            Self::Small { .. } => "small",
            Self::LargeImage { .. } => "large_image",
            Self::Button { .. } => "button",
        }
    }
}
