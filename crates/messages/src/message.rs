use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    card::{Button, TemplateCard},
    media::{Media, MediaKind, MediaSource},
};

// ── Embed ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// A structured card with a title, body and ordered key/value fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    /// RGB colour, `0xRRGGBB`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Embed {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Append a field; insertion order is display order.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn color(mut self, rgb: u32) -> Self {
        self.color = Some(rgb & 0x00FF_FFFF);
        self
    }

    #[must_use]
    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }
}

// ── Message ─────────────────────────────────────────────────────────────────

/// One outbound reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Text {
        content: String,
    },
    /// Native markdown, or a platform template when `template_id` is set
    /// (the content then carries `{{key}}` placeholders).
    Markdown {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyboard_id: Option<String>,
    },
    Media(Media),
    Embed(Embed),
    #[serde(rename = "template_card")]
    Card {
        card: TemplateCard,
    },
}

impl Message {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        Self::Markdown {
            content: content.into(),
            template_id: None,
            keyboard_id: None,
        }
    }

    pub fn markdown_template(
        template_id: impl Into<String>,
        content: impl Into<String>,
        keyboard_id: Option<String>,
    ) -> Self {
        Self::Markdown {
            content: content.into(),
            template_id: Some(template_id.into()),
            keyboard_id,
        }
    }

    pub fn media(media: Media) -> Self {
        Self::Media(media)
    }

    pub fn image_url(url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self::Media(Media::new(MediaKind::Image, MediaSource::Url(url.into())).with_caption(caption))
    }

    pub fn image_bytes(bytes: Vec<u8>, caption: impl Into<String>) -> Self {
        Self::Media(Media::new(MediaKind::Image, MediaSource::InlineBytes(bytes)).with_caption(caption))
    }

    pub fn image_path(path: impl Into<PathBuf>) -> Self {
        Self::Media(Media::new(MediaKind::Image, MediaSource::LocalPath(path.into())))
    }

    pub fn video(url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self::Media(Media::new(MediaKind::Video, MediaSource::Url(url.into())).with_caption(caption))
    }

    pub fn voice(url: impl Into<String>) -> Self {
        Self::Media(Media::new(MediaKind::Voice, MediaSource::Url(url.into())))
    }

    pub fn file(url: impl Into<String>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let media = Media::new(MediaKind::File, MediaSource::Url(url.into()));
        Self::Media(match filename.is_empty() {
            true => media,
            false => media.with_filename(filename),
        })
    }

    pub fn embed(embed: Embed) -> Self {
        Self::Embed(embed)
    }

    pub fn card(card: TemplateCard) -> Self {
        Self::Card { card }
    }

    pub fn text_card(
        content: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        let description = description.into();
        let prompt = prompt.into();
        Self::card(TemplateCard::Text {
            content: content.into(),
            description: (!description.is_empty()).then_some(description),
            prompt: (!prompt.is_empty()).then_some(prompt),
        })
    }

    pub fn link_card(
        title: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::card(TemplateCard::Link {
            title: title.into(),
            description: description.into(),
            url: url.into(),
            image_url: None,
        })
    }

    pub fn large_image(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self::card(TemplateCard::LargeImage {
            title: title.into(),
            subtitle: subtitle.into(),
            image_url: image_url.into(),
            url: None,
        })
    }

    pub fn button_card(
        title: impl Into<String>,
        content: impl Into<String>,
        buttons: Vec<Button>,
    ) -> Self {
        Self::card(TemplateCard::Button {
            title: title.into(),
            content: content.into(),
            buttons,
        })
    }

    /// Stable kind label, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Markdown { .. } => "markdown",
            Self::Media(_) => "media",
            Self::Embed(_) => "embed",
            Self::Card { .. } => "template_card",
        }
    }

    /// Text content for text-like messages; `None` for media and cards.
    pub fn plain_text(&self) -> Option<&str> {
        match self {
            Self::Text { content } | Self::Markdown { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Short human-readable rendering used by transports without rich support.
    pub fn summary(&self) -> String {
        match self {
            Self::Text { content } | Self::Markdown { content, .. } => content.clone(),
            Self::Media(media) => match (&media.caption, &media.filename) {
                (Some(caption), _) => format!("[{}] {caption}", media.kind),
                (None, Some(name)) => format!("[{}] {name}", media.kind),
                (None, None) => format!("[{}]", media.kind),
            },
            Self::Embed(embed) => match embed.description.is_empty() {
                true => embed.title.clone(),
                false => format!("{}\n{}", embed.title, embed.description),
            },
            Self::Card { card } => format!("[card:{}]", card.variant_name()),
        }
    }
}

impl From<&str> for Message {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

impl From<String> for Message {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

impl From<Embed> for Message {
    fn from(embed: Embed) -> Self {
        Self::Embed(embed)
    }
}

impl From<Media> for Message {
    fn from(media: Media) -> Self {
        Self::Media(media)
    }
}
