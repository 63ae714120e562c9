//! Rich-media attachments (image, video, voice, file).

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// What kind of media an attachment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Voice,
    File,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Voice => "voice",
            Self::File => "file",
        };
        f.write_str(label)
    }
}

/// Where the transport should fetch the media bytes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Url(String),
    LocalPath(PathBuf),
    /// Raw bytes; base64 encoded on the wire.
    InlineBytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// A media attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    pub source: MediaSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Display name for file attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Ask the transport to upload the media to the platform before sending
    /// instead of passing the source through.
    #[serde(default = "default_auto_upload")]
    pub auto_upload: bool,
}

fn default_auto_upload() -> bool {
    true
}

impl Media {
    pub fn new(kind: MediaKind, source: MediaSource) -> Self {
        Self {
            kind,
            source,
            caption: None,
            filename: None,
            auto_upload: default_auto_upload(),
        }
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        let caption = caption.into();
        self.caption = (!caption.is_empty()).then_some(caption);
        self
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_auto_upload(mut self, auto_upload: bool) -> Self {
        self.auto_upload = auto_upload;
        self
    }
}

mod base64_bytes {
    use {
        base64::{Engine as _, engine::general_purpose::STANDARD},
        serde::{Deserialize, Deserializer, Serializer, de::Error as _},
    };

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_bytes_are_base64_on_the_wire() {
        let media = Media::new(MediaKind::Image, MediaSource::InlineBytes(vec![0x89, b'P', b'N', b'G']));
        let json = serde_json::to_value(&media).unwrap();
        assert_eq!(json["source"]["inline_bytes"], "iVBORw==");

        let back: Media = serde_json::from_value(json).unwrap();
        assert_eq!(back, media);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let json = serde_json::json!({
            "kind": "image",
            "source": {"inline_bytes": "***"},
        });
        assert!(serde_json::from_value::<Media>(json).is_err());
    }

    #[test]
    fn auto_upload_defaults_to_true() {
        let json = serde_json::json!({
            "kind": "video",
            "source": {"url": "https://example.com/a.mp4"},
        });
        let media: Media = serde_json::from_value(json).unwrap();
        assert!(media.auto_upload);
        assert_eq!(media.caption, None);
    }

    #[test]
    fn empty_caption_is_dropped() {
        let media = Media::new(MediaKind::Voice, MediaSource::Url("u".into())).with_caption("");
        assert_eq!(media.caption, None);
    }
}
