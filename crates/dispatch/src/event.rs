//! Inbound events: the closed set of built-in kinds with typed payloads, plus
//! open string-keyed custom kinds for plugin-to-plugin signalling.

use std::{convert::Infallible, fmt, str::FromStr};

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

// ── EventKind ───────────────────────────────────────────────────────────────

/// What triggered a dispatch.
///
/// Built-in kinds round-trip through their snake_case names; every other
/// string is a [`EventKind::Custom`] kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    MessageReceived,
    /// Fallback phase, run only when no `MessageReceived` handler claimed the message.
    MessageNotHandled,
    NoticeReceived,
    RequestReceived,
    BeforeBotStart,
    AfterBotStart,
    BeforeBotStop,
    AfterBotStop,
    Custom(String),
}

impl EventKind {
    /// All built-in variants, for iteration.
    pub const BUILTIN: &'static [EventKind] = &[
        Self::MessageReceived,
        Self::MessageNotHandled,
        Self::NoticeReceived,
        Self::RequestReceived,
        Self::BeforeBotStart,
        Self::AfterBotStart,
        Self::BeforeBotStop,
        Self::AfterBotStop,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::MessageReceived => "message_received",
            Self::MessageNotHandled => "message_not_handled",
            Self::NoticeReceived => "notice_received",
            Self::RequestReceived => "request_received",
            Self::BeforeBotStart => "before_bot_start",
            Self::AfterBotStart => "after_bot_start",
            Self::BeforeBotStop => "before_bot_stop",
            Self::AfterBotStop => "after_bot_stop",
            Self::Custom(name) => name,
        }
    }

    /// Bot lifecycle kinds: every handler runs and only status messages are kept.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::BeforeBotStart | Self::AfterBotStart | Self::BeforeBotStop | Self::AfterBotStop
        )
    }

    /// Kinds whose handlers answer with messages and may claim the event.
    pub fn produces_messages(&self) -> bool {
        matches!(
            self,
            Self::MessageReceived
                | Self::MessageNotHandled
                | Self::NoticeReceived
                | Self::RequestReceived
        )
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        Self::BUILTIN
            .iter()
            .find(|kind| kind.as_str() == name)
            .cloned()
            .unwrap_or_else(|| Self::Custom(name.to_string()))
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Custom(_) => Self::Custom(name),
            builtin => builtin,
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Custom(name) => name,
            builtin => builtin.as_str().to_string(),
        }
    }
}

impl FromStr for EventKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

// ── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    #[default]
    Private,
    Group,
    Channel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An inbound chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: String,
    pub content: String,
    #[serde(default)]
    pub chat_type: ChatType,
    pub author: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// The bot was mentioned, replied to, or messaged privately.
    #[serde(default)]
    pub to_me: bool,
}

impl InboundMessage {
    pub fn new(
        message_id: impl Into<String>,
        author_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            content: content.into(),
            author: Author {
                id: author_id.into(),
                name: None,
            },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.chat_type = ChatType::Group;
        self.group_id = Some(group_id.into());
        self
    }

    /// Content with surrounding whitespace removed.
    pub fn plaintext(&self) -> &str {
        self.content.trim()
    }

    /// Conversation key: events from the same group/channel/DM share it.
    pub fn session_id(&self) -> String {
        match (self.chat_type, &self.group_id, &self.channel_id) {
            (ChatType::Group, Some(group), _) => format!("group_{group}"),
            (ChatType::Channel, _, Some(channel)) => format!("channel_{channel}"),
            _ => format!("private_{}", self.author.id),
        }
    }
}

/// A platform notice (member joined, admin changed, message recalled, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoticeEvent {
    pub notice_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
}

/// A request awaiting a decision (friend request, group invitation, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub request_type: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub comment: String,
    /// Opaque token the transport needs to approve or reject the request.
    #[serde(default)]
    pub flag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    BeforeStart,
    AfterStart,
    BeforeStop,
    AfterStop,
}

impl LifecyclePhase {
    pub fn kind(self) -> EventKind {
        match self {
            Self::BeforeStart => EventKind::BeforeBotStart,
            Self::AfterStart => EventKind::AfterBotStart,
            Self::BeforeStop => EventKind::BeforeBotStop,
            Self::AfterStop => EventKind::AfterBotStop,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotLifecycle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Message(InboundMessage),
    Notice(NoticeEvent),
    Request(RequestEvent),
    Lifecycle(BotLifecycle),
    Custom(Value),
}

// ── EventEnvelope ───────────────────────────────────────────────────────────

/// One inbound occurrence, read-only to the engine and its handlers.
///
/// Constructors pair every built-in kind with its payload type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    kind: EventKind,
    bot_id: String,
    payload: EventPayload,
}

impl EventEnvelope {
    pub fn message(bot_id: impl Into<String>, message: InboundMessage) -> Self {
        Self {
            kind: EventKind::MessageReceived,
            bot_id: bot_id.into(),
            payload: EventPayload::Message(message),
        }
    }

    pub fn notice(bot_id: impl Into<String>, notice: NoticeEvent) -> Self {
        Self {
            kind: EventKind::NoticeReceived,
            bot_id: bot_id.into(),
            payload: EventPayload::Notice(notice),
        }
    }

    pub fn request(bot_id: impl Into<String>, request: RequestEvent) -> Self {
        Self {
            kind: EventKind::RequestReceived,
            bot_id: bot_id.into(),
            payload: EventPayload::Request(request),
        }
    }

    pub fn lifecycle(phase: LifecyclePhase, bot_id: impl Into<String>, data: BotLifecycle) -> Self {
        Self {
            kind: phase.kind(),
            bot_id: bot_id.into(),
            payload: EventPayload::Lifecycle(data),
        }
    }

    /// A plugin-defined event. Any kind name is accepted.
    ///
    /// Names are resolved through [`EventKind::from`]: a built-in name such
    /// as `"message_received"` yields that built-in kind, and the envelope is
    /// then dispatched like one (two-phase, replies collected into
    /// `responses`) rather than through the custom-event loop. Only names
    /// outside [`EventKind::BUILTIN`] reach the raw-output `trigger` path.
    pub fn custom(kind: impl Into<EventKind>, bot_id: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            bot_id: bot_id.into(),
            payload: EventPayload::Custom(payload),
        }
    }

    /// Same event presented under another kind (the fallback phase sees the
    /// original message as `message_not_handled`).
    pub(crate) fn with_kind(&self, kind: EventKind) -> Self {
        Self {
            kind,
            bot_id: self.bot_id.clone(),
            payload: self.payload.clone(),
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn message_data(&self) -> Option<&InboundMessage> {
        match &self.payload {
            EventPayload::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn custom_data(&self) -> Option<&Value> {
        match &self.payload {
            EventPayload::Custom(v) => Some(v),
            _ => None,
        }
    }

    /// Trimmed message text, or `""` for non-message events.
    pub fn plaintext(&self) -> &str {
        self.message_data().map(InboundMessage::plaintext).unwrap_or("")
    }
}
