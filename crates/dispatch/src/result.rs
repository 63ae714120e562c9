//! Canonical handler result and the normalization boundary.
//!
//! [`try_normalize`] is the only place that interprets loose handler output;
//! the engine itself works on [`DispatchResult`] exclusively.

use {
    parley_messages::Message,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::handler::HandlerOutput;

/// Outcome of invoking one handler.
///
/// `continue_chain` only matters when `handled` is true: an unhandled result
/// always lets the chain continue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub handled: bool,
    #[serde(rename = "continue", default)]
    pub continue_chain: bool,
    #[serde(rename = "response", default)]
    pub responses: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl DispatchResult {
    /// Claim the event with one reply.
    pub fn reply(message: impl Into<Message>) -> Self {
        Self::reply_all(vec![message.into()])
    }

    /// Claim the event with an ordered list of replies.
    pub fn reply_all(responses: Vec<Message>) -> Self {
        Self {
            handled: true,
            responses,
            ..Self::default()
        }
    }

    /// Decline the event.
    pub fn pass() -> Self {
        Self::default()
    }

    /// Let lower-priority handlers run after this one.
    #[must_use]
    pub fn and_continue(mut self) -> Self {
        self.continue_chain = true;
        self
    }

    /// Status line reported by lifecycle hooks.
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            status_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether the next handler in the chain should run.
    pub fn continues(&self) -> bool {
        !self.handled || self.continue_chain
    }
}

/// Handler output that matches none of the recognized shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed handler result: {reason}")]
pub struct MalformedResult {
    pub reason: String,
}

impl MalformedResult {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Keys that mark a JSON object as a result mapping rather than a bare message.
const RESULT_KEYS: &[&str] = &["response", "message", "handled", "continue", "status_message"];

/// Convert handler output into a [`DispatchResult`], reporting shapes that
/// cannot be interpreted.
pub fn try_normalize(output: HandlerOutput) -> Result<DispatchResult, MalformedResult> {
    match output {
        HandlerOutput::Result(result) => Ok(result),
        HandlerOutput::Message(message) => Ok(DispatchResult::reply(message)),
        HandlerOutput::Messages(messages) if messages.is_empty() => Ok(DispatchResult::pass()),
        HandlerOutput::Messages(messages) => Ok(DispatchResult::reply_all(messages)),
        HandlerOutput::Nothing => Ok(DispatchResult::pass()),
        HandlerOutput::Value(value) => normalize_value(value),
    }
}

/// Total form of [`try_normalize`]: malformed output becomes an unhandled,
/// empty result.
pub fn normalize(output: HandlerOutput) -> DispatchResult {
    try_normalize(output).unwrap_or_default()
}

fn normalize_value(value: Value) -> Result<DispatchResult, MalformedResult> {
    match value {
        Value::Null => Ok(DispatchResult::pass()),
        Value::String(text) => Ok(DispatchResult::reply(Message::text(text))),
        Value::Array(items) if items.is_empty() => Ok(DispatchResult::pass()),
        Value::Array(items) => parse_messages(items).map(DispatchResult::reply_all),
        Value::Object(map) if map.is_empty() => Ok(DispatchResult::pass()),
        Value::Object(map) => {
            let is_mapping = RESULT_KEYS.iter().any(|key| map.contains_key(*key));
            if !is_mapping && map.contains_key("type") {
                // Legacy handlers return a bare message object.
                return parse_message(Value::Object(map)).map(DispatchResult::reply);
            }
            normalize_mapping(map)
        },
        other => Err(MalformedResult::new(format!(
            "unsupported {} value",
            json_type(&other)
        ))),
    }
}

fn normalize_mapping(mut map: Map<String, Value>) -> Result<DispatchResult, MalformedResult> {
    let handled = flag(&map, "handled")?;
    let continue_chain = flag(&map, "continue")?;
    let status_message = match map.remove("status_message") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            return Err(MalformedResult::new(format!(
                "status_message must be a string, got {}",
                json_type(&other)
            )));
        },
    };

    // `response` wins over the older `message` key.
    let raw = map.remove("response").or_else(|| map.remove("message"));
    let responses = match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => vec![Message::text(text)],
        Some(Value::Array(items)) => parse_messages(items)?,
        Some(object @ Value::Object(_)) => vec![parse_message(object)?],
        Some(other) => {
            return Err(MalformedResult::new(format!(
                "response must be a message or a list of messages, got {}",
                json_type(&other)
            )));
        },
    };

    Ok(DispatchResult {
        handled,
        continue_chain,
        responses,
        status_message,
    })
}

fn flag(map: &Map<String, Value>, key: &str) -> Result<bool, MalformedResult> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(MalformedResult::new(format!(
            "`{key}` must be a boolean, got {}",
            json_type(other)
        ))),
    }
}

/// All-or-nothing: one bad element rejects the whole list.
fn parse_messages(items: Vec<Value>) -> Result<Vec<Message>, MalformedResult> {
    items.into_iter().map(parse_message).collect()
}

fn parse_message(value: Value) -> Result<Message, MalformedResult> {
    if let Value::String(text) = value {
        return Ok(Message::text(text));
    }
    serde_json::from_value(value).map_err(|e| MalformedResult::new(format!("invalid message: {e}")))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn norm(value: Value) -> DispatchResult {
        normalize(HandlerOutput::Value(value))
    }

    #[test]
    fn canonical_result_is_unchanged() {
        let canonical = DispatchResult {
            handled: true,
            continue_chain: true,
            responses: vec![Message::text("a"), Message::markdown("**b**")],
            status_message: Some("ok".into()),
        };
        assert_eq!(normalize(HandlerOutput::Result(canonical.clone())), canonical);

        // Serialized form normalizes back to the same value.
        let json = serde_json::to_value(&canonical).unwrap();
        assert_eq!(norm(json), canonical);
    }

    #[test]
    fn bare_message_equals_single_element_list() {
        let msg = Message::text("hello");
        let alone = normalize(HandlerOutput::Message(msg.clone()));
        let wrapped = normalize(HandlerOutput::Messages(vec![msg.clone()]));
        assert_eq!(alone, wrapped);
        assert!(alone.handled);
        assert!(!alone.continue_chain);

        let json_alone = norm(json!({"response": {"type": "text", "content": "hello"}}));
        let json_list = norm(json!({"response": [{"type": "text", "content": "hello"}]}));
        assert_eq!(json_alone, json_list);
        assert_eq!(json_alone.responses, vec![msg]);
    }

    #[test]
    fn missing_flags_default_to_false() {
        let result = norm(json!({"response": "hi"}));
        assert!(!result.handled);
        assert!(!result.continue_chain);
        assert_eq!(result.responses, vec![Message::text("hi")]);
        assert!(result.continues());
    }

    #[test]
    fn message_key_is_accepted_and_response_wins() {
        let result = norm(json!({"message": "old", "handled": true}));
        assert_eq!(result.responses, vec![Message::text("old")]);

        let result = norm(json!({"message": "old", "response": "new", "handled": true}));
        assert_eq!(result.responses, vec![Message::text("new")]);
    }

    #[test]
    fn legacy_bare_message_object_is_handled() {
        let result = norm(json!({"type": "markdown", "content": "# hi"}));
        assert!(result.handled);
        assert_eq!(result.responses, vec![Message::markdown("# hi")]);
    }

    #[test]
    fn empty_shapes_pass() {
        for value in [json!(null), json!({}), json!([])] {
            assert_eq!(norm(value), DispatchResult::pass());
        }
        assert_eq!(normalize(HandlerOutput::Nothing), DispatchResult::pass());
        assert_eq!(normalize(HandlerOutput::Messages(vec![])), DispatchResult::pass());
    }

    #[test]
    fn unrecognized_shapes_fail_open() {
        for value in [
            json!(42),
            json!(true),
            json!({"handled": "yes"}),
            json!({"response": 7, "handled": true}),
            json!({"type": "hologram"}),
            json!({"handled": true, "status_message": 3}),
        ] {
            assert!(try_normalize(HandlerOutput::Value(value.clone())).is_err(), "{value}");
            assert_eq!(norm(value), DispatchResult::pass());
        }
    }

    #[test]
    fn one_bad_message_rejects_the_whole_list() {
        let result = try_normalize(HandlerOutput::Value(json!({
            "handled": true,
            "response": [{"type": "text", "content": "ok"}, {"type": "nope"}]
        })));
        let err = result.unwrap_err();
        assert!(err.reason.contains("invalid message"));
    }

    #[test]
    fn unknown_extra_keys_are_ignored() {
        let result = norm(json!({"handled": true, "continue": true, "priority": 3}));
        assert!(result.handled);
        assert!(result.continue_chain);
        assert!(result.continues());
    }

    #[test]
    fn builders() {
        let r = DispatchResult::reply("hey").and_continue();
        assert!(r.handled && r.continue_chain);
        assert!(!DispatchResult::reply("x").continues());
        assert_eq!(DispatchResult::status("up").status_message.as_deref(), Some("up"));
    }
}
