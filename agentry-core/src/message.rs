//! Conversation messages and the copy-on-write envelope helpers.
//!
//! Every helper here takes its input by reference and hands back an owned,
//! independent copy; the caller's message or conversation is never touched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentryError, AgentryResult};

/// Free-form string-keyed mapping used for metadata and pass-through fields.
pub type Metadata = Map<String, Value>;

/// An ordered chat history. Order is meaningful and preserved by every helper.
pub type Conversation = Vec<Message>;

/// A single chat message.
///
/// `role` and `content` are always present, though `content` may be `null`
/// (function-call messages carry no text). Keys other than the four named
/// fields are kept in `extra` so that a message survives a round trip through
/// JSON without losing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            name: None,
            metadata: None,
            extra: Metadata::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Content as text; empty when the content is null or not a string.
    pub fn text(&self) -> &str {
        self.content.as_str().unwrap_or_default()
    }

    /// Returns a metadata value, if the message carries metadata at all.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Reads a message out of a JSON value, as received through an operation argument.
    pub fn from_value(value: Value) -> AgentryResult<Self> {
        serde_json::from_value(value).map_err(|e| AgentryError::InvalidMessage(e.to_string()))
    }

    pub fn to_value(&self) -> Value {
        // Serializing a struct of strings and JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Returns an independent deep copy of a message or a whole conversation.
pub fn copy_message<T: Clone>(message: &T) -> T {
    message.clone()
}

/// Returns a copy of `message` with every entry of `updates` written into its
/// metadata. Metadata is created empty when absent; keys not named in
/// `updates` are left alone.
pub fn modify_metadata<I, K>(message: &Message, updates: I) -> Message
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let mut message = copy_message(message);
    let metadata = message.metadata.get_or_insert_with(Metadata::new);
    for (key, value) in updates {
        metadata.insert(key.into(), value);
    }
    message
}

/// Returns a copy of `message` whose content is replaced verbatim.
pub fn modify_content(message: &Message, content: impl Into<Value>) -> Message {
    let mut message = copy_message(message);
    message.content = content.into();
    message
}

/// Returns a copy of `conversation` whose final element is `message`.
pub fn replace_last(conversation: &[Message], message: Message) -> AgentryResult<Conversation> {
    let mut conversation = conversation.to_vec();
    let last = conversation
        .last_mut()
        .ok_or(AgentryError::EmptyConversation)?;
    *last = message;
    Ok(conversation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_conversation() -> Conversation {
        vec![
            Message::system("You are terse."),
            Message::user("hi").with_name("alice"),
            Message::assistant("hello"),
        ]
    }

    #[test]
    fn test_modify_metadata_overlays_updates() {
        let original = modify_metadata(&Message::user("q"), [("trace", json!("t-1"))]);
        let updated = modify_metadata(
            &original,
            [("round", json!(2)), ("trace", json!("t-2"))],
        );

        assert_eq!(original.metadata_value("trace"), Some(&json!("t-1")));
        assert!(original.metadata_value("round").is_none());
        assert_eq!(updated.metadata_value("trace"), Some(&json!("t-2")));
        assert_eq!(updated.metadata_value("round"), Some(&json!(2)));
        assert_eq!(updated.content, "q");
    }

    #[test]
    fn test_modify_metadata_creates_metadata() {
        let message = Message::user("q");
        let updated = modify_metadata(&message, Vec::<(String, Value)>::new());

        assert!(message.metadata.is_none());
        assert_eq!(updated.metadata, Some(Metadata::new()));
    }

    #[test]
    fn test_modify_metadata_duplicate_keys_last_wins() {
        let updated = modify_metadata(
            &Message::user("q"),
            [("k", json!(1)), ("k", json!(2))],
        );
        assert_eq!(updated.metadata_value("k"), Some(&json!(2)));
    }

    #[test]
    fn test_modify_content_keeps_other_fields() {
        let message = modify_metadata(&Message::user("old").with_name("bob"), [("a", json!(1))]);
        let updated = modify_content(&message, "new");

        assert_eq!(message.content, "old");
        assert_eq!(updated.content, "new");
        assert_eq!(updated.name.as_deref(), Some("bob"));
        assert_eq!(updated.metadata, message.metadata);
    }

    #[test]
    fn test_replace_last_leaves_source_untouched() {
        let conversation = sample_conversation();
        let snapshot = conversation.clone();
        let replacement = Message::assistant("bye");

        let mut replaced = replace_last(&conversation, replacement.clone()).unwrap();
        assert_eq!(conversation, snapshot);
        assert_eq!(replaced.len(), conversation.len());
        assert_eq!(replaced[..2], conversation[..2]);
        assert_eq!(replaced[2], replacement);

        replaced[0].content = json!("mutated");
        assert_eq!(conversation[0].content, "You are terse.");
    }

    #[test]
    fn test_replace_last_is_idempotent() {
        let conversation = sample_conversation();
        let message = Message::user("again");
        let once = replace_last(&conversation, message.clone()).unwrap();
        let twice = replace_last(&once, message).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_last_on_empty_conversation_fails() {
        for message in [Message::user("a"), Message::system(""), Message::assistant("b")] {
            let result = replace_last(&[], message);
            assert!(matches!(result, Err(AgentryError::EmptyConversation)));
        }
    }

    #[test]
    fn test_unknown_keys_survive_json_round_trip() {
        let value = json!({
            "role": "user",
            "content": "hi",
            "function_call": {"name": "lookup"}
        });
        let message = Message::from_value(value.clone()).unwrap();
        assert_eq!(message.extra.get("function_call"), Some(&json!({"name": "lookup"})));
        assert_eq!(message.to_value(), value);
    }

    fn function_call() -> Message {
        Message::from_value(json!({
            "role": "assistant",
            "content": null,
            "function_call": {"name": "search", "arguments": "{}"}
        }))
        .unwrap()
    }

    #[test]
    fn test_null_content_function_call_is_a_message() {
        let message = function_call();
        assert_eq!(message.content, Value::Null);
        assert_eq!(message.text(), "");
        assert_eq!(message.to_value()["content"], Value::Null);

        let copy = copy_message(&message);
        assert_eq!(copy, message);

        let tagged = modify_metadata(&message, [("round", json!(1))]);
        assert_eq!(tagged.content, Value::Null);
        assert_eq!(tagged.extra.get("function_call"), message.extra.get("function_call"));
        assert!(message.metadata.is_none());

        let replaced = replace_last(&[Message::user("find it")], message.clone()).unwrap();
        assert_eq!(replaced[0], message);
    }

    #[test]
    fn test_modify_content_accepts_any_value() {
        let cleared = modify_content(&Message::assistant("draft"), Value::Null);
        assert_eq!(cleared.content, Value::Null);

        let filled = modify_content(&function_call(), "done");
        assert_eq!(filled.text(), "done");
        assert!(filled.extra.contains_key("function_call"));
    }

    #[test]
    fn test_message_requires_role_and_content() {
        let result = Message::from_value(json!({"role": "user"}));
        assert!(matches!(result, Err(AgentryError::InvalidMessage(_))));
    }
}
