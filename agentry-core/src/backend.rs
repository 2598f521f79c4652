//! Seams to the model and retrieval collaborators.
//!
//! The dispatch core only ever calls [`ModelBackend::chat`]; a retrieval
//! backend is an opaque handle passed through to agent construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ModelConfig;
use crate::error::{AgentryError, AgentryResult};
use crate::message::{Message, Metadata};
use crate::response::{ChatResponse, GenerationStats};

/// End-of-turn markers some chat templates leave in generated text.
pub const END_MARKERS: &[&str] = &["<|im_end|>", "<|endoftext|>"];

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Runs one chat completion. Implementations return at least one response.
    async fn chat(
        &self,
        conversation: &[Message],
        config: &ChatConfig,
    ) -> AgentryResult<Vec<ChatResponse>>;
}

/// Opaque retrieval handle, forwarded unchanged into agent construction.
pub trait RetrievalBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
}

pub type SharedModel = Arc<dyn ModelBackend>;
pub type SharedRetrieval = Arc<dyn RetrievalBackend>;

/// Generation options for a single chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub max_length: u32,
    pub top_p: f64,
    pub temperature: f64,
    /// Free-form generation overrides passed through to the backend.
    #[serde(default, flatten)]
    pub extra: Metadata,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for ChatConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            max_length: config.max_length,
            top_p: config.top_p,
            temperature: config.temperature,
            extra: Metadata::new(),
        }
    }
}

impl ChatConfig {
    /// Returns a copy with `overrides` applied. The three typed options are
    /// parsed out of the mapping; every other key lands in `extra`.
    pub fn merged(&self, overrides: &Metadata) -> AgentryResult<Self> {
        let mut merged = self.clone();
        for (key, value) in overrides {
            match key.as_str() {
                "max_length" => {
                    merged.max_length = value
                        .as_u64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| bad_option(key, value))?;
                }
                "top_p" => merged.top_p = value.as_f64().ok_or_else(|| bad_option(key, value))?,
                "temperature" => {
                    merged.temperature = value.as_f64().ok_or_else(|| bad_option(key, value))?
                }
                _ => {
                    merged.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(merged)
    }
}

fn bad_option(key: &str, value: &Value) -> AgentryError {
    AgentryError::invalid_arguments("llm_config", format!("'{}' cannot be {}", key, value))
}

/// Role prefixes used by prompt-template backends to flatten a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    pub user_role: String,
    pub assistant_role: String,
    pub system_msg: String,
}

impl Default for RoleMapping {
    fn default() -> Self {
        Self {
            user_role: "User:".to_string(),
            assistant_role: "Assistant:".to_string(),
            system_msg: "You are a helpful assistant. Think it over and answer the user question correctly."
                .to_string(),
        }
    }
}

impl RoleMapping {
    /// Flattens a conversation into a single prompt ending with an open
    /// assistant turn. A leading system message replaces `system_msg`.
    pub fn render(&self, conversation: &[Message]) -> String {
        let mut prompt = String::new();
        let mut system = self.system_msg.as_str();
        let mut turns = conversation;
        if let Some((first, rest)) = conversation.split_first() {
            if first.role == "system" {
                system = first.text();
                turns = rest;
            }
        }
        prompt.push_str(system);
        prompt.push('\n');
        for message in turns {
            let prefix = if message.role == "assistant" {
                &self.assistant_role
            } else {
                &self.user_role
            };
            prompt.push_str(prefix);
            prompt.push_str(message.text());
            prompt.push('\n');
        }
        prompt.push_str(&self.assistant_role);
        prompt
    }
}

/// Cuts generated text at the first end-of-turn marker.
pub fn trim_at_markers(output: &str) -> &str {
    END_MARKERS
        .iter()
        .filter_map(|marker| output.find(marker))
        .min()
        .map(|idx| &output[..idx])
        .unwrap_or(output)
}

/// Deterministic backend that answers with the last user message.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    name: String,
    prefix: String,
    role_mapping: RoleMapping,
}

impl EchoBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            role_mapping: RoleMapping::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

#[async_trait]
impl ModelBackend for EchoBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        conversation: &[Message],
        config: &ChatConfig,
    ) -> AgentryResult<Vec<ChatResponse>> {
        let started = Instant::now();
        let prompt = self.role_mapping.render(conversation);
        let last_user = conversation
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(Message::text)
            .unwrap_or_default();

        let mut output = format!("{}{}", self.prefix, last_user);
        let limit = config.max_length as usize;
        if output.chars().count() > limit {
            output = output.chars().take(limit).collect();
        }

        let generated = output.split_whitespace().count() as u64;
        let input = prompt.split_whitespace().count() as u64;
        let stats = GenerationStats::new(input, generated, started.elapsed().as_secs_f64())
            .with_request_id(uuid::Uuid::new_v4().to_string());

        Ok(vec![ChatResponse::ok(output, prompt).with_stats(&stats)])
    }
}

/// A named, inert retrieval handle.
#[derive(Debug, Clone)]
pub struct NamedRetrieval {
    name: String,
}

impl NamedRetrieval {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RetrievalBackend for NamedRetrieval {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merged_parses_typed_options() {
        let base = ChatConfig::default();
        let mut overrides = Metadata::new();
        overrides.insert("temperature".to_string(), json!(0.7));
        overrides.insert("max_length".to_string(), json!(256));
        overrides.insert("generation.repetition_penalty".to_string(), json!(1.1));

        let merged = base.merged(&overrides).unwrap();
        assert_eq!(merged.max_length, 256);
        assert!((merged.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(merged.top_p, base.top_p);
        assert_eq!(
            merged.extra.get("generation.repetition_penalty"),
            Some(&json!(1.1))
        );
        assert!(base.extra.is_empty());
    }

    #[test]
    fn test_merged_rejects_bad_values() {
        let mut overrides = Metadata::new();
        overrides.insert("top_p".to_string(), json!("high"));
        let result = ChatConfig::default().merged(&overrides);
        assert!(matches!(result, Err(AgentryError::InvalidArguments { .. })));
    }

    #[test]
    fn test_trim_at_markers() {
        assert_eq!(trim_at_markers("answer<|im_end|>junk"), "answer");
        assert_eq!(trim_at_markers("a<|endoftext|>b<|im_end|>"), "a");
        assert_eq!(trim_at_markers("plain"), "plain");
    }

    #[test]
    fn test_role_mapping_uses_leading_system_message() {
        let mapping = RoleMapping::default();
        let prompt = mapping.render(&[
            Message::system("Be brief."),
            Message::user("hi"),
            Message::assistant("hello"),
        ]);
        assert!(prompt.starts_with("Be brief.\n"));
        assert!(prompt.contains("User:hi\n"));
        assert!(prompt.ends_with("Assistant:hello\nAssistant:"));
    }

    #[tokio::test]
    async fn test_echo_backend_returns_last_user_message() {
        let backend = EchoBackend::new("echo").with_prefix("re: ");
        let responses = backend
            .chat(
                &[Message::user("first"), Message::assistant("x"), Message::user("second")],
                &ChatConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].output, "re: second");
        assert!(responses[0].request_id().is_some());
    }

    #[tokio::test]
    async fn test_echo_backend_respects_max_length() {
        let backend = EchoBackend::new("echo");
        let config = ChatConfig {
            max_length: 3,
            ..ChatConfig::default()
        };
        let responses = backend
            .chat(&[Message::user("abcdef")], &config)
            .await
            .unwrap();
        assert_eq!(responses[0].output, "abc");
    }
}
