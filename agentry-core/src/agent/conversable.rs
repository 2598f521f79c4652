use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::{trim_at_markers, ChatConfig, SharedModel};
use crate::error::{AgentryError, AgentryResult};
use crate::message::{modify_metadata, Conversation, Message};

use super::{optional_str, required_message, required_str, Agent, AgentContext, AgentKind, Args};

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful AI Assistant.";

const KIND: &str = "conversable";

const OPERATIONS: &[&str] = &[
    "receive",
    "generate_reply",
    "last_message",
    "update_system_message",
    "system_message",
    "reset",
];

/// Chat agent keeping one conversation per peer and answering through its model.
pub struct ConversableAgent {
    name: String,
    model: SharedModel,
    chat_config: ChatConfig,
    state: RwLock<ConversableState>,
}

#[derive(Default)]
struct ConversableState {
    system_message: String,
    histories: HashMap<String, Conversation>,
    last_sender: Option<String>,
}

impl ConversableAgent {
    pub fn new(
        name: impl Into<String>,
        model: SharedModel,
        system_message: impl Into<String>,
        chat_config: ChatConfig,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            chat_config,
            state: RwLock::new(ConversableState {
                system_message: system_message.into(),
                ..ConversableState::default()
            }),
        }
    }

    pub async fn history(&self, peer: &str) -> Conversation {
        self.state
            .read()
            .await
            .histories
            .get(peer)
            .cloned()
            .unwrap_or_default()
    }

    async fn receive(&self, args: &Args) -> AgentryResult<Value> {
        let message = required_message(args, "message", "receive")?;
        let sender = optional_str(args, "sender", "receive")?
            .or(message.name.as_deref())
            .unwrap_or_default()
            .to_string();

        let stored = modify_metadata(&message, [("sender", json!(sender))]);
        let mut state = self.state.write().await;
        let history = state.histories.entry(sender.clone()).or_default();
        history.push(stored);
        let len = history.len();
        state.last_sender = Some(sender);
        Ok(json!(len))
    }

    async fn generate_reply(&self, args: &Args) -> AgentryResult<Value> {
        let peer = optional_str(args, "sender", "generate_reply")?.map(str::to_string);
        let config = match args.get("llm_config") {
            None | Some(Value::Null) => self.chat_config.clone(),
            Some(Value::Object(overrides)) => self.chat_config.merged(overrides)?,
            Some(other) => {
                return Err(AgentryError::invalid_arguments(
                    "generate_reply",
                    format!("'llm_config' must be an object, got {}", other),
                ))
            }
        };

        let (peer, prompt) = {
            let state = self.state.read().await;
            let peer = peer.or_else(|| state.last_sender.clone()).unwrap_or_default();
            let mut prompt = vec![Message::system(state.system_message.clone())];
            if let Some(history) = state.histories.get(&peer) {
                prompt.extend(history.iter().cloned());
            }
            (peer, prompt)
        };

        debug!(
            agent = %self.name,
            peer = %peer,
            turns = prompt.len(),
            "Generating reply"
        );

        let responses = self.model.chat(&prompt, &config).await?;
        let response = responses
            .into_iter()
            .next()
            .ok_or_else(|| AgentryError::EmptyModelResponse(self.model.name().to_string()))?;

        let reply = Message::assistant(trim_at_markers(&response.output)).with_name(self.name.clone());
        self.state
            .write()
            .await
            .histories
            .entry(peer)
            .or_default()
            .push(reply.clone());

        Ok(reply.to_value())
    }

    async fn last_message(&self, args: &Args) -> AgentryResult<Value> {
        let peer = optional_str(args, "sender", "last_message")?;
        let state = self.state.read().await;
        let peer = match peer {
            Some(p) => Some(p.to_string()),
            None => state.last_sender.clone(),
        };
        let last = peer
            .and_then(|p| state.histories.get(&p))
            .and_then(|h| h.last())
            .map(Message::to_value)
            .unwrap_or(Value::Null);
        Ok(last)
    }
}

#[async_trait]
impl Agent for ConversableAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        KIND
    }

    fn operations(&self) -> &[&'static str] {
        OPERATIONS
    }

    async fn call(&self, operation: &str, args: Args) -> AgentryResult<Value> {
        match operation {
            "receive" => self.receive(&args).await,
            "generate_reply" => self.generate_reply(&args).await,
            "last_message" => self.last_message(&args).await,
            "update_system_message" => {
                let content = required_str(&args, "content", operation)?.to_string();
                self.state.write().await.system_message = content;
                Ok(Value::Null)
            }
            "system_message" => Ok(json!(self.state.read().await.system_message)),
            "reset" => {
                let mut state = self.state.write().await;
                state.histories.clear();
                state.last_sender = None;
                Ok(Value::Null)
            }
            other => Err(AgentryError::unknown_operation(&self.name, other)),
        }
    }
}

/// Builds [`ConversableAgent`]s.
///
/// Recognized constructor arguments: `system_message` (string) and
/// `llm_config` (object of generation overrides). Other arguments are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversableKind;

impl AgentKind for ConversableKind {
    fn kind_name(&self) -> &str {
        KIND
    }

    fn construct(&self, ctx: AgentContext) -> AgentryResult<Arc<dyn Agent>> {
        let system_message = match ctx.args.get("system_message") {
            None | Some(Value::Null) => DEFAULT_SYSTEM_MESSAGE.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ctx.construction_error(
                    KIND,
                    format!("system_message must be a string, got {}", other),
                ))
            }
        };

        let chat_config = match ctx.args.get("llm_config") {
            None | Some(Value::Null) => ctx.chat_config.clone(),
            Some(Value::Object(overrides)) => ctx
                .chat_config
                .merged(overrides)
                .map_err(|e| ctx.construction_error(KIND, e.to_string()))?,
            Some(other) => {
                return Err(ctx.construction_error(
                    KIND,
                    format!("llm_config must be an object, got {}", other),
                ))
            }
        };

        Ok(Arc::new(ConversableAgent::new(
            ctx.name,
            ctx.model,
            system_message,
            chat_config,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::call_local;
    use crate::backend::{EchoBackend, ModelBackend};
    use crate::response::ChatResponse;

    fn echo_agent(name: &str) -> ConversableAgent {
        ConversableAgent::new(
            name,
            Arc::new(EchoBackend::new("echo").with_prefix("echo: ")),
            "Be brief.",
            ChatConfig::default(),
        )
    }

    fn receive_args(sender: &str, content: &str) -> Args {
        let mut args = Args::new();
        args.insert("sender".to_string(), json!(sender));
        args.insert("message".to_string(), Message::user(content).to_value());
        args
    }

    #[tokio::test]
    async fn test_receive_tags_sender_and_keeps_order() {
        let agent = echo_agent("bob");
        call_local(&agent, "receive", receive_args("alice", "one")).await.unwrap();
        let len = call_local(&agent, "receive", receive_args("alice", "two"))
            .await
            .unwrap();
        assert_eq!(len, json!(2));

        let history = agent.history("alice").await;
        assert_eq!(history[0].content, "one");
        assert_eq!(history[1].content, "two");
        assert_eq!(history[1].metadata_value("sender"), Some(&json!("alice")));
    }

    #[tokio::test]
    async fn test_generate_reply_answers_last_sender() {
        let agent = echo_agent("bob");
        call_local(&agent, "receive", receive_args("alice", "ping")).await.unwrap();

        let reply = call_local(&agent, "generate_reply", Args::new()).await.unwrap();
        let reply = Message::from_value(reply).unwrap();
        assert_eq!(reply.role, "assistant");
        assert_eq!(reply.content, "echo: ping");
        assert_eq!(reply.name.as_deref(), Some("bob"));
        assert_eq!(agent.history("alice").await.len(), 2);

        let last = call_local(&agent, "last_message", Args::new()).await.unwrap();
        assert_eq!(Message::from_value(last).unwrap(), reply);
    }

    #[tokio::test]
    async fn test_generate_reply_applies_llm_config_override() {
        let agent = echo_agent("bob");
        call_local(&agent, "receive", receive_args("alice", "abcdef")).await.unwrap();

        let mut args = Args::new();
        args.insert("llm_config".to_string(), json!({"max_length": 7}));
        let reply = call_local(&agent, "generate_reply", args).await.unwrap();
        assert_eq!(reply["content"], json!("echo: a"));
    }

    struct Mute;

    #[async_trait]
    impl ModelBackend for Mute {
        fn name(&self) -> &str {
            "mute"
        }

        async fn chat(&self, _: &[Message], _: &ChatConfig) -> AgentryResult<Vec<ChatResponse>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_empty_model_response_is_an_error() {
        let agent = ConversableAgent::new("bob", Arc::new(Mute), "", ChatConfig::default());
        let result = call_local(&agent, "generate_reply", Args::new()).await;
        assert!(matches!(result, Err(AgentryError::EmptyModelResponse(ref b)) if b == "mute"));
    }

    #[tokio::test]
    async fn test_system_message_update_and_reset() {
        let agent = echo_agent("bob");
        let mut args = Args::new();
        args.insert("content".to_string(), json!("Be verbose."));
        call_local(&agent, "update_system_message", args).await.unwrap();
        assert_eq!(
            call_local(&agent, "system_message", Args::new()).await.unwrap(),
            json!("Be verbose.")
        );

        call_local(&agent, "receive", receive_args("alice", "hi")).await.unwrap();
        call_local(&agent, "reset", Args::new()).await.unwrap();
        assert!(agent.history("alice").await.is_empty());
        assert_eq!(
            call_local(&agent, "last_message", Args::new()).await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn test_receive_without_message_is_invalid() {
        let agent = echo_agent("bob");
        let result = call_local(&agent, "receive", Args::new()).await;
        assert!(matches!(result, Err(AgentryError::InvalidArguments { .. })));
    }
}
