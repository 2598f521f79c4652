use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::agent::{optional_str, required_message, required_str, Agent, AgentContext, AgentKind, Args};
use crate::backend::{SharedModel, SharedRetrieval};
use crate::dispatch::Dispatcher;
use crate::error::{AgentryError, AgentryResult};
use crate::handle::AgentHandle;
use crate::message::{modify_metadata, Conversation, Message};

use super::Group;

const KIND: &str = "group_chat_manager";

const OPERATIONS: &[&str] = &[
    "describe",
    "agent_names",
    "receive",
    "messages",
    "broadcast",
    "check_function_call",
    "reset",
];

/// Manager agent fronting a [`Group`]. It is dispatched like any other agent.
pub struct GroupChatManager {
    name: String,
    group: Arc<dyn Group>,
    dispatcher: Dispatcher,
    model: SharedModel,
    retrieval: Option<SharedRetrieval>,
    args: Args,
    transcript: RwLock<Conversation>,
}

impl GroupChatManager {
    pub fn group(&self) -> &Arc<dyn Group> {
        &self.group
    }

    /// Constructor arguments left over after the group policy was taken out.
    pub fn args(&self) -> &Args {
        &self.args
    }

    async fn agent_names(&self) -> AgentryResult<Vec<String>> {
        let mut names = Vec::with_capacity(self.group.agents().len());
        for member in self.group.agents() {
            names.push(self.dispatcher.resolve_name(member).await?);
        }
        Ok(names)
    }

    async fn receive(&self, args: &Args) -> AgentryResult<Value> {
        let message = required_message(args, "message", "receive")?;
        let message = match optional_str(args, "sender", "receive")? {
            Some(sender) => modify_metadata(&message, [("sender", json!(sender))]),
            None => message,
        };
        let mut transcript = self.transcript.write().await;
        transcript.push(message);
        Ok(json!(transcript.len()))
    }

    /// Forwards `message` to every member except its sender. The transcript
    /// entry lists the members actually reached, and is written even when a
    /// delivery fails part way through; that failure is then returned.
    async fn broadcast(&self, args: &Args) -> AgentryResult<Value> {
        let message = required_message(args, "message", "broadcast")?;
        let sender = required_str(args, "sender", "broadcast")?;

        let mut recipients = Vec::new();
        let mut failure = None;
        for member in self.group.agents() {
            match self.deliver(member, &message, sender).await {
                Ok(Some(name)) => recipients.push(name),
                Ok(None) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.transcript.write().await.push(modify_metadata(
            &message,
            [("sender", json!(sender)), ("recipients", json!(recipients))],
        ));

        if let Some(e) = failure {
            warn!(
                group = %self.name,
                sender,
                delivered = recipients.len(),
                error = %e,
                "Broadcast stopped at a failing member"
            );
            return Err(e);
        }

        debug!(
            group = %self.name,
            sender,
            recipients = recipients.len(),
            "Broadcast message"
        );
        Ok(json!(recipients))
    }

    /// Delivers to one member; `None` when the member is the sender.
    async fn deliver(
        &self,
        member: &AgentHandle,
        message: &Message,
        sender: &str,
    ) -> AgentryResult<Option<String>> {
        let name = self.dispatcher.resolve_name(member).await?;
        if name == sender {
            return Ok(None);
        }
        let mut call = Args::new();
        call.insert("message".to_string(), message.to_value());
        call.insert("sender".to_string(), json!(sender));
        self.dispatcher.invoke(member, "receive", call).await?;
        Ok(Some(name))
    }

    fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "kind": KIND,
            "members": self.group.agents().len(),
            "max_round": self.group.max_round(),
            "admin_name": self.group.admin_name(),
            "func_call_filter": self.group.func_call_filter(),
            "model": self.model.name(),
            "retrieval": self.retrieval.as_ref().map(|r| r.name().to_string()),
            "args": self.args,
        })
    }
}

#[async_trait]
impl Agent for GroupChatManager {
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
            "describe" => Ok(self.describe()),
            "agent_names" => Ok(json!(self.agent_names().await?)),
            "receive" => self.receive(&args).await,
            "messages" => {
                let transcript = self.transcript.read().await;
                Ok(Value::Array(transcript.iter().map(Message::to_value).collect()))
            }
            "broadcast" => self.broadcast(&args).await,
            "check_function_call" => {
                let function = required_str(&args, "name", operation)?;
                Ok(json!(self.group.func_call_filter().permits(function)))
            }
            "reset" => {
                *self.transcript.write().await = self.group.messages().to_vec();
                Ok(Value::Null)
            }
            other => Err(AgentryError::unknown_operation(&self.name, other)),
        }
    }
}

/// Builds [`GroupChatManager`]s. The context must carry a group.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupChatManagerKind;

impl AgentKind for GroupChatManagerKind {
    fn kind_name(&self) -> &str {
        KIND
    }

    fn construct(&self, ctx: AgentContext) -> AgentryResult<Arc<dyn Agent>> {
        let group = ctx
            .group
            .clone()
            .ok_or_else(|| ctx.construction_error(KIND, "a group chat manager needs a group"))?;
        let transcript = RwLock::new(group.messages().to_vec());
        Ok(Arc::new(GroupChatManager {
            name: ctx.name,
            group,
            dispatcher: ctx.dispatcher,
            model: ctx.model,
            retrieval: ctx.retrieval,
            args: ctx.args,
            transcript,
        }))
    }
}
