//! The agent capability surface and the kinds that construct agents.
//!
//! An agent exposes named operations taking a JSON argument map and
//! returning a JSON value, so the same call can be made in-process or
//! shipped through an actor mailbox unchanged.

mod conversable;

pub use conversable::{ConversableAgent, ConversableKind, DEFAULT_SYSTEM_MESSAGE};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::backend::{ChatConfig, SharedModel, SharedRetrieval};
use crate::dispatch::Dispatcher;
use crate::error::{AgentryError, AgentryResult};
use crate::group::{Group, GroupChatManagerKind};
use crate::message::Message;

/// Keyword arguments of an operation or a constructor.
pub type Args = Map<String, Value>;

/// Name accessor every agent answers, whatever its kind.
pub const GET_NAME: &str = "get_name";

/// Operations a local agent must expose to take part in a group.
pub const MEMBER_OPERATIONS: &[&str] = &["receive", "generate_reply", "reset"];

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> &str;

    /// Operations accepted by [`Agent::call`], not counting [`GET_NAME`].
    fn operations(&self) -> &[&'static str];

    fn supports(&self, operation: &str) -> bool {
        operation == GET_NAME || self.operations().contains(&operation)
    }

    async fn call(&self, operation: &str, args: Args) -> AgentryResult<Value>;
}

/// Runs `operation` on an in-process agent.
///
/// [`GET_NAME`] is answered here from the stored name. Any other operation
/// the agent does not list fails with `UnknownOperation` before the agent
/// sees it.
pub async fn call_local(agent: &dyn Agent, operation: &str, args: Args) -> AgentryResult<Value> {
    if operation == GET_NAME {
        return Ok(Value::String(agent.name().to_string()));
    }
    if !agent.supports(operation) {
        return Err(AgentryError::unknown_operation(agent.name(), operation));
    }
    debug!(agent = agent.name(), operation, "Calling local agent");
    agent.call(operation, args).await
}

/// Member operations `agent` does not expose.
pub fn missing_member_operations(agent: &dyn Agent) -> Vec<&'static str> {
    MEMBER_OPERATIONS
        .iter()
        .copied()
        .filter(|op| !agent.supports(op))
        .collect()
}

/// Everything a kind gets when asked to build an agent.
#[derive(Clone)]
pub struct AgentContext {
    pub name: String,
    pub model: SharedModel,
    pub retrieval: Option<SharedRetrieval>,
    pub group: Option<Arc<dyn Group>>,
    pub args: Args,
    pub dispatcher: Dispatcher,
    pub chat_config: ChatConfig,
}

impl AgentContext {
    pub fn construction_error(&self, kind: &str, message: impl Into<String>) -> AgentryError {
        AgentryError::AgentConstructionFailed {
            name: self.name.clone(),
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

/// A constructor for one type of agent.
pub trait AgentKind: Send + Sync {
    fn kind_name(&self) -> &str;

    fn construct(&self, ctx: AgentContext) -> AgentryResult<Arc<dyn Agent>>;
}

/// Caller-facing construction parameters, completed by the factory into an
/// [`AgentContext`].
#[derive(Clone)]
pub struct AgentParams {
    pub name: String,
    pub model: SharedModel,
    pub retrieval: Option<SharedRetrieval>,
    pub group: Option<Arc<dyn Group>>,
    pub args: Args,
}

impl AgentParams {
    pub fn new(name: impl Into<String>, model: SharedModel) -> Self {
        Self {
            name: name.into(),
            model,
            retrieval: None,
            group: None,
            args: Args::new(),
        }
    }

    pub fn with_retrieval(mut self, retrieval: Option<SharedRetrieval>) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_group(mut self, group: Arc<dyn Group>) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.args.insert(key.into(), value);
        self
    }
}

/// Looks up a built-in kind by its name.
pub fn builtin_kind(name: &str) -> Option<Arc<dyn AgentKind>> {
    match name {
        "conversable" => Some(Arc::new(ConversableKind)),
        "group_chat_manager" => Some(Arc::new(GroupChatManagerKind)),
        _ => None,
    }
}

// ============================================================================
// Argument helpers shared by the built-in kinds
// ============================================================================

pub(crate) fn required_message(args: &Args, key: &str, operation: &str) -> AgentryResult<Message> {
    let value = args
        .get(key)
        .ok_or_else(|| AgentryError::invalid_arguments(operation, format!("missing '{}'", key)))?;
    Message::from_value(value.clone())
        .map_err(|e| AgentryError::invalid_arguments(operation, e.to_string()))
}

pub(crate) fn optional_str<'a>(
    args: &'a Args,
    key: &str,
    operation: &str,
) -> AgentryResult<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(AgentryError::invalid_arguments(
            operation,
            format!("'{}' must be a string, got {}", key, other),
        )),
    }
}

pub(crate) fn required_str<'a>(args: &'a Args, key: &str, operation: &str) -> AgentryResult<&'a str> {
    optional_str(args, key, operation)?
        .ok_or_else(|| AgentryError::invalid_arguments(operation, format!("missing '{}'", key)))
}
