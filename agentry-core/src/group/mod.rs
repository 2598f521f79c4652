//! Groups of agents coordinated by a manager agent.
//!
//! How a group schedules its members is up to the [`Group`] implementation;
//! this module only builds one and hands it to a manager.

mod assembly;
mod manager;

pub use assembly::GroupAssembler;
pub use manager::{GroupChatManager, GroupChatManagerKind};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::agent::Args;
use crate::config::GroupConfig;
use crate::error::{AgentryError, AgentryResult};
use crate::handle::AgentHandle;
use crate::message::{Conversation, Message};

/// Option keys that configure the group itself rather than its manager.
pub const POLICY_KEYS: &[&str] = &["messages", "max_round", "admin_name", "func_call_filter"];

/// Which function-call messages a group lets through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FuncCallFilter {
    All(bool),
    Only(Vec<String>),
}

impl Default for FuncCallFilter {
    fn default() -> Self {
        FuncCallFilter::All(true)
    }
}

impl FuncCallFilter {
    pub fn permits(&self, function: &str) -> bool {
        match self {
            FuncCallFilter::All(allowed) => *allowed,
            FuncCallFilter::Only(names) => names.iter().any(|n| n == function),
        }
    }
}

/// Group policy peeled off an assembly option map. Unset fields fall back to
/// the group constructor's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupOptions {
    pub messages: Option<Conversation>,
    pub max_round: Option<u32>,
    pub admin_name: Option<String>,
    pub func_call_filter: Option<FuncCallFilter>,
}

impl GroupOptions {
    /// Moves every [`POLICY_KEYS`] entry out of `args` into typed options and
    /// returns the rest untouched. Each key ends up on exactly one side; a
    /// `null` policy value counts as unset.
    pub fn split(mut args: Args) -> AgentryResult<(GroupOptions, Args)> {
        let mut options = GroupOptions::default();

        if let Some(value) = take(&mut args, "messages") {
            let items = match value {
                Value::Array(items) => items,
                other => {
                    return Err(AgentryError::invalid_group_option(
                        "messages",
                        format!("expected a list of messages, got {}", other),
                    ))
                }
            };
            let messages = items
                .into_iter()
                .map(Message::from_value)
                .collect::<AgentryResult<Conversation>>()
                .map_err(|e| AgentryError::invalid_group_option("messages", e.to_string()))?;
            options.messages = Some(messages);
        }

        if let Some(value) = take(&mut args, "max_round") {
            let max_round = value
                .as_u64()
                .filter(|n| *n >= 1)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    AgentryError::invalid_group_option(
                        "max_round",
                        format!("expected a positive integer, got {}", value),
                    )
                })?;
            options.max_round = Some(max_round);
        }

        if let Some(value) = take(&mut args, "admin_name") {
            match value {
                Value::String(name) => options.admin_name = Some(name),
                other => {
                    return Err(AgentryError::invalid_group_option(
                        "admin_name",
                        format!("expected a string, got {}", other),
                    ))
                }
            }
        }

        if let Some(value) = take(&mut args, "func_call_filter") {
            let filter = serde_json::from_value(value.clone()).map_err(|_| {
                AgentryError::invalid_group_option(
                    "func_call_filter",
                    format!("expected a boolean or a list of names, got {}", value),
                )
            })?;
            options.func_call_filter = Some(filter);
        }

        Ok((options, args))
    }

    pub fn is_empty(&self) -> bool {
        self == &GroupOptions::default()
    }
}

fn take(args: &mut Args, key: &str) -> Option<Value> {
    args.remove(key).filter(|v| !v.is_null())
}

/// The group collaborator handed to a manager agent.
pub trait Group: Send + Sync + fmt::Debug {
    fn agents(&self) -> &[AgentHandle];

    fn messages(&self) -> &[Message];

    fn max_round(&self) -> u32;

    fn admin_name(&self) -> &str;

    fn func_call_filter(&self) -> &FuncCallFilter;
}

/// Builds a [`Group`] from its members and policy options.
pub trait GroupConstructor: Send + Sync {
    fn build(&self, agents: Vec<AgentHandle>, options: GroupOptions)
        -> AgentryResult<Arc<dyn Group>>;
}

/// Plain data group: members plus resolved policy.
#[derive(Debug, Clone)]
pub struct GroupChat {
    agents: Vec<AgentHandle>,
    messages: Conversation,
    max_round: u32,
    admin_name: String,
    func_call_filter: FuncCallFilter,
}

impl GroupChat {
    pub fn new(agents: Vec<AgentHandle>, options: GroupOptions, defaults: &GroupConfig) -> Self {
        Self {
            agents,
            messages: options.messages.unwrap_or_default(),
            max_round: options.max_round.unwrap_or(defaults.max_round),
            admin_name: options
                .admin_name
                .unwrap_or_else(|| defaults.admin_name.clone()),
            func_call_filter: options.func_call_filter.unwrap_or_default(),
        }
    }
}

impl Group for GroupChat {
    fn agents(&self) -> &[AgentHandle] {
        &self.agents
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn max_round(&self) -> u32 {
        self.max_round
    }

    fn admin_name(&self) -> &str {
        &self.admin_name
    }

    fn func_call_filter(&self) -> &FuncCallFilter {
        &self.func_call_filter
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupChatConstructor {
    defaults: GroupConfig,
}

impl GroupChatConstructor {
    pub fn new(defaults: GroupConfig) -> Self {
        Self { defaults }
    }
}

impl GroupConstructor for GroupChatConstructor {
    fn build(
        &self,
        agents: Vec<AgentHandle>,
        options: GroupOptions,
    ) -> AgentryResult<Arc<dyn Group>> {
        Ok(Arc::new(GroupChat::new(agents, options, &self.defaults)))
    }
}
