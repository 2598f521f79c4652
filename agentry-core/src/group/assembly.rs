use std::sync::Arc;
use tracing::info;

use crate::agent::{missing_member_operations, Agent, AgentKind, AgentParams, Args};
use crate::backend::{SharedModel, SharedRetrieval};
use crate::config::GroupConfig;
use crate::error::{AgentryError, AgentryResult};
use crate::factory::{AgentFactory, Placement};
use crate::handle::AgentHandle;
use crate::runtime::ActorRef;

use super::{GroupChatConstructor, GroupChatManagerKind, GroupConstructor, GroupOptions};

/// Composes agents into a group and wraps it in a manager agent.
#[derive(Clone)]
pub struct GroupAssembler {
    factory: AgentFactory,
    constructor: Arc<dyn GroupConstructor>,
    manager_kind: Arc<dyn AgentKind>,
}

impl GroupAssembler {
    pub fn new(factory: AgentFactory) -> Self {
        Self::with_defaults(factory, GroupConfig::default())
    }

    pub fn with_defaults(factory: AgentFactory, defaults: GroupConfig) -> Self {
        Self {
            factory,
            constructor: Arc::new(GroupChatConstructor::new(defaults)),
            manager_kind: Arc::new(GroupChatManagerKind),
        }
    }

    pub fn with_constructor(mut self, constructor: Arc<dyn GroupConstructor>) -> Self {
        self.constructor = constructor;
        self
    }

    pub fn with_manager_kind(mut self, manager_kind: Arc<dyn AgentKind>) -> Self {
        self.manager_kind = manager_kind;
        self
    }

    pub fn factory(&self) -> &AgentFactory {
        &self.factory
    }

    /// Builds a group of `agents` and returns the handle of its manager,
    /// placed the same way as the group.
    pub async fn assemble(
        &self,
        placement: Placement,
        group_name: &str,
        agents: Vec<AgentHandle>,
        model: SharedModel,
        retrieval: Option<SharedRetrieval>,
        extra: Args,
    ) -> AgentryResult<AgentHandle> {
        match placement {
            Placement::Local => self
                .assemble_local(group_name, agents, model, retrieval, extra)
                .map(AgentHandle::Local),
            Placement::Remote => self
                .assemble_remote(group_name, agents, model, retrieval, extra)
                .await
                .map(AgentHandle::Remote),
        }
    }

    /// In-process group. Every member must be a local agent exposing the
    /// member operations; nothing is built if one is not.
    pub fn assemble_local(
        &self,
        group_name: &str,
        agents: Vec<AgentHandle>,
        model: SharedModel,
        retrieval: Option<SharedRetrieval>,
        extra: Args,
    ) -> AgentryResult<Arc<dyn Agent>> {
        validate_local_members(&agents)?;
        let params = self.prepare(group_name, agents, model, retrieval, extra)?;
        let manager = self.factory.create_local(self.manager_kind.as_ref(), params)?;
        info!(group = group_name, placement = "local", "Assembled group");
        Ok(manager)
    }

    /// Actor-backed group. Members are taken as given, since checking a
    /// remote member's operations would need a round trip.
    pub async fn assemble_remote(
        &self,
        group_name: &str,
        agents: Vec<AgentHandle>,
        model: SharedModel,
        retrieval: Option<SharedRetrieval>,
        extra: Args,
    ) -> AgentryResult<ActorRef> {
        let params = self.prepare(group_name, agents, model, retrieval, extra)?;
        let manager = self
            .factory
            .create_remote(self.manager_kind.clone(), params)
            .await?;
        info!(
            group = group_name,
            placement = "remote",
            actor = %manager.id(),
            "Assembled group"
        );
        Ok(manager)
    }

    fn prepare(
        &self,
        group_name: &str,
        agents: Vec<AgentHandle>,
        model: SharedModel,
        retrieval: Option<SharedRetrieval>,
        extra: Args,
    ) -> AgentryResult<AgentParams> {
        let (options, manager_args) = GroupOptions::split(extra)?;
        let group = self.constructor.build(agents, options)?;
        Ok(AgentParams::new(group_name, model)
            .with_retrieval(retrieval)
            .with_group(group)
            .with_args(manager_args))
    }
}

fn validate_local_members(agents: &[AgentHandle]) -> AgentryResult<()> {
    let offending: Vec<String> = agents
        .iter()
        .enumerate()
        .filter_map(|(index, handle)| match handle {
            AgentHandle::Local(agent) => {
                let missing = missing_member_operations(agent.as_ref());
                (!missing.is_empty()).then(|| {
                    format!("[{}] '{}' lacks {}", index, agent.name(), missing.join(", "))
                })
            }
            AgentHandle::Remote(actor) => Some(format!("[{}] remote actor {}", index, actor.id())),
            AgentHandle::Named(name) => Some(format!("[{}] name reference '{}'", index, name)),
        })
        .collect();

    if offending.is_empty() {
        Ok(())
    } else {
        Err(AgentryError::InvalidAgentType(offending))
    }
}
