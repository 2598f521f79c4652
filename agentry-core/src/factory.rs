use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::agent::{Agent, AgentContext, AgentKind, AgentParams};
use crate::backend::ChatConfig;
use crate::config::AgentryConfig;
use crate::dispatch::Dispatcher;
use crate::error::{AgentryError, AgentryResult};
use crate::handle::AgentHandle;
use crate::runtime::{ActorRef, ActorRuntime};

/// Where a new agent should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    #[default]
    Local,
    Remote,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Local => write!(f, "local"),
            Placement::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for Placement {
    type Err = AgentryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Placement::Local),
            "remote" | "actor" => Ok(Placement::Remote),
            other => Err(AgentryError::InvalidConfigValue {
                key: "placement".to_string(),
                message: format!("Unknown placement '{}', expected local or remote", other),
            }),
        }
    }
}

/// Builds agents in-process or as registered actors.
#[derive(Clone)]
pub struct AgentFactory {
    runtime: ActorRuntime,
    dispatcher: Dispatcher,
    chat_config: ChatConfig,
}

impl AgentFactory {
    pub fn new(runtime: ActorRuntime) -> Self {
        let dispatcher = Dispatcher::new(runtime.registry());
        Self {
            runtime,
            dispatcher,
            chat_config: ChatConfig::default(),
        }
    }

    pub fn from_config(config: &AgentryConfig) -> Self {
        let runtime = ActorRuntime::from_config(&config.runtime);
        let dispatcher = Dispatcher::from_config(runtime.registry(), &config.runtime);
        Self {
            runtime,
            dispatcher,
            chat_config: ChatConfig::from(&config.model),
        }
    }

    pub fn with_chat_config(mut self, chat_config: ChatConfig) -> Self {
        self.chat_config = chat_config;
        self
    }

    pub fn runtime(&self) -> &ActorRuntime {
        &self.runtime
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn context(&self, params: AgentParams) -> AgentContext {
        AgentContext {
            name: params.name,
            model: params.model,
            retrieval: params.retrieval,
            group: params.group,
            args: params.args,
            dispatcher: self.dispatcher.clone(),
            chat_config: self.chat_config.clone(),
        }
    }

    /// Instantiates an agent in this process. The registry is not consulted.
    pub fn create_local(
        &self,
        kind: &dyn AgentKind,
        params: AgentParams,
    ) -> AgentryResult<Arc<dyn Agent>> {
        debug!(name = %params.name, kind = kind.kind_name(), "Creating local agent");
        construct(kind, self.context(params))
    }

    /// Spawns an actor for a new agent and registers it under its name.
    ///
    /// Fails with `NameCollision` if the name is taken; the agent is not built
    /// in that case.
    pub async fn create_remote(
        &self,
        kind: Arc<dyn AgentKind>,
        params: AgentParams,
    ) -> AgentryResult<ActorRef> {
        let name = params.name.clone();
        let ctx = self.context(params);
        self.runtime
            .spawn(&name, kind.kind_name(), || construct(kind.as_ref(), ctx))
            .await
    }

    pub async fn create(
        &self,
        placement: Placement,
        kind: Arc<dyn AgentKind>,
        params: AgentParams,
    ) -> AgentryResult<AgentHandle> {
        match placement {
            Placement::Local => self.create_local(kind.as_ref(), params).map(AgentHandle::Local),
            Placement::Remote => self.create_remote(kind, params).await.map(AgentHandle::Remote),
        }
    }
}

fn construct(kind: &dyn AgentKind, ctx: AgentContext) -> AgentryResult<Arc<dyn Agent>> {
    let name = ctx.name.clone();
    kind.construct(ctx).map_err(|e| match e {
        AgentryError::AgentConstructionFailed { .. } => e,
        other => AgentryError::AgentConstructionFailed {
            name,
            kind: kind.kind_name().to_string(),
            message: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Args, ConversableKind};
    use crate::backend::EchoBackend;
    use serde_json::json;

    fn params(name: &str) -> AgentParams {
        AgentParams::new(name, Arc::new(EchoBackend::new("echo")))
    }

    #[test]
    fn test_placement_parsing() {
        assert_eq!("local".parse::<Placement>().unwrap(), Placement::Local);
        assert_eq!("Remote".parse::<Placement>().unwrap(), Placement::Remote);
        assert!("cloud".parse::<Placement>().is_err());
        assert_eq!(Placement::Remote.to_string(), "remote");
    }

    #[tokio::test]
    async fn test_create_local_does_not_register() {
        let factory = AgentFactory::new(ActorRuntime::default());
        let agent = factory.create_local(&ConversableKind, params("solo")).unwrap();

        assert_eq!(agent.name(), "solo");
        assert!(factory.runtime().registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_construction_errors_are_wrapped() {
        let factory = AgentFactory::new(ActorRuntime::default());
        let bad = params("solo").with_arg("system_message", json!(42));

        let result = factory.create_remote(Arc::new(ConversableKind), bad).await;
        assert!(matches!(
            result,
            Err(AgentryError::AgentConstructionFailed { ref kind, .. }) if kind == "conversable"
        ));
        assert!(factory.runtime().registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_create_by_placement() {
        let factory = AgentFactory::new(ActorRuntime::default());
        let kind: Arc<dyn AgentKind> = Arc::new(ConversableKind);

        let local = factory
            .create(Placement::Local, kind.clone(), params("here"))
            .await
            .unwrap();
        let remote = factory
            .create(Placement::Remote, kind, params("there"))
            .await
            .unwrap();

        assert_eq!(local.variant(), "local");
        assert_eq!(remote.variant(), "remote");
        let dispatcher = factory.dispatcher();
        assert_eq!(dispatcher.resolve_name(&remote).await.unwrap(), "there");
        assert_eq!(
            dispatcher.invoke(&local, "system_message", Args::new()).await.unwrap(),
            json!(crate::agent::DEFAULT_SYSTEM_MESSAGE)
        );
    }
}
