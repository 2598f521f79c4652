//! Location-transparent dispatch.
//!
//! Callers hand over an [`AgentHandle`] and get the same result shape back
//! whether the agent runs in-process, behind an actor, or under a registry
//! name.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::agent::{call_local, Args, GET_NAME};
use crate::config::RuntimeConfig;
use crate::error::{AgentryError, AgentryResult};
use crate::handle::AgentHandle;
use crate::runtime::{ActorRef, ActorRegistry};

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ActorRegistry>,
    call_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ActorRegistry>) -> Self {
        Self {
            registry,
            call_timeout: None,
        }
    }

    pub fn from_config(registry: Arc<ActorRegistry>, config: &RuntimeConfig) -> Self {
        Self::new(registry).with_call_timeout(config.call_timeout())
    }

    /// Bounds how long a remote call may take before it counts as unreachable.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub fn registry(&self) -> &Arc<ActorRegistry> {
        &self.registry
    }

    /// Canonical name of the agent behind `handle`.
    ///
    /// Local agents answer from their stored name without touching the
    /// registry; a name reference is already the name; a remote handle is asked
    /// through its mailbox.
    pub async fn resolve_name(&self, handle: &AgentHandle) -> AgentryResult<String> {
        match handle {
            AgentHandle::Local(agent) => Ok(agent.name().to_string()),
            AgentHandle::Named(name) => Ok(name.clone()),
            AgentHandle::Remote(actor) => {
                match self.call_remote(actor, GET_NAME, Args::new()).await? {
                    Value::String(name) if !name.is_empty() => Ok(name),
                    other => Err(AgentryError::unreachable(
                        format!("actor {}", actor.id()),
                        format!("name accessor returned {}", other),
                    )),
                }
            }
        }
    }

    /// Runs `operation` on the agent behind `handle` and waits for the result.
    pub async fn invoke(
        &self,
        handle: &AgentHandle,
        operation: &str,
        args: Args,
    ) -> AgentryResult<Value> {
        match handle {
            AgentHandle::Local(agent) => call_local(agent.as_ref(), operation, args).await,
            AgentHandle::Named(name) => {
                let actor = self.registry.lookup(name).await?;
                debug!(name = %name, operation, "Dispatching by name");
                self.call_remote(&actor, operation, args).await
            }
            AgentHandle::Remote(actor) => {
                debug!(actor = %actor.id(), operation, "Dispatching to actor");
                self.call_remote(actor, operation, args).await
            }
        }
    }

    async fn call_remote(
        &self,
        actor: &ActorRef,
        operation: &str,
        args: Args,
    ) -> AgentryResult<Value> {
        match self.call_timeout {
            Some(timeout) => actor.call_timeout(operation, args, timeout).await,
            None => actor.call(operation, args).await,
        }
    }
}
