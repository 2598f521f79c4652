use std::fmt;
use std::sync::Arc;

use crate::agent::Agent;
use crate::runtime::ActorRef;

/// The one public representation of "an agent".
///
/// Every dispatch-facing operation matches on all three variants; see
/// [`crate::dispatch::Dispatcher`].
#[derive(Clone)]
pub enum AgentHandle {
    /// An agent living in this process, called directly.
    Local(Arc<dyn Agent>),
    /// A running actor reached through its mailbox.
    Remote(ActorRef),
    /// A registry name, looked up at call time.
    Named(String),
}

impl AgentHandle {
    pub fn named(name: impl Into<String>) -> Self {
        AgentHandle::Named(name.into())
    }

    pub fn variant(&self) -> &'static str {
        match self {
            AgentHandle::Local(_) => "local",
            AgentHandle::Remote(_) => "remote",
            AgentHandle::Named(_) => "named",
        }
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentHandle::Local(agent) => f
                .debug_struct("Local")
                .field("name", &agent.name())
                .field("kind", &agent.kind())
                .finish(),
            AgentHandle::Remote(actor) => f.debug_tuple("Remote").field(&actor.id()).finish(),
            AgentHandle::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl From<Arc<dyn Agent>> for AgentHandle {
    fn from(agent: Arc<dyn Agent>) -> Self {
        AgentHandle::Local(agent)
    }
}

impl From<ActorRef> for AgentHandle {
    fn from(actor: ActorRef) -> Self {
        AgentHandle::Remote(actor)
    }
}

impl From<String> for AgentHandle {
    fn from(name: String) -> Self {
        AgentHandle::Named(name)
    }
}

impl From<&str> for AgentHandle {
    fn from(name: &str) -> Self {
        AgentHandle::Named(name.to_string())
    }
}
