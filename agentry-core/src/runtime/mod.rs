mod actor;
mod registry;

pub use actor::{ActorOptions, ActorRef};
pub use registry::{ActorEntry, ActorInfo, ActorRegistry};

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::agent::Agent;
use crate::config::RuntimeConfig;
use crate::error::{AgentryError, AgentryResult};

/// Hosts actors and owns the name registry they are published in.
#[derive(Clone)]
pub struct ActorRuntime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    registry: Arc<ActorRegistry>,
    options: ActorOptions,
    shut_down: AtomicBool,
}

impl Default for ActorRuntime {
    fn default() -> Self {
        Self::new(ActorOptions::default())
    }
}

impl ActorRuntime {
    pub fn new(options: ActorOptions) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                registry: Arc::new(ActorRegistry::new()),
                options,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(ActorOptions::from(config))
    }

    pub fn registry(&self) -> Arc<ActorRegistry> {
        self.inner.registry.clone()
    }

    pub fn options(&self) -> ActorOptions {
        self.inner.options
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Builds an agent and starts it as an actor registered under `name`.
    ///
    /// `build` is only invoked once the name is known to be free. Fails with
    /// `NameCollision` when it is not, leaving the existing actor untouched.
    pub async fn spawn<F>(&self, name: &str, kind: &str, build: F) -> AgentryResult<ActorRef>
    where
        F: FnOnce() -> AgentryResult<Arc<dyn Agent>>,
    {
        if self.is_shut_down() {
            return Err(AgentryError::RuntimeShutdown);
        }

        let options = self.inner.options;
        let actor = self
            .inner
            .registry
            .register_with(name, || {
                let agent = build()?;
                let actor = actor::spawn_actor(agent, options);
                Ok(ActorEntry {
                    info: ActorInfo {
                        name: name.to_string(),
                        id: actor.id(),
                        kind: kind.to_string(),
                        spawned_at: Utc::now(),
                        max_concurrency: options.max_concurrency,
                    },
                    actor,
                })
            })
            .await?;

        info!(
            name,
            kind,
            actor = %actor.id(),
            max_concurrency = options.max_concurrency,
            "Spawned actor"
        );
        Ok(actor)
    }

    pub async fn get_actor(&self, name: &str) -> AgentryResult<ActorRef> {
        self.inner.registry.lookup(name).await
    }

    /// Stops the actor registered under `name` and frees the name. Calls
    /// already running finish; calls still waiting in its mailbox, and any
    /// sent later, fail as unreachable.
    pub async fn kill(&self, name: &str) -> AgentryResult<()> {
        let entry = self
            .inner
            .registry
            .remove(name)
            .await
            .ok_or_else(|| AgentryError::AgentNotFound(name.to_string()))?;
        entry.actor.stop();
        info!(name, actor = %entry.info.id, "Killed actor");
        Ok(())
    }

    pub async fn list_actors(&self) -> Vec<ActorInfo> {
        self.inner.registry.list().await
    }

    /// Stops every actor and refuses further spawns.
    pub async fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        let entries = self.inner.registry.drain().await;
        let count = entries.len();
        for entry in entries {
            entry.actor.stop();
        }
        info!(count, "Actor runtime shut down");
    }
}
