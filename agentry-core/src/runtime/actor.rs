//! Mailbox-backed actors.
//!
//! An actor owns one agent and serves calls from a bounded mailbox. Each call
//! runs on its own task once a concurrency permit is free; calls beyond the
//! budget wait in the mailbox in arrival order. Stopping is signalled out of
//! band: running calls finish, and calls still waiting fail as unreachable.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::agent::{call_local, Agent, Args};
use crate::config::RuntimeConfig;
use crate::error::{AgentryError, AgentryResult};

struct ActorCall {
    operation: String,
    args: Args,
    reply: oneshot::Sender<AgentryResult<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorOptions {
    pub max_concurrency: usize,
    pub mailbox_capacity: usize,
}

impl Default for ActorOptions {
    fn default() -> Self {
        Self::from(&RuntimeConfig::default())
    }
}

impl From<&RuntimeConfig> for ActorOptions {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1),
            mailbox_capacity: config.mailbox_capacity.max(1),
        }
    }
}

/// Handle to a running actor. Cheap to clone; all clones feed the same mailbox.
#[derive(Clone)]
pub struct ActorRef {
    id: Uuid,
    tx: mpsc::Sender<ActorCall>,
    stop: Arc<watch::Sender<bool>>,
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.id)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl ActorRef {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// True once the actor loop has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn label(&self) -> String {
        format!("actor {}", self.id)
    }

    /// Sends a call and waits for its reply.
    pub async fn call(&self, operation: &str, args: Args) -> AgentryResult<Value> {
        let (reply, rx) = oneshot::channel();
        let msg = ActorCall {
            operation: operation.to_string(),
            args,
            reply,
        };
        self.tx
            .send(msg)
            .await
            .map_err(|_| AgentryError::unreachable(self.label(), "mailbox closed"))?;
        rx.await
            .map_err(|_| AgentryError::unreachable(self.label(), "reply dropped"))?
    }

    /// Like [`ActorRef::call`], failing as unreachable once `timeout` elapses.
    /// The operation keeps running on the actor after the caller gives up.
    pub async fn call_timeout(
        &self,
        operation: &str,
        args: Args,
        timeout: Duration,
    ) -> AgentryResult<Value> {
        tokio::time::timeout(timeout, self.call(operation, args))
            .await
            .map_err(|_| {
                AgentryError::unreachable(self.label(), format!("no reply within {:?}", timeout))
            })?
    }

    pub(crate) fn stop(&self) {
        if self.stop.send_replace(true) {
            debug!(actor = %self.id, "Actor already stopped");
        }
    }
}

/// Starts the loop for `agent` on the current tokio runtime. The loop outlives
/// the caller and ends when stopped or when every [`ActorRef`] is dropped.
pub(crate) fn spawn_actor(agent: Arc<dyn Agent>, options: ActorOptions) -> ActorRef {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(options.mailbox_capacity);
    let (stop, stopped) = watch::channel(false);
    tokio::spawn(run(id, agent, rx, stopped, options.max_concurrency));
    ActorRef {
        id,
        tx,
        stop: Arc::new(stop),
    }
}

async fn run(
    id: Uuid,
    agent: Arc<dyn Agent>,
    mut inbox: mpsc::Receiver<ActorCall>,
    mut stopped: watch::Receiver<bool>,
    max_concurrency: usize,
) {
    let permits = Arc::new(Semaphore::new(max_concurrency));

    // The stop flag only ever flips to true, so any change means stop.
    loop {
        let call = tokio::select! {
            biased;
            _ = stopped.changed() => break,
            call = inbox.recv() => match call {
                Some(call) => call,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = stopped.changed() => {
                refuse(id, call);
                break;
            }
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let agent = agent.clone();
        tokio::spawn(async move {
            let ActorCall {
                operation,
                args,
                reply,
            } = call;
            let result = call_local(agent.as_ref(), &operation, args).await;
            if reply.send(result).is_err() {
                warn!(
                    actor = %id,
                    agent = agent.name(),
                    operation = %operation,
                    "Caller went away before the reply was ready"
                );
            }
            drop(permit);
        });
    }

    inbox.close();
    let mut refused = 0usize;
    while let Ok(call) = inbox.try_recv() {
        refuse(id, call);
        refused += 1;
    }

    debug!(actor = %id, agent = agent.name(), refused, "Actor loop finished");
}

fn refuse(id: Uuid, call: ActorCall) {
    let error = AgentryError::unreachable(format!("actor {}", id), "actor stopped");
    let _ = call.reply.send(Err(error));
}
