use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AgentryError, AgentryResult};

use super::actor::ActorRef;

/// What the registry knows about a running actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorInfo {
    pub name: String,
    pub id: Uuid,
    pub kind: String,
    pub spawned_at: DateTime<Utc>,
    pub max_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct ActorEntry {
    pub actor: ActorRef,
    pub info: ActorInfo,
}

/// Process-wide name to actor table.
///
/// Names are unique: [`ActorRegistry::register_with`] checks and inserts
/// under one write lock, so two racing registrations of a name cannot both
/// succeed.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    actors: RwLock<HashMap<String, ActorEntry>>,
    lookups: AtomicU64,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the entry produced by `build` under `name`.
    ///
    /// `build` runs only when the name is free and while the lock is held, so
    /// nothing it spawns can be left running behind a `NameCollision`.
    pub async fn register_with<F>(&self, name: &str, build: F) -> AgentryResult<ActorRef>
    where
        F: FnOnce() -> AgentryResult<ActorEntry>,
    {
        let mut actors = self.actors.write().await;
        if actors.contains_key(name) {
            return Err(AgentryError::NameCollision(name.to_string()));
        }

        let entry = build()?;
        let actor = entry.actor.clone();
        actors.insert(name.to_string(), entry);
        Ok(actor)
    }

    /// Point-in-time lookup; never waits for a registration to appear.
    pub async fn lookup(&self, name: &str) -> AgentryResult<ActorRef> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.actors
            .read()
            .await
            .get(name)
            .map(|entry| entry.actor.clone())
            .ok_or_else(|| AgentryError::AgentNotFound(name.to_string()))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.actors.read().await.contains_key(name)
    }

    pub async fn remove(&self, name: &str) -> Option<ActorEntry> {
        self.actors.write().await.remove(name)
    }

    pub async fn drain(&self) -> Vec<ActorEntry> {
        self.actors.write().await.drain().map(|(_, entry)| entry).collect()
    }

    /// Registered actors, ordered by name.
    pub async fn list(&self) -> Vec<ActorInfo> {
        let mut infos: Vec<ActorInfo> = self
            .actors
            .read()
            .await
            .values()
            .map(|entry| entry.info.clone())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub async fn len(&self) -> usize {
        self.actors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.actors.read().await.is_empty()
    }

    /// Number of name lookups served so far.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}
