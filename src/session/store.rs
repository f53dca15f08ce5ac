// src/session/store.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::{
    models::session::{SessionKey, SessionSnapshot},
    session::{error::StoreError, timer::time_remaining},
};

/// Durable snapshot storage scoped to one (user, assignment) key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionSnapshot>, StoreError>;
    async fn save(&self, key: &SessionKey, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
    async fn clear(&self, key: &SessionKey) -> Result<(), StoreError>;
}

/// What a loaded snapshot means at the current instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restored {
    /// `remaining` is `None` for untimed tests.
    Resume {
        snapshot: SessionSnapshot,
        remaining: Option<Duration>,
    },
    Expired,
}

/// Checks a loaded snapshot's `end_time` against `now`.
pub fn reconcile(snapshot: SessionSnapshot, now: DateTime<Utc>) -> Restored {
    match snapshot.end_time {
        Some(end_time) if end_time <= now => Restored::Expired,
        Some(end_time) => Restored::Resume {
            remaining: Some(time_remaining(end_time, now)),
            snapshot,
        },
        None => Restored::Resume {
            snapshot,
            remaining: None,
        },
    }
}

/// Process-local store. Snapshots survive as long as the process does.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    snapshots: RwLock<HashMap<SessionKey, SessionSnapshot>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionSnapshot>, StoreError> {
        Ok(self.snapshots.read().await.get(key).cloned())
    }

    async fn save(&self, key: &SessionKey, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.snapshots.write().await.insert(*key, snapshot.clone());
        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.snapshots.write().await.remove(key);
        Ok(())
    }
}
