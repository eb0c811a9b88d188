//! The session registry: every live session, by key.
//!
//! # Concurrency note
//!
//! Sessions are inserted by the accept loop and removed by their own
//! close path, from arbitrary runtime threads, so the map is a sharded
//! `DashMap` rather than a `HashMap` behind one lock. Lookups never block
//! each other unless they hit the same shard.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::{Session, SessionId};

/// Concurrent map from session key to session, plus the id counter.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    /// Creates an empty registry whose first id is `1`.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates the next session id. Ids are never reused.
    pub fn next_id(&self) -> SessionId {
        SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Inserts or replaces the session stored under `key`.
    ///
    /// Returns the session previously stored there, if any.
    pub fn set(&self, key: impl Into<String>, session: Arc<Session>) -> Option<Arc<Session>> {
        self.sessions.insert(key.into(), session)
    }

    /// Looks up a session.
    pub fn get(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes and returns the session stored under `key`.
    pub fn remove(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.remove(key).map(|(_, session)| session)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of the registered keys.
    pub fn keys(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of the registered sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
