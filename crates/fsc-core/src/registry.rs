//! # Session Registry
//!
//! Sessions are independent: each has its own graph, allocator and workflow.
//! A `SharedSession` serializes writers and lets readers proceed in parallel.

use crate::session::{Session, SessionConfig};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A session behind a single-writer / multi-reader lock.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write()
    }

    /// Run `f` with shared access.
    pub fn with<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        f(&self.inner.read())
    }

    /// Run `f` with exclusive access.
    pub fn with_mut<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        f(&mut self.inner.write())
    }
}

/// Named sessions, one per system under analysis.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<String, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for `system_name`, creating it with `config` if absent.
    pub fn open(&self, system_name: &str, config: impl FnOnce() -> SessionConfig) -> SharedSession {
        if let Some(existing) = self.sessions.read().get(system_name) {
            return existing.clone();
        }
        self.sessions
            .write()
            .entry(system_name.to_string())
            .or_insert_with(|| {
                let mut config = config();
                config.system_name = system_name.to_string();
                SharedSession::new(Session::with_config(config))
            })
            .clone()
    }

    /// Register an existing session under its configured system name.
    /// Returns the session it replaced, if any.
    pub fn insert(&self, session: Session) -> Option<SharedSession> {
        let name = session.config().system_name.clone();
        self.sessions
            .write()
            .insert(name, SharedSession::new(session))
    }

    pub fn get(&self, system_name: &str) -> Option<SharedSession> {
        self.sessions.read().get(system_name).cloned()
    }

    pub fn close(&self, system_name: &str) -> Option<SharedSession> {
        self.sessions.write().remove(system_name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
