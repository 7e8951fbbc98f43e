//! Log Registry
//!
//! Server-wide map of open logs, reference counted by session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{LogError, Result};
use crate::log::{LogCore, LogFactory};

/// Identifier of one accepted connection
pub type SessionId = u64;

struct Entry {
    log: Arc<dyn LogCore>,
    sessions: HashSet<SessionId>,
}

/// Logs resident on the server, keyed by path
///
/// ## Concurrency:
/// - One lock covers creation, registration and eviction, so a session
///   registering a path can never observe a log that is mid-eviction
/// - Operations on a log run outside the lock on a cloned handle
pub struct LogRegistry {
    factory: Arc<dyn LogFactory>,
    logs: Mutex<HashMap<String, Entry>>,
}

impl LogRegistry {
    pub fn new(factory: Arc<dyn LogFactory>) -> Self {
        Self {
            factory,
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Add `session` to the reference set of `path`, opening the log if absent
    pub fn register(&self, path: &str, args: &[String], session: SessionId) -> Result<()> {
        let mut logs = self.logs.lock();

        if let Some(entry) = logs.get_mut(path) {
            entry.sessions.insert(session);
            return Ok(());
        }

        let log = self.factory.open(path, args)?;
        tracing::info!("Opened log {} for session {}", path, session);
        logs.insert(
            path.to_string(),
            Entry {
                log,
                sessions: HashSet::from([session]),
            },
        );
        Ok(())
    }

    /// Handle for a resident log
    pub fn get(&self, path: &str) -> Option<Arc<dyn LogCore>> {
        self.logs.lock().get(path).map(|entry| Arc::clone(&entry.log))
    }

    /// Handle for a resident log, only if `session` is in its reference set
    ///
    /// A session that registered an earlier instance of `path` (since
    /// deleted) gets nothing, even if the path was re-created.
    pub fn get_for(&self, path: &str, session: SessionId) -> Option<Arc<dyn LogCore>> {
        self.logs
            .lock()
            .get(path)
            .filter(|entry| entry.sessions.contains(&session))
            .map(|entry| Arc::clone(&entry.log))
    }

    /// Delete a log's storage and evict it regardless of other references
    ///
    /// `session` must be in the log's reference set.
    pub fn delete(&self, path: &str, session: SessionId) -> Result<()> {
        let log = self
            .get_for(path, session)
            .ok_or_else(|| LogError::LogUnavailable(path.to_string()))?;

        log.delete()?;

        let mut logs = self.logs.lock();
        // Only evict the instance we deleted, not one re-created meanwhile
        if logs.get(path).is_some_and(|entry| Arc::ptr_eq(&entry.log, &log)) {
            logs.remove(path);
            tracing::info!("Deleted log {}", path);
        }
        Ok(())
    }

    /// Drop `session` from the reference sets of `paths`
    ///
    /// Logs left without references are stopped and evicted. Returns the
    /// evicted paths.
    pub fn release<'a, I>(&self, session: SessionId, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut logs = self.logs.lock();
        let mut evicted = Vec::new();

        for path in paths {
            let Some(entry) = logs.get_mut(path) else {
                continue;
            };
            // The path may have been deleted and re-created by others
            if !entry.sessions.remove(&session) || !entry.sessions.is_empty() {
                continue;
            }

            if let Some(entry) = logs.remove(path) {
                if let Err(e) = entry.log.stop() {
                    tracing::warn!("Failed to stop evicted log {}: {}", path, e);
                }
                tracing::info!("Evicted log {} (last session {} gone)", path, session);
                evicted.push(path.clone());
            }
        }

        evicted
    }

    /// Whether a log is resident
    pub fn contains(&self, path: &str) -> bool {
        self.logs.lock().contains_key(path)
    }

    /// Number of sessions referencing `path`
    pub fn references(&self, path: &str) -> usize {
        self.logs
            .lock()
            .get(path)
            .map(|entry| entry.sessions.len())
            .unwrap_or(0)
    }

    /// Number of resident logs
    pub fn len(&self) -> usize {
        self.logs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
