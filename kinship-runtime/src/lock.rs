//! Named mutex registry shared by the entities of one group.
//!
//! One async mutex exists per relation name, created on first use. The guard
//! protects the whole filter, fetch and apply sequence of a batch load, so at
//! most one loader call per (group, relation) is ever in flight. Different
//! names never contend.
//!
//! Each lock also records the outcome of the most recent batch. A caller that
//! queued while a batch failed receives that same failure instead of starting
//! a second fetch; callers arriving afterwards retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::error::EntityError;

/// Registry of per-relation locks.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<&'static str, Arc<RelationLock>>>,
}

impl LockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for a relation, creating it on first use.
    pub fn get(&self, name: &'static str) -> Arc<RelationLock> {
        self.locks
            .lock()
            .entry(name)
            .or_insert_with(|| Arc::new(RelationLock::default()))
            .clone()
    }

    /// Number of relation locks created so far.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Check if no lock has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The lock for one relation name.
#[derive(Debug, Default)]
pub struct RelationLock {
    completed: AtomicU64,
    log: AsyncMutex<BatchLog>,
}

impl RelationLock {
    /// Take a ticket before waiting: the number of batches completed so far.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.completed.load(Ordering::Acquire))
    }

    /// Wait for exclusive access to this relation.
    pub async fn acquire(&self) -> BatchGuard<'_> {
        BatchGuard {
            lock: self,
            log: self.log.lock().await,
        }
    }

    /// Number of batches that reached the loader.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }
}

/// Position in a relation's batch history taken before waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
struct BatchLog {
    last_failure: Option<(u64, EntityError)>,
}

/// Exclusive access to one relation of one group.
pub struct BatchGuard<'a> {
    lock: &'a RelationLock,
    log: MutexGuard<'a, BatchLog>,
}

impl BatchGuard<'_> {
    /// The failure of a batch that completed after `ticket` was taken, if any.
    pub fn failure_since(&self, ticket: Ticket) -> Option<&EntityError> {
        match &self.log.last_failure {
            Some((batch, err)) if *batch > ticket.0 => Some(err),
            _ => None,
        }
    }

    /// Record a successful batch.
    pub fn succeeded(&mut self) {
        self.lock.completed.fetch_add(1, Ordering::AcqRel);
        self.log.last_failure = None;
    }

    /// Record a failed batch.
    pub fn failed(&mut self, err: EntityError) {
        let batch = self.lock.completed.fetch_add(1, Ordering::AcqRel) + 1;
        self.log.last_failure = Some((batch, err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_registry_reuses_locks() {
        let registry = LockRegistry::new();
        let a = registry.get("author");
        let b = registry.get("author");
        let c = registry.get("comments");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_visible_to_earlier_tickets_only() {
        let lock = RelationLock::default();
        let before = lock.ticket();

        {
            let mut guard = lock.acquire().await;
            guard.failed(EntityError::new(ErrorCode::LoaderFailed, "boom"));
        }

        let after = lock.ticket();
        let guard = lock.acquire().await;
        assert_eq!(guard.failure_since(before).map(|e| e.message.as_str()), Some("boom"));
        assert!(guard.failure_since(after).is_none());
    }

    #[tokio::test]
    async fn test_success_clears_failure() {
        let lock = RelationLock::default();
        let before = lock.ticket();
        {
            let mut guard = lock.acquire().await;
            guard.failed(EntityError::new(ErrorCode::LoaderFailed, "boom"));
        }
        {
            let mut guard = lock.acquire().await;
            guard.succeeded();
        }
        let guard = lock.acquire().await;
        assert!(guard.failure_since(before).is_none());
        assert_eq!(lock.completed(), 2);
    }
}
