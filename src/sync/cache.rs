//! Process-local cache of query results, keyed by entity kind plus
//! query-or-id parameters.
//!
//! Entries are whole values: a write replaces the entry outright, never a
//! part of it. The coordinator and the list query engine go through
//! [`CacheStore`]'s operations and never hold references into it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::models::{DetailedTodo, NoteWithAuthor, RecordId, TodoListQuery, TodoPage, User};

use super::SyncError;

/// Address of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A todo list page, keyed by the serialized query parameters. Two
    /// queries with identical parameters share one entry.
    TodoList(String),
    /// A single todo.
    Todo(RecordId),
    /// The notes of one todo, newest first.
    Notes(RecordId),
    /// The user directory.
    Users,
}

impl CacheKey {
    pub fn todo_list(query: &TodoListQuery) -> Self {
        Self::TodoList(query.cache_key())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TodoList(params) => write!(f, "todos?{}", params),
            Self::Todo(id) => write!(f, "todo:{}", id),
            Self::Notes(id) => write!(f, "notes:{}", id),
            Self::Users => write!(f, "users"),
        }
    }
}

/// A cached value. One variant per entity kind the cache holds.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Page(TodoPage),
    Todo(DetailedTodo),
    Notes(Vec<NoteWithAuthor>),
    Users(Vec<User>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    stale: bool,
}

/// Opaque handle to a captured pre-mutation state for one key.
///
/// Produced by [`CacheStore::snapshot`]; spent by either
/// [`CacheStore::restore`] or [`CacheStore::discard`].
#[derive(Debug)]
pub struct SnapshotToken {
    id: u64,
    key: CacheKey,
}

impl SnapshotToken {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Captured states, by token id. `None` records that the key was absent.
    snapshots: HashMap<u64, Option<CacheEntry>>,
    next_token: u64,
}

/// The shared client cache. Cheap to clone; clones share one store.
///
/// Constructor-injected into every component that touches it, so
/// snapshot/restore behavior is testable in isolation.
#[derive(Clone, Default)]
pub struct CacheStore {
    inner: Arc<Mutex<Inner>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `key`, fresh or stale.
    pub fn read(&self, key: &CacheKey) -> Option<CacheValue> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.get(key).map(|e| e.value.clone())
    }

    /// Current value for `key`, only if not invalidated. A `None` here is
    /// the read-through engine's cue to refetch.
    pub fn read_fresh(&self, key: &CacheKey) -> Option<CacheValue> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner
            .entries
            .get(key)
            .filter(|e| !e.stale)
            .map(|e| e.value.clone())
    }

    /// Replace the entry unconditionally and mark it fresh.
    pub fn write(&self, key: CacheKey, value: CacheValue) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                stale: false,
            },
        );
    }

    /// Drop the entry entirely (used when an entity is deleted).
    pub fn remove(&self, key: &CacheKey) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.remove(key);
    }

    /// Mark the entry stale so the next read-through refetches it.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    /// Capture the current value of `key` (or its absence) for a later
    /// [`restore`](Self::restore).
    pub fn snapshot(&self, key: &CacheKey) -> SnapshotToken {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let id = inner.next_token;
        inner.next_token += 1;
        let captured = inner.entries.get(key).cloned();
        inner.snapshots.insert(id, captured);
        SnapshotToken {
            id,
            key: key.clone(),
        }
    }

    /// Set the key back to its snapshotted state, re-establishing absence
    /// if the key did not exist at capture time.
    ///
    /// A missing snapshot means the cache no longer holds the pre-mutation
    /// truth; the key is invalidated outright rather than left with stale
    /// optimistic data, and the corruption is reported to the caller.
    pub fn restore(&self, token: SnapshotToken) -> Result<(), SyncError> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        match inner.snapshots.remove(&token.id) {
            Some(Some(entry)) => {
                inner.entries.insert(token.key, entry);
                Ok(())
            }
            Some(None) => {
                inner.entries.remove(&token.key);
                Ok(())
            }
            None => {
                tracing::error!("Snapshot lost for cache key {}", token.key);
                if let Some(entry) = inner.entries.get_mut(&token.key) {
                    entry.stale = true;
                }
                Err(SyncError::StateCorruption(token.key.to_string()))
            }
        }
    }

    /// Drop a snapshot that is no longer needed (the mutation succeeded).
    pub fn discard(&self, token: SnapshotToken) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.snapshots.remove(&token.id);
    }
}
