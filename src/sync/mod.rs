//! The optimistic client-side synchronization engine.
//!
//! A mutation is applied tentatively to the [`cache`](CacheStore) before
//! the server confirms it, then reconciled with the authoritative response
//! or rolled back to a snapshot on failure. The
//! [`ListQueryEngine`] reads the same cache read-through, so an in-flight
//! list view reflects tentative mutations immediately.
//!
//! The engine assumes one logical thread of control: suspension happens
//! only at remote-call boundaries, so cache accesses never race at the
//! memory level. Logical races between overlapping mutations are handled by
//! the snapshot/restore discipline, not locks.

mod cache;
mod coordinator;
mod http;
mod query;
mod remote;

pub use cache::{CacheKey, CacheStore, CacheValue, SnapshotToken};
pub use coordinator::{MutationCoordinator, MutationPhase};
pub use http::HttpRemote;
pub use query::ListQueryEngine;
pub use remote::{RemoteError, TodoRemote};

use thiserror::Error;

/// Failure surfaced by the sync engine. Whatever the kind, the cache is
/// left in the exact pre-mutation state (or force-invalidated when even
/// that is impossible).
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Rejected before anything was written; surfaced to the user inline.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The referenced record is gone; the mutation was abandoned and the
    /// cache rolled back.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote call failed; the tentative write was rolled back and the
    /// user may retry.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// A rollback could not find its snapshot. The affected keys have been
    /// force-invalidated.
    #[error("cache state corrupted for key {0}")]
    StateCorruption(String),
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Validation(msg) => Self::Validation(msg),
            RemoteError::NotFound(msg) => Self::NotFound(msg),
            RemoteError::Transport(msg) => Self::Remote(msg),
        }
    }
}
