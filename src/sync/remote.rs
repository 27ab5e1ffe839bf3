//! The remote-collaborator seam of the sync engine.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CreateNoteInput, CreateTodoInput, DetailedTodo, NoteWithAuthor, RecordId, TodoListQuery,
    TodoPatch, User,
};

/// Failure reported by the remote collaborator.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Malformed input, rejected by the server. Surfaced inline, never
    /// retried automatically.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The referenced record does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network or server failure. Retryable by the user, not by the engine.
    #[error("remote call failed: {0}")]
    Transport(String),
}

/// The API the sync engine talks to.
///
/// Mutations return the authoritative entity (or a success marker for
/// delete). List fetches return one page plus the total matching count.
/// Calls may suspend for an unbounded but finite time; the engine applies
/// no timeout of its own and cannot cancel a submitted call.
pub trait TodoRemote {
    async fn create_todo(
        &self,
        owner: Uuid,
        input: CreateTodoInput,
    ) -> Result<DetailedTodo, RemoteError>;

    async fn update_todo(
        &self,
        id: &RecordId,
        patch: TodoPatch,
    ) -> Result<DetailedTodo, RemoteError>;

    async fn delete_todo(&self, id: &RecordId) -> Result<(), RemoteError>;

    async fn create_note(
        &self,
        author: Uuid,
        input: CreateNoteInput,
    ) -> Result<NoteWithAuthor, RemoteError>;

    async fn fetch_todo(&self, id: &RecordId) -> Result<DetailedTodo, RemoteError>;

    async fn fetch_todos(
        &self,
        query: &TodoListQuery,
    ) -> Result<(Vec<DetailedTodo>, u64), RemoteError>;

    /// Notes for a todo, newest first.
    async fn fetch_notes(&self, todo_id: &RecordId) -> Result<Vec<NoteWithAuthor>, RemoteError>;

    async fn fetch_users(&self) -> Result<Vec<User>, RemoteError>;
}
