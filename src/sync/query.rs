//! Read-through list queries against the shared cache.

use uuid::Uuid;

use crate::models::{
    DetailedTodo, NoteWithAuthor, Pagination, RecordId, TodoListQuery, TodoPage, User,
};

use super::{CacheKey, CacheStore, CacheValue, SyncError, TodoRemote};

/// Executes filtered/sorted/paginated queries, caching results under their
/// composite key. A fresh cache entry is served without a remote call; an
/// absent or invalidated entry triggers a fetch whose result fully replaces
/// the prior contents.
pub struct ListQueryEngine<R> {
    cache: CacheStore,
    remote: R,
}

impl<R: TodoRemote> ListQueryEngine<R> {
    pub fn new(cache: CacheStore, remote: R) -> Self {
        Self { cache, remote }
    }

    /// One page of todos for `query`, with derived pagination metadata.
    pub async fn todos(&self, query: &TodoListQuery) -> Result<TodoPage, SyncError> {
        let key = CacheKey::todo_list(query);
        if let Some(CacheValue::Page(page)) = self.cache.read_fresh(&key) {
            return Ok(page);
        }

        tracing::debug!(key = %key, "cache miss, fetching todo page");
        let (todos, total) = self.remote.fetch_todos(query).await?;
        let page = TodoPage {
            todos,
            pagination: Pagination::new(total, query.page, query.limit),
        };
        self.cache.write(key, CacheValue::Page(page.clone()));
        Ok(page)
    }

    /// A single todo by id.
    pub async fn todo(&self, id: &RecordId) -> Result<DetailedTodo, SyncError> {
        let key = CacheKey::Todo(id.clone());
        if let Some(CacheValue::Todo(todo)) = self.cache.read_fresh(&key) {
            return Ok(todo);
        }

        let todo = self.remote.fetch_todo(id).await?;
        self.cache.write(key, CacheValue::Todo(todo.clone()));
        Ok(todo)
    }

    /// The notes of a todo, newest first.
    pub async fn notes(&self, todo_id: &RecordId) -> Result<Vec<NoteWithAuthor>, SyncError> {
        let key = CacheKey::Notes(todo_id.clone());
        if let Some(CacheValue::Notes(notes)) = self.cache.read_fresh(&key) {
            return Ok(notes);
        }

        let notes = self.remote.fetch_notes(todo_id).await?;
        self.cache.write(key, CacheValue::Notes(notes.clone()));
        Ok(notes)
    }

    /// The user directory (drives mention suggestions).
    pub async fn users(&self) -> Result<Vec<User>, SyncError> {
        if let Some(CacheValue::Users(users)) = self.cache.read_fresh(&CacheKey::Users) {
            return Ok(users);
        }

        let users = self.remote.fetch_users().await?;
        self.cache
            .write(CacheKey::Users, CacheValue::Users(users.clone()));
        Ok(users)
    }

    /// Convenience: the default first-page view for a user.
    pub async fn default_view(&self, user_id: Uuid) -> Result<TodoPage, SyncError> {
        self.todos(&TodoListQuery::for_user(user_id)).await
    }
}
