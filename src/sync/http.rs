//! HTTP implementation of [`TodoRemote`] against the Tally API.
//!
//! Configuration is via environment variables:
//! - `TALLY_URL` - Base URL (default: `http://localhost:3000/api/v1`)

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::models::*;

use super::{RemoteError, TodoRemote};

/// Default URL for local development.
const DEFAULT_URL: &str = "http://localhost:3000/api/v1";

/// HTTP client for the Tally API.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    client: Client,
}

impl HttpRemote {
    /// Create client from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("TALLY_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(base_url)
    }

    /// Create with an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    /// Handle a response, converting HTTP errors to [`RemoteError`].
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, RemoteError> {
        let response = response.map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            match status {
                StatusCode::NOT_FOUND => Err(RemoteError::NotFound(body)),
                StatusCode::BAD_REQUEST => Err(RemoteError::Validation(body)),
                _ => Err(RemoteError::Transport(format!("{}: {}", status, body))),
            }
        }
    }
}

impl TodoRemote for HttpRemote {
    async fn create_todo(
        &self,
        owner: Uuid,
        input: CreateTodoInput,
    ) -> Result<DetailedTodo, RemoteError> {
        let response = self
            .request(reqwest::Method::POST, "/todos")
            .query(&[("userId", owner.to_string())])
            .json(&input)
            .send()
            .await;
        self.handle_response(response).await
    }

    async fn update_todo(
        &self,
        id: &RecordId,
        patch: TodoPatch,
    ) -> Result<DetailedTodo, RemoteError> {
        let response = self
            .request(reqwest::Method::PATCH, &format!("/todos/{}", id))
            .json(&patch)
            .send()
            .await;
        self.handle_response(response).await
    }

    async fn delete_todo(&self, id: &RecordId) -> Result<(), RemoteError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/todos/{}", id))
            .send()
            .await;
        // The server answers with a `{"success": true}` marker.
        let _: serde_json::Value = self.handle_response(response).await?;
        Ok(())
    }

    async fn create_note(
        &self,
        author: Uuid,
        input: CreateNoteInput,
    ) -> Result<NoteWithAuthor, RemoteError> {
        let response = self
            .request(reqwest::Method::POST, "/notes")
            .query(&[("userId", author.to_string())])
            .json(&input)
            .send()
            .await;
        self.handle_response(response).await
    }

    async fn fetch_todo(&self, id: &RecordId) -> Result<DetailedTodo, RemoteError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/todos/{}", id))
            .send()
            .await;
        self.handle_response(response).await
    }

    async fn fetch_todos(
        &self,
        query: &TodoListQuery,
    ) -> Result<(Vec<DetailedTodo>, u64), RemoteError> {
        let response = self
            .request(reqwest::Method::GET, "/todos")
            .query(&query.to_query_pairs())
            .send()
            .await;
        let page: TodoPage = self.handle_response(response).await?;
        Ok((page.todos, page.pagination.total))
    }

    async fn fetch_notes(&self, todo_id: &RecordId) -> Result<Vec<NoteWithAuthor>, RemoteError> {
        let response = self
            .request(reqwest::Method::GET, "/notes")
            .query(&[("todoId", todo_id.as_str())])
            .send()
            .await;
        self.handle_response(response).await
    }

    async fn fetch_users(&self) -> Result<Vec<User>, RemoteError> {
        let response = self.request(reqwest::Method::GET, "/users").send().await;
        self.handle_response(response).await
    }
}
