use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::Database;
use crate::export;
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
/// The full error is logged server-side for debugging, but clients only
/// see a generic message to avoid leaking internal details.
///
/// "Not found" errors raised inside the db layer (e.g. a note referencing
/// a missing todo) are safe to expose and map to 404.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    let msg = e.to_string();

    if msg.contains("not found") || msg.contains("Not found") {
        tracing::warn!("Lookup failed: {}", msg);
        return (StatusCode::NOT_FOUND, msg);
    }

    tracing::error!("Internal error: {}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn bad_request(msg: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg)
}

/// Identity of the acting user. Stands in for the session the auth
/// collaborator would provide.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActingUser {
    pub user_id: Uuid,
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Todos
// ============================================================

pub async fn list_todos(
    State(db): State<Database>,
    Query(query): Query<TodoListQuery>,
) -> Result<Json<TodoPage>, (StatusCode, String)> {
    let (todos, total) = db.list_todos(&query).map_err(internal_error)?;
    Ok(Json(TodoPage {
        todos,
        pagination: Pagination::new(total, query.page, query.limit),
    }))
}

pub async fn get_todo(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<DetailedTodo>, (StatusCode, String)> {
    db.get_todo(&RecordId::from(id))
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Todo not found".to_string()))
}

pub async fn create_todo(
    State(db): State<Database>,
    Query(acting): Query<ActingUser>,
    Json(input): Json<CreateTodoInput>,
) -> Result<(StatusCode, Json<DetailedTodo>), (StatusCode, String)> {
    input.validate().map_err(bad_request)?;

    db.create_todo(acting.user_id, input)
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(internal_error)
}

pub async fn update_todo(
    State(db): State<Database>,
    Path(id): Path<String>,
    Json(patch): Json<TodoPatch>,
) -> Result<Json<DetailedTodo>, (StatusCode, String)> {
    patch.validate().map_err(bad_request)?;

    db.update_todo(&RecordId::from(id), patch)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Todo not found".to_string()))
}

pub async fn delete_todo(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if db.delete_todo(&RecordId::from(id)).map_err(internal_error)? {
        Ok(Json(serde_json::json!({ "success": true })))
    } else {
        Err((StatusCode::NOT_FOUND, "Todo not found".to_string()))
    }
}

// ============================================================
// Notes
// ============================================================

/// Query parameters for listing a todo's notes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotesQuery {
    pub todo_id: String,
}

pub async fn list_notes(
    State(db): State<Database>,
    Query(query): Query<ListNotesQuery>,
) -> Result<Json<Vec<NoteWithAuthor>>, (StatusCode, String)> {
    db.get_notes(&RecordId::from(query.todo_id))
        .map(Json)
        .map_err(internal_error)
}

pub async fn create_note(
    State(db): State<Database>,
    Query(acting): Query<ActingUser>,
    Json(input): Json<CreateNoteInput>,
) -> Result<(StatusCode, Json<NoteWithAuthor>), (StatusCode, String)> {
    input.validate().map_err(bad_request)?;

    // First verify the todo exists
    db.get_todo(&input.todo_id)
        .map_err(internal_error)?
        .ok_or((StatusCode::NOT_FOUND, "Todo not found".to_string()))?;

    db.create_note(acting.user_id, input)
        .map(|n| (StatusCode::CREATED, Json(n)))
        .map_err(internal_error)
}

// ============================================================
// Users
// ============================================================

pub async fn list_users(
    State(db): State<Database>,
) -> Result<Json<Vec<User>>, (StatusCode, String)> {
    db.get_all_users().map(Json).map_err(internal_error)
}

pub async fn create_user(
    State(db): State<Database>,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), (StatusCode, String)> {
    db.create_user(input)
        .map(|u| (StatusCode::CREATED, Json(u)))
        .map_err(internal_error)
}

// ============================================================
// Export
// ============================================================

/// Query parameters for exporting a user's todos.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    /// `json` (default) or `csv`.
    pub format: Option<String>,
    pub user_id: Uuid,
}

pub async fn export_todos(
    State(db): State<Database>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let todos = db
        .get_todos_for_user(query.user_id)
        .map_err(internal_error)?;

    let date = chrono::Utc::now().format("%Y-%m-%d");

    if query.format.as_deref() == Some("csv") {
        let body = export::to_csv(&todos);
        let headers = [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"todos-{}-{}.csv\"",
                    query.user_id, date
                ),
            ),
        ];
        return Ok((headers, body));
    }

    let body = export::to_json(&todos).map_err(internal_error)?;
    let headers = [
        (header::CONTENT_TYPE, "application/json".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"todos-{}-{}.json\"",
                query.user_id, date
            ),
        ),
    ];
    Ok((headers, body))
}
