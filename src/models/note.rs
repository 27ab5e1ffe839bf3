use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RecordId;

/// A comment attached to a todo. Immutable once created; there is no edit
/// or delete path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: RecordId,
    pub todo_id: RecordId,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A note with its author inlined, as returned by the notes endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteWithAuthor {
    #[serde(flatten)]
    pub note: Note,
    pub user: super::User,
}

/// Input for creating a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteInput {
    pub todo_id: RecordId,
    pub content: String,
}

impl CreateNoteInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.content.is_empty() {
            return Err("Content is required".to_string());
        }
        if self.content.chars().count() > 500 {
            return Err("Content is too long".to_string());
        }
        Ok(())
    }
}
