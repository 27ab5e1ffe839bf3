use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A label shared across all users' todos.
///
/// Tags are found-or-created by name (case-sensitive) on first use and are
/// deliberately never deleted, even when no todo references them: they form
/// a shared vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}
