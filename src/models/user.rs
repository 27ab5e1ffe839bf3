use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member of the user directory.
///
/// Users are owned by the auth collaborator; this crate only reads them,
/// for mention resolution and note authorship. `username` is optional
/// because accounts predating its introduction never set one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: Option<String>,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user (seeding and tests; signup itself lives in the
/// auth collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub name: String,
    pub username: Option<String>,
    pub email: String,
}
