use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking a client-fabricated placeholder id.
const TEMP_PREFIX: &str = "temp-";

/// Identifier for client-visible records (todos and notes).
///
/// Server-assigned ids are plain UUIDs. The sync engine fabricates
/// placeholder ids with a `temp-` prefix for optimistically created records;
/// these are replaced by the real id once the server responds, and callers
/// must not assume a temporary id stays valid after that point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh server-side id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Fabricate a client-side placeholder id.
    pub fn temporary() -> Self {
        Self(format!("{}{}", TEMP_PREFIX, Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
