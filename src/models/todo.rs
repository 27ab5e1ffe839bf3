use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Note, RecordId, Tag, User};

/// A todo record. Every persisted todo has exactly one owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: RecordId,
    pub title: String,
    /// Free text; may contain `@name` mention tokens.
    pub description: String,
    pub priority: Priority,
    /// The owning user.
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A todo with its relations inlined: tags, notes, and the users mentioned
/// in its description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailedTodo {
    #[serde(flatten)]
    pub todo: Todo,
    pub tags: Vec<Tag>,
    pub notes: Vec<Note>,
    pub mentions: Vec<User>,
}

/// Urgency of a todo.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Input for creating a todo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodoInput {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
}

impl CreateTodoInput {
    pub fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)?;
        if let Some(ref description) = self.description {
            validate_description(description)?;
        }
        Ok(())
    }
}

/// Partial update for a todo.
///
/// Fields are enumerated explicitly rather than accepting an open-ended
/// payload, so an update for one mutation kind cannot leak fields into
/// another. Absent fields leave the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
}

impl TodoPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref title) = self.title {
            validate_title(title)?;
        }
        if let Some(ref description) = self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    /// Merge the scalar fields into a todo. Tags are relational and are
    /// handled by the caller.
    pub fn apply(&self, todo: &mut Todo) {
        if let Some(ref title) = self.title {
            todo.title = title.clone();
        }
        if let Some(ref description) = self.description {
            todo.description = description.clone();
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
    }
}

fn validate_title(title: &str) -> Result<(), String> {
    if title.is_empty() {
        return Err("Title is required".to_string());
    }
    if title.chars().count() > 100 {
        return Err("Title is too long".to_string());
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > 500 {
        return Err("Description is too long".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_round_trips_through_str() {
        for p in [Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(Priority::from_str(p.as_str()), Some(p));
        }
        assert_eq!(Priority::from_str("URGENT"), None);
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut todo = Todo {
            id: RecordId::generate(),
            title: "Original".to_string(),
            description: "desc".to_string(),
            priority: Priority::Low,
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let patch = TodoPatch {
            title: Some("Edited".to_string()),
            ..Default::default()
        };
        patch.apply(&mut todo);

        assert_eq!(todo.title, "Edited");
        assert_eq!(todo.description, "desc");
        assert_eq!(todo.priority, Priority::Low);
    }

    #[test]
    fn create_input_enforces_limits() {
        let input = CreateTodoInput {
            title: String::new(),
            description: None,
            priority: None,
            tags: None,
        };
        assert!(input.validate().is_err());

        let input = CreateTodoInput {
            title: "x".repeat(101),
            description: None,
            priority: None,
            tags: None,
        };
        assert!(input.validate().is_err());
    }
}
