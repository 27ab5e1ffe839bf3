use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DetailedTodo, Priority};

/// Filter/sort/page parameters for a todo list query.
///
/// Two queries with identical parameters address the same cache entry, so
/// the parameter set doubles as the list's cache key (see
/// [`TodoListQuery::cache_key`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodoListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Exact tag name to filter by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Email of a mentioned user to filter by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentioned_user: Option<String>,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
    /// The owning user whose todos are listed.
    pub user_id: Uuid,
    /// Case-insensitive substring match against title, description, or any
    /// tag name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl TodoListQuery {
    /// Default view for a user: newest first, first page of ten.
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            tag: None,
            priority: None,
            mentioned_user: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            user_id,
            search: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Canonical serialization of the parameters. Every field appears in a
    /// fixed order so equal queries always produce equal keys.
    pub fn cache_key(&self) -> String {
        format!(
            "user={}&page={}&limit={}&tag={}&priority={}&mentioned={}&sort={}:{}&search={}",
            self.user_id,
            self.page,
            self.limit,
            self.tag.as_deref().unwrap_or(""),
            self.priority.map(|p| p.as_str()).unwrap_or(""),
            self.mentioned_user.as_deref().unwrap_or(""),
            self.sort_by.as_str(),
            self.sort_order.as_str(),
            self.search.as_deref().unwrap_or(""),
        )
    }

    /// Query-string pairs for the HTTP remote. Unset filters are omitted.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("sortBy", self.sort_by.as_str().to_string()),
            ("sortOrder", self.sort_order.as_str().to_string()),
            ("userId", self.user_id.to_string()),
        ];
        if let Some(ref tag) = self.tag {
            pairs.push(("tag", tag.clone()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        if let Some(ref mentioned) = self.mentioned_user {
            pairs.push(("mentionedUser", mentioned.clone()));
        }
        if let Some(ref search) = self.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}

/// Field the todo list is ordered by.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    Priority,
    Title,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::Priority => "priority",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Pagination metadata derived from a list fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64) as u32
        };
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// One page of todos plus its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodoPage {
    pub todos: Vec<DetailedTodo>,
    pub pagination: Pagination,
}
