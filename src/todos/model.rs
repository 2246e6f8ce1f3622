//! Todo data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::Tag;

/// A single to-do item as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Autoincrement id; also the creation-order surrogate for sorting.
    pub id: i64,
    /// Owning account.
    #[serde(skip)]
    pub owner_id: i64,
    /// Short name, never blank.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// A todo enriched with its tags, as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoView {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// The todo's tags, ordered by name.
    pub tags: Vec<Tag>,
}

impl TodoView {
    pub fn new(todo: Todo, tags: Vec<Tag>) -> Self {
        Self {
            id: todo.id,
            name: todo.name,
            description: todo.description,
            completed: todo.completed,
            created_at: todo.created_at,
            tags,
        }
    }
}

/// Input for creating a todo. Validation happens before this reaches the
/// repository.
#[derive(Debug, Clone, Default)]
pub struct NewTodo {
    pub name: String,
    pub description: Option<String>,
}

impl NewTodo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Trim a todo name, rejecting names that are empty afterwards.
pub fn normalize_todo_name(raw: &str) -> Result<String, crate::error::TodoError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(crate::error::TodoError::validation("Name must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions are stored as absent.
pub fn normalize_description(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}
