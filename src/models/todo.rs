//! To-do item model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// To-do item stored in the `todos` collection and returned by the API as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Todo {
    /// Time-ordered ID (also used as document ID)
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    /// Owning user
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Validated fields for a new to-do item.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
}

/// Validated replacement for the editable fields of a to-do item.
#[derive(Debug, Clone)]
pub struct TodoChanges {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

impl Todo {
    /// Build a new record owned by `user_id`.
    pub fn create(user_id: &str, new: NewTodo) -> Self {
        let now = crate::time_utils::now_rfc3339();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            title: new.title,
            description: new.description,
            completed: false,
            user_id: user_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply changes and bump `updated_at`.
    pub fn apply(&mut self, changes: TodoChanges) {
        self.title = changes.title;
        self.description = changes.description;
        self.completed = changes.completed;
        self.updated_at = crate::time_utils::now_rfc3339();
    }
}

/// Newest-created first; ties broken by the time-ordered ID.
pub fn sort_newest_first(todos: &mut [Todo]) {
    todos.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
