// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore in production, in-memory for development).

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::config::{Config, StorageBackend};
use crate::error::AppError;
use crate::models::{LinkedAccount, Todo, User};
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email uniqueness index (keyed by url-encoded email)
    pub const USER_EMAILS: &str = "user_emails";
    pub const ACCOUNTS: &str = "accounts";
    pub const TODOS: &str = "todos";
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreStore),
    Memory(Arc<MemoryStore>),
    Offline,
}

/// Handle to the persistence backend. Cheap to clone.
#[derive(Clone)]
pub struct Db {
    backend: Backend,
}

fn offline() -> AppError {
    AppError::Database("Database not connected (offline mode)".to_string())
}

pub(crate) fn todo_not_found(todo_id: &str) -> AppError {
    AppError::NotFound(format!("Todo {} not found", todo_id))
}

impl Db {
    /// Connect to the backend selected in the configuration.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        match config.storage {
            StorageBackend::Firestore => Ok(Self {
                backend: Backend::Firestore(FirestoreStore::new(&config.gcp_project_id).await?),
            }),
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Self::memory())
            }
        }
    }

    /// Fresh, empty in-memory database.
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryStore::new())),
        }
    }

    /// Create a mock database for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            backend: Backend::Offline,
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.get_user(user_id).await,
            Backend::Memory(mem) => Ok(mem.get_user(user_id)),
            Backend::Offline => Err(offline()),
        }
    }

    /// Exact (case-sensitive) email lookup.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.find_user_by_email(email).await,
            Backend::Memory(mem) => Ok(mem.find_user_by_email(email)),
            Backend::Offline => Err(offline()),
        }
    }

    /// Create a user. Fails with [`AppError::Conflict`] if the email is taken.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.create_user(user).await,
            Backend::Memory(mem) => mem.create_user(user),
            Backend::Offline => Err(offline()),
        }
    }

    /// Overwrite an existing user's profile (email stays fixed).
    pub async fn update_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.set_user(user).await,
            Backend::Memory(mem) => mem.update_user(user),
            Backend::Offline => Err(offline()),
        }
    }

    // ─── Account Operations ──────────────────────────────────────

    pub async fn find_linked_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<LinkedAccount>, AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.find_linked_account(provider, provider_account_id).await,
            Backend::Memory(mem) => Ok(mem.find_linked_account(provider, provider_account_id)),
            Backend::Offline => Err(offline()),
        }
    }

    pub async fn link_account(&self, account: &LinkedAccount) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.link_account(account).await,
            Backend::Memory(mem) => {
                mem.link_account(account);
                Ok(())
            }
            Backend::Offline => Err(offline()),
        }
    }

    // ─── Todo Operations ─────────────────────────────────────────

    /// All to-do items owned by `owner_id`, newest first.
    pub async fn list_todos(&self, owner_id: &str) -> Result<Vec<Todo>, AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.list_todos(owner_id).await,
            Backend::Memory(mem) => Ok(mem.list_todos(owner_id)),
            Backend::Offline => Err(offline()),
        }
    }

    /// Fetch a to-do item only if it belongs to `owner_id`.
    ///
    /// A missing item and another user's item are indistinguishable to the caller.
    pub async fn get_owned_todo(
        &self,
        owner_id: &str,
        todo_id: &str,
    ) -> Result<Option<Todo>, AppError> {
        let todo = match &self.backend {
            Backend::Firestore(fs) => fs.get_todo(todo_id).await?,
            Backend::Memory(mem) => mem.get_todo(todo_id),
            Backend::Offline => return Err(offline()),
        };
        Ok(todo.filter(|todo| todo.user_id == owner_id))
    }

    /// Store a newly created to-do item.
    pub async fn save_todo(&self, todo: &Todo) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.set_todo(todo).await,
            Backend::Memory(mem) => {
                mem.set_todo(todo);
                Ok(())
            }
            Backend::Offline => Err(offline()),
        }
    }

    /// Replace an existing to-do item. Fails with `NotFound` if it was
    /// deleted since it was read, rather than writing it back.
    pub async fn update_todo(&self, todo: &Todo) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.update_todo(todo).await,
            Backend::Memory(mem) => {
                if mem.update_todo(todo) {
                    Ok(())
                } else {
                    Err(todo_not_found(&todo.id))
                }
            }
            Backend::Offline => Err(offline()),
        }
    }

    pub async fn delete_todo(&self, todo_id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(fs) => fs.delete_todo(todo_id).await,
            Backend::Memory(mem) => {
                mem.delete_todo(todo_id);
                Ok(())
            }
            Backend::Offline => Err(offline()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTodo;

    #[tokio::test]
    async fn test_offline_reports_database_error() {
        let db = Db::new_mock();
        assert!(matches!(
            db.list_todos("u1").await,
            Err(AppError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_get_owned_todo_hides_foreign_items() {
        let db = Db::memory();
        let todo = Todo::create("owner", NewTodo { title: "t".into(), description: None });
        db.save_todo(&todo).await.unwrap();

        assert!(db.get_owned_todo("owner", &todo.id).await.unwrap().is_some());
        assert!(db.get_owned_todo("intruder", &todo.id).await.unwrap().is_none());
        assert!(db.get_owned_todo("owner", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_of_deleted_todo_is_not_found() {
        let db = Db::memory();
        let mut todo = Todo::create("owner", NewTodo { title: "t".into(), description: None });
        db.save_todo(&todo).await.unwrap();
        db.delete_todo(&todo.id).await.unwrap();

        todo.title = "renamed".into();
        assert!(matches!(
            db.update_todo(&todo).await,
            Err(AppError::NotFound(_))
        ));
        assert!(db.get_owned_todo("owner", &todo.id).await.unwrap().is_none());
    }
}
