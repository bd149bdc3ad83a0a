// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.

use crate::error::AppError;
use crate::models::todo::sort_newest_first;
use crate::models::user::account_document_id;
use crate::models::{LinkedAccount, Todo, User};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Concurrent in-memory collections mirroring the Firestore layout.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    /// email -> user ID
    emails: DashMap<String, String>,
    accounts: DashMap<String, LinkedAccount>,
    todos: DashMap<String, Todo>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|user| user.clone())
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        let user_id = self.emails.get(email)?.clone();
        self.get_user(&user_id)
    }

    /// Insert a user, claiming its email. The email entry is held until the
    /// user record is visible, so a concurrent duplicate sees the conflict.
    pub fn create_user(&self, user: &User) -> Result<(), AppError> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict("User already exists".to_string())),
            Entry::Vacant(slot) => {
                self.users.insert(user.id.clone(), user.clone());
                slot.insert(user.id.clone());
                Ok(())
            }
        }
    }

    /// Replace a user's profile fields. The email is never changed here.
    pub fn update_user(&self, user: &User) -> Result<(), AppError> {
        match self.users.get_mut(&user.id) {
            Some(mut existing) if existing.email == user.email => {
                *existing = user.clone();
                Ok(())
            }
            Some(_) => Err(AppError::BadRequest(
                "Email changes are not supported".to_string(),
            )),
            None => Err(AppError::NotFound(format!("User {} not found", user.id))),
        }
    }

    pub fn find_linked_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Option<LinkedAccount> {
        self.accounts
            .get(&account_document_id(provider, provider_account_id))
            .map(|account| account.clone())
    }

    pub fn link_account(&self, account: &LinkedAccount) {
        self.accounts
            .insert(account.document_id(), account.clone());
    }

    pub fn list_todos(&self, owner_id: &str) -> Vec<Todo> {
        let mut todos: Vec<Todo> = self
            .todos
            .iter()
            .filter(|entry| entry.user_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        sort_newest_first(&mut todos);
        todos
    }

    pub fn get_todo(&self, todo_id: &str) -> Option<Todo> {
        self.todos.get(todo_id).map(|todo| todo.clone())
    }

    pub fn set_todo(&self, todo: &Todo) {
        self.todos.insert(todo.id.clone(), todo.clone());
    }

    /// Replace an existing to-do. Returns false if it has been deleted.
    pub fn update_todo(&self, todo: &Todo) -> bool {
        match self.todos.get_mut(&todo.id) {
            Some(mut existing) => {
                *existing = todo.clone();
                true
            }
            None => false,
        }
    }

    pub fn delete_todo(&self, todo_id: &str) {
        self.todos.remove(todo_id);
    }
}
