// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage, email uniqueness index)
//! - Accounts (links to external identity providers)
//! - Todos (per-user to-do items)
//!
//! Listing a user's to-dos filters on `userId` and orders by `createdAt`
//! then `id`, which needs the composite index in `firestore.indexes.json`.

use crate::db::{collections, todo_not_found};
use crate::error::AppError;
use crate::models::user::account_document_id;
use crate::models::{LinkedAccount, Todo, User, UserEmail};
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up a user through the email index.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let index: Option<UserEmail> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&email_document_id(email))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match index {
            Some(index) => self.get_user(&index.user_id).await,
            None => Ok(None),
        }
    }

    /// Create a user, claiming its email in the index first.
    ///
    /// The index insert fails if the document already exists, which is what
    /// enforces email uniqueness.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let index = UserEmail {
            user_id: user.id.clone(),
        };

        let claimed: Result<UserEmail, FirestoreError> = self
            .client
            .fluent()
            .insert()
            .into(collections::USER_EMAILS)
            .document_id(email_document_id(&user.email))
            .object(&index)
            .execute()
            .await;

        match claimed {
            Ok(_) => {}
            Err(FirestoreError::DataConflictError(_)) => {
                return Err(AppError::Conflict("User already exists".to_string()));
            }
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        if let Err(e) = self.set_user(user).await {
            // Release the email so a retry is not blocked by an orphaned claim.
            if let Err(cleanup) = self
                .client
                .fluent()
                .delete()
                .from(collections::USER_EMAILS)
                .document_id(email_document_id(&user.email))
                .execute()
                .await
            {
                tracing::error!(error = %cleanup, user_id = %user.id, "Failed to release email claim");
            }
            return Err(e);
        }

        Ok(())
    }

    /// Overwrite a user document.
    pub async fn set_user(&self, user: &User) -> Result<(), AppError> {
        let _: User = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Account Operations ──────────────────────────────────────

    pub async fn find_linked_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<LinkedAccount>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::ACCOUNTS)
            .obj()
            .one(&account_document_id(provider, provider_account_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn link_account(&self, account: &LinkedAccount) -> Result<(), AppError> {
        let _: LinkedAccount = self
            .client
            .fluent()
            .update()
            .in_col(collections::ACCOUNTS)
            .document_id(account.document_id())
            .object(account)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Todo Operations ─────────────────────────────────────────

    /// All to-do items of one user, newest first.
    pub async fn list_todos(&self, owner_id: &str) -> Result<Vec<Todo>, AppError> {
        let owner_id = owner_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::TODOS)
            .filter(move |q| q.for_all([q.field("userId").eq(owner_id.clone())]))
            .order_by([
                ("createdAt", firestore::FirestoreQueryDirection::Descending),
                ("id", firestore::FirestoreQueryDirection::Descending),
            ])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_todo(&self, todo_id: &str) -> Result<Option<Todo>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::TODOS)
            .obj()
            .one(todo_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write a new to-do item.
    pub async fn set_todo(&self, todo: &Todo) -> Result<(), AppError> {
        let _: Todo = self
            .client
            .fluent()
            .update()
            .in_col(collections::TODOS)
            .document_id(&todo.id)
            .object(todo)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Replace a to-do item only if its document still exists.
    pub async fn update_todo(&self, todo: &Todo) -> Result<(), AppError> {
        let updated: Result<Todo, FirestoreError> = self
            .client
            .fluent()
            .update()
            .in_col(collections::TODOS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&todo.id)
            .object(todo)
            .execute()
            .await;

        match updated {
            Ok(_) => Ok(()),
            Err(FirestoreError::DataNotFoundError(_)) => Err(todo_not_found(&todo.id)),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    pub async fn delete_todo(&self, todo_id: &str) -> Result<(), AppError> {
        self.client
            .fluent()
            .delete()
            .from(collections::TODOS)
            .document_id(todo_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Firestore document IDs may not contain `/`.
fn email_document_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}
