// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! To-do routes for authenticated users.
//!
//! Every query is scoped to the session's user ID. An item that exists but
//! belongs to someone else is reported exactly like a missing one.

use crate::db::todo_not_found;
use crate::error::{AppError, AppJson, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{NewTodo, Todo, TodoChanges};
use crate::routes::not_blank;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// To-do routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/todos", get(list_todos).post(create_todo))
        .route("/api/todos/{id}", put(update_todo).delete(delete_todo))
}

const TITLE_REQUIRED: &str = "Title is required";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTodoRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteTodoResponse {
    pub success: bool,
}

/// Trimmed description; blank becomes `None`.
fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// List the caller's to-do items, newest first.
async fn list_todos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Todo>>> {
    let todos = state.db.list_todos(&user.id).await?;
    tracing::debug!(user_id = %user.id, count = todos.len(), "Listed todos");
    Ok(Json(todos))
}

/// Create a to-do item owned by the caller.
async fn create_todo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(body): AppJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>)> {
    body.validate()
        .map_err(|_| AppError::BadRequest(TITLE_REQUIRED.to_string()))?;

    let todo = Todo::create(
        &user.id,
        NewTodo {
            title: body.title.trim().to_string(),
            description: normalize_description(body.description),
        },
    );
    state.db.save_todo(&todo).await?;

    tracing::info!(user_id = %user.id, todo_id = %todo.id, "Created todo");
    Ok((StatusCode::CREATED, Json(todo)))
}

/// Replace the editable fields of one of the caller's to-do items.
async fn update_todo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(todo_id): Path<String>,
    AppJson(body): AppJson<UpdateTodoRequest>,
) -> Result<Json<Todo>> {
    body.validate()
        .map_err(|_| AppError::BadRequest(TITLE_REQUIRED.to_string()))?;

    let Some(mut todo) = state.db.get_owned_todo(&user.id, &todo_id).await? else {
        tracing::warn!(user_id = %user.id, todo_id = %todo_id, "Update of missing or foreign todo");
        return Err(todo_not_found(&todo_id));
    };

    todo.apply(TodoChanges {
        title: body.title.trim().to_string(),
        description: normalize_description(body.description),
        completed: body.completed.unwrap_or(false),
    });
    state.db.update_todo(&todo).await?;

    tracing::info!(user_id = %user.id, todo_id = %todo.id, completed = todo.completed, "Updated todo");
    Ok(Json(todo))
}

/// Delete one of the caller's to-do items.
async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(todo_id): Path<String>,
) -> Result<Json<DeleteTodoResponse>> {
    if state.db.get_owned_todo(&user.id, &todo_id).await?.is_none() {
        tracing::warn!(user_id = %user.id, todo_id = %todo_id, "Delete of missing or foreign todo");
        return Err(todo_not_found(&todo_id));
    }

    state.db.delete_todo(&todo_id).await?;

    tracing::info!(user_id = %user.id, todo_id = %todo_id, "Deleted todo");
    Ok(Json(DeleteTodoResponse { success: true }))
}
