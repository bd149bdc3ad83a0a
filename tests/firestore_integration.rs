// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with: FIRESTORE_EMULATOR_HOST=localhost:8081 cargo test --test firestore_integration
//!
//! Each test uses fresh IDs so runs against a shared emulator do not collide.

use todo_auth::error::AppError;
use todo_auth::models::{LinkedAccount, NewTodo, Todo, TodoChanges, User};
use todo_auth::time_utils::now_rfc3339;

mod common;
use common::test_db;

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::now_v7())
}

/// Helper to create a basic test user
fn test_user(email: &str) -> User {
    let now = now_rfc3339();
    User {
        id: uuid::Uuid::now_v7().to_string(),
        email: email.to_string(),
        name: "Test User".to_string(),
        password: None,
        email_verified: None,
        image: None,
        created_at: now.clone(),
        updated_at: now,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_create_and_lookup() {
    require_emulator!();

    let db = test_db().await;
    let email = format!("{}@example.com", unique("user"));

    assert!(db.find_user_by_email(&email).await.unwrap().is_none());

    let user = test_user(&email);
    db.create_user(&user).await.unwrap();

    let by_id = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, email);

    let by_email = db.find_user_by_email(&email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    require_emulator!();

    let db = test_db().await;
    let email = format!("{}@example.com", unique("dup"));

    let first = test_user(&email);
    db.create_user(&first).await.unwrap();

    let second = test_user(&email);
    let result = db.create_user(&second).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // The loser's document must not exist
    assert!(db.get_user(&second.id).await.unwrap().is_none());
    let stored = db.find_user_by_email(&email).await.unwrap().unwrap();
    assert_eq!(stored.id, first.id);
}

#[tokio::test]
async fn test_linked_account_roundtrip() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&format!("{}@example.com", unique("link")));
    db.create_user(&user).await.unwrap();

    let subject = unique("sub");
    assert!(db.find_linked_account("google", &subject).await.unwrap().is_none());

    db.link_account(&LinkedAccount {
        user_id: user.id.clone(),
        provider: "google".to_string(),
        provider_account_id: subject.clone(),
        created_at: now_rfc3339(),
    })
    .await
    .unwrap();

    let account = db.find_linked_account("google", &subject).await.unwrap().unwrap();
    assert_eq!(account.user_id, user.id);
}

// ═══════════════════════════════════════════════════════════════════════════
// TODO TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_todos_scoped_and_ordered() {
    require_emulator!();

    let db = test_db().await;
    let alice = unique("alice");
    let bob = unique("bob");

    let first = Todo::create(
        &alice,
        NewTodo {
            title: "first".to_string(),
            description: None,
        },
    );
    db.save_todo(&first).await.unwrap();
    let second = Todo::create(
        &alice,
        NewTodo {
            title: "second".to_string(),
            description: None,
        },
    );
    db.save_todo(&second).await.unwrap();
    let bobs = Todo::create(
        &bob,
        NewTodo {
            title: "bob".to_string(),
            description: None,
        },
    );
    db.save_todo(&bobs).await.unwrap();

    let listed: Vec<String> = db
        .list_todos(&alice)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(listed, vec![second.id.clone(), first.id.clone()]);

    assert!(db.get_owned_todo(&bob, &first.id).await.unwrap().is_none());
    assert!(db.get_owned_todo(&alice, &first.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_todo_update_and_delete() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique("owner");

    let mut todo = Todo::create(
        &owner,
        NewTodo {
            title: "draft".to_string(),
            description: Some("d".to_string()),
        },
    );
    db.save_todo(&todo).await.unwrap();

    todo.apply(TodoChanges {
        title: "final".to_string(),
        description: None,
        completed: true,
    });
    db.update_todo(&todo).await.unwrap();

    let stored = db.get_owned_todo(&owner, &todo.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "final");
    assert!(stored.completed);
    assert!(stored.description.is_none());

    db.delete_todo(&todo.id).await.unwrap();
    assert!(db.get_owned_todo(&owner, &todo.id).await.unwrap().is_none());
    assert!(db.list_todos(&owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_after_delete_is_not_found() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique("owner");

    let mut todo = Todo::create(
        &owner,
        NewTodo {
            title: "doomed".to_string(),
            description: None,
        },
    );
    db.save_todo(&todo).await.unwrap();
    db.delete_todo(&todo.id).await.unwrap();

    todo.apply(TodoChanges {
        title: "resurrected".to_string(),
        description: None,
        completed: true,
    });
    let result = db.update_todo(&todo).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(db.get_owned_todo(&owner, &todo.id).await.unwrap().is_none());
}
