//! Persistence gateway.
//!
//! Handlers and the authentication middleware only ever see `dyn Store`. Each method is
//! one logical transaction: a todo is created together with its assignee links and
//! subtasks or not at all.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{NewTodo, NewUser, PublicUser, Todo, TodoChanges, TodoFilters, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Short name used in startup logs.
    fn backend(&self) -> &'static str;

    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, AppError>;
    /// All users ordered by id, without password hashes.
    async fn list_users(&self) -> Result<Vec<PublicUser>, AppError>;

    /// Unknown assignee ids are a `BadRequest`, never silently dropped.
    async fn create_todo(&self, todo: NewTodo, creator_id: i32) -> Result<Todo, AppError>;
    async fn get_todo_by_id(&self, id: i32) -> Result<Option<Todo>, AppError>;
    /// Todos the user created or is assigned to, newest first.
    async fn list_todos_for_user(&self, user_id: i32) -> Result<Vec<Todo>, AppError>;
    /// All todos matching every supplied filter, newest first.
    async fn list_todos(&self, filters: &TodoFilters) -> Result<Vec<Todo>, AppError>;
    /// Applies only the supplied fields. A supplied assignee list replaces the current
    /// set. Returns `None` if the todo does not exist.
    async fn update_todo(&self, id: i32, changes: TodoChanges) -> Result<Option<Todo>, AppError>;
    /// `false` when there was nothing to delete.
    async fn delete_todo(&self, id: i32) -> Result<bool, AppError>;

    async fn close(&self) {}
}

/// Picks the backend: Postgres when `DATABASE_URL` is set, the in-memory store otherwise.
pub async fn connect(config: &Config) -> Result<Arc<dyn Store>, AppError> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        None => {
            log::warn!("DATABASE_URL is not set, using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub(crate) fn unknown_assignees(requested: &[i32], found: &[i32]) -> Result<(), AppError> {
    let missing: Vec<String> = requested
        .iter()
        .filter(|id| !found.contains(id))
        .map(|id| id.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Unknown assignee id(s): {}",
            missing.join(", ")
        )))
    }
}
