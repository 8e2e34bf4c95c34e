use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::db::{unknown_assignees, Store};
use crate::error::AppError;
use crate::models::{
    NewTodo, NewUser, PublicUser, Subtask, Todo, TodoChanges, TodoFilters, TodoRow, User,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    todos: BTreeMap<i32, TodoRow>,
    /// todo id -> assigned user ids, kept sorted.
    assignees: BTreeMap<i32, Vec<i32>>,
    subtasks: BTreeMap<i32, Subtask>,
    next_user_id: i32,
    next_todo_id: i32,
    next_subtask_id: i32,
}

impl Tables {
    fn public_user(&self, id: i32) -> Option<PublicUser> {
        self.users.get(&id).map(PublicUser::from)
    }

    fn hydrate(&self, row: &TodoRow) -> Todo {
        let assigned_to = self
            .assignees
            .get(&row.id)
            .map(|ids| ids.iter().filter_map(|id| self.public_user(*id)).collect())
            .unwrap_or_default();
        let subtasks = self
            .subtasks
            .values()
            .filter(|s| s.todo_id == row.id)
            .cloned()
            .collect();

        Todo::from_parts(row.clone(), self.public_user(row.creator_id), assigned_to, subtasks)
    }

    /// Newest first, id breaking ties.
    fn collect_sorted<'a>(&self, rows: impl Iterator<Item = &'a TodoRow>) -> Vec<Todo> {
        let mut todos: Vec<Todo> = rows.map(|row| self.hydrate(row)).collect();
        todos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        todos
    }

    fn check_assignees(&self, ids: &[i32]) -> Result<(), AppError> {
        let found: Vec<i32> = ids
            .iter()
            .copied()
            .filter(|id| self.users.contains_key(id))
            .collect();
        unknown_assignees(ids, &found)
    }

    fn is_visible_to(&self, row: &TodoRow, user_id: i32) -> bool {
        row.creator_id == user_id
            || self
                .assignees
                .get(&row.id)
                .map_or(false, |ids| ids.contains(&user_id))
    }
}

/// Process-local store with the same observable behavior as [`super::PgStore`].
///
/// Used when no `DATABASE_URL` is configured and by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("User with this email already exists".into()));
        }

        tables.next_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            email: user.email,
            password: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<PublicUser>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().map(PublicUser::from).collect())
    }

    async fn create_todo(&self, todo: NewTodo, creator_id: i32) -> Result<Todo, AppError> {
        let mut tables = self.tables.write().await;

        tables.check_assignees(&todo.assigned_to)?;

        tables.next_todo_id += 1;
        let now = Utc::now();
        let row = TodoRow {
            id: tables.next_todo_id,
            title: todo.title,
            description: todo.description,
            due_date: todo.due_date,
            reminder_date: todo.reminder_date,
            status: todo.status,
            priority: todo.priority,
            starred: todo.starred,
            creator_id,
            created_at: now,
            updated_at: now,
        };

        if !todo.assigned_to.is_empty() {
            tables.assignees.insert(row.id, todo.assigned_to);
        }
        for subtask in todo.subtasks {
            tables.next_subtask_id += 1;
            let id = tables.next_subtask_id;
            tables.subtasks.insert(
                id,
                Subtask {
                    id,
                    title: subtask.title,
                    completed: subtask.completed,
                    todo_id: row.id,
                },
            );
        }

        let hydrated = tables.hydrate(&row);
        tables.todos.insert(row.id, row);

        Ok(hydrated)
    }

    async fn get_todo_by_id(&self, id: i32) -> Result<Option<Todo>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.todos.get(&id).map(|row| tables.hydrate(row)))
    }

    async fn list_todos_for_user(&self, user_id: i32) -> Result<Vec<Todo>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.collect_sorted(
            tables
                .todos
                .values()
                .filter(|row| tables.is_visible_to(row, user_id)),
        ))
    }

    async fn list_todos(&self, filters: &TodoFilters) -> Result<Vec<Todo>, AppError> {
        let tables = self.tables.read().await;
        let mut todos = tables.collect_sorted(tables.todos.values());
        todos.retain(|todo| filters.matches(todo));
        Ok(todos)
    }

    async fn update_todo(&self, id: i32, changes: TodoChanges) -> Result<Option<Todo>, AppError> {
        let mut tables = self.tables.write().await;

        if !tables.todos.contains_key(&id) {
            return Ok(None);
        }
        if let Some(ids) = &changes.assigned_to {
            tables.check_assignees(ids)?;
        }

        let Some(row) = tables.todos.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            row.title = title;
        }
        if let Some(description) = changes.description {
            row.description = Some(description);
        }
        if let Some(due_date) = changes.due_date {
            row.due_date = due_date;
        }
        if let Some(reminder_date) = changes.reminder_date {
            row.reminder_date = Some(reminder_date);
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(priority) = changes.priority {
            row.priority = priority;
        }
        if let Some(starred) = changes.starred {
            row.starred = starred;
        }
        row.updated_at = Utc::now();
        let row = row.clone();

        // Replace, never merge.
        if let Some(ids) = changes.assigned_to {
            tables.assignees.insert(id, ids);
        }

        Ok(Some(tables.hydrate(&row)))
    }

    async fn delete_todo(&self, id: i32) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;

        if tables.todos.remove(&id).is_none() {
            return Ok(false);
        }
        tables.assignees.remove(&id);
        tables.subtasks.retain(|_, s| s.todo_id != id);

        Ok(true)
    }
}
