use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;
use crate::models::user::PublicUser;

/// Represents the status of a todo.
/// Corresponds to the `todo_status` SQL enum.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "todo_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "PENDING",
            TodoStatus::InProgress => "IN_PROGRESS",
            TodoStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for TodoStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_enum_name(s).as_str() {
            "PENDING" => Ok(TodoStatus::Pending),
            "IN_PROGRESS" => Ok(TodoStatus::InProgress),
            "COMPLETED" => Ok(TodoStatus::Completed),
            _ => Err(AppError::BadRequest(format!("Invalid status: {}", s.trim()))),
        }
    }
}

/// Represents the priority of a todo.
/// Corresponds to the `todo_priority` SQL enum.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "todo_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl TodoPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoPriority::High => "HIGH",
            TodoPriority::Medium => "MEDIUM",
            TodoPriority::Low => "LOW",
        }
    }
}

impl FromStr for TodoPriority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_enum_name(s).as_str() {
            "HIGH" => Ok(TodoPriority::High),
            "MEDIUM" => Ok(TodoPriority::Medium),
            "LOW" => Ok(TodoPriority::Low),
            _ => Err(AppError::BadRequest(format!("Invalid priority: {}", s.trim()))),
        }
    }
}

fn normalize_enum_name(s: &str) -> String {
    s.trim().to_uppercase().replace(['-', ' '], "_")
}

/// A `todos` row without its relations.
#[derive(Debug, Clone, FromRow)]
pub struct TodoRow {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub starred: bool,
    pub creator_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A checklist item belonging to exactly one todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: i32,
    pub title: String,
    pub completed: bool,
    pub todo_id: i32,
}

/// A todo with its creator, assignees and subtasks, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub starred: bool,
    pub creator_id: i32,
    pub creator: Option<PublicUser>,
    pub assigned_to: Vec<PublicUser>,
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn from_parts(
        row: TodoRow,
        creator: Option<PublicUser>,
        assigned_to: Vec<PublicUser>,
        subtasks: Vec<Subtask>,
    ) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            due_date: row.due_date,
            reminder_date: row.reminder_date,
            status: row.status,
            priority: row.priority,
            starred: row.starred,
            creator_id: row.creator_id,
            creator,
            assigned_to,
            subtasks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    /// Only the creator may update or delete a todo; assignees may not.
    pub fn is_creator(&self, user_id: i32) -> bool {
        self.creator_id == user_id
    }

    pub fn assignee_ids(&self) -> Vec<i32> {
        self.assigned_to.iter().map(|u| u.id).collect()
    }
}

/// Validated input for creating a todo.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub starred: bool,
    pub assigned_to: Vec<i32>,
    pub subtasks: Vec<NewSubtask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSubtask {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Validated partial update. `None` leaves the stored value untouched.
///
/// `assigned_to`, when present, replaces the whole assignee set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub starred: Option<bool>,
    pub assigned_to: Option<Vec<i32>>,
}

/// Body of `POST /todos`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub reminder_date: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub starred: Option<bool>,
    pub assigned_to: Option<Vec<i32>>,
    pub subtasks: Option<Vec<NewSubtask>>,
}

impl CreateTodoRequest {
    pub fn into_new_todo(mut self) -> Result<NewTodo, AppError> {
        trim_field(&mut self.title);
        trim_field(&mut self.description);

        let title = self
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::BadRequest("Title is required".into()))?;

        let due_date = match self.due_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_date("due date", raw)?,
            _ => return Err(AppError::BadRequest("Due date is required".into())),
        };

        self.validate()?;

        let reminder_date = parse_optional_date("reminder date", self.reminder_date.as_deref())?;

        let subtasks = self.subtasks.unwrap_or_default();
        if subtasks.iter().any(|s| s.title.trim().is_empty()) {
            return Err(AppError::BadRequest("Subtask title is required".into()));
        }

        Ok(NewTodo {
            title,
            description: self.description,
            due_date,
            reminder_date,
            status: self.status.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            starred: self.starred.unwrap_or(false),
            assigned_to: normalize_ids(self.assigned_to.unwrap_or_default()),
            subtasks: subtasks
                .into_iter()
                .map(|s| NewSubtask {
                    title: s.title.trim().to_string(),
                    completed: s.completed,
                })
                .collect(),
        })
    }
}

/// Body of `PUT /todos/{id}`. Every field is optional.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub reminder_date: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub starred: Option<bool>,
    pub assigned_to: Option<Vec<i32>>,
    /// Accepted for compatibility; existing subtasks are not edited through this path.
    pub subtasks: Option<IgnoredAny>,
}

impl UpdateTodoRequest {
    pub fn into_changes(mut self) -> Result<TodoChanges, AppError> {
        trim_field(&mut self.title);
        trim_field(&mut self.description);

        if self.title.as_deref() == Some("") {
            return Err(AppError::BadRequest("Title cannot be empty".into()));
        }

        self.validate()?;

        if self.subtasks.is_some() {
            log::debug!("ignoring subtasks in todo update");
        }

        Ok(TodoChanges {
            title: self.title,
            description: self.description,
            due_date: parse_optional_date("due date", self.due_date.as_deref())?,
            reminder_date: parse_optional_date("reminder date", self.reminder_date.as_deref())?,
            status: self.status,
            priority: self.priority,
            starred: self.starred,
            assigned_to: self.assigned_to.map(normalize_ids),
        })
    }
}

/// Length limits apply to the stored value, so fields are trimmed before validation.
fn trim_field(field: &mut Option<String>) {
    if let Some(value) = field {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }
}

/// Parses a todo id path segment.
pub fn parse_todo_id(raw: &str) -> Result<i32, AppError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest("Invalid todo ID".into()))
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC)
/// and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_date(label: &str, raw: &str) -> Result<DateTime<Utc>, AppError> {
    parse_datetime(raw).ok_or_else(|| AppError::BadRequest(format!("Invalid {}", label)))
}

/// Blank strings count as absent.
fn parse_optional_date(label: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_date(label, raw).map(Some),
        _ => Ok(None),
    }
}

fn normalize_ids(mut ids: Vec<i32>) -> Vec<i32> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
