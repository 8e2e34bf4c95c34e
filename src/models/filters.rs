//! Query filters for `GET /todos`.
//!
//! Every parameter is a comma-separated list. Filters combine with AND; an absent or
//! empty parameter places no constraint.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::todo::{Todo, TodoPriority, TodoStatus};

/// Raw query string parameters, exactly as sent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoQuery {
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    pub starred: Option<String>,
    pub priority: Option<String>,
}

/// Parsed filters. Empty vectors mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoFilters {
    pub status: Vec<TodoStatus>,
    pub assigned_to: Vec<i32>,
    pub starred: Option<bool>,
    pub priority: Vec<TodoPriority>,
}

impl TryFrom<TodoQuery> for TodoFilters {
    type Error = AppError;

    fn try_from(query: TodoQuery) -> Result<Self, Self::Error> {
        let status_items = split_list(query.status.as_deref());
        // "all" anywhere in the list switches the status filter off.
        let status = if status_items.iter().any(|s| s.eq_ignore_ascii_case("all")) {
            Vec::new()
        } else {
            dedup(
                status_items
                    .iter()
                    .map(|s| s.parse())
                    .collect::<Result<Vec<TodoStatus>, _>>()?,
            )
        };

        let mut assigned_to = split_list(query.assigned_to.as_deref())
            .iter()
            .map(|s| {
                s.parse::<i32>()
                    .map_err(|_| AppError::BadRequest(format!("Invalid assignee id: {}", s)))
            })
            .collect::<Result<Vec<i32>, _>>()?;
        assigned_to.sort_unstable();
        assigned_to.dedup();

        let starred = match query.starred.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("true") => Some(true),
            Some(raw) if raw.eq_ignore_ascii_case("false") => Some(false),
            Some(raw) => {
                return Err(AppError::BadRequest(format!(
                    "Invalid starred filter: {}",
                    raw
                )))
            }
        };

        let priority = dedup(
            split_list(query.priority.as_deref())
                .iter()
                .map(|s| s.parse())
                .collect::<Result<Vec<TodoPriority>, _>>()?,
        );

        Ok(TodoFilters {
            status,
            assigned_to,
            starred,
            priority,
        })
    }
}

impl TodoFilters {
    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
            && self.assigned_to.is_empty()
            && self.starred.is_none()
            && self.priority.is_empty()
    }

    /// In-process evaluation of the filters against a hydrated todo.
    pub fn matches(&self, todo: &Todo) -> bool {
        (self.status.is_empty() || self.status.contains(&todo.status))
            && (self.assigned_to.is_empty()
                || todo
                    .assigned_to
                    .iter()
                    .any(|user| self.assigned_to.contains(&user.id)))
            && self.starred.map_or(true, |starred| todo.starred == starred)
            && (self.priority.is_empty() || self.priority.contains(&todo.priority))
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
