use crate::{
    auth::AuthenticatedUser,
    db::Store,
    error::AppError,
    models::{
        todo::parse_todo_id, CreateTodoRequest, Todo, TodoFilters, TodoQuery, UpdateTodoRequest,
    },
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;

fn todo_not_found() -> AppError {
    AppError::NotFound("Todo not found".into())
}

/// Loads a todo and checks that `user` created it.
async fn owned_todo(
    store: &dyn Store,
    id: i32,
    user: &AuthenticatedUser,
    action: &str,
) -> Result<Todo, AppError> {
    let todo = store.get_todo_by_id(id).await?.ok_or_else(todo_not_found)?;

    if !todo.is_creator(user.id()) {
        return Err(AppError::Forbidden(format!(
            "Only the creator can {} this todo",
            action
        )));
    }

    Ok(todo)
}

/// Lists every todo, optionally filtered.
///
/// ## Query Parameters (all comma-separated, all optional):
/// - `status`: `PENDING`, `IN_PROGRESS`, `COMPLETED` or `all`.
/// - `assignedTo`: user ids; matches todos assigned to any of them.
/// - `starred`: `true` or `false`.
/// - `priority`: `HIGH`, `MEDIUM`, `LOW`.
///
/// The parsed filters are echoed back under `filters`.
#[get("/todos")]
pub async fn get_todos(
    store: web::Data<dyn Store>,
    query: web::Query<TodoQuery>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let filters = TodoFilters::try_from(query.into_inner())?;
    if !filters.is_empty() {
        log::debug!("listing todos with {:?}", filters);
    }
    let todos = store.list_todos(&filters).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Todos retrieved successfully",
        "todos": todos,
        "filters": filters,
    })))
}

/// Creates a todo owned by the caller.
///
/// `title` and `dueDate` are required; everything else falls back to the model
/// defaults. Assignees and subtasks are stored in the same transaction.
#[post("/todos")]
pub async fn create_todo(
    store: web::Data<dyn Store>,
    body: web::Json<CreateTodoRequest>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let new_todo = body.into_inner().into_new_todo()?;
    let todo = store.create_todo(new_todo, user.id()).await?;

    log::info!("user {} created todo {}", user.id(), todo.id);

    Ok(HttpResponse::Created().json(json!({
        "message": "Todo created successfully",
        "todo": todo,
    })))
}

/// Fetches one todo. Reachable without a token.
#[get("/todos/{id}")]
pub async fn get_todo(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let id = parse_todo_id(&path)?;
    let todo = store.get_todo_by_id(id).await?.ok_or_else(todo_not_found)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Todo retrieved successfully",
        "todo": todo,
    })))
}

/// Partial update, creator only.
///
/// A supplied `assignedTo` replaces the current assignees; `[]` clears them.
/// The body is only looked at once the todo exists and belongs to the caller.
#[put("/todos/{id}")]
pub async fn update_todo(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    body: Result<web::Json<UpdateTodoRequest>, actix_web::Error>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = parse_todo_id(&path)?;
    owned_todo(store.get_ref(), id, &user, "update").await?;

    let body = body.map_err(|err| {
        log::debug!("rejected update body for todo {}: {}", id, err);
        AppError::BadRequest("Invalid request body".into())
    })?;
    let changes = body.into_inner().into_changes()?;
    let todo = store
        .update_todo(id, changes)
        .await?
        .ok_or_else(todo_not_found)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Todo updated successfully",
        "todo": todo,
    })))
}

/// Deletes a todo with its subtasks and assignee links, creator only.
#[delete("/todos/{id}")]
pub async fn delete_todo(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = parse_todo_id(&path)?;
    owned_todo(store.get_ref(), id, &user, "delete").await?;

    // The row may have gone between the check and here.
    if !store.delete_todo(id).await? {
        return Err(todo_not_found());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Todo deleted successfully" })))
}

/// Todos the caller created or is assigned to.
#[get("/my-todos")]
pub async fn my_todos(
    store: web::Data<dyn Store>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let todos = store.list_todos_for_user(user.id()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Your todos retrieved successfully",
        "todos": todos,
    })))
}
