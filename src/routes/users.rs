use crate::{auth::AuthenticatedUser, db::Store, error::AppError};
use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

/// All registered users, without password hashes, for picking assignees.
#[get("/users")]
pub async fn get_users(
    store: web::Data<dyn Store>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let users = store.list_users().await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Users retrieved successfully",
        "users": users,
    })))
}
