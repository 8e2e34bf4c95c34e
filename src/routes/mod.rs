pub mod auth;
pub mod health;
pub mod todos;
pub mod users;

use actix_web::web;

use crate::error::AppError;

pub use health::not_found;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(health::index)
        .service(health::health)
        .service(auth::register)
        .service(auth::login)
        .service(auth::logout)
        .service(todos::get_todos)
        .service(todos::create_todo)
        .service(todos::my_todos)
        .service(todos::get_todo)
        .service(todos::update_todo)
        .service(todos::delete_todo)
        .service(users::get_users);
}

/// Malformed bodies become a JSON 400 instead of actix's plain-text default.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        log::debug!("rejected request body: {}", err);
        AppError::BadRequest("Invalid request body".into()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        log::debug!("rejected query string: {}", err);
        AppError::BadRequest("Invalid query string".into()).into()
    })
}
