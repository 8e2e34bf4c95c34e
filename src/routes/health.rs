use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;

use crate::config::Config;

/// Health check endpoint
///
/// Returns the current status of the API and timestamp.
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "OK",
        "timestamp": Utc::now(),
        "message": "Server is running"
    }))
}

/// API index listing the available routes.
#[get("/")]
pub async fn index(config: web::Data<Config>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "Todo API",
        "version": env!("CARGO_PKG_VERSION"),
        "baseUrl": config.server_url(),
        "endpoints": {
            "auth": ["POST /register", "POST /login", "POST /logout"],
            "todos": [
                "GET /todos",
                "POST /todos",
                "GET /todos/{id}",
                "PUT /todos/{id}",
                "DELETE /todos/{id}",
                "GET /my-todos"
            ],
            "users": ["GET /users"],
            "health": ["GET /health"]
        }
    }))
}

/// JSON 404 for anything no route matched.
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "Route not found" }))
}
