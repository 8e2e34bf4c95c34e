#![allow(dead_code)]

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use todo_api::auth::{AuthMiddleware, AuthResponse, AuthService};
use todo_api::config::Config;
use todo_api::db::{MemoryStore, Store};
use todo_api::error::AppError;
use todo_api::models::{NewTodo, NewUser, PublicUser, Todo, TodoChanges, TodoFilters, User};
use todo_api::routes;

pub const TEST_SECRET: &str = "integration-test-secret";

// Helper struct to hold auth details
pub struct TestUser {
    pub id: i32,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token))
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "JWT_SECRET" => Some(TEST_SECRET.to_string()),
        "BCRYPT_COST" => Some("4".to_string()),
        _ => None,
    })
    .expect("test config")
}

pub fn auth_service() -> AuthService {
    AuthService::from_config(&test_config())
}

/// The full application over a fresh in-memory store, wired like `main`.
pub async fn init_app() -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    init_app_with_store(Arc::new(MemoryStore::new())).await
}

pub async fn init_app_with_store(
    store: Arc<dyn Store>,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .wrap(AuthMiddleware)
            .app_data(web::Data::new(test_config()))
            .app_data(web::Data::new(auth_service()))
            .app_data(web::Data::from(store))
            .configure(routes::config)
            .default_service(web::route().to(routes::not_found)),
    )
    .await
}

/// A store whose backend is down: every call fails with a database error.
pub struct FailingStore;

impl FailingStore {
    fn fail<T>() -> Result<T, AppError> {
        Err(AppError::DatabaseError(
            "connection refused on 10.0.0.3:5432".into(),
        ))
    }
}

#[async_trait]
impl Store for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn create_user(&self, _user: NewUser) -> Result<User, AppError> {
        Self::fail()
    }

    async fn find_user_by_email(&self, _email: &str) -> Result<Option<User>, AppError> {
        Self::fail()
    }

    async fn find_user_by_id(&self, _id: i32) -> Result<Option<User>, AppError> {
        Self::fail()
    }

    async fn list_users(&self) -> Result<Vec<PublicUser>, AppError> {
        Self::fail()
    }

    async fn create_todo(&self, _todo: NewTodo, _creator_id: i32) -> Result<Todo, AppError> {
        Self::fail()
    }

    async fn get_todo_by_id(&self, _id: i32) -> Result<Option<Todo>, AppError> {
        Self::fail()
    }

    async fn list_todos_for_user(&self, _user_id: i32) -> Result<Vec<Todo>, AppError> {
        Self::fail()
    }

    async fn list_todos(&self, _filters: &TodoFilters) -> Result<Vec<Todo>, AppError> {
        Self::fail()
    }

    async fn update_todo(&self, _id: i32, _changes: TodoChanges) -> Result<Option<Todo>, AppError> {
        Self::fail()
    }

    async fn delete_todo(&self, _id: i32) -> Result<bool, AppError> {
        Self::fail()
    }
}

/// A token for a user that only exists in the caller's imagination.
pub fn token_for(id: i32, email: &str) -> String {
    let now = Utc::now();
    let user = User {
        id,
        username: "ghost".into(),
        email: email.into(),
        password: String::new(),
        created_at: now,
        updated_at: now,
    };
    auth_service().issue_token(&user).expect("issue token")
}

pub async fn register_user(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    username: &str,
    password: &str,
) -> TestUser {
    let req = test::TestRequest::post()
        .uri("/register")
        .set_json(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": password
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    assert_eq!(
        status,
        actix_web::http::StatusCode::CREATED,
        "Registration failed. Body: {}",
        String::from_utf8_lossy(&body)
    );

    let auth: AuthResponse = serde_json::from_slice(&body).expect("register response");
    TestUser {
        id: auth.user.id,
        token: auth.token,
    }
}

/// Creates a todo and returns its JSON representation.
pub async fn create_todo(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    user: &TestUser,
    body: serde_json::Value,
) -> serde_json::Value {
    let req = test::TestRequest::post()
        .uri("/todos")
        .insert_header(user.bearer())
        .set_json(&body)
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    assert_eq!(
        status,
        actix_web::http::StatusCode::CREATED,
        "Create todo failed. Body: {}",
        String::from_utf8_lossy(&bytes)
    );

    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("create response");
    json["todo"].clone()
}
