use crate::{
    auth::{AuthResponse, AuthService, LoginRequest, RegisterRequest},
    db::Store,
    error::AppError,
    models::{NewUser, PublicUser},
};
use actix_web::{post, web, HttpResponse, Responder};
use serde_json::json;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Register a new user
///
/// Creates a new user account and returns it together with a bearer token.
/// A taken email is answered with `409 Conflict`.
#[post("/register")]
pub async fn register(
    store: web::Data<dyn Store>,
    auth: web::Data<AuthService>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.check()?;
    let data = register_data.into_inner();

    let password_hash = auth.hash_password(&data.password).await?;

    let user = store
        .create_user(NewUser {
            username: data.username.trim().to_string(),
            email: data.email.trim().to_string(),
            password_hash,
        })
        .await?;

    let token = auth.issue_token(&user)?;
    log::info!("registered user {}", user.id);

    Ok(HttpResponse::Created().json(AuthResponse {
        message: "User registered successfully".into(),
        user: PublicUser::from(user),
        token,
    }))
}

/// Login user
///
/// Unknown email and wrong password produce the same 401 body.
#[post("/login")]
pub async fn login(
    store: web::Data<dyn Store>,
    auth: web::Data<AuthService>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.check()?;

    let user = store
        .find_user_by_email(login_data.email.trim())
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    if !auth.verify_password(&login_data.password, &user.password).await? {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = auth.issue_token(&user)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "Login successful".into(),
        user: PublicUser::from(user),
        token,
    }))
}

/// Logout
///
/// Tokens are stateless: the client discards its token, which stays valid until it
/// expires.
#[post("/logout")]
pub async fn logout() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "Logout successful" }))
}
