use actix_web::web;

use crate::auth::password;
use crate::auth::token::{Claims, TokenService};
use crate::config::Config;
use crate::error::AppError;
use crate::models::User;

/// Credential service: password hashing plus bearer token issue/verification.
///
/// Built once from [`Config`] and shared read-only between workers.
#[derive(Clone)]
pub struct AuthService {
    tokens: TokenService,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(jwt_secret: &str, token_ttl_hours: i64, bcrypt_cost: u32) -> Self {
        Self {
            tokens: TokenService::new(jwt_secret, token_ttl_hours),
            bcrypt_cost,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_hours, config.bcrypt_cost)
    }

    /// bcrypt is CPU-bound, so hashing runs on the blocking pool instead of the worker.
    pub async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        web::block(move || password::hash_password(&password, cost)).await?
    }

    pub async fn verify_password(&self, password: &str, hashed: &str) -> Result<bool, AppError> {
        let (password, hashed) = (password.to_owned(), hashed.to_owned());
        web::block(move || password::verify_password(&password, &hashed)).await?
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AppError> {
        self.tokens.issue(user.id, &user.email)
    }

    pub fn authenticate(&self, token: &str) -> Option<Claims> {
        self.tokens.authenticate(token)
    }
}
