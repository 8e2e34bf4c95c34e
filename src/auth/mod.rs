pub mod extractors;
pub mod middleware;
pub mod password;
pub mod service;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::models::PublicUser;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::{is_public_route, AuthMiddleware};
pub use service::AuthService;
pub use token::{parse_bearer, Claims, TokenService};

/// Represents the payload for a user login request.
///
/// Missing fields deserialize as empty strings so that the handler can answer with one
/// fixed message instead of a serde error naming the field.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn check(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::BadRequest("Email and password are required".into()));
        }
        Ok(())
    }
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    /// Must be a valid email format.
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    /// Must be at least 6 characters long.
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

impl RegisterRequest {
    /// Presence first, then format rules.
    pub fn check(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty()
        {
            return Err(AppError::BadRequest(
                "Username, email, and password are required".into(),
            ));
        }
        self.validate()?;
        Ok(())
    }
}

/// Response structure after successful authentication (login or registration).
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: PublicUser,
    /// The JWT for bearer authentication.
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn bad_request_message(result: Result<(), AppError>) -> String {
        match result {
            Err(AppError::BadRequest(msg)) => msg,
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_login_request_validation() {
        let valid = LoginRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid.check().is_ok());

        let missing: LoginRequest = serde_json::from_str(r#"{"email":"test@example.com"}"#).unwrap();
        assert_eq!(
            bad_request_message(missing.check()),
            "Email and password are required"
        );
    }

    #[test]
    fn test_register_request_validation() {
        assert!(register("test_user", "test@example.com", "password123").check().is_ok());

        assert_eq!(
            bad_request_message(register(" ", "test@example.com", "password123").check()),
            "Username, email, and password are required"
        );
        assert_eq!(
            bad_request_message(register("test_user", "testexample.com", "password123").check()),
            "Invalid email address"
        );
        assert_eq!(
            bad_request_message(register("test_user", "test@example.com", "12345").check()),
            "Password must be at least 6 characters long"
        );
    }

    #[test]
    fn test_register_missing_fields_deserialize_blank() {
        let request: RegisterRequest = serde_json::from_str(r#"{"username":"u"}"#).unwrap();
        assert_eq!(
            bad_request_message(request.check()),
            "Username, email, and password are required"
        );
    }
}
