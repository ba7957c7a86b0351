use actix_web::{HttpResponse, http::StatusCode};
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;

pub type Res<T> = std::result::Result<T, AppError>;

/// A single rejected input field.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    // === CONVERSION ERRORS ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    JWT(#[from] jsonwebtoken::errors::Error),

    #[error("Stripe error: {0}")]
    Stripe(#[from] stripe::StripeError),

    #[error("Mail error: {0}")]
    Mail(String),

    // === APPLICATION ERRORS ===
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Locked(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("{0}")]
    Internal(String),
}

const SERVER_ERROR: &str = "Internal server error";

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(error) if is_unique_violation(error) => StatusCode::BAD_REQUEST,
            AppError::Database(error) if is_foreign_key_violation(error) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::JWT(_) => StatusCode::UNAUTHORIZED,
            AppError::Stripe(_) | AppError::Mail(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Locked(_) => StatusCode::LOCKED,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message that is safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => "Resource not found".to_string(),
            AppError::Database(error) if is_unique_violation(error) => {
                "Resource already exists".to_string()
            }
            AppError::Database(error) if is_foreign_key_violation(error) => {
                "Resource is still referenced by other records".to_string()
            }
            AppError::JWT(error) => match error.kind() {
                ErrorKind::ExpiredSignature => "Session expired, please log in again".to_string(),
                _ => "Invalid token".to_string(),
            },
            AppError::Database(_)
            | AppError::Stripe(_)
            | AppError::Mail(_)
            | AppError::Internal(_) => SERVER_ERROR.to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_http_response(&self) -> HttpResponse {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        let mut body = serde_json::json!({
            "success": false,
            "error": self.public_message(),
        });
        if let AppError::Validation(errors) = self {
            body["errors"] = serde_json::json!(errors);
        }

        HttpResponse::build(status).json(body)
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map(|e| e.is_foreign_key_violation())
        .unwrap_or(false)
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        self.to_http_response()
    }
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;
    use jsonwebtoken::errors::{Error as JwtError, ErrorKind};

    use super::*;

    #[test]
    fn maps_application_errors_to_status() {
        assert_eq!(
            AppError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Locked("x".into()).status(), StatusCode::LOCKED);
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Validation(vec![]).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn expired_token_is_distinguishable() {
        let expired = AppError::JWT(JwtError::from(ErrorKind::ExpiredSignature));
        let invalid = AppError::JWT(JwtError::from(ErrorKind::InvalidSignature));
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_ne!(expired.public_message(), invalid.public_message());
    }

    #[test]
    fn hides_internal_details() {
        let err = AppError::Internal("connection refused on 10.0.0.3".into());
        assert_eq!(err.public_message(), SERVER_ERROR);
    }

    #[actix_web::test]
    async fn validation_errors_are_listed() {
        let err = AppError::Validation(vec![FieldError {
            field: "email".into(),
            message: "Invalid email".into(),
        }]);
        let body = to_bytes(err.to_http_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"][0]["field"], "email");
    }
}
