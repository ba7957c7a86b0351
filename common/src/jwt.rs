use actix_web::{HttpMessage, HttpResponse, dev::ServiceRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    env_config::JwtConfig,
    error::{AppError, Res},
    misc::Role,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub user_id: Uuid,
    pub role: String,
    pub exp: usize,
}

pub struct ClaimsSpec {
    pub user_id: Uuid,
    pub role: Role,
}

/// Generates JWT token based on user object and JWT configuration options
pub fn generate_jwt(spec: ClaimsSpec, config: &JwtConfig) -> Res<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.expiration_hours))
        .ok_or_else(|| AppError::Internal("JWT expiration overflow".to_string()))?
        .timestamp();

    let claims = JwtClaims {
        user_id: spec.user_id,
        role: spec.role.as_str().to_string(),
        exp: expiration as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(AppError::from)
}

/// Extracts claims object from JWT token.
/// Requires JWT secret.
pub fn validate_jwt(token: &str, secret: &str) -> Res<JwtClaims> {
    let token_data = jsonwebtoken::decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn get_jwt_claims_or_error(req: &ServiceRequest) -> Result<JwtClaims, HttpResponse> {
    if let Some(jwt_claims_res) = req.extensions().get::<Res<JwtClaims>>() {
        match jwt_claims_res {
            Ok(claims) => Ok(claims.clone()),
            Err(app_error) => Err(app_error.to_http_response()),
        }
    } else {
        Err(AppError::Unauthorized("Authentication required".to_string()).to_http_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(hours: i64) -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_hours: hours,
            cookie_expire_days: 7,
        }
    }

    #[test]
    fn token_round_trips_identity() {
        let user_id = Uuid::new_v4();
        let token = generate_jwt(
            ClaimsSpec {
                user_id,
                role: Role::Instructor,
            },
            &config(1),
        )
        .unwrap();
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, "instructor");
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let token = generate_jwt(
            ClaimsSpec {
                user_id: Uuid::new_v4(),
                role: Role::Student,
            },
            &config(-2),
        )
        .unwrap();
        let err = validate_jwt(&token, "test-secret").unwrap_err();
        assert_eq!(err.public_message(), "Session expired, please log in again");
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = generate_jwt(
            ClaimsSpec {
                user_id: Uuid::new_v4(),
                role: Role::Student,
            },
            &config(1),
        )
        .unwrap();
        let err = validate_jwt(&token, "other").unwrap_err();
        assert_eq!(err.public_message(), "Invalid token");
    }
}
