use actix_web::{
    HttpResponse,
    cookie::{Cookie, SameSite, time::Duration as CookieDuration},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use common::{
    env_config::Config,
    error::{AppError, Res},
};
use db::models::user::User;
use sqlx::PgPool;

/// Consecutive failed logins that lock the account.
pub const MAX_LOGIN_ATTEMPTS: i32 = 5;
pub const LOCK_DURATION_HOURS: i64 = 2;

const TOKEN_COOKIE: &str = "token";

pub fn hash_password(password: &str) -> Res<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> Res<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Attempt counter and lock deadline after one more failed login.
/// A lock that has already expired starts a fresh count.
pub fn next_failure(
    attempts: i32,
    lock_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (i32, Option<DateTime<Utc>>) {
    if lock_until.is_some_and(|until| until <= now) {
        return (1, None);
    }
    let attempts = attempts + 1;
    if attempts >= MAX_LOGIN_ATTEMPTS && lock_until.is_none() {
        (attempts, Some(now + Duration::hours(LOCK_DURATION_HOURS)))
    } else {
        (attempts, lock_until)
    }
}

/// Whole minutes left before `lock_until`, rounded up.
pub fn minutes_until(lock_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (lock_until - now).num_seconds().max(0);
    (seconds + 59) / 60
}

/// Authenticates existing user.
/// Unknown email or wrong password returns 401, a locked account 423.
/// Failed attempts are counted towards the lockout.
pub async fn authenticate_user(pool: &PgPool, email: &str, password: &str) -> Res<User> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());
    let (user, credentials) = db::user::get_user_with_password_hash(pool, email)
        .await?
        .ok_or_else(invalid)?;

    let now = Utc::now();
    if let Some(lock_until) = user.lock_until.filter(|until| *until > now) {
        return Err(AppError::Locked(format!(
            "Account locked, retry in {} minutes",
            minutes_until(lock_until, now)
        )));
    }

    if !verify_password(password, &credentials.password_hash)? {
        let (attempts, lock_until) = next_failure(user.login_attempts, user.lock_until, now);
        db::user::record_login_failure(pool, user.id, attempts, lock_until).await?;
        if lock_until.is_some() {
            log::warn!("Account {} locked after {} failed logins", user.id, attempts);
        }
        return Err(invalid());
    }

    if !user.is_active {
        return Err(AppError::Unauthorized("Account deactivated".to_string()));
    }

    db::user::record_login_success(pool, user.id, now).await?;
    Ok(user)
}

/// Session cookie holding the JWT.
pub fn token_cookie(token: &str, config: &Config) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(config.is_production())
        .max_age(CookieDuration::days(config.jwt_config.cookie_expire_days))
        .finish()
}

/// Overwrites the session cookie with `none`, expiring in 10 seconds.
pub fn clear_token_cookie(config: &Config) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, "none")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(config.is_production())
        .max_age(CookieDuration::seconds(10))
        .finish()
}

pub fn with_cookie(mut response: HttpResponse, cookie: &Cookie<'_>) -> Res<HttpResponse> {
    response
        .add_cookie(cookie)
        .map_err(|e| AppError::Internal(format!("Failed to set cookie: {}", e)))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_differs_from_plaintext_and_verifies() {
        let hash = hash_password("Secret123").unwrap();
        assert_ne!(hash, "Secret123");
        assert!(verify_password("Secret123", &hash).unwrap());
        assert!(!verify_password("secret123", &hash).unwrap());
    }

    #[test]
    fn fifth_failure_locks_for_two_hours() {
        let now = Utc::now();
        assert_eq!(next_failure(0, None, now), (1, None));
        assert_eq!(next_failure(3, None, now), (4, None));
        let (attempts, lock) = next_failure(4, None, now);
        assert_eq!(attempts, 5);
        assert_eq!(lock, Some(now + Duration::hours(2)));
    }

    #[test]
    fn expired_lock_restarts_count() {
        let now = Utc::now();
        let expired = now - Duration::minutes(1);
        assert_eq!(next_failure(5, Some(expired), now), (1, None));
    }

    #[test]
    fn remaining_minutes_round_up() {
        let now = Utc::now();
        assert_eq!(minutes_until(now + Duration::seconds(61), now), 2);
        assert_eq!(minutes_until(now + Duration::hours(2), now), 120);
        assert_eq!(minutes_until(now - Duration::seconds(5), now), 0);
    }
}
