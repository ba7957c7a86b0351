use chrono::{Duration, Utc};
use common::{
    error::{AppError, Res},
    misc::{Role, generate_token, hash_token},
    validation::Validator,
};
use db::{
    dtos::user::UserCreateRequest,
    models::user::{AuthCredentials, User},
};
use mailer::Mailer;
use sqlx::PgPool;

use crate::{dtos::auth::RegisterRequest, services::auth::hash_password};

pub const VERIFICATION_TTL_HOURS: i64 = 24;
pub const RESET_TTL_HOURS: i64 = 1;

pub fn validate_registration(req: &RegisterRequest) -> Res<()> {
    Validator::new()
        .email("email", &req.email)
        .password("password", &req.password)
        .required("firstName", &req.first_name, 50)
        .required("lastName", &req.last_name, 50)
        .check(
            req.data_consent,
            "dataConsent",
            "Consent to data processing is required",
        )
        .finish()
}

/// Inserts user record and credentials to the database, then mails the
/// verification link. A mail failure does not undo the registration.
pub async fn create_user_with_credentials(
    pool: &PgPool,
    mailer: &Mailer,
    req: &RegisterRequest,
) -> Res<User> {
    let email = req.email.trim().to_lowercase();
    if db::user::exists_user_by_email(pool, &email).await? {
        return Err(AppError::BadRequest("Email already in use".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let verification_token = generate_token();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let user = db::user::insert_user(
        &mut *tx,
        UserCreateRequest {
            email,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            role: Role::Student,
            data_consent: req.data_consent,
            marketing_consent: req.marketing_consent,
            consent_date: req.data_consent.then_some(now),
        },
    )
    .await?;
    db::user::insert_user_with_credentials(
        &mut *tx,
        AuthCredentials {
            user_id: user.id,
            password_hash,
        },
    )
    .await?;
    db::user::set_email_verification_token(
        &mut *tx,
        user.id,
        &hash_token(&verification_token),
        now + Duration::hours(VERIFICATION_TTL_HOURS),
    )
    .await?;
    tx.commit().await?;

    if let Err(e) = mailer
        .send_verification(&user.email, &user.first_name, &verification_token)
        .await
    {
        log::error!("Verification email to {} failed: {}", user.email, e);
    }

    Ok(user)
}

/// Issues a new verification token and mails it.
pub async fn resend_verification(pool: &PgPool, mailer: &Mailer, user: &User) -> Res<()> {
    if user.is_email_verified {
        return Err(AppError::BadRequest("Email already verified".to_string()));
    }
    let token = generate_token();
    db::user::set_email_verification_token(
        pool,
        user.id,
        &hash_token(&token),
        Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS),
    )
    .await?;
    mailer
        .send_verification(&user.email, &user.first_name, &token)
        .await
}

/// Stores a reset token for `email` and mails it. Unknown emails are ignored.
pub async fn request_password_reset(pool: &PgPool, mailer: &Mailer, email: &str) -> Res<()> {
    let Some(user) = db::user::get_user_by_email(pool, email.trim()).await? else {
        log::debug!("Password reset requested for unknown email");
        return Ok(());
    };

    let token = generate_token();
    db::user::set_reset_password_token(
        pool,
        user.id,
        Some(&hash_token(&token)),
        Some(Utc::now() + Duration::hours(RESET_TTL_HOURS)),
    )
    .await?;

    if let Err(e) = mailer
        .send_password_reset(&user.email, &user.first_name, &token)
        .await
    {
        log::error!("Password reset email to {} failed: {}", user.email, e);
        db::user::set_reset_password_token(pool, user.id, None, None).await?;
    }
    Ok(())
}

/// Consumes a reset token and stores the new password.
pub async fn reset_password(pool: &PgPool, token: &str, password: &str) -> Res<User> {
    let password_hash = hash_password(password)?;
    let mut tx = pool.begin().await?;
    let user = db::user::take_reset_password_token(&mut *tx, &hash_token(token), Utc::now())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired token".to_string()))?;
    db::user::update_password_hash(&mut *tx, user.id, &password_hash).await?;
    tx.commit().await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            email: "youssef@example.ma".into(),
            password: "Secret123".into(),
            first_name: "Youssef".into(),
            last_name: "Alaoui".into(),
            data_consent: true,
            marketing_consent: false,
        }
    }

    #[test]
    fn registration_requires_consent() {
        assert!(validate_registration(&request()).is_ok());
        let mut req = request();
        req.data_consent = false;
        match validate_registration(&req) {
            Err(AppError::Validation(errors)) => assert_eq!(errors[0].field, "dataConsent"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn registration_lists_every_bad_field() {
        let req = RegisterRequest {
            email: "nope".into(),
            password: "short".into(),
            first_name: "".into(),
            ..request()
        };
        match validate_registration(&req) {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"email"));
                assert!(fields.contains(&"password"));
                assert!(fields.contains(&"firstName"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
