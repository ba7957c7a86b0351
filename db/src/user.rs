use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    dtos::user::{FreelanceActivation, ProfileUpdate, UserCreateRequest},
    models::user::{AuthCredentials, User, UserCard},
};

#[derive(sqlx::FromRow)]
struct UserWithHash {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

pub async fn exists_user_by_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email.to_lowercase())
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_user_by_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email.to_lowercase())
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_user_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_user_card<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<UserCard>> {
    sqlx::query_as::<_, UserCard>(
        "SELECT id, first_name, last_name, avatar FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: UserCreateRequest,
) -> Res<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, first_name, last_name, role, data_consent, marketing_consent, consent_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(data.email.to_lowercase())
    .bind(data.first_name)
    .bind(data.last_name)
    .bind(data.role.as_str())
    .bind(data.data_consent)
    .bind(data.marketing_consent)
    .bind(data.consent_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_user_with_credentials<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: AuthCredentials,
) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO auth_credentials (user_id, password_hash)
        VALUES ($1, $2)
        "#,
    )
    .bind(data.user_id)
    .bind(data.password_hash)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_user_with_password_hash<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<Option<(User, AuthCredentials)>> {
    let row = sqlx::query_as::<_, UserWithHash>(
        r#"
        SELECT u.*, ac.password_hash
        FROM users u
        JOIN auth_credentials ac ON u.id = ac.user_id
        WHERE u.email = $1
        "#,
    )
    .bind(email.to_lowercase())
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|record| {
        let credentials = AuthCredentials {
            user_id: record.user.id,
            password_hash: record.password_hash,
        };
        (record.user, credentials)
    }))
}

pub async fn get_password_hash<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<String> {
    sqlx::query_scalar("SELECT password_hash FROM auth_credentials WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn update_password_hash<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    password_hash: &str,
) -> Res<()> {
    sqlx::query("UPDATE auth_credentials SET password_hash = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn set_email_verification_token<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    token_hash: &str,
    expires: DateTime<Utc>,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET email_verification_token = $2, email_verification_expires = $3, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires)
    .execute(executor)
    .await?;
    Ok(())
}

/// Marks the owner of a still-valid verification token as verified.
pub async fn verify_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET is_email_verified = TRUE,
            email_verification_token = NULL,
            email_verification_expires = NULL,
            updated_at = now()
        WHERE email_verification_token = $1 AND email_verification_expires > $2
        RETURNING *
        "#,
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn set_reset_password_token<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    token_hash: Option<&str>,
    expires: Option<DateTime<Utc>>,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET reset_password_token = $2, reset_password_expires = $3, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires)
    .execute(executor)
    .await?;
    Ok(())
}

/// Consumes a still-valid reset token, returning its owner.
pub async fn take_reset_password_token<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET reset_password_token = NULL,
            reset_password_expires = NULL,
            login_attempts = 0,
            lock_until = NULL,
            updated_at = now()
        WHERE reset_password_token = $1 AND reset_password_expires > $2
        RETURNING *
        "#,
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn record_login_failure<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    attempts: i32,
    lock_until: Option<DateTime<Utc>>,
) -> Res<()> {
    sqlx::query("UPDATE users SET login_attempts = $2, lock_until = $3 WHERE id = $1")
        .bind(user_id)
        .bind(attempts)
        .bind(lock_until)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn record_login_success<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<()> {
    sqlx::query(
        "UPDATE users SET login_attempts = 0, lock_until = NULL, last_login = $2 WHERE id = $1",
    )
    .bind(user_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn set_stripe_customer_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    customer_id: &str,
) -> Res<()> {
    sqlx::query("UPDATE users SET stripe_customer_id = $2, updated_at = now() WHERE id = $1")
        .bind(user_id)
        .bind(customer_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn update_profile<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    data: ProfileUpdate,
) -> Res<User> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            avatar = COALESCE($4, avatar),
            bio = COALESCE($5, bio),
            phone = COALESCE($6, phone),
            city = COALESCE($7, city),
            country = COALESCE($8, country),
            skills = COALESCE($9, skills),
            marketing_consent = COALESCE($10, marketing_consent),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(data.first_name)
    .bind(data.last_name)
    .bind(data.avatar)
    .bind(data.bio)
    .bind(data.phone)
    .bind(data.city)
    .bind(data.country)
    .bind(data.skills.map(Json))
    .bind(data.marketing_consent)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn activate_freelance<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    data: FreelanceActivation,
) -> Res<User> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            is_freelancer = TRUE,
            freelance_title = $2,
            hourly_rate = $3,
            skills = COALESCE($4, skills),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(data.title)
    .bind(data.hourly_rate)
    .bind(data.skills.map(Json))
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn increment_completed_projects<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<()> {
    sqlx::query("UPDATE users SET completed_projects = completed_projects + 1 WHERE id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Replaces personal data with placeholders and deactivates the account.
pub async fn anonymize_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE users SET
            email = 'deleted_' || id::text || '@deleted.skillup.ma',
            first_name = 'Utilisateur',
            last_name = 'Supprimé',
            avatar = 'default-avatar.png',
            bio = NULL,
            phone = NULL,
            city = NULL,
            skills = '[]',
            freelance_title = NULL,
            is_freelancer = FALSE,
            email_verification_token = NULL,
            reset_password_token = NULL,
            stripe_customer_id = NULL,
            marketing_consent = FALSE,
            is_active = FALSE,
            deleted_at = $2,
            updated_at = $2
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn list_users<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    limit: i64,
) -> Res<Vec<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC LIMIT $1")
        .bind(limit)
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn update_role<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    role: &str,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(role)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn delete_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<()> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn count_users<'e, E: Executor<'e, Database = Postgres>>(executor: E) -> Res<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}
