use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::enrollment::{Certification, CertificationView, EnrolledCourse, Enrollment};

/// Enrolls the user once; returns `None` when an enrollment already exists.
pub async fn insert_enrollment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
    price_paid: i64,
    payment_method: &str,
) -> Res<Option<Enrollment>> {
    sqlx::query_as::<_, Enrollment>(
        r#"
        INSERT INTO enrollments (user_id, course_id, price_paid, payment_method)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, course_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(price_paid)
    .bind(payment_method)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_enrollment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
) -> Res<Option<Enrollment>> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Locks the enrollment row for the rest of the transaction.
pub async fn get_enrollment_for_update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
) -> Res<Option<Enrollment>> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn is_enrolled<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
) -> Res<bool> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM enrollments
            WHERE user_id = $1 AND course_id = $2 AND status = 'active'
        )
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn delete_enrollment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
) -> Res<bool> {
    let result = sqlx::query("DELETE FROM enrollments WHERE user_id = $1 AND course_id = $2")
        .bind(user_id)
        .bind(course_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Stores a recomputed lesson set together with its percentage and completion state.
pub async fn save_progress<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    enrollment_id: Uuid,
    completed_lessons: &[String],
    progress: i32,
    completed_at: Option<DateTime<Utc>>,
    certificate_id: Option<&str>,
) -> Res<Enrollment> {
    sqlx::query_as::<_, Enrollment>(
        r#"
        UPDATE enrollments SET
            completed_lessons = $2,
            progress = $3,
            completed = $4::timestamptz IS NOT NULL,
            completed_at = $4,
            certificate_id = COALESCE($5, certificate_id),
            last_accessed_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(enrollment_id)
    .bind(completed_lessons)
    .bind(progress)
    .bind(completed_at)
    .bind(certificate_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn save_position<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    enrollment_id: Uuid,
    chapter_index: i32,
    lesson_index: i32,
) -> Res<Enrollment> {
    sqlx::query_as::<_, Enrollment>(
        r#"
        UPDATE enrollments SET
            last_chapter_index = $2,
            last_lesson_index = $3,
            last_accessed_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(enrollment_id)
    .bind(chapter_index)
    .bind(lesson_index)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_enrolled_courses<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<EnrolledCourse>> {
    sqlx::query_as::<_, EnrolledCourse>(
        r#"
        SELECT e.course_id, c.title, c.slug, c.thumbnail, c.lessons_count, c.total_duration,
               e.progress, e.completed, e.completed_at, e.certificate_id,
               e.last_chapter_index, e.last_lesson_index, e.last_accessed_at, e.enrolled_at
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE e.user_id = $1 AND e.status = 'active'
        ORDER BY e.last_accessed_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_user_enrollments<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<Enrollment>> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = $1 ORDER BY enrolled_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn count_enrollments<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
) -> Res<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM enrollments")
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

/// Records the certificate; a second completion of the same course keeps the first one.
pub async fn insert_certification<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
    certificate_number: &str,
) -> Res<Option<Certification>> {
    sqlx::query_as::<_, Certification>(
        r#"
        INSERT INTO certifications (user_id, course_id, certificate_number)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, course_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(certificate_number)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_certification<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
) -> Res<Option<Certification>> {
    sqlx::query_as::<_, Certification>(
        "SELECT * FROM certifications WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_certifications<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<CertificationView>> {
    sqlx::query_as::<_, CertificationView>(
        r#"
        SELECT ce.certificate_number, ce.verified, ce.issued_at,
               c.id AS course_id, c.title AS course_title, c.slug AS course_slug
        FROM certifications ce
        JOIN courses c ON c.id = ce.course_id
        WHERE ce.user_id = $1
        ORDER BY ce.issued_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
