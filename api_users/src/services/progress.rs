use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use db::models::{
    course::Course,
    enrollment::{
        Enrollment, certificate_number, mark_lesson, progress_percentage, unmark_lesson,
    },
};
use sqlx::PgPool;
use uuid::Uuid;

/// Lesson set and completion state after a change, ready to be stored.
#[derive(Debug, PartialEq)]
pub struct ProgressChange {
    pub completed_lessons: Vec<String>,
    pub progress: i32,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only when this change completes the course for the first time.
    pub certificate: Option<String>,
}

/// Adds or removes `lesson_id` and recomputes the percentage.
/// Reaching 100% on an enrollment that was never completed issues a certificate.
pub fn toggle_lesson(
    enrollment: &Enrollment,
    total_lessons: usize,
    lesson_id: &str,
    completed: bool,
    now: DateTime<Utc>,
) -> ProgressChange {
    let mut lessons = enrollment.completed_lessons.clone();
    if completed {
        mark_lesson(&mut lessons, lesson_id);
    } else {
        unmark_lesson(&mut lessons, lesson_id);
    }
    let progress = progress_percentage(lessons.len(), total_lessons);

    let (completed_at, certificate) = match enrollment.completed_at {
        Some(at) => (Some(at), None),
        None if progress >= 100 => (
            Some(now),
            Some(certificate_number(enrollment.user_id, now)),
        ),
        None => (None, None),
    };

    ProgressChange {
        completed_lessons: lessons,
        progress,
        completed_at,
        certificate,
    }
}

fn ensure_lesson(course: &Course, lesson_id: &str) -> Res<()> {
    if course.has_lesson(lesson_id) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Lesson {} does not belong to this course",
            lesson_id
        )))
    }
}

/// Course by slug and the caller's active enrollment in it.
pub async fn get_learning(pool: &PgPool, user_id: Uuid, slug: &str) -> Res<(Course, Enrollment)> {
    let course = db::course::get_course_by_slug(pool, slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;
    let enrollment = db::enrollment::get_enrollment(pool, user_id, course.id)
        .await?
        .filter(|e| e.is_active())
        .ok_or_else(|| AppError::Forbidden("You must purchase this course".to_string()))?;
    Ok((course, enrollment))
}

/// Marks or unmarks a lesson, completing the enrollment and recording the
/// certificate when the course is finished.
pub async fn set_lesson_state(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    lesson_id: &str,
    completed: bool,
) -> Res<Enrollment> {
    let course = db::course::get_course_by_id(pool, course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;
    ensure_lesson(&course, lesson_id)?;

    let mut tx = pool.begin().await?;
    let enrollment = db::enrollment::get_enrollment_for_update(&mut *tx, user_id, course_id)
        .await?
        .filter(|e| e.is_active())
        .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

    let change = toggle_lesson(
        &enrollment,
        course.lesson_ids().len(),
        lesson_id,
        completed,
        Utc::now(),
    );
    let certificate = match &change.certificate {
        Some(number) => {
            match db::enrollment::insert_certification(&mut *tx, user_id, course_id, number)
                .await?
            {
                Some(issued) => {
                    log::info!("Certificate {} issued to {} for {}", number, user_id, course.slug);
                    Some(issued.certificate_number)
                }
                // finished before a refund and re-enrollment: the first certificate stands
                None => db::enrollment::get_certification(&mut *tx, user_id, course_id)
                    .await?
                    .map(|c| c.certificate_number),
            }
        }
        None => None,
    };
    let saved = db::enrollment::save_progress(
        &mut *tx,
        enrollment.id,
        &change.completed_lessons,
        change.progress,
        change.completed_at,
        certificate.as_deref(),
    )
    .await?;
    tx.commit().await?;
    Ok(saved)
}

/// Records a finished lesson from the player together with the resume position.
pub async fn complete_lesson(
    pool: &PgPool,
    course: &Course,
    enrollment: &Enrollment,
    lesson_id: &str,
    chapter_index: i32,
    lesson_index: i32,
) -> Res<Enrollment> {
    ensure_lesson(course, lesson_id)?;

    let mut tx = pool.begin().await?;
    let current = db::enrollment::get_enrollment_for_update(
        &mut *tx,
        enrollment.user_id,
        enrollment.course_id,
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

    let mut lessons = current.completed_lessons.clone();
    mark_lesson(&mut lessons, lesson_id);
    let progress = progress_percentage(lessons.len(), course.lesson_ids().len());

    db::enrollment::save_position(&mut *tx, current.id, chapter_index, lesson_index).await?;
    let saved = db::enrollment::save_progress(
        &mut *tx,
        current.id,
        &lessons,
        progress,
        current.completed_at,
        None,
    )
    .await?;
    tx.commit().await?;
    Ok(saved)
}
