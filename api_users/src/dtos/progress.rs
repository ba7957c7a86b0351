use chrono::{DateTime, Utc};
use db::models::enrollment::Enrollment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resume position, body of `POST /progress/{slug}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRequest {
    #[serde(default)]
    pub last_chapter_index: i32,
    #[serde(default)]
    pub last_lesson_index: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonRequest {
    pub lesson_id: String,
    #[serde(default)]
    pub chapter_index: i32,
    #[serde(default)]
    pub lesson_index: i32,
}

/// Progress of the caller on one course.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub course_id: Uuid,
    pub completed_lessons: Vec<String>,
    pub last_chapter_index: i32,
    pub last_lesson_index: i32,
    pub last_accessed_at: DateTime<Utc>,
    pub progress: i32,
    pub completed: bool,
}

impl From<Enrollment> for ProgressView {
    fn from(enrollment: Enrollment) -> Self {
        ProgressView {
            course_id: enrollment.course_id,
            completed_lessons: enrollment.completed_lessons,
            last_chapter_index: enrollment.last_chapter_index,
            last_lesson_index: enrollment.last_lesson_index,
            last_accessed_at: enrollment.last_accessed_at,
            progress: enrollment.progress,
            completed: enrollment.completed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LessonCompleted {
    pub data: ProgressView,
    pub percentage: i32,
}
