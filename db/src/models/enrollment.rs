use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub status: String,
    pub price_paid: i64,
    pub payment_method: String,
    pub progress: i32,
    pub completed_lessons: Vec<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub certificate_id: Option<String>,
    pub last_chapter_index: i32,
    pub last_lesson_index: i32,
    pub last_accessed_at: DateTime<Utc>,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Enrollment joined with the course card fields needed by dashboards.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub course_id: Uuid,
    pub title: String,
    pub slug: String,
    pub thumbnail: String,
    pub lessons_count: i32,
    pub total_duration: i32,
    pub progress: i32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub certificate_id: Option<String>,
    pub last_chapter_index: i32,
    pub last_lesson_index: i32,
    pub last_accessed_at: DateTime<Utc>,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub certificate_number: String,
    pub verified: bool,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationView {
    pub certificate_number: String,
    pub verified: bool,
    pub issued_at: DateTime<Utc>,
    pub course_id: Uuid,
    pub course_title: String,
    pub course_slug: String,
}

/// `round(100 * completed / total)`, 0 for a course without lessons.
pub fn progress_percentage(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let pct = ((completed.min(total) * 200 + total) / (2 * total)) as i32;
    pct.min(100)
}

/// Adds `lesson_id` to the completed set; returns false when already present.
pub fn mark_lesson(completed: &mut Vec<String>, lesson_id: &str) -> bool {
    if completed.iter().any(|l| l == lesson_id) {
        return false;
    }
    completed.push(lesson_id.to_string());
    true
}

/// Removes `lesson_id` from the completed set; returns false when absent.
pub fn unmark_lesson(completed: &mut Vec<String>, lesson_id: &str) -> bool {
    let before = completed.len();
    completed.retain(|l| l != lesson_id);
    completed.len() != before
}

/// Certificate number: `CERT-<unix millis>-<last 6 chars of the user id>`.
pub fn certificate_number(user_id: Uuid, issued_at: DateTime<Utc>) -> String {
    let id = user_id.simple().to_string().to_uppercase();
    format!("CERT-{}-{}", issued_at.timestamp_millis(), &id[id.len() - 6..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(progress_percentage(0, 0), 0);
        assert_eq!(progress_percentage(1, 3), 33);
        assert_eq!(progress_percentage(2, 3), 67);
        assert_eq!(progress_percentage(1, 8), 13);
        assert_eq!(progress_percentage(3, 3), 100);
        assert_eq!(progress_percentage(5, 3), 100);
    }

    #[test]
    fn marking_is_idempotent() {
        let mut done = vec![];
        assert!(mark_lesson(&mut done, "a"));
        assert!(!mark_lesson(&mut done, "a"));
        assert!(mark_lesson(&mut done, "b"));
        assert_eq!(done.len(), 2);
        assert!(unmark_lesson(&mut done, "a"));
        assert!(!unmark_lesson(&mut done, "a"));
        assert_eq!(done, vec!["b".to_string()]);
    }

    #[test]
    fn certificate_number_format() {
        let user_id = Uuid::parse_str("0f8fad5b-d9cb-469f-a165-70867728950e").unwrap();
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(
            certificate_number(user_id, at),
            "CERT-1700000000123-28950E"
        );
    }
}
