use std::fmt;

use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

pub const CATEGORIES: [&str; 9] = [
    "developpement-web",
    "developpement-mobile",
    "design",
    "marketing-digital",
    "data-science",
    "business",
    "langues",
    "soft-skills",
    "autre",
];
pub const LEVELS: [&str; 4] = ["debutant", "intermediaire", "avance", "expert"];
pub const LANGUAGES: [&str; 4] = ["fr", "ar", "en", "darija"];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Pending,
    Published,
    Archived,
}
impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Pending => "pending",
            CourseStatus::Published => "published",
            CourseStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Res<Self> {
        match s {
            "draft" => Ok(CourseStatus::Draft),
            "pending" => Ok(CourseStatus::Pending),
            "published" => Ok(CourseStatus::Published),
            "archived" => Ok(CourseStatus::Archived),
            other => Err(AppError::BadRequest(format!(
                "Invalid course status: {}",
                other
            ))),
        }
    }
}
impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub video_duration: i64,
    #[serde(default)]
    pub resources: Vec<Resource>,
    pub order: i32,
    #[serde(default)]
    pub is_free: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    pub order: i32,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub tags: Vec<String>,
    pub thumbnail: String,
    pub preview_video: Option<String>,
    pub instructor_id: Uuid,
    pub chapters: Json<Vec<Chapter>>,
    /// Minor currency units.
    pub price: i64,
    pub currency: String,
    pub discount_percentage: Option<i32>,
    pub discount_valid_until: Option<DateTime<Utc>>,
    pub students_count: i32,
    pub lessons_count: i32,
    /// Minutes.
    pub total_duration: i32,
    pub rating: f64,
    pub reviews_count: i32,
    pub level: String,
    pub prerequisites: Vec<String>,
    pub learning_outcomes: Vec<String>,
    pub language: String,
    pub has_certificate: bool,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub featured_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course as shown in listings: no chapters, with the instructor's name.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCard {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub short_description: Option<String>,
    pub category: String,
    pub level: String,
    pub language: String,
    pub thumbnail: String,
    pub price: i64,
    pub currency: String,
    pub discount_percentage: Option<i32>,
    pub discount_valid_until: Option<DateTime<Utc>>,
    pub students_count: i32,
    pub lessons_count: i32,
    pub total_duration: i32,
    pub rating: f64,
    pub reviews_count: i32,
    pub status: String,
    pub is_featured: bool,
    pub instructor_id: Uuid,
    pub instructor_first_name: String,
    pub instructor_last_name: String,
    pub instructor_avatar: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: String,
    pub count: i64,
    pub avg_price: f64,
    pub avg_rating: f64,
}

impl Course {
    pub fn status(&self) -> Res<CourseStatus> {
        CourseStatus::from_str(&self.status)
    }

    pub fn final_price(&self, now: DateTime<Utc>) -> i64 {
        discounted_price(
            self.price,
            self.discount_percentage,
            self.discount_valid_until,
            now,
        )
    }

    pub fn lesson_ids(&self) -> Vec<String> {
        self.chapters
            .iter()
            .flat_map(|c| c.lessons.iter())
            .map(|l| l.id.to_string())
            .collect()
    }

    pub fn has_lesson(&self, lesson_id: &str) -> bool {
        self.chapters
            .iter()
            .flat_map(|c| c.lessons.iter())
            .any(|l| l.id.to_string() == lesson_id)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.total_duration)
    }
}

/// Price after a discount that is still valid at `now`, rounded to minor units.
pub fn discounted_price(
    price: i64,
    percentage: Option<i32>,
    valid_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    match (percentage, valid_until) {
        (Some(pct), Some(until)) if pct > 0 && until > now => {
            let pct = pct.clamp(0, 100) as i64;
            (price * (100 - pct) + 50) / 100
        }
        _ => price,
    }
}

/// Lesson count and total duration in minutes.
pub fn compute_stats(chapters: &[Chapter]) -> (i32, i32) {
    let lessons = chapters.iter().flat_map(|c| c.lessons.iter());
    let (count, seconds) = lessons.fold((0i32, 0i64), |(n, secs), l| {
        (n + 1, secs + l.video_duration.max(0))
    });
    (count, ((seconds + 30) / 60) as i32)
}

/// Hides video URLs of lessons that are not free previews.
pub fn mask_videos(chapters: &[Chapter]) -> Vec<Chapter> {
    chapters
        .iter()
        .map(|chapter| Chapter {
            lessons: chapter
                .lessons
                .iter()
                .map(|lesson| Lesson {
                    video_url: if lesson.is_free {
                        lesson.video_url.clone()
                    } else {
                        None
                    },
                    ..lesson.clone()
                })
                .collect(),
            ..chapter.clone()
        })
        .collect()
}

pub fn format_duration(minutes: i32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{}h {}min", hours, rest)
    } else {
        format!("{} min", rest)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn lesson(duration: i64, is_free: bool) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            title: "Intro".into(),
            description: None,
            video_url: Some("https://cdn.skillup.ma/v/1.mp4".into()),
            video_duration: duration,
            resources: vec![],
            order: 1,
            is_free,
        }
    }

    fn chapter(lessons: Vec<Lesson>) -> Chapter {
        Chapter {
            id: Uuid::new_v4(),
            title: "Bases".into(),
            description: None,
            lessons,
            order: 1,
        }
    }

    #[test]
    fn discount_applies_only_while_valid() {
        let now = Utc::now();
        assert_eq!(
            discounted_price(49_900, Some(20), Some(now + Duration::days(1)), now),
            39_920
        );
        assert_eq!(
            discounted_price(49_900, Some(20), Some(now - Duration::days(1)), now),
            49_900
        );
        assert_eq!(discounted_price(49_900, Some(0), None, now), 49_900);
        assert_eq!(
            discounted_price(10_000, Some(100), Some(now + Duration::hours(1)), now),
            0
        );
    }

    #[test]
    fn discount_rounds_to_minor_units() {
        let now = Utc::now();
        // 333 * 0.85 = 283.05
        assert_eq!(
            discounted_price(333, Some(15), Some(now + Duration::days(1)), now),
            283
        );
        // 999 * 0.5 = 499.5
        assert_eq!(
            discounted_price(999, Some(50), Some(now + Duration::days(1)), now),
            500
        );
    }

    #[test]
    fn stats_count_lessons_and_minutes() {
        let chapters = vec![
            chapter(vec![lesson(600, false), lesson(290, true)]),
            chapter(vec![lesson(0, false)]),
        ];
        assert_eq!(compute_stats(&chapters), (3, 15));
        assert_eq!(compute_stats(&[]), (0, 0));
    }

    #[test]
    fn masks_paid_lessons_only() {
        let chapters = vec![chapter(vec![lesson(60, true), lesson(60, false)])];
        let masked = mask_videos(&chapters);
        assert!(masked[0].lessons[0].video_url.is_some());
        assert!(masked[0].lessons[1].video_url.is_none());
        assert_eq!(masked[0].lessons[1].title, chapters[0].lessons[1].title);
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(135), "2h 15min");
        assert_eq!(format_duration(45), "45 min");
    }

    #[test]
    fn lesson_ids_default_when_missing() {
        let json = r#"[{"title":"C1","order":1,"lessons":[{"title":"L1","order":1}]}]"#;
        let chapters: Vec<Chapter> = serde_json::from_str(json).unwrap();
        assert!(!chapters[0].lessons[0].id.is_nil());
        assert!(!chapters[0].lessons[0].is_free);
    }
}
