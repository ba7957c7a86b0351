use chrono::{DateTime, Utc};
use db::{
    dtos::course::CourseFilter,
    models::{
        course::{Chapter, Course},
        enrollment::Enrollment,
        user::UserCard,
    },
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 12;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub level: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl From<CatalogQuery> for CourseFilter {
    fn from(query: CatalogQuery) -> Self {
        CourseFilter {
            category: query.category.filter(|c| !c.is_empty()),
            level: query.level.filter(|l| !l.is_empty()),
            min_price: query.min_price,
            max_price: query.max_price,
            search: query.search,
            sort: query.sort,
            page: query.page.unwrap_or(1).max(1),
            limit: query
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// Body of `POST /courses`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub short_description: Option<String>,
    #[serde(default)]
    pub category: String,
    pub subcategory: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub thumbnail: Option<String>,
    pub preview_video: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub price: i64,
    pub currency: Option<String>,
    pub discount_percentage: Option<i32>,
    pub discount_valid_until: Option<DateTime<Utc>>,
    pub level: Option<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
    pub language: Option<String>,
    pub has_certificate: Option<bool>,
    pub status: Option<String>,
    pub is_featured: Option<bool>,
    pub featured_order: Option<i32>,
}

/// Body of `PUT /courses/{id}`; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub tags: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    pub preview_video: Option<String>,
    pub chapters: Option<Vec<Chapter>>,
    pub price: Option<i64>,
    pub currency: Option<String>,
    pub discount_percentage: Option<i32>,
    pub discount_valid_until: Option<DateTime<Utc>>,
    pub level: Option<String>,
    pub prerequisites: Option<Vec<String>>,
    pub learning_outcomes: Option<Vec<String>>,
    pub language: Option<String>,
    pub has_certificate: Option<bool>,
    pub status: Option<String>,
    pub is_featured: Option<bool>,
    pub featured_order: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    #[serde(flatten)]
    pub course: Course,
    pub final_price: i64,
    pub formatted_duration: String,
    pub instructor: Option<UserCard>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub progress: i32,
    pub completed_lessons: Vec<String>,
    pub completed: bool,
    pub last_chapter_index: i32,
    pub last_lesson_index: i32,
    pub last_accessed_at: DateTime<Utc>,
}

impl From<Enrollment> for UserProgress {
    fn from(enrollment: Enrollment) -> Self {
        UserProgress {
            progress: enrollment.progress,
            completed_lessons: enrollment.completed_lessons,
            completed: enrollment.completed,
            last_chapter_index: enrollment.last_chapter_index,
            last_lesson_index: enrollment.last_lesson_index,
            last_accessed_at: enrollment.last_accessed_at,
        }
    }
}

/// `GET /courses/{slug}` body, next to `success`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    pub data: CourseView,
    pub is_enrolled: bool,
    pub user_progress: Option<UserProgress>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstructorStats {
    pub total_courses: usize,
    pub published_courses: usize,
    pub draft_courses: usize,
    pub total_students: i64,
    /// Estimate: students times list price, minor units.
    pub total_revenue: i64,
    pub avg_rating: f64,
}
