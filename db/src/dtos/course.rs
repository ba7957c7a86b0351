use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::course::Chapter;

/// Every editable column of a course. Derived stats are computed on save.
#[derive(Debug, Clone)]
pub struct CourseData {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub tags: Vec<String>,
    pub thumbnail: Option<String>,
    pub preview_video: Option<String>,
    pub chapters: Vec<Chapter>,
    pub price: i64,
    pub currency: String,
    pub discount_percentage: Option<i32>,
    pub discount_valid_until: Option<DateTime<Utc>>,
    pub level: String,
    pub prerequisites: Vec<String>,
    pub learning_outcomes: Vec<String>,
    pub language: String,
    pub has_certificate: bool,
    pub status: String,
    pub is_featured: bool,
    pub featured_order: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub category: Option<String>,
    pub level: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl CourseFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit
    }
}

pub struct CourseInsert {
    pub instructor_id: Uuid,
    pub data: CourseData,
}
