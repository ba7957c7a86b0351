use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug)]
pub struct ProjectInsert {
    pub client_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub skills: Vec<String>,
    pub budget_type: String,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub budget_currency: String,
    pub duration_value: Option<i32>,
    pub duration_unit: String,
    pub experience_level: String,
    pub location_type: String,
    pub location_city: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub visibility: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub category: Option<String>,
    pub experience_level: Option<String>,
    pub skills: Vec<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl ProjectFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit
    }
}

#[derive(Debug)]
pub struct ApplicationInsert {
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub cover_letter: String,
    pub proposed_budget: Option<i64>,
    pub proposed_duration: Option<i32>,
}

#[derive(Debug)]
pub struct MilestoneInsert {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: i64,
    pub due_date: Option<DateTime<Utc>>,
}
