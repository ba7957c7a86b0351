use chrono::{DateTime, Utc};
use db::{
    dtos::project::ProjectFilter,
    models::{
        project::{Application, ApplicationView, Milestone, ProjectListing},
        user::Skill,
    },
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 12;
pub const MAX_PAGE_SIZE: i64 = 50;

/// Query of `GET /freelance/projects`. `skills` is comma-separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardQuery {
    pub category: Option<String>,
    pub experience_level: Option<String>,
    pub skills: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl From<BoardQuery> for ProjectFilter {
    fn from(query: BoardQuery) -> Self {
        ProjectFilter {
            category: query.category.filter(|c| !c.is_empty()),
            experience_level: query.experience_level.filter(|l| !l.is_empty()),
            skills: query
                .skills
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            budget_min: query.budget_min,
            budget_max: query.budget_max,
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

/// Body of `POST /freelance/projects`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub budget_type: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub budget_currency: Option<String>,
    pub duration_value: Option<i32>,
    pub duration_unit: Option<String>,
    pub experience_level: Option<String>,
    pub location_type: Option<String>,
    pub location_city: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub visibility: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: ProjectListing,
    /// Owner only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications: Option<Vec<ApplicationView>>,
    /// Owner and selected freelancer only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestones: Option<Vec<Milestone>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub data: ProjectView,
    pub has_applied: bool,
    pub user_application: Option<Application>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub cover_letter: Option<String>,
    pub proposed_budget: Option<i64>,
    pub proposed_duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub amount: i64,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateProfileRequest {
    pub title: Option<String>,
    pub hourly_rate: Option<i64>,
    pub skills: Option<Vec<Skill>>,
}
