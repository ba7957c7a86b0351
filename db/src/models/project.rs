use std::fmt;

use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PROJECT_CATEGORIES: [&str; 10] = [
    "developpement-web",
    "developpement-mobile",
    "design-graphique",
    "ui-ux",
    "marketing-digital",
    "redaction",
    "traduction",
    "video-animation",
    "data-analysis",
    "autre",
];
pub const EXPERIENCE_LEVELS: [&str; 3] = ["entry", "intermediate", "expert"];
pub const LOCATION_TYPES: [&str; 3] = ["remote", "onsite", "hybrid"];
pub const BUDGET_TYPES: [&str; 2] = ["fixed", "hourly"];
pub const DURATION_UNITS: [&str; 3] = ["days", "weeks", "months"];
pub const VISIBILITIES: [&str; 3] = ["public", "invite_only", "private"];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Open,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}
impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Open => "open",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
            ProjectStatus::Disputed => "disputed",
        }
    }

    pub fn from_str(s: &str) -> Res<Self> {
        match s {
            "draft" => Ok(ProjectStatus::Draft),
            "open" => Ok(ProjectStatus::Open),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            "disputed" => Ok(ProjectStatus::Disputed),
            other => Err(AppError::BadRequest(format!(
                "Invalid project status: {}",
                other
            ))),
        }
    }
}
impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}
impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Submitted,
    Approved,
    Paid,
}
impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Submitted => "submitted",
            MilestoneStatus::Approved => "approved",
            MilestoneStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Res<Self> {
        match s {
            "pending" => Ok(MilestoneStatus::Pending),
            "in_progress" => Ok(MilestoneStatus::InProgress),
            "submitted" => Ok(MilestoneStatus::Submitted),
            "approved" => Ok(MilestoneStatus::Approved),
            "paid" => Ok(MilestoneStatus::Paid),
            other => Err(AppError::BadRequest(format!(
                "Invalid milestone status: {}",
                other
            ))),
        }
    }

    /// The only status a milestone may move to from this one.
    pub fn next(&self) -> Option<MilestoneStatus> {
        match self {
            MilestoneStatus::Pending => Some(MilestoneStatus::InProgress),
            MilestoneStatus::InProgress => Some(MilestoneStatus::Submitted),
            MilestoneStatus::Submitted => Some(MilestoneStatus::Approved),
            MilestoneStatus::Approved => Some(MilestoneStatus::Paid),
            MilestoneStatus::Paid => None,
        }
    }

    /// Work transitions belong to the freelancer, acceptance and payment to the client.
    pub fn moved_by_client(&self) -> bool {
        matches!(self, MilestoneStatus::Approved | MilestoneStatus::Paid)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub client_id: Uuid,
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
    pub location_country: String,
    pub selected_freelancer_id: Option<Uuid>,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub visibility: String,
    pub views: i32,
    pub applications_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn status(&self) -> Res<ProjectStatus> {
        ProjectStatus::from_str(&self.status)
    }
}

/// Project with its client's public card.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_avatar: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub cover_letter: String,
    pub proposed_budget: Option<i64>,
    pub proposed_duration: Option<i32>,
    pub status: String,
    pub applied_at: DateTime<Utc>,
}

/// Application with the freelancer's public profile, as shown to the project owner.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: Uuid,
    pub freelancer_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
    pub freelance_title: Option<String>,
    pub hourly_rate: Option<i64>,
    pub freelance_rating: f64,
    pub cover_letter: String,
    pub proposed_budget: Option<i64>,
    pub proposed_duration: Option<i32>,
    pub status: String,
    pub applied_at: DateTime<Utc>,
}

/// A freelancer's application together with the project it targets.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyApplication {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub application: Application,
    pub project_title: String,
    pub project_category: String,
    pub project_status: String,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub budget_currency: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: i64,
    pub due_date: Option<DateTime<Utc>>,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Milestone {
    pub fn status(&self) -> Res<MilestoneStatus> {
        MilestoneStatus::from_str(&self.status)
    }
}

/// Outcome of accepting `accepted` among a project's applications:
/// the accepted one and every other still-pending one to reject.
pub fn resolve_acceptance(
    applications: &[Application],
    accepted: Uuid,
) -> Res<(Uuid, Vec<Uuid>)> {
    let chosen = applications
        .iter()
        .find(|a| a.id == accepted)
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
    if chosen.status != ApplicationStatus::Pending.as_str() {
        return Err(AppError::BadRequest(
            "Only pending applications can be accepted".to_string(),
        ));
    }
    let rejected = applications
        .iter()
        .filter(|a| a.id != accepted && a.status == ApplicationStatus::Pending.as_str())
        .map(|a| a.id)
        .collect();
    Ok((chosen.freelancer_id, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(status: &str) -> Application {
        Application {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            freelancer_id: Uuid::new_v4(),
            cover_letter: "Bonjour".into(),
            proposed_budget: None,
            proposed_duration: None,
            status: status.into(),
            applied_at: Utc::now(),
        }
    }

    #[test]
    fn acceptance_rejects_other_pending_applications() {
        let apps = vec![
            application("pending"),
            application("pending"),
            application("withdrawn"),
        ];
        let (freelancer, rejected) = resolve_acceptance(&apps, apps[1].id).unwrap();
        assert_eq!(freelancer, apps[1].freelancer_id);
        assert_eq!(rejected, vec![apps[0].id]);
    }

    #[test]
    fn acceptance_requires_pending_application() {
        let apps = vec![application("rejected")];
        assert!(resolve_acceptance(&apps, apps[0].id).is_err());
        assert!(resolve_acceptance(&apps, Uuid::new_v4()).is_err());
    }

    #[test]
    fn milestones_move_forward_one_step() {
        assert_eq!(
            MilestoneStatus::Pending.next(),
            Some(MilestoneStatus::InProgress)
        );
        assert_eq!(MilestoneStatus::Paid.next(), None);
        assert!(MilestoneStatus::Approved.moved_by_client());
        assert!(!MilestoneStatus::Submitted.moved_by_client());
    }
}
