use chrono::{DateTime, Utc};
use db::{
    dtos::user::ProfileUpdate,
    models::{
        enrollment::{CertificationView, EnrolledCourse, Enrollment},
        payment::PaymentView,
        user::{Profile, Skill, User},
    },
};
use serde::{Deserialize, Serialize};

/// Body of `PUT /users/profile`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub skills: Option<Vec<Skill>>,
    pub marketing_consent: Option<bool>,
}

impl From<ProfileRequest> for ProfileUpdate {
    fn from(req: ProfileRequest) -> Self {
        let trimmed = |value: Option<String>| value.map(|v| v.trim().to_string());
        ProfileUpdate {
            first_name: trimmed(req.first_name),
            last_name: trimmed(req.last_name),
            avatar: req.avatar,
            bio: trimmed(req.bio),
            phone: trimmed(req.phone),
            city: trimmed(req.city),
            country: trimmed(req.country),
            skills: req.skills,
            marketing_consent: req.marketing_consent,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: User,
    pub enrollments_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCheck {
    pub is_enrolled: bool,
    pub enrollment: Option<Enrollment>,
}

/// Body of `PUT /users/courses/{courseId}/progress`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonToggle {
    pub lesson_id: String,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub progress: i32,
    pub completed_lessons: Vec<String>,
    pub completed: bool,
    pub certificate_id: Option<String>,
}

impl From<Enrollment> for ProgressSummary {
    fn from(enrollment: Enrollment) -> Self {
        ProgressSummary {
            progress: enrollment.progress,
            completed_lessons: enrollment.completed_lessons,
            completed: enrollment.completed,
            certificate_id: enrollment.certificate_id,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FreelanceStats {
    pub completed_projects: i32,
    pub rating: f64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub courses_in_progress: usize,
    pub courses_completed: usize,
    pub certifications_count: usize,
    pub average_progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freelance: Option<FreelanceStats>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreelanceProfile {
    pub is_freelancer: bool,
    pub title: Option<String>,
    pub hourly_rate: Option<i64>,
    pub completed_projects: i32,
    pub rating: f64,
}

/// Everything stored about the caller, for `GET /users/export-data`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    pub profile: Profile,
    pub email: String,
    pub enrolled_courses: Vec<EnrolledCourse>,
    pub certifications: Vec<CertificationView>,
    pub payments: Vec<PaymentView>,
    pub skills: Vec<Skill>,
    pub freelance_profile: FreelanceProfile,
    pub data_consent: bool,
    pub marketing_consent: bool,
    pub consent_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub exported_at: DateTime<Utc>,
}
