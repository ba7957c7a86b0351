use chrono::Utc;
use common::{error::Res, validation::Validator};
use db::models::{enrollment::Enrollment, user::User};
use sqlx::PgPool;

use crate::dtos::user::{
    DashboardStats, DataExport, FreelanceProfile, FreelanceStats, ProfileRequest,
};

pub fn validate_profile(req: &ProfileRequest) -> Res<()> {
    let mut v = Validator::new();
    if let Some(first_name) = &req.first_name {
        v.required("firstName", first_name, 50);
    }
    if let Some(last_name) = &req.last_name {
        v.required("lastName", last_name, 50);
    }
    if let Some(bio) = &req.bio {
        v.check(bio.chars().count() <= 500, "bio", "Maximum 500 characters");
    }
    if let Some(phone) = &req.phone {
        v.check(
            phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-')),
            "phone",
            "Invalid phone number",
        );
    }
    if let Some(skills) = &req.skills {
        v.check(
            skills.iter().all(|s| !s.name.trim().is_empty()),
            "skills",
            "Skill names cannot be empty",
        );
    }
    v.finish()
}

pub fn dashboard_stats(
    user: &User,
    enrollments: &[Enrollment],
    certifications_count: usize,
) -> DashboardStats {
    let active: Vec<&Enrollment> = enrollments.iter().filter(|e| e.is_active()).collect();
    let completed = active.iter().filter(|e| e.completed).count();
    let average_progress = if active.is_empty() {
        0
    } else {
        let sum: i64 = active.iter().map(|e| e.progress as i64).sum();
        ((sum as f64) / (active.len() as f64)).round() as i32
    };

    DashboardStats {
        courses_in_progress: active.len() - completed,
        courses_completed: completed,
        certifications_count,
        average_progress,
        freelance: user.is_freelancer.then(|| FreelanceStats {
            completed_projects: user.completed_projects,
            rating: user.freelance_rating,
        }),
    }
}

/// Collects the caller's personal data.
pub async fn export_data(pool: &PgPool, user: &User) -> Res<DataExport> {
    let enrolled_courses = db::enrollment::list_enrolled_courses(pool, user.id).await?;
    let certifications = db::enrollment::list_certifications(pool, user.id).await?;
    let payments = db::payment::list_user_payments(pool, user.id).await?;

    Ok(DataExport {
        profile: user.profile(),
        email: user.email.clone(),
        enrolled_courses,
        certifications,
        payments,
        skills: user.skills.0.clone(),
        freelance_profile: FreelanceProfile {
            is_freelancer: user.is_freelancer,
            title: user.freelance_title.clone(),
            hourly_rate: user.hourly_rate,
            completed_projects: user.completed_projects,
            rating: user.freelance_rating,
        },
        data_consent: user.data_consent,
        marketing_consent: user.marketing_consent,
        consent_date: user.consent_date,
        created_at: user.created_at,
        exported_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use db::testing::{enrollment, user};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn dashboard_counts_active_enrollments() {
        let student = user("student");
        let mut done = enrollment(student.id, Uuid::new_v4());
        done.progress = 100;
        done.completed = true;
        let mut started = enrollment(student.id, Uuid::new_v4());
        started.progress = 33;
        let mut cancelled = enrollment(student.id, Uuid::new_v4());
        cancelled.status = "cancelled".into();
        cancelled.progress = 90;

        let stats = dashboard_stats(&student, &[done, started, cancelled], 1);
        assert_eq!(
            stats,
            DashboardStats {
                courses_in_progress: 1,
                courses_completed: 1,
                certifications_count: 1,
                average_progress: 67,
                freelance: None,
            }
        );
    }

    #[test]
    fn freelancers_get_their_numbers() {
        let freelancer = User {
            is_freelancer: true,
            completed_projects: 4,
            freelance_rating: 4.5,
            ..user("student")
        };
        let stats = dashboard_stats(&freelancer, &[], 0);
        assert_eq!(stats.average_progress, 0);
        assert_eq!(
            stats.freelance,
            Some(FreelanceStats {
                completed_projects: 4,
                rating: 4.5
            })
        );
    }

    #[test]
    fn profile_fields_are_checked() {
        let ok = ProfileRequest {
            first_name: Some("Youssef".into()),
            phone: Some("+212 6 12 34 56 78".into()),
            ..Default::default()
        };
        assert!(validate_profile(&ok).is_ok());

        let bad = ProfileRequest {
            first_name: Some("  ".into()),
            phone: Some("call me".into()),
            bio: Some("x".repeat(501)),
            ..Default::default()
        };
        let err = validate_profile(&bad).unwrap_err();
        assert_eq!(err.status(), 400);
    }
}
