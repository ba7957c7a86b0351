use common::{
    error::{AppError, Res},
    misc::Role,
    validation::Validator,
};
use db::{
    dtos::project::{MilestoneInsert, ProjectInsert},
    models::{
        project::{
            ApplicationStatus, BUDGET_TYPES, DURATION_UNITS, EXPERIENCE_LEVELS, LOCATION_TYPES,
            MilestoneStatus, PROJECT_CATEGORIES, Project, ProjectStatus, VISIBILITIES,
            resolve_acceptance,
        },
        user::User,
    },
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dtos::project::{MilestoneRequest, ProjectRequest};

const MAX_SKILLS: usize = 20;

fn is_admin(user: &User) -> bool {
    user.role().is_ok_and(|role| role == Role::Admin)
}

fn one_of(value: &str, allowed: &[&str]) -> bool {
    allowed.contains(&value)
}

/// Validated insert for a new project owned by `client_id`.
pub fn project_insert(req: ProjectRequest, client_id: Uuid) -> Res<ProjectInsert> {
    let budget_type = req.budget_type.unwrap_or_else(|| "fixed".to_string());
    let duration_unit = req.duration_unit.unwrap_or_else(|| "weeks".to_string());
    let experience_level = req
        .experience_level
        .unwrap_or_else(|| "intermediate".to_string());
    let location_type = req.location_type.unwrap_or_else(|| "remote".to_string());
    let visibility = req.visibility.unwrap_or_else(|| "public".to_string());
    let skills: Vec<String> = req
        .skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut v = Validator::new();
    v.required("title", &req.title, 100)
        .required("description", &req.description, 5000)
        .check(
            one_of(&req.category, &PROJECT_CATEGORIES),
            "category",
            "Unknown category",
        )
        .check(
            one_of(&budget_type, &BUDGET_TYPES),
            "budgetType",
            "Budget type must be fixed or hourly",
        )
        .check(
            req.budget_min.is_none_or(|min| min >= 0),
            "budgetMin",
            "Budget cannot be negative",
        )
        .check(
            match (req.budget_min, req.budget_max) {
                (Some(min), Some(max)) => min <= max,
                _ => true,
            },
            "budgetMax",
            "Maximum budget must not be lower than the minimum",
        )
        .check(
            req.duration_value.is_none_or(|d| d > 0),
            "durationValue",
            "Duration must be positive",
        )
        .check(
            one_of(&duration_unit, &DURATION_UNITS),
            "durationUnit",
            "Unknown duration unit",
        )
        .check(
            one_of(&experience_level, &EXPERIENCE_LEVELS),
            "experienceLevel",
            "Unknown experience level",
        )
        .check(
            one_of(&location_type, &LOCATION_TYPES),
            "locationType",
            "Unknown location type",
        )
        .check(
            one_of(&visibility, &VISIBILITIES),
            "visibility",
            "Unknown visibility",
        )
        .check(
            skills.len() <= MAX_SKILLS,
            "skills",
            &format!("At most {} skills", MAX_SKILLS),
        );
    v.finish()?;

    Ok(ProjectInsert {
        client_id,
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        category: req.category,
        skills,
        budget_type,
        budget_min: req.budget_min,
        budget_max: req.budget_max,
        budget_currency: req
            .budget_currency
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| "MAD".to_string()),
        duration_value: req.duration_value,
        duration_unit,
        experience_level,
        location_type,
        location_city: req.location_city,
        deadline: req.deadline,
        visibility,
    })
}

pub fn milestone_insert(req: MilestoneRequest, project_id: Uuid) -> Res<MilestoneInsert> {
    Validator::new()
        .required("title", &req.title, 200)
        .check(req.amount >= 0, "amount", "Amount cannot be negative")
        .finish()?;
    Ok(MilestoneInsert {
        project_id,
        title: req.title.trim().to_string(),
        description: req.description,
        amount: req.amount,
        due_date: req.due_date,
    })
}

pub fn ensure_owner(project: &Project, user: &User) -> Res<()> {
    if project.client_id == user.id {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized for this project".to_string()))
    }
}

/// Applications are visible to the project owner and to admins.
pub fn ensure_owner_or_admin(project: &Project, user: &User) -> Res<()> {
    if is_admin(user) {
        return Ok(());
    }
    ensure_owner(project, user)
}

pub fn is_participant(project: &Project, user_id: Uuid) -> bool {
    project.client_id == user_id || project.selected_freelancer_id == Some(user_id)
}

pub fn ensure_can_apply(project: &Project, user_id: Uuid, already_applied: bool) -> Res<()> {
    if project.status()? != ProjectStatus::Open {
        return Err(AppError::BadRequest(
            "Project is not accepting applications".to_string(),
        ));
    }
    if project.client_id == user_id {
        return Err(AppError::BadRequest(
            "You cannot apply to your own project".to_string(),
        ));
    }
    if already_applied {
        return Err(AppError::BadRequest(
            "You already applied to this project".to_string(),
        ));
    }
    Ok(())
}

/// A milestone moves one step at a time. The freelancer starts and submits
/// work, the client approves and pays.
pub fn check_milestone_move(
    project: &Project,
    current: MilestoneStatus,
    requested: MilestoneStatus,
    user_id: Uuid,
) -> Res<()> {
    if project.status()? != ProjectStatus::InProgress {
        return Err(AppError::BadRequest(
            "Milestones can only change while the project is in progress".to_string(),
        ));
    }
    if current.next() != Some(requested) {
        return Err(AppError::BadRequest(format!(
            "Milestone cannot move from {} to {}",
            current.as_str(),
            requested.as_str()
        )));
    }
    let allowed = if requested.moved_by_client() {
        project.client_id == user_id
    } else {
        project.selected_freelancer_id == Some(user_id)
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Not allowed to mark this milestone {}",
            requested.as_str()
        )))
    }
}

/// Accepts one application: rejects the other pending ones and starts the project.
pub async fn accept_application(
    pool: &PgPool,
    project_id: Uuid,
    application_id: Uuid,
    user: &User,
) -> Res<Project> {
    let mut tx = pool.begin().await?;
    let project = db::project::get_project_for_update(&mut *tx, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    ensure_owner(&project, user)?;
    if project.status()? != ProjectStatus::Open {
        return Err(AppError::BadRequest(
            "Project is no longer open".to_string(),
        ));
    }

    let applications = db::project::list_applications(&mut *tx, project.id).await?;
    let (freelancer_id, rejected) = resolve_acceptance(&applications, application_id)?;

    db::project::set_application_status(
        &mut *tx,
        &[application_id],
        ApplicationStatus::Accepted.as_str(),
    )
    .await?;
    if !rejected.is_empty() {
        db::project::set_application_status(
            &mut *tx,
            &rejected,
            ApplicationStatus::Rejected.as_str(),
        )
        .await?;
    }
    let started = db::project::start_project(&mut *tx, project.id, freelancer_id).await?;
    tx.commit().await?;

    log::info!(
        "Project {} started with freelancer {} ({} applications rejected)",
        started.id,
        freelancer_id,
        rejected.len()
    );
    Ok(started)
}

/// Closes an in-progress project and credits the freelancer.
pub async fn finish_project(pool: &PgPool, project_id: Uuid, user: &User) -> Res<Project> {
    let mut tx = pool.begin().await?;
    let project = db::project::get_project_for_update(&mut *tx, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    ensure_owner(&project, user)?;
    if project.status()? != ProjectStatus::InProgress {
        return Err(AppError::BadRequest(
            "Only projects in progress can be completed".to_string(),
        ));
    }

    let completed = db::project::complete_project(&mut *tx, project.id).await?;
    if let Some(freelancer_id) = project.selected_freelancer_id {
        db::user::increment_completed_projects(&mut *tx, freelancer_id).await?;
    }
    tx.commit().await?;
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use db::testing::{project, user};

    use super::*;

    fn request() -> ProjectRequest {
        ProjectRequest {
            title: "Application mobile de réservation".into(),
            description: "Réservation de hammams à Marrakech".into(),
            category: "developpement-mobile".into(),
            skills: vec![" Flutter ".into(), "".into()],
            budget_min: Some(500000),
            budget_max: Some(800000),
            ..Default::default()
        }
    }

    #[test]
    fn project_defaults_are_filled_in() {
        let client = Uuid::new_v4();
        let insert = project_insert(request(), client).unwrap();
        assert_eq!(insert.client_id, client);
        assert_eq!(insert.skills, vec!["flutter".to_string()]);
        assert_eq!(insert.budget_type, "fixed");
        assert_eq!(insert.budget_currency, "MAD");
        assert_eq!(insert.visibility, "public");
    }

    #[test]
    fn inverted_budget_is_rejected() {
        let req = ProjectRequest {
            budget_min: Some(900000),
            ..request()
        };
        assert_eq!(
            project_insert(req, Uuid::new_v4()).unwrap_err().status(),
            400
        );
        let req = ProjectRequest {
            category: "plomberie".into(),
            ..request()
        };
        assert!(project_insert(req, Uuid::new_v4()).is_err());
    }

    #[test]
    fn applying_requires_an_open_foreign_project() {
        let client = Uuid::new_v4();
        let freelancer = Uuid::new_v4();
        let mut p = project(client);
        assert!(ensure_can_apply(&p, freelancer, false).is_ok());
        assert!(ensure_can_apply(&p, client, false).is_err());
        assert!(ensure_can_apply(&p, freelancer, true).is_err());
        p.status = "in_progress".into();
        assert_eq!(
            ensure_can_apply(&p, freelancer, false).unwrap_err().status(),
            400
        );
    }

    #[test]
    fn milestone_moves_follow_roles() {
        let client = Uuid::new_v4();
        let freelancer = Uuid::new_v4();
        let mut p = project(client);
        p.status = "in_progress".into();
        p.selected_freelancer_id = Some(freelancer);

        use MilestoneStatus::*;
        assert!(check_milestone_move(&p, Pending, InProgress, freelancer).is_ok());
        assert_eq!(
            check_milestone_move(&p, Pending, InProgress, client)
                .unwrap_err()
                .status(),
            403
        );
        assert!(check_milestone_move(&p, Submitted, Approved, client).is_ok());
        assert!(check_milestone_move(&p, Submitted, Approved, freelancer).is_err());
        assert!(check_milestone_move(&p, Approved, Paid, client).is_ok());
        assert_eq!(
            check_milestone_move(&p, Pending, Submitted, freelancer)
                .unwrap_err()
                .status(),
            400
        );

        p.status = "completed".into();
        assert!(check_milestone_move(&p, Approved, Paid, client).is_err());
    }

    #[test]
    fn admins_see_applications() {
        let p = project(Uuid::new_v4());
        assert!(ensure_owner_or_admin(&p, &user("admin")).is_ok());
        assert_eq!(
            ensure_owner_or_admin(&p, &user("student"))
                .unwrap_err()
                .status(),
            403
        );
        let owner = User {
            id: p.client_id,
            ..user("student")
        };
        assert!(ensure_owner_or_admin(&p, &owner).is_ok());
        assert!(ensure_owner(&p, &user("admin")).is_err());
    }
}
