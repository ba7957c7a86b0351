use actix_web::{HttpResponse, get, post, web};
use common::error::Res;
use common::http::{Listing, Success};
use common::validation::Validator;
use db::dtos::user::FreelanceActivation;
use db::models::user::{Skill, User};
use sqlx::PgPool;
use std::sync::Arc;

use crate::dtos::project::ActivateProfileRequest;

const RECOMMENDED_LIMIT: i64 = 10;

/// Projects published by the caller.
#[get("/my-projects", wrap = "api_auth::protect()")]
pub async fn get_my_projects(
    user: web::ReqData<User>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let projects = db::project::list_client_projects(&***pool, user.id).await?;
    Success::flat(Listing::from(projects))
}

/// Applications sent by the caller with the project they target.
#[get("/my-applications", wrap = "api_auth::protect()")]
pub async fn get_my_applications(
    user: web::ReqData<User>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let applications = db::project::list_freelancer_applications(&***pool, user.id).await?;
    Success::flat(Listing::from(applications))
}

/// Projects the caller was selected for, in progress or completed.
#[get("/my-missions", wrap = "api_auth::protect()")]
pub async fn get_my_missions(
    user: web::ReqData<User>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let missions = db::project::list_missions(&***pool, user.id).await?;
    Success::flat(Listing::from(missions))
}

/// Turns the caller's account into a freelance profile.
///
/// # Frontend Example
/// ```javascript
/// await fetch('/api/freelance/activate-profile', {
///   method: 'POST',
///   credentials: 'include',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({
///     title: 'Développeuse React',
///     hourlyRate: 25000,
///     skills: [{ name: 'react', level: 'expert' }, { name: 'node' }]
///   })
/// });
/// ```
#[post("/activate-profile", wrap = "api_auth::protect()")]
pub async fn post_activate_profile(
    user: web::ReqData<User>,
    req: web::Json<ActivateProfileRequest>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let req = req.into_inner();
    let title = req.title.unwrap_or_default();
    Validator::new()
        .required("title", &title, 100)
        .check(
            req.hourly_rate.is_none_or(|rate| rate >= 0),
            "hourlyRate",
            "Hourly rate cannot be negative",
        )
        .finish()?;

    let skills = req.skills.map(|skills| {
        skills
            .into_iter()
            .map(|s| Skill {
                name: s.name.trim().to_lowercase(),
                level: s.level,
            })
            .filter(|s| !s.name.is_empty())
            .collect()
    });
    let updated = db::user::activate_freelance(
        &***pool,
        user.id,
        FreelanceActivation {
            title: title.trim().to_string(),
            hourly_rate: req.hourly_rate,
            skills,
        },
    )
    .await?;
    log::info!("Freelance profile activated for {}", user.id);
    Success::ok_with_message("Freelance profile activated", updated)
}

/// Open projects sharing at least one skill with the caller.
#[get("/recommended", wrap = "api_auth::protect()")]
pub async fn get_recommended(
    user: web::ReqData<User>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let skills: Vec<String> = user
        .skills
        .iter()
        .map(|s| s.name.trim().to_lowercase())
        .collect();
    let projects =
        db::project::list_recommended(&***pool, user.id, &skills, RECOMMENDED_LIMIT).await?;
    Success::flat(Listing::from(projects))
}
