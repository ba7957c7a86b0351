use actix_web::{HttpResponse, get, web};
use common::error::{AppError, Res};
use common::http::{Listing, Success};
use db::models::user::User;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::course as service;

/// Courses authored by the caller, drafts included, newest first.
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/instructor/courses', { credentials: 'include' });
/// const { count, data: courses } = await response.json();
/// ```
#[get("/courses", wrap = "crate::authors()")]
pub async fn get_courses(
    user: web::ReqData<User>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let courses = db::course::list_instructor_courses(&***pool, user.id).await?;
    Success::flat(Listing::from(courses))
}

/// One of the caller's courses with unmasked lessons, for the editor.
#[get("/courses/{id}", wrap = "crate::authors()")]
pub async fn get_course(
    path: web::Path<Uuid>,
    user: web::ReqData<User>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let course = db::course::get_instructor_course(&***pool, path.into_inner(), user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;
    Success::ok(course)
}

/// Totals over the caller's courses. Revenue is estimated from list prices.
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/instructor/stats', { credentials: 'include' });
/// const { data } = await response.json();
/// // { totalCourses, publishedCourses, draftCourses, totalStudents, totalRevenue, avgRating }
/// ```
#[get("/stats", wrap = "crate::authors()")]
pub async fn get_stats(
    user: web::ReqData<User>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let courses = db::course::list_instructor_courses(&***pool, user.id).await?;
    Success::ok(service::instructor_stats(&courses))
}
