use actix_web::web;
use api_auth::middleware::auth::AuthMiddleware;
use common::misc::Role;

mod dtos {
    pub(crate) mod course;
}
pub mod routes {
    pub mod course;
    pub mod instructor;
}
mod services {
    pub(crate) mod course;
}

pub fn mount_courses() -> actix_web::Scope {
    // fixed paths before `/{slug}`
    web::scope("/courses")
        .service(routes::course::get_featured)
        .service(routes::course::get_category_stats)
        .service(routes::course::get_catalog)
        .service(routes::course::post_course)
        .service(routes::course::get_course)
        .service(routes::course::put_course)
        .service(routes::course::delete_course)
}

pub fn mount_instructor() -> actix_web::Scope {
    web::scope("/instructor")
        .service(routes::instructor::get_courses)
        .service(routes::instructor::get_course)
        .service(routes::instructor::get_stats)
}

/// Course authors: instructors and admins.
fn authors() -> AuthMiddleware {
    api_auth::protect_roles(&[Role::Instructor, Role::Admin])
}
