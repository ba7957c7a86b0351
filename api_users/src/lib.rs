use actix_web::web;

mod dtos {
    pub(crate) mod progress;
    pub(crate) mod user;
}
pub mod routes {
    pub mod progress;
    pub mod user;
}
mod services {
    pub(crate) mod progress;
    pub(crate) mod user;
}

pub fn mount_users() -> actix_web::Scope {
    web::scope("/users")
        .service(routes::user::get_enrolled_courses)
        .service(routes::user::get_profile)
        .service(routes::user::put_profile)
        .service(routes::user::get_is_enrolled)
        .service(routes::user::put_lesson_progress)
        .service(routes::user::get_certifications)
        .service(routes::user::get_dashboard)
        .service(routes::user::get_export_data)
        .service(routes::user::delete_me)
}

pub fn mount_progress() -> actix_web::Scope {
    web::scope("/progress")
        .service(routes::progress::get_progress)
        .service(routes::progress::post_position)
        .service(routes::progress::post_complete_lesson)
}
