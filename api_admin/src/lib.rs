use actix_web::web;
use api_auth::middleware::auth::AuthMiddleware;
use common::misc::Role;

mod dtos {
    pub(crate) mod admin;
}
pub mod routes {
    pub mod admin;
}
mod services {
    pub(crate) mod admin;
}

pub fn mount_admin() -> actix_web::Scope {
    web::scope("/admin")
        .service(routes::admin::get_stats)
        .service(routes::admin::get_users)
        .service(routes::admin::put_user_role)
        .service(routes::admin::delete_user)
        .service(routes::admin::get_courses)
        .service(routes::admin::put_course_status)
        .service(routes::admin::delete_course)
}

fn admins() -> AuthMiddleware {
    api_auth::protect_roles(&[Role::Admin])
}
