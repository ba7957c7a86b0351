use actix_web::web;

mod dtos {
    pub(crate) mod project;
}
pub mod routes {
    pub mod freelancer;
    pub mod project;
}
mod services {
    pub(crate) mod project;
}

pub fn mount_freelance() -> actix_web::Scope {
    web::scope("/freelance")
        .service(routes::project::get_projects)
        .service(routes::project::post_project)
        .service(routes::project::get_project)
        .service(routes::project::post_apply)
        .service(routes::project::get_applications)
        .service(routes::project::post_accept)
        .service(routes::project::post_milestone)
        .service(routes::project::put_milestone_status)
        .service(routes::project::post_complete)
        .service(routes::freelancer::get_my_projects)
        .service(routes::freelancer::get_my_applications)
        .service(routes::freelancer::get_my_missions)
        .service(routes::freelancer::post_activate_profile)
        .service(routes::freelancer::get_recommended)
}
