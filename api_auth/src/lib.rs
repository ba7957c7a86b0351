use common::misc::Role;
use middleware::auth::{AuthMiddleware, AuthMode};

pub mod middleware {
    pub mod auth;
}
mod dtos {
    pub(crate) mod auth;
}
mod routes {
    pub(crate) mod auth;
}
pub mod services {
    pub mod auth;
    pub(crate) mod user;
}

pub use services::auth::{clear_token_cookie, verify_password, with_cookie};

pub fn mount_auth() -> actix_web::Scope {
    actix_web::web::scope("/auth")
        .service(routes::auth::post_register)
        .service(routes::auth::post_login)
        .service(routes::auth::get_verify_email)
        .service(routes::auth::post_forgot_password)
        .service(routes::auth::put_reset_password)
        .service(routes::auth::post_logout)
        .service(routes::auth::get_me)
        .service(routes::auth::put_update_password)
        .service(routes::auth::post_resend_verification)
}

/// Rejects anonymous callers with 401 and attaches the `User` to the request.
pub fn protect() -> AuthMiddleware {
    AuthMiddleware::new(AuthMode::Required, &[])
}

/// Like [`protect`], and answers 403 when the caller's role is not in `roles`.
pub fn protect_roles(roles: &[Role]) -> AuthMiddleware {
    AuthMiddleware::new(AuthMode::Required, roles)
}

/// Attaches the `User` when a valid credential is present; never rejects.
pub fn optional() -> AuthMiddleware {
    AuthMiddleware::new(AuthMode::Optional, &[])
}
