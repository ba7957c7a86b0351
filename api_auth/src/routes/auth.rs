use actix_web::{HttpResponse, get, http::StatusCode, post, put, web};
use common::env_config::Config;
use common::error::{AppError, Res};
use common::http::Success;
use common::jwt::{self, ClaimsSpec};
use common::misc::hash_token;
use common::validation::Validator;
use db::models::user::User;
use mailer::Mailer;
use sqlx::PgPool;
use std::sync::Arc;

use crate::dtos::auth::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    SessionUser, UpdatePasswordRequest,
};
use crate::services::{self, auth::with_cookie};

/// Signs a token for `user` and answers with it in the body and in the `token` cookie.
fn token_response(
    user: &User,
    status: StatusCode,
    message: &str,
    config: &Config,
) -> Res<HttpResponse> {
    let role = user.role()?;
    let token = jwt::generate_jwt(
        ClaimsSpec {
            user_id: user.id,
            role,
        },
        &config.jwt_config,
    )?;
    let cookie = services::auth::token_cookie(&token, config);
    let response = Success::respond(
        status,
        Some(message),
        AuthResponse {
            token,
            user: SessionUser::new(user, role),
        },
    )?;
    with_cookie(response, &cookie)
}

/// Registers a new student account with email and password.
///
/// # Input
/// - `req`: JSON payload with email, password, first/last name and the data-processing consent
/// - `pool`: Database connection pool
/// - `mailer`: Sends the email verification link
///
/// # Output
/// - Success: 201 Created with a session token (also set as the `token` cookie) and the user
/// - Error: 400 Bad Request with the list of invalid fields, or when the email is taken
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/auth/register', {
///   method: 'POST',
///   credentials: 'include',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({
///     email: 'salma@example.ma',
///     password: 'Secret123',
///     firstName: 'Salma',
///     lastName: 'Bennani',
///     dataConsent: true
///   })
/// });
///
/// const { token, user } = await response.json();
/// // user: { id, email, role: 'student', profile: {...}, isEmailVerified: false }
/// ```
#[post("/register")]
async fn post_register(
    req: web::Json<RegisterRequest>,
    pool: web::Data<Arc<PgPool>>,
    config: web::Data<Arc<Config>>,
    mailer: web::Data<Arc<Mailer>>,
) -> Res<HttpResponse> {
    services::user::validate_registration(&req)?;
    let user = services::user::create_user_with_credentials(&pool, &mailer, &req).await?;
    token_response(
        &user,
        StatusCode::CREATED,
        "Registration successful, please check your email",
        &config,
    )
}

/// Authenticates a user with email and password.
///
/// # Input
/// - `login_data`: JSON payload containing email and password
/// - `config`: Application configuration for JWT generation
/// - `pool`: Database connection pool
///
/// # Output
/// - Success: Returns the JWT token and user details, and sets the `token` cookie
/// - Error: 401 for invalid credentials, 423 while the account is locked
///   (five failed attempts lock it for two hours)
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/auth/login', {
///   method: 'POST',
///   credentials: 'include',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({ email: 'salma@example.ma', password: 'Secret123' })
/// });
///
/// if (response.status === 423) {
///   const { error } = await response.json(); // "Account locked, retry in 118 minutes"
/// }
/// ```
#[post("/login")]
pub async fn post_login(
    login_data: web::Json<LoginRequest>,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    if login_data.email.trim().is_empty() || login_data.password.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide an email and a password".to_string(),
        ));
    }
    let user =
        services::auth::authenticate_user(&pool, &login_data.email, &login_data.password).await?;
    token_response(&user, StatusCode::OK, "Login successful", &config)
}

/// Clears the session cookie.
#[post("/logout", wrap = "crate::protect()")]
async fn post_logout(config: web::Data<Arc<Config>>) -> Res<HttpResponse> {
    let response = Success::message("Logged out")?;
    with_cookie(response, &services::auth::clear_token_cookie(&config))
}

/// Endpoint to retrieve the current authenticated user's information.
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/auth/me', {
///   headers: { 'Authorization': `Bearer ${localStorage.getItem('authToken')}` }
/// });
/// const { data: user } = await response.json();
/// ```
#[get("/me", wrap = "crate::protect()")]
async fn get_me(user: web::ReqData<User>) -> Res<HttpResponse> {
    Success::ok(user.into_inner())
}

/// Confirms the email address with the token from the verification link.
#[get("/verify-email/{token}")]
async fn get_verify_email(
    path: web::Path<String>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<HttpResponse> {
    let token = path.into_inner();
    db::user::verify_email(&***pool, &hash_token(&token), chrono::Utc::now())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired token".to_string()))?;
    Success::message("Email verified")
}

/// Sends a password reset link valid for one hour.
/// Always answers 200 so that registered emails cannot be probed.
///
/// # Frontend Example
/// ```javascript
/// await fetch('/api/auth/forgot-password', {
///   method: 'POST',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({ email: 'salma@example.ma' })
/// });
/// ```
#[post("/forgot-password")]
async fn post_forgot_password(
    req: web::Json<ForgotPasswordRequest>,
    pool: web::Data<Arc<PgPool>>,
    mailer: web::Data<Arc<Mailer>>,
) -> Res<HttpResponse> {
    Validator::new().email("email", &req.email).finish()?;
    services::user::request_password_reset(&pool, &mailer, &req.email).await?;
    Success::message("If an account exists for this email, a reset link has been sent")
}

/// Sets a new password using the token from the reset link and opens a session.
#[put("/reset-password/{token}")]
async fn put_reset_password(
    path: web::Path<String>,
    req: web::Json<ResetPasswordRequest>,
    pool: web::Data<Arc<PgPool>>,
    config: web::Data<Arc<Config>>,
) -> Res<HttpResponse> {
    Validator::new().password("password", &req.password).finish()?;
    let user = services::user::reset_password(&pool, &path.into_inner(), &req.password).await?;
    token_response(&user, StatusCode::OK, "Password reset", &config)
}

/// Changes the password of the signed-in user after checking the current one.
///
/// # Frontend Example
/// ```javascript
/// await fetch('/api/auth/update-password', {
///   method: 'PUT',
///   credentials: 'include',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({ currentPassword: 'Secret123', newPassword: 'Secret456' })
/// });
/// ```
#[put("/update-password", wrap = "crate::protect()")]
async fn put_update_password(
    user: web::ReqData<User>,
    req: web::Json<UpdatePasswordRequest>,
    pool: web::Data<Arc<PgPool>>,
    config: web::Data<Arc<Config>>,
) -> Res<HttpResponse> {
    Validator::new()
        .check(
            !req.current_password.is_empty(),
            "currentPassword",
            "This field is required",
        )
        .password("newPassword", &req.new_password)
        .finish()?;

    let current_hash = db::user::get_password_hash(&***pool, user.id).await?;
    if !services::auth::verify_password(&req.current_password, &current_hash)? {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }
    let new_hash = services::auth::hash_password(&req.new_password)?;
    db::user::update_password_hash(&***pool, user.id, &new_hash).await?;

    token_response(&user, StatusCode::OK, "Password updated", &config)
}

/// Mails a fresh verification link to the signed-in user.
#[post("/resend-verification", wrap = "crate::protect()")]
async fn post_resend_verification(
    user: web::ReqData<User>,
    pool: web::Data<Arc<PgPool>>,
    mailer: web::Data<Arc<Mailer>>,
) -> Res<HttpResponse> {
    services::user::resend_verification(&pool, &mailer, &user).await?;
    Success::message("Verification email sent")
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};
    use common::env_config::Config;
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    fn config() -> Arc<Config> {
        let vars = [
            ("DATABASE_URL", "postgres://localhost/skillup_test"),
            ("JWT_SECRET", "auth-routes-secret"),
            ("STRIPE_SECRET_KEY", "sk_test_x"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_x"),
        ];
        Arc::new(
            Config::from_lookup(|key| {
                vars.iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
            })
            .unwrap(),
        )
    }

    #[actix_web::test]
    async fn invalid_requests_fail_before_the_database() {
        let config = config();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let mailer = Mailer::new(config.mail.clone(), &config.frontend_url);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(pool)))
                .app_data(web::Data::new(config.clone()))
                .app_data(web::Data::new(Arc::new(mailer)))
                .service(crate::mount_auth()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/register")
            .set_json(serde_json::json!({ "email": "bad", "password": "x" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 400);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
        assert!(body["errors"].as_array().is_some_and(|e| !e.is_empty()));

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(serde_json::json!({ "email": "" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::get().uri("/auth/me").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }
}
