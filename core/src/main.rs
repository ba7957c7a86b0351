mod cors;

use std::{sync::Arc, time::Duration};

use actix_web::{
    App, HttpResponse, HttpServer, get,
    web::{self},
};
use common::{
    env_config::Config,
    error::{AppError, Res},
    http::Success,
};
use limiter::counter::{MemoryCounter, RateCounter, RedisCounter};
use mailer::Mailer;

#[get("/health")]
async fn health() -> Res<HttpResponse> {
    Success::message("SkillUp Maroc API")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    // init logger
    if config.console_logging_enabled {
        logger::setup(&config.log_file).expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, config.is_production())
        .await
        .expect("Failed to set up database");

    // per-user request counter, shared by every instance when Redis is configured
    let counter: Arc<dyn RateCounter> = match &config.redis_url {
        Some(url) => Arc::new(RedisCounter::from_url(url).expect("Failed to create Redis pool")),
        None => {
            log::warn!("REDIS_URL not set, rate limits are kept per process");
            Arc::new(MemoryCounter::new())
        }
    };

    let mailer = Arc::new(Mailer::new(config.mail.clone(), &config.frontend_url));
    if !mailer.is_enabled() {
        log::warn!("SMTP not configured, emails will only be logged");
    }

    let origins = config.cors_allowed_origins.clone();
    let rate = config.rate_limit.clone();
    log::info!(
        "Starting server on {}:{} ({})",
        config.server_host,
        config.server_port,
        config.environment
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config_data.clone()))
            .app_data(web::Data::new(mailer.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                AppError::BadRequest(format!("Invalid JSON body: {}", err)).into()
            }))
            .wrap(limiter::global_middleware(rate.global_per_second)) // 5th
            .wrap(limiter::user_middleware(
                counter.clone(),
                rate.user_max_requests,
                Duration::from_secs(rate.user_window_secs),
            )) // 4th
            .wrap(logger::middleware()) // 3rd
            .wrap(extractor::middleware()) // 2nd
            .wrap(cors::middleware(&origins)) // 1st
            .service(
                web::scope("/api")
                    .service(health)
                    .service(api_auth::mount_auth())
                    .service(api_courses::mount_courses())
                    .service(api_courses::mount_instructor())
                    .service(api_pay::mount_pay())
                    .service(api_users::mount_users())
                    .service(api_users::mount_progress())
                    .service(api_freelance::mount_freelance())
                    .service(api_admin::mount_admin()),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
