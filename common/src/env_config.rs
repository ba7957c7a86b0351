use std::{env, sync::Arc};

use crate::error::{AppError, Res};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds all the necessary configuration parameters
/// required to initialize and run the server.
/// It includes database connection details, JWT and cookie settings,
/// server host and port, number of worker threads, CORS settings,
/// logging preferences, Stripe credentials, rate limits and
/// the outgoing mail configuration.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// The URL of Redis server used by the per-user rate limiter.
    /// When absent the limiter keeps its counters in process memory.
    pub redis_url: Option<String>,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origins for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origins: Vec<String>,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// File the logger appends to.
    pub log_file: String,
    /// Public URL of the web application, used in redirects and emails.
    pub frontend_url: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook secret
    pub stripe_webhook_secret: String,
    /// Currency of checkout sessions (ISO code, lowercase).
    pub stripe_currency: String,
    /// Rate limiting settings.
    pub rate_limit: RateLimitConfig,
    /// Outgoing mail settings.
    pub mail: MailConfig,
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
///
/// This struct contains the secret key used to sign JWTs,
/// the expiration time in hours for issued tokens and
/// the lifetime of the `token` cookie in days.
pub struct JwtConfig {
    /// The secret key used to sign and verify JWTs.
    pub secret: String,
    /// The expiration time for JWTs in hours.
    pub expiration_hours: i64,
    /// The lifetime of the auth cookie in days.
    pub cookie_expire_days: i64,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Requests per second accepted by the whole server.
    pub global_per_second: u32,
    /// Requests accepted per identity in one window.
    pub user_max_requests: u64,
    /// Window length in seconds.
    pub user_window_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    pub from_name: String,
}

impl MailConfig {
    /// Mail can only be sent when a relay and a sender are known.
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// Loads the `.env` file when present and delegates parsing to
    /// [`Config::from_lookup`].
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `DATABASE_URL`: Connection string for the database
    /// - `JWT_SECRET`: Secret key for JWT signing
    /// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`: Stripe credentials
    ///
    /// Optional (with defaults):
    /// - `ENVIRONMENT`: "development" or "production" (default: "development")
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8000)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGINS`: Comma separated origins (default: "http://localhost:5173")
    /// - `FRONTEND_URL`: Web application URL (default: first allowed origin)
    /// - `JWT_EXPIRATION_HOURS` (default: 168), `JWT_COOKIE_EXPIRE` days (default: 7)
    /// - `REDIS_URL`, `GLOBAL_RATE_LIMIT`, `USER_RATE_LIMIT`, `USER_RATE_WINDOW_SECS`
    /// - `SMTP_*`, `MAIL_FROM_ADDRESS`, `MAIL_FROM_NAME`
    ///
    /// # Panics
    ///
    /// This function will panic if required environment variables are missing or if
    /// numeric values cannot be parsed correctly.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        match Config::from_lookup(|key| env::var(key).ok()) {
            Ok(config) => Arc::new(config),
            Err(e) => panic!("Invalid configuration: {}", e),
        }
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Res<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Res<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Internal(format!("{} must be set", key)))
        };
        let or_default = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| default.to_string())
        };
        let flag = |key: &str, default: bool| -> bool {
            lookup(key)
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(default)
        };

        let cors_allowed_origins: Vec<String> =
            or_default("CORS_ALLOWED_ORIGINS", "http://localhost:5173")
                .split(',')
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect();
        let frontend_url = lookup("FRONTEND_URL")
            .or_else(|| cors_allowed_origins.first().cloned())
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            environment: or_default("ENVIRONMENT", "development"),
            database_url: required("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            jwt_config: JwtConfig {
                secret: required("JWT_SECRET")?,
                expiration_hours: parse_number(&lookup, "JWT_EXPIRATION_HOURS", 168)?,
                cookie_expire_days: parse_number(&lookup, "JWT_COOKIE_EXPIRE", 7)?,
            },
            server_host: or_default("IP", "127.0.0.1"),
            server_port: parse_number(&lookup, "PORT", 8000)?,
            num_workers: parse_number(&lookup, "WORKERS", 4)?,
            cors_allowed_origins,
            console_logging_enabled: flag("ENABLE_CONSOLE_LOGGING", true),
            log_file: or_default("LOG_FILE", "skillup.log"),
            frontend_url,
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            stripe_currency: or_default("STRIPE_CURRENCY", "mad").to_lowercase(),
            rate_limit: RateLimitConfig {
                global_per_second: parse_number(&lookup, "GLOBAL_RATE_LIMIT", 50)?,
                user_max_requests: parse_number(&lookup, "USER_RATE_LIMIT", 100)?,
                user_window_secs: parse_number(&lookup, "USER_RATE_WINDOW_SECS", 60)?,
            },
            mail: MailConfig {
                smtp_host: lookup("SMTP_HOST").filter(|v| !v.is_empty()),
                smtp_port: parse_number(&lookup, "SMTP_PORT", 587)?,
                smtp_username: lookup("SMTP_USERNAME").filter(|v| !v.is_empty()),
                smtp_password: lookup("SMTP_PASSWORD").filter(|v| !v.is_empty()),
                smtp_tls: flag("SMTP_TLS", true),
                from_address: lookup("MAIL_FROM_ADDRESS").filter(|v| !v.is_empty()),
                from_name: or_default("MAIL_FROM_NAME", "SkillUp Maroc"),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Res<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Internal(format!("{} must be a valid number", key))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 4] = [
        ("DATABASE_URL", "postgres://u:p@localhost/skillup"),
        ("JWT_SECRET", "secret"),
        ("STRIPE_SECRET_KEY", "sk_test_123"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
    ];

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup_from(&BASE)).unwrap();
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.jwt_config.cookie_expire_days, 7);
        assert_eq!(config.stripe_currency, "mad");
        assert_eq!(config.frontend_url, "http://localhost:5173");
        assert!(config.redis_url.is_none());
        assert!(!config.mail.is_configured());
        assert!(!config.is_production());
    }

    #[test]
    fn splits_cors_origins() {
        let mut pairs = BASE.to_vec();
        pairs.push((
            "CORS_ALLOWED_ORIGINS",
            "https://skillup.ma/, https://admin.skillup.ma",
        ));
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://skillup.ma", "https://admin.skillup.ma"]
        );
        assert_eq!(config.frontend_url, "https://skillup.ma");
    }

    #[test]
    fn stripe_secrets_have_no_default() {
        let pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "STRIPE_WEBHOOK_SECRET")
            .collect();
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn rejects_malformed_numbers() {
        let mut pairs = BASE.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }
}
