use chrono::{DateTime, Utc};
use common::{error::Res, misc::Role};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub name: String,
    #[serde(default = "default_skill_level")]
    pub level: String,
}

fn default_skill_level() -> String {
    "intermédiaire".to_string()
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: String,
    pub skills: Json<Vec<Skill>>,
    pub is_freelancer: bool,
    pub freelance_title: Option<String>,
    pub hourly_rate: Option<i64>,
    pub completed_projects: i32,
    pub freelance_rating: f64,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_password_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub login_attempts: i32,
    #[serde(skip_serializing)]
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub data_consent: bool,
    pub marketing_consent: bool,
    pub consent_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Res<Role> {
        Role::from_str(&self.role)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.map(|until| until > now).unwrap_or(false)
    }

    pub fn profile(&self) -> Profile {
        Profile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar: self.avatar.clone(),
            bio: self.bio.clone(),
            phone: self.phone.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: String,
}

/// Public author card attached to courses and projects.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCard {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AuthCredentials {
    pub user_id: Uuid,
    pub password_hash: String,
}
