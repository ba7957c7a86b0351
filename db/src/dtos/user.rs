use chrono::{DateTime, Utc};
use common::misc::Role;

use crate::models::user::Skill;

pub struct UserCreateRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub data_consent: bool,
    pub marketing_consent: bool,
    pub consent_date: Option<DateTime<Utc>>,
}

/// Profile fields a user may change. `None` keeps the stored value.
#[derive(Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub skills: Option<Vec<Skill>>,
    pub marketing_consent: Option<bool>,
}

pub struct FreelanceActivation {
    pub title: String,
    pub hourly_rate: Option<i64>,
    pub skills: Option<Vec<Skill>>,
}
