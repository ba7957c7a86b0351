use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_courses: i64,
    pub total_enrollments: i64,
    pub total_projects: i64,
    /// Succeeded payments, minor units.
    pub total_revenue: i64,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}
