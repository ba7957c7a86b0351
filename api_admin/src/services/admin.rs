use common::{
    error::{AppError, Res},
    misc::Role,
};
use db::models::user::User;
use sqlx::PgPool;

use crate::dtos::admin::PlatformStats;

/// Admin accounts are never deleted through the API.
pub fn ensure_deletable(target: &User) -> Res<()> {
    if target.role()? == Role::Admin {
        return Err(AppError::BadRequest("Cannot delete an admin".to_string()));
    }
    Ok(())
}

/// An admin cannot demote themselves and lock everyone out.
pub fn ensure_role_change(target: &User, admin: &User) -> Res<()> {
    if target.id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_string(),
        ));
    }
    Ok(())
}

pub async fn platform_stats(pool: &PgPool) -> Res<PlatformStats> {
    Ok(PlatformStats {
        total_users: db::user::count_users(pool).await?,
        total_courses: db::course::count_courses(pool).await?,
        total_enrollments: db::enrollment::count_enrollments(pool).await?,
        total_projects: db::project::count_projects(pool).await?,
        total_revenue: db::payment::total_revenue(pool).await?,
    })
}

#[cfg(test)]
mod tests {
    use db::testing::user;

    use super::*;

    #[test]
    fn admins_cannot_be_deleted() {
        assert_eq!(ensure_deletable(&user("admin")).unwrap_err().status(), 400);
        assert!(ensure_deletable(&user("instructor")).is_ok());
        assert!(ensure_deletable(&user("student")).is_ok());
    }

    #[test]
    fn own_role_is_locked() {
        let admin = user("admin");
        assert!(ensure_role_change(&admin, &admin).is_err());
        assert!(ensure_role_change(&user("student"), &admin).is_ok());
    }
}
