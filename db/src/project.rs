use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    dtos::project::{ApplicationInsert, MilestoneInsert, ProjectFilter, ProjectInsert},
    models::project::{
        Application, ApplicationView, Milestone, MyApplication, Project, ProjectListing,
    },
};

const LISTING_SELECT: &str = r#"
    SELECT p.*, u.first_name AS client_first_name, u.last_name AS client_last_name,
           u.avatar AS client_avatar
    FROM projects p
    JOIN users u ON u.id = p.client_id
"#;

pub async fn insert_project<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    req: ProjectInsert,
) -> Res<Project> {
    sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (
            client_id, title, description, category, skills, budget_type, budget_min,
            budget_max, budget_currency, duration_value, duration_unit, experience_level,
            location_type, location_city, deadline, visibility
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(req.client_id)
    .bind(req.title)
    .bind(req.description)
    .bind(req.category)
    .bind(req.skills)
    .bind(req.budget_type)
    .bind(req.budget_min)
    .bind(req.budget_max)
    .bind(req.budget_currency)
    .bind(req.duration_value)
    .bind(req.duration_unit)
    .bind(req.experience_level)
    .bind(req.location_type)
    .bind(req.location_city)
    .bind(req.deadline)
    .bind(req.visibility)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_project<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
) -> Res<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_project_for_update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
) -> Res<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 FOR UPDATE")
        .bind(project_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Bumps the view counter and returns the project with its client card.
pub async fn view_project<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
) -> Res<Option<ProjectListing>> {
    sqlx::query_as::<_, ProjectListing>(
        r#"
        WITH p AS (
            UPDATE projects SET views = views + 1 WHERE id = $1 RETURNING *
        )
        SELECT p.*, u.first_name AS client_first_name, u.last_name AS client_last_name,
               u.avatar AS client_avatar
        FROM p
        JOIN users u ON u.id = p.client_id
        "#,
    )
    .bind(project_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

fn push_board_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &ProjectFilter) {
    qb.push(" WHERE p.status = 'open' AND p.visibility = 'public'");
    if let Some(category) = &filter.category {
        qb.push(" AND p.category = ").push_bind(category.clone());
    }
    if let Some(level) = &filter.experience_level {
        qb.push(" AND p.experience_level = ").push_bind(level.clone());
    }
    if !filter.skills.is_empty() {
        qb.push(" AND p.skills && ").push_bind(filter.skills.clone());
    }
    if let Some(min) = filter.budget_min {
        qb.push(" AND p.budget_max >= ").push_bind(min);
    }
    if let Some(max) = filter.budget_max {
        qb.push(" AND p.budget_min <= ").push_bind(max);
    }
    if let Some(search) = filter.search.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (p.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub fn board_order(sort: Option<&str>) -> &'static str {
    match sort.unwrap_or("-createdAt") {
        "createdAt" => "p.created_at ASC",
        "-budget" => "p.budget_max DESC NULLS LAST",
        "budget" => "p.budget_min ASC NULLS LAST",
        "deadline" => "p.deadline ASC NULLS LAST",
        _ => "p.created_at DESC",
    }
}

/// Open public projects matching the filter, with the total match count.
pub async fn list_open_projects<'e, E>(
    executor: E,
    filter: &ProjectFilter,
) -> Res<(Vec<ProjectListing>, i64)>
where
    E: Executor<'e, Database = Postgres> + Copy,
{
    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p");
    push_board_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(executor).await?;

    let mut qb = QueryBuilder::<Postgres>::new(LISTING_SELECT);
    push_board_filters(&mut qb, filter);
    qb.push(" ORDER BY ")
        .push(board_order(filter.sort.as_deref()))
        .push(" LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset());
    let projects = qb
        .build_query_as::<ProjectListing>()
        .fetch_all(executor)
        .await?;

    Ok((projects, total))
}

pub async fn list_client_projects<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    client_id: Uuid,
) -> Res<Vec<Project>> {
    sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE client_id = $1 ORDER BY created_at DESC",
    )
    .bind(client_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Projects in progress or completed with `freelancer_id` selected.
pub async fn list_missions<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    freelancer_id: Uuid,
) -> Res<Vec<ProjectListing>> {
    sqlx::query_as::<_, ProjectListing>(&format!(
        "{} WHERE p.selected_freelancer_id = $1 AND p.status IN ('in_progress', 'completed') \
         ORDER BY p.start_date DESC NULLS LAST",
        LISTING_SELECT
    ))
    .bind(freelancer_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Open projects sharing a skill with the freelancer, excluding their own
/// and those already applied to.
pub async fn list_recommended<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    skills: &[String],
    limit: i64,
) -> Res<Vec<ProjectListing>> {
    sqlx::query_as::<_, ProjectListing>(&format!(
        r#"{}
        WHERE p.status = 'open' AND p.visibility = 'public'
          AND p.client_id <> $1
          AND p.skills && $2
          AND NOT EXISTS (
              SELECT 1 FROM applications a WHERE a.project_id = p.id AND a.freelancer_id = $1
          )
        ORDER BY p.created_at DESC
        LIMIT $3"#,
        LISTING_SELECT
    ))
    .bind(user_id)
    .bind(skills)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Moves the project to `in_progress` with its freelancer selected.
pub async fn start_project<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
    freelancer_id: Uuid,
) -> Res<Project> {
    sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects SET
            status = 'in_progress',
            selected_freelancer_id = $2,
            start_date = now(),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(freelancer_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn complete_project<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
) -> Res<Project> {
    sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects SET status = 'completed', end_date = now(), updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(project_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Inserts the application; `None` when the freelancer already applied.
pub async fn insert_application<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    req: ApplicationInsert,
) -> Res<Option<Application>> {
    sqlx::query_as::<_, Application>(
        r#"
        WITH inserted AS (
            INSERT INTO applications (
                project_id, freelancer_id, cover_letter, proposed_budget, proposed_duration
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (project_id, freelancer_id) DO NOTHING
            RETURNING *
        ),
        counted AS (
            UPDATE projects SET applications_count = applications_count + 1
            WHERE id = $1 AND EXISTS (SELECT 1 FROM inserted)
        )
        SELECT * FROM inserted
        "#,
    )
    .bind(req.project_id)
    .bind(req.freelancer_id)
    .bind(req.cover_letter)
    .bind(req.proposed_budget)
    .bind(req.proposed_duration)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn has_applied<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
    freelancer_id: Uuid,
) -> Res<Option<Application>> {
    sqlx::query_as::<_, Application>(
        "SELECT * FROM applications WHERE project_id = $1 AND freelancer_id = $2",
    )
    .bind(project_id)
    .bind(freelancer_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_applications<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
) -> Res<Vec<Application>> {
    sqlx::query_as::<_, Application>(
        "SELECT * FROM applications WHERE project_id = $1 ORDER BY applied_at ASC",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_application_views<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
) -> Res<Vec<ApplicationView>> {
    sqlx::query_as::<_, ApplicationView>(
        r#"
        SELECT a.id, a.freelancer_id, u.first_name, u.last_name, u.avatar,
               u.freelance_title, u.hourly_rate, u.freelance_rating,
               a.cover_letter, a.proposed_budget, a.proposed_duration, a.status, a.applied_at
        FROM applications a
        JOIN users u ON u.id = a.freelancer_id
        WHERE a.project_id = $1
        ORDER BY a.applied_at ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_freelancer_applications<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    freelancer_id: Uuid,
) -> Res<Vec<MyApplication>> {
    sqlx::query_as::<_, MyApplication>(
        r#"
        SELECT a.*, p.title AS project_title, p.category AS project_category,
               p.status AS project_status, p.budget_min, p.budget_max, p.budget_currency
        FROM applications a
        JOIN projects p ON p.id = a.project_id
        WHERE a.freelancer_id = $1
        ORDER BY a.applied_at DESC
        "#,
    )
    .bind(freelancer_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn set_application_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    application_ids: &[Uuid],
    status: &str,
) -> Res<u64> {
    let result = sqlx::query("UPDATE applications SET status = $2 WHERE id = ANY($1)")
        .bind(application_ids)
        .bind(status)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn insert_milestone<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    req: MilestoneInsert,
) -> Res<Milestone> {
    sqlx::query_as::<_, Milestone>(
        r#"
        INSERT INTO milestones (project_id, title, description, amount, due_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(req.project_id)
    .bind(req.title)
    .bind(req.description)
    .bind(req.amount)
    .bind(req.due_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_milestone<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
    milestone_id: Uuid,
) -> Res<Option<Milestone>> {
    sqlx::query_as::<_, Milestone>("SELECT * FROM milestones WHERE id = $1 AND project_id = $2")
        .bind(milestone_id)
        .bind(project_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn list_milestones<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    project_id: Uuid,
) -> Res<Vec<Milestone>> {
    sqlx::query_as::<_, Milestone>(
        "SELECT * FROM milestones WHERE project_id = $1 ORDER BY created_at ASC",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Moves the milestone from `from` to `to`; `None` if another request moved it first.
pub async fn advance_milestone<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    milestone_id: Uuid,
    from: &str,
    to: &str,
) -> Res<Option<Milestone>> {
    sqlx::query_as::<_, Milestone>(
        r#"
        UPDATE milestones SET
            status = $3,
            paid_at = CASE WHEN $3 = 'paid' THEN now() ELSE paid_at END
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(milestone_id)
    .bind(from)
    .bind(to)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn count_projects<'e, E: Executor<'e, Database = Postgres>>(executor: E) -> Res<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_order_is_whitelisted() {
        assert_eq!(board_order(Some("-budget")), "p.budget_max DESC NULLS LAST");
        assert_eq!(board_order(Some("views; --")), "p.created_at DESC");
    }
}
