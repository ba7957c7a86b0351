use common::{
    error::{AppError, Res},
    misc::slugify,
};
use sqlx::{Executor, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::{
    dtos::course::{CourseData, CourseFilter, CourseInsert},
    models::course::{CategoryStats, Course, CourseCard, compute_stats},
};

const CARD_SELECT: &str = r#"
    SELECT c.id, c.title, c.slug, c.short_description, c.category, c.level, c.language,
           c.thumbnail, c.price, c.currency, c.discount_percentage, c.discount_valid_until,
           c.students_count, c.lessons_count, c.total_duration, c.rating, c.reviews_count,
           c.status, c.is_featured, c.instructor_id,
           u.first_name AS instructor_first_name,
           u.last_name AS instructor_last_name,
           u.avatar AS instructor_avatar,
           c.created_at
    FROM courses c
    JOIN users u ON u.id = c.instructor_id
"#;

/// First of `base`, `base-2`, `base-3`, ... that is not in `taken`.
pub fn next_free_slug(base: &str, taken: &[String]) -> String {
    let base = if base.is_empty() { "cours" } else { base };
    if !taken.iter().any(|s| s == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.iter().any(|s| s == candidate))
        .unwrap_or_else(|| format!("{}-{}", base, Uuid::new_v4().simple()))
}

/// Slug derived from `title` that no other course uses.
pub async fn unique_slug<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    title: &str,
    exclude: Option<Uuid>,
) -> Res<String> {
    let base = slugify(title);
    let taken: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT slug FROM courses
        WHERE (slug = $1 OR slug LIKE $1 || '-%') AND ($2::uuid IS NULL OR id <> $2)
        "#,
    )
    .bind(&base)
    .bind(exclude)
    .fetch_all(executor)
    .await?;
    Ok(next_free_slug(&base, &taken))
}

pub async fn insert_course<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    req: CourseInsert,
) -> Res<Course> {
    let data = req.data;
    let (lessons_count, total_duration) = compute_stats(&data.chapters);
    sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses (
            title, slug, description, short_description, category, subcategory, tags,
            thumbnail, preview_video, instructor_id, chapters, price, currency,
            discount_percentage, discount_valid_until, lessons_count, total_duration,
            level, prerequisites, learning_outcomes, language, has_certificate, status,
            published_at, is_featured, featured_order
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, COALESCE($8, 'default-course.jpg'), $9, $10, $11, $12, $13,
            $14, $15, $16, $17, $18, $19, $20, $21, $22, $23,
            CASE WHEN $23 = 'published' THEN now() ELSE NULL END, $24, $25
        )
        RETURNING *
        "#,
    )
    .bind(data.title)
    .bind(data.slug)
    .bind(data.description)
    .bind(data.short_description)
    .bind(data.category)
    .bind(data.subcategory)
    .bind(data.tags)
    .bind(data.thumbnail)
    .bind(data.preview_video)
    .bind(req.instructor_id)
    .bind(Json(data.chapters))
    .bind(data.price)
    .bind(data.currency)
    .bind(data.discount_percentage)
    .bind(data.discount_valid_until)
    .bind(lessons_count)
    .bind(total_duration)
    .bind(data.level)
    .bind(data.prerequisites)
    .bind(data.learning_outcomes)
    .bind(data.language)
    .bind(data.has_certificate)
    .bind(data.status)
    .bind(data.is_featured)
    .bind(data.featured_order)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_course<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    course_id: Uuid,
    data: CourseData,
) -> Res<Course> {
    let (lessons_count, total_duration) = compute_stats(&data.chapters);
    sqlx::query_as::<_, Course>(
        r#"
        UPDATE courses SET
            title = $2, slug = $3, description = $4, short_description = $5, category = $6,
            subcategory = $7, tags = $8, thumbnail = COALESCE($9, thumbnail), preview_video = $10,
            chapters = $11, price = $12, currency = $13, discount_percentage = $14,
            discount_valid_until = $15, lessons_count = $16, total_duration = $17, level = $18,
            prerequisites = $19, learning_outcomes = $20, language = $21, has_certificate = $22,
            status = $23,
            published_at = CASE WHEN $23 = 'published' THEN COALESCE(published_at, now()) ELSE published_at END,
            is_featured = $24, featured_order = $25, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(course_id)
    .bind(data.title)
    .bind(data.slug)
    .bind(data.description)
    .bind(data.short_description)
    .bind(data.category)
    .bind(data.subcategory)
    .bind(data.tags)
    .bind(data.thumbnail)
    .bind(data.preview_video)
    .bind(Json(data.chapters))
    .bind(data.price)
    .bind(data.currency)
    .bind(data.discount_percentage)
    .bind(data.discount_valid_until)
    .bind(lessons_count)
    .bind(total_duration)
    .bind(data.level)
    .bind(data.prerequisites)
    .bind(data.learning_outcomes)
    .bind(data.language)
    .bind(data.has_certificate)
    .bind(data.status)
    .bind(data.is_featured)
    .bind(data.featured_order)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn set_course_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    course_id: Uuid,
    status: &str,
) -> Res<Option<Course>> {
    sqlx::query_as::<_, Course>(
        r#"
        UPDATE courses SET
            status = $2,
            published_at = CASE WHEN $2 = 'published' THEN COALESCE(published_at, now()) ELSE published_at END,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(course_id)
    .bind(status)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_course_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    course_id: Uuid,
) -> Res<Option<Course>> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_course_by_slug<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    slug: &str,
) -> Res<Option<Course>> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE slug = $1")
        .bind(slug)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_published_course_by_slug<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    slug: &str,
) -> Res<Option<Course>> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE slug = $1 AND status = 'published'")
        .bind(slug)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

fn push_catalog_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &CourseFilter) {
    qb.push(" WHERE c.status = 'published'");
    if let Some(category) = &filter.category {
        qb.push(" AND c.category = ").push_bind(category.clone());
    }
    if let Some(level) = &filter.level {
        qb.push(" AND c.level = ").push_bind(level.clone());
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND c.price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND c.price <= ").push_bind(max);
    }
    if let Some(search) = filter.search.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (c.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR array_to_string(c.tags, ' ') ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// ORDER BY clause for a catalog sort key; `-` prefix means descending.
pub fn catalog_order(sort: Option<&str>) -> &'static str {
    match sort.unwrap_or("-createdAt") {
        "createdAt" => "c.created_at ASC",
        "price" => "c.price ASC",
        "-price" => "c.price DESC",
        "-rating" | "rating" => "c.rating DESC",
        "-students" | "popular" => "c.students_count DESC",
        "title" => "c.title ASC",
        _ => "c.created_at DESC",
    }
}

/// Published courses matching the filter, with the total match count.
pub async fn list_published_courses<'e, E>(
    executor: E,
    filter: &CourseFilter,
) -> Res<(Vec<CourseCard>, i64)>
where
    E: Executor<'e, Database = Postgres> + Copy,
{
    let mut count_qb = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM courses c JOIN users u ON u.id = c.instructor_id",
    );
    push_catalog_filters(&mut count_qb, filter);
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(executor)
        .await?;

    let mut qb = QueryBuilder::<Postgres>::new(CARD_SELECT);
    push_catalog_filters(&mut qb, filter);
    qb.push(" ORDER BY ")
        .push(catalog_order(filter.sort.as_deref()))
        .push(" LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset());
    let courses = qb.build_query_as::<CourseCard>().fetch_all(executor).await?;

    Ok((courses, total))
}

pub async fn list_featured_courses<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    limit: i64,
) -> Res<Vec<CourseCard>> {
    sqlx::query_as::<_, CourseCard>(&format!(
        "{} WHERE c.status = 'published' AND c.is_featured ORDER BY c.featured_order ASC NULLS LAST LIMIT $1",
        CARD_SELECT
    ))
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_all_courses<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    limit: i64,
) -> Res<Vec<CourseCard>> {
    sqlx::query_as::<_, CourseCard>(&format!(
        "{} ORDER BY c.created_at DESC LIMIT $1",
        CARD_SELECT
    ))
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_category_stats<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
) -> Res<Vec<CategoryStats>> {
    sqlx::query_as::<_, CategoryStats>(
        r#"
        SELECT category,
               COUNT(*) AS count,
               COALESCE(AVG(price), 0)::float8 AS avg_price,
               COALESCE(AVG(rating), 0)::float8 AS avg_rating
        FROM courses
        WHERE status = 'published'
        GROUP BY category
        ORDER BY count DESC
        "#,
    )
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_instructor_courses<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    instructor_id: Uuid,
) -> Res<Vec<Course>> {
    sqlx::query_as::<_, Course>(
        "SELECT * FROM courses WHERE instructor_id = $1 ORDER BY created_at DESC",
    )
    .bind(instructor_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_instructor_course<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    course_id: Uuid,
    instructor_id: Uuid,
) -> Res<Option<Course>> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1 AND instructor_id = $2")
        .bind(course_id)
        .bind(instructor_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn increment_students<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    course_id: Uuid,
) -> Res<()> {
    sqlx::query("UPDATE courses SET students_count = students_count + 1 WHERE id = $1")
        .bind(course_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn decrement_students<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    course_id: Uuid,
) -> Res<()> {
    sqlx::query(
        "UPDATE courses SET students_count = GREATEST(students_count - 1, 0) WHERE id = $1",
    )
    .bind(course_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete_course<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    course_id: Uuid,
) -> Res<bool> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(course_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_courses<'e, E: Executor<'e, Database = Postgres>>(executor: E) -> Res<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM courses")
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collisions_get_suffixes() {
        assert_eq!(next_free_slug("react", &[]), "react");
        let taken = vec!["react".to_string(), "react-2".to_string()];
        assert_eq!(next_free_slug("react", &taken), "react-3");
        assert_eq!(next_free_slug("", &[]), "cours");
    }

    #[test]
    fn unknown_sort_keys_fall_back_to_newest() {
        assert_eq!(catalog_order(Some("-price")), "c.price DESC");
        assert_eq!(catalog_order(Some("; DROP TABLE courses")), "c.created_at DESC");
        assert_eq!(catalog_order(None), "c.created_at DESC");
    }
}
