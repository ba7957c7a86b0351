use common::{
    error::{AppError, Res},
    misc::Role,
    validation::Validator,
};
use db::{
    dtos::course::CourseData,
    models::{
        course::{CATEGORIES, Course, CourseStatus, LANGUAGES, LEVELS},
        user::User,
    },
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dtos::course::{CoursePatch, CourseRequest, InstructorStats};

const DEFAULT_CURRENCY: &str = "MAD";

pub fn validate_course(data: &CourseData) -> Res<()> {
    let mut validator = Validator::new();
    validator
        .required("title", &data.title, 200)
        .required("description", &data.description, 5000)
        .check(
            data.short_description
                .as_ref()
                .is_none_or(|s| s.chars().count() <= 300),
            "shortDescription",
            "Maximum 300 characters",
        )
        .check(
            CATEGORIES.contains(&data.category.as_str()),
            "category",
            "Unknown category",
        )
        .check(LEVELS.contains(&data.level.as_str()), "level", "Unknown level")
        .check(
            LANGUAGES.contains(&data.language.as_str()),
            "language",
            "Unknown language",
        )
        .check(data.price >= 0, "price", "Price cannot be negative")
        .check(
            data.discount_percentage
                .is_none_or(|pct| (0..=100).contains(&pct)),
            "discountPercentage",
            "Discount must be between 0 and 100",
        )
        .check(
            CourseStatus::from_str(&data.status).is_ok(),
            "status",
            "Unknown status",
        );
    for chapter in &data.chapters {
        validator.check(
            !chapter.title.trim().is_empty(),
            "chapters",
            "Every chapter needs a title",
        );
        for lesson in &chapter.lessons {
            validator
                .check(
                    !lesson.title.trim().is_empty(),
                    "chapters",
                    "Every lesson needs a title",
                )
                .check(
                    lesson.video_duration >= 0,
                    "chapters",
                    "Lesson duration cannot be negative",
                );
        }
    }
    validator.finish()
}

fn is_admin(user: &User) -> bool {
    user.role().is_ok_and(|role| role == Role::Admin)
}

/// Instructors may edit their own courses, admins any course.
pub fn ensure_can_edit(course: &Course, user: &User) -> Res<()> {
    if course.instructor_id == user.id || is_admin(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not allowed to modify this course".to_string(),
        ))
    }
}

/// Lesson videos are visible to enrolled students, the course author and admins.
pub fn can_watch(course: &Course, user: Option<&User>, is_enrolled: bool) -> bool {
    is_enrolled || user.is_some_and(|u| u.id == course.instructor_id || is_admin(u))
}

/// Featured flags sent by non-admin authors are ignored.
pub fn new_course_data(req: CourseRequest, slug: String, author: &User) -> CourseData {
    let admin = is_admin(author);
    CourseData {
        title: req.title.trim().to_string(),
        slug,
        description: req.description,
        short_description: req.short_description,
        category: req.category,
        subcategory: req.subcategory,
        tags: req.tags,
        thumbnail: req.thumbnail,
        preview_video: req.preview_video,
        chapters: req.chapters,
        price: req.price,
        currency: req.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        discount_percentage: req.discount_percentage,
        discount_valid_until: req.discount_valid_until,
        level: req.level.unwrap_or_else(|| LEVELS[0].to_string()),
        prerequisites: req.prerequisites,
        learning_outcomes: req.learning_outcomes,
        language: req.language.unwrap_or_else(|| LANGUAGES[0].to_string()),
        has_certificate: req.has_certificate.unwrap_or(true),
        status: req
            .status
            .unwrap_or_else(|| CourseStatus::Draft.as_str().to_string()),
        is_featured: admin && req.is_featured.unwrap_or(false),
        featured_order: if admin { req.featured_order } else { None },
    }
}

/// Stored course with the patch applied on top.
pub fn merge_patch(course: Course, patch: CoursePatch, slug: String, editor: &User) -> CourseData {
    let admin = is_admin(editor);
    CourseData {
        title: patch
            .title
            .map(|t| t.trim().to_string())
            .unwrap_or(course.title),
        slug,
        description: patch.description.unwrap_or(course.description),
        short_description: patch.short_description.or(course.short_description),
        category: patch.category.unwrap_or(course.category),
        subcategory: patch.subcategory.or(course.subcategory),
        tags: patch.tags.unwrap_or(course.tags),
        thumbnail: patch.thumbnail,
        preview_video: patch.preview_video.or(course.preview_video),
        chapters: patch.chapters.unwrap_or(course.chapters.0),
        price: patch.price.unwrap_or(course.price),
        currency: patch.currency.unwrap_or(course.currency),
        discount_percentage: patch.discount_percentage.or(course.discount_percentage),
        discount_valid_until: patch.discount_valid_until.or(course.discount_valid_until),
        level: patch.level.unwrap_or(course.level),
        prerequisites: patch.prerequisites.unwrap_or(course.prerequisites),
        learning_outcomes: patch.learning_outcomes.unwrap_or(course.learning_outcomes),
        language: patch.language.unwrap_or(course.language),
        has_certificate: patch.has_certificate.unwrap_or(course.has_certificate),
        status: patch.status.unwrap_or(course.status),
        is_featured: match patch.is_featured {
            Some(featured) if admin => featured,
            _ => course.is_featured,
        },
        featured_order: match patch.featured_order {
            Some(order) if admin => Some(order),
            _ => course.featured_order,
        },
    }
}

/// Loads a course the caller may edit: 404 when missing, 403 when not theirs.
pub async fn get_editable_course(pool: &PgPool, course_id: Uuid, user: &User) -> Res<Course> {
    let course = db::course::get_course_by_id(pool, course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;
    ensure_can_edit(&course, user)?;
    Ok(course)
}

pub fn instructor_stats(courses: &[Course]) -> InstructorStats {
    let count_status = |status: CourseStatus| {
        courses
            .iter()
            .filter(|c| c.status == status.as_str())
            .count()
    };
    let ratings: Vec<f64> = courses
        .iter()
        .map(|c| c.rating)
        .filter(|r| *r > 0.0)
        .collect();
    let avg_rating = if ratings.is_empty() {
        0.0
    } else {
        let avg = ratings.iter().sum::<f64>() / ratings.len() as f64;
        (avg * 10.0).round() / 10.0
    };

    InstructorStats {
        total_courses: courses.len(),
        published_courses: count_status(CourseStatus::Published),
        draft_courses: count_status(CourseStatus::Draft),
        total_students: courses.iter().map(|c| c.students_count as i64).sum(),
        total_revenue: courses
            .iter()
            .map(|c| c.students_count as i64 * c.price)
            .sum(),
        avg_rating,
    }
}

#[cfg(test)]
mod tests {
    use db::testing::{course, user};

    use super::*;

    fn request() -> CourseRequest {
        serde_json::from_value(serde_json::json!({
            "title": "  Rust pour les débutants ",
            "description": "Apprendre Rust pas à pas",
            "category": "developpement-web",
            "price": 19900,
            "isFeatured": true,
            "chapters": [{
                "title": "Bases",
                "order": 1,
                "lessons": [
                    { "title": "Installation", "order": 1, "videoDuration": 300, "isFree": true },
                    { "title": "Variables", "order": 2, "videoDuration": 600 }
                ]
            }]
        }))
        .unwrap()
    }

    fn stats_course(instructor_id: Uuid, status: &str, students: i32, price: i64, rating: f64) -> Course {
        Course {
            status: status.into(),
            students_count: students,
            price,
            rating,
            ..course(instructor_id)
        }
    }

    #[test]
    fn new_course_gets_defaults_and_keeps_structure() {
        let instructor = user("instructor");
        let data = new_course_data(request(), "rust-pour-les-debutants".into(), &instructor);
        assert_eq!(data.title, "Rust pour les débutants");
        assert_eq!(data.level, "debutant");
        assert_eq!(data.language, "fr");
        assert_eq!(data.status, "draft");
        assert_eq!(data.currency, "MAD");
        assert!(!data.is_featured, "only admins feature courses");
        assert_eq!(data.chapters[0].lessons.len(), 2);
        assert!(data.chapters[0].lessons[0].is_free);
        assert!(validate_course(&data).is_ok());

        let admin = user("admin");
        assert!(new_course_data(request(), "x".into(), &admin).is_featured);
    }

    #[test]
    fn invalid_course_lists_every_field() {
        let mut data = new_course_data(request(), "x".into(), &user("instructor"));
        data.category = "cuisine".into();
        data.price = -1;
        data.discount_percentage = Some(120);
        let err = validate_course(&data).unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["category", "price", "discountPercentage"]);
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let instructor = user("instructor");
        let stored = course(instructor.id);
        let chapters = stored.chapters.0.clone();
        let patch = CoursePatch {
            price: Some(5000),
            is_featured: Some(true),
            ..Default::default()
        };
        let data = merge_patch(stored, patch, "rust".into(), &instructor);
        assert_eq!(data.price, 5000);
        assert_eq!(data.title, "Rust pour les débutants");
        assert_eq!(data.chapters, chapters);
        assert!(!data.is_featured);
        assert_eq!(data.thumbnail, None);
    }

    #[test]
    fn only_author_or_admin_edits() {
        let author = user("instructor");
        let stored = course(author.id);
        assert!(ensure_can_edit(&stored, &author).is_ok());
        assert!(ensure_can_edit(&stored, &user("admin")).is_ok());
        assert_eq!(
            ensure_can_edit(&stored, &user("instructor")).unwrap_err().status(),
            403
        );
    }

    #[test]
    fn videos_visible_to_enrolled_author_and_admin() {
        let author = user("instructor");
        let stored = course(author.id);
        assert!(!can_watch(&stored, None, false));
        assert!(!can_watch(&stored, Some(&user("student")), false));
        assert!(can_watch(&stored, Some(&user("student")), true));
        assert!(can_watch(&stored, Some(&author), false));
        assert!(can_watch(&stored, Some(&user("admin")), false));
    }

    #[test]
    fn stats_estimate_revenue_and_average_rating() {
        let id = Uuid::new_v4();
        let courses = vec![
            stats_course(id, "published", 10, 20000, 4.5),
            stats_course(id, "published", 3, 10000, 4.0),
            stats_course(id, "draft", 0, 5000, 0.0),
        ];
        let stats = instructor_stats(&courses);
        assert_eq!(stats.total_courses, 3);
        assert_eq!(stats.published_courses, 2);
        assert_eq!(stats.draft_courses, 1);
        assert_eq!(stats.total_students, 13);
        assert_eq!(stats.total_revenue, 230000);
        assert_eq!(stats.avg_rating, 4.3);
        assert_eq!(instructor_stats(&[]), InstructorStats::default());
    }
}
