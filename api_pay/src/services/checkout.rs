use std::collections::HashMap;

use common::{
    env_config::Config,
    error::{AppError, Res},
};
use db::models::{course::Course, user::User};
use sqlx::PgPool;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCheckoutSessionPaymentMethodTypes,
    Currency, CustomerId,
};
use uuid::Uuid;

const DESCRIPTION_MAX_CHARS: usize = 200;

/// Stripe currency from a configured ISO code such as `mad`.
pub fn parse_currency(code: &str) -> Res<Currency> {
    serde_json::from_value(serde_json::Value::String(code.trim().to_lowercase()))
        .map_err(|_| AppError::Internal(format!("Unsupported currency: {}", code)))
}

pub fn checkout_metadata(
    course_id: Uuid,
    user_id: Uuid,
    discount_code: Option<&str>,
) -> HashMap<String, String> {
    HashMap::from([
        ("courseId".to_string(), course_id.to_string()),
        ("userId".to_string(), user_id.to_string()),
        (
            "discountCode".to_string(),
            discount_code.unwrap_or_default().to_string(),
        ),
    ])
}

/// Product description shown on the hosted page.
pub fn line_description(course: &Course) -> String {
    match &course.short_description {
        Some(short) if !short.trim().is_empty() => short.clone(),
        _ => course.description.chars().take(DESCRIPTION_MAX_CHARS).collect(),
    }
}

pub fn success_url(frontend_url: &str) -> String {
    format!(
        "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
        frontend_url.trim_end_matches('/')
    )
}

pub fn cancel_url(frontend_url: &str, course_slug: &str) -> String {
    format!(
        "{}/courses/{}?payment=cancelled",
        frontend_url.trim_end_matches('/'),
        course_slug
    )
}

/// Enrolls the user in a course that costs nothing and counts the new student.
pub async fn enroll_free(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Res<()> {
    let mut tx = pool.begin().await?;
    let enrollment =
        db::enrollment::insert_enrollment(&mut *tx, user_id, course_id, 0, "free").await?;
    if enrollment.is_none() {
        return Err(AppError::BadRequest(
            "Already enrolled in this course".to_string(),
        ));
    }
    db::course::increment_students(&mut *tx, course_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Stripe customer of the user, created and stored on first purchase.
pub async fn ensure_customer(client: &Client, pool: &PgPool, user: &User) -> Res<CustomerId> {
    if let Some(customer_id) = &user.stripe_customer_id {
        return customer_id.parse::<CustomerId>().map_err(|e| {
            AppError::Internal(format!(
                "Failed to parse customer id: {}. {}",
                customer_id, e
            ))
        });
    }
    let customer =
        common::stripe::create_customer(client, &user.email, &user.full_name(), user.id).await?;
    db::user::set_stripe_customer_id(pool, user.id, customer.id.as_str()).await?;
    log::info!("Stripe customer {} created for {}", customer.id, user.id);
    Ok(customer.id)
}

/// Hosted one-off payment page for `course` at `unit_amount` minor units.
pub async fn create_session(
    client: &Client,
    config: &Config,
    customer: CustomerId,
    course: &Course,
    user_id: Uuid,
    unit_amount: i64,
    discount_code: Option<&str>,
) -> Res<CheckoutSession> {
    let success_url = success_url(&config.frontend_url);
    let cancel_url = cancel_url(&config.frontend_url, &course.slug);
    let params = CreateCheckoutSession {
        payment_method_types: Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]),
        line_items: Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: parse_currency(&config.stripe_currency)?,
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: course.title.clone(),
                    description: Some(line_description(course)),
                    ..Default::default()
                }),
                unit_amount: Some(unit_amount),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]),
        mode: Some(CheckoutSessionMode::Payment),
        metadata: Some(checkout_metadata(course.id, user_id, discount_code)),
        success_url: Some(success_url.as_str()),
        cancel_url: Some(cancel_url.as_str()),
        customer: Some(customer),
        ..Default::default()
    };
    CheckoutSession::create(client, params)
        .await
        .map_err(AppError::from)
}

pub async fn retrieve_session(client: &Client, session_id: &str) -> Res<CheckoutSession> {
    let id = session_id
        .parse::<CheckoutSessionId>()
        .map_err(|_| AppError::BadRequest(format!("Invalid session id: {}", session_id)))?;
    CheckoutSession::retrieve(client, &id, &[])
        .await
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use db::testing::course;

    use super::*;

    #[test]
    fn configured_currency_is_understood() {
        assert_eq!(parse_currency("mad").unwrap(), Currency::MAD);
        assert_eq!(parse_currency("EUR").unwrap(), Currency::EUR);
    }

    #[test]
    fn metadata_carries_identity_and_discount() {
        let course_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let metadata = checkout_metadata(course_id, user_id, None);
        assert_eq!(metadata["courseId"], course_id.to_string());
        assert_eq!(metadata["userId"], user_id.to_string());
        assert_eq!(metadata["discountCode"], "");
        assert_eq!(
            checkout_metadata(course_id, user_id, Some("RAMADAN"))["discountCode"],
            "RAMADAN"
        );
    }

    #[test]
    fn redirect_urls_point_to_the_frontend() {
        assert_eq!(
            success_url("https://skillup.ma/"),
            "https://skillup.ma/payment/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(
            cancel_url("https://skillup.ma", "rust"),
            "https://skillup.ma/courses/rust?payment=cancelled"
        );
    }

    #[test]
    fn description_falls_back_to_truncated_text() {
        let author = Uuid::new_v4();
        let long = Course {
            description: "a".repeat(500),
            ..course(author)
        };
        assert_eq!(line_description(&long).len(), 200);

        let short = Course {
            short_description: Some("Les bases de Rust".into()),
            ..course(author)
        };
        assert_eq!(line_description(&short), "Les bases de Rust");
    }
}
