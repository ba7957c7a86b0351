use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use db::dtos::payment::PaymentInsert;
use db::models::{
    course::Course,
    payment::{Payment, invoice_number},
    user::User,
};
use mailer::Mailer;
use sqlx::PgPool;
use stripe::{CheckoutSession, Event, EventObject, EventType, Webhook};
use uuid::Uuid;

/// What a completed Checkout Session tells about the purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub discount_code: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
}

/// Records written for one purchase, kept for the emails sent after commit.
pub struct Purchase {
    pub user: User,
    pub course: Course,
    pub payment: Payment,
}

/// Creates an event for the webhook based on the request payload and signature.
/// Requires a webhook secret key.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    match Webhook::construct_event(payload, signature, webhook_secret) {
        Ok(event) => Ok(event),
        Err(e) => {
            log::error!("Error constructing webhook event: {}", e);
            Err(AppError::BadRequest(format!("Webhook Error: {}", e)))
        }
    }
}

/// User, course and discount code set as session metadata at checkout.
pub fn checkout_identity(
    metadata: Option<&HashMap<String, String>>,
) -> Res<(Uuid, Uuid, Option<String>)> {
    let field = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };
    let id = |key: &str| {
        field(key)
            .and_then(|v| v.parse::<Uuid>().ok())
            .ok_or_else(|| AppError::BadRequest(format!("Checkout metadata lacks a valid {}", key)))
    };
    Ok((
        id("userId")?,
        id("courseId")?,
        field("discountCode").map(str::to_string),
    ))
}

pub fn completed_checkout(session: &CheckoutSession) -> Res<CompletedCheckout> {
    let (user_id, course_id, discount_code) = checkout_identity(session.metadata.as_ref())?;
    Ok(CompletedCheckout {
        session_id: session.id.to_string(),
        user_id,
        course_id,
        discount_code,
        amount: session.amount_total.unwrap_or(0),
        currency: session
            .currency
            .as_ref()
            .map(|c| c.to_string().to_uppercase())
            .unwrap_or_else(|| "MAD".to_string()),
        payment_intent_id: session.payment_intent.as_ref().map(|pi| pi.id().to_string()),
        customer_id: session.customer.as_ref().map(|c| c.id().to_string()),
    })
}

/// Applies a completed checkout in one transaction: event id, payment,
/// enrollment and student counter. `None` when the event or the payment
/// intent was already processed, or when the buyer or the course is gone.
pub async fn record_checkout(
    pool: &PgPool,
    event_id: &str,
    checkout: &CompletedCheckout,
    now: DateTime<Utc>,
) -> Res<Option<Purchase>> {
    let mut tx = pool.begin().await?;

    if !db::webhook::record_event(&mut *tx, event_id, "checkout.session.completed").await? {
        log::info!("Event {} already processed, skipping", event_id);
        return Ok(None);
    }

    let user = db::user::get_user_by_id(&mut *tx, checkout.user_id).await?;
    let course = db::course::get_course_by_id(&mut *tx, checkout.course_id).await?;
    let (Some(user), Some(course)) = (user, course) else {
        // acknowledged: a redelivery would find the same rows missing
        log::error!(
            "Checkout session {} references a missing user {} or course {}",
            checkout.session_id,
            checkout.user_id,
            checkout.course_id
        );
        tx.commit().await?;
        return Ok(None);
    };

    let sequence = db::payment::count_invoices_in_month(&mut *tx, now).await? + 1;
    let discounted = checkout.amount < course.price;
    let payment = db::payment::insert_payment(
        &mut *tx,
        PaymentInsert {
            user_id: user.id,
            course_id: course.id,
            amount: checkout.amount,
            currency: checkout.currency.clone(),
            original_price: course.price,
            discount_code: checkout.discount_code.clone(),
            discount_percentage: course.discount_percentage.filter(|_| discounted),
            stripe_payment_intent_id: checkout.payment_intent_id.clone(),
            stripe_customer_id: checkout.customer_id.clone(),
            stripe_session_id: checkout.session_id.clone(),
            invoice_number: invoice_number(now, sequence),
            paid_at: now,
        },
    )
    .await?;

    let Some(payment) = payment else {
        log::info!(
            "Payment intent {:?} already recorded, skipping",
            checkout.payment_intent_id
        );
        tx.commit().await?;
        return Ok(None);
    };

    let enrollment =
        db::enrollment::insert_enrollment(&mut *tx, user.id, course.id, checkout.amount, "card")
            .await?;
    if enrollment.is_some() {
        db::course::increment_students(&mut *tx, course.id).await?;
    } else {
        log::warn!("User {} paid for course {} they were already enrolled in", user.id, course.id);
    }

    tx.commit().await?;
    Ok(Some(Purchase {
        user,
        course,
        payment,
    }))
}

/// Email failures never undo a recorded purchase.
pub async fn send_purchase_emails(mailer: &Mailer, purchase: &Purchase) {
    let Purchase {
        user,
        course,
        payment,
    } = purchase;
    if let Err(e) = mailer
        .send_enrollment_confirmation(&user.email, &user.first_name, &course.title, &course.slug)
        .await
    {
        log::error!("Failed to send enrollment confirmation to {}: {}", user.id, e);
    }
    if let Err(e) = mailer
        .send_payment_receipt(
            &user.email,
            &user.first_name,
            &course.title,
            payment.invoice_number.as_deref().unwrap_or_default(),
            payment.amount,
            &payment.currency,
        )
        .await
    {
        log::error!("Failed to send receipt for payment {}: {}", payment.id, e);
    }
}

/// Processes the webhook event.
pub async fn process_webhook_event(pool: &PgPool, mailer: &Mailer, event: Event) -> Res<()> {
    log::info!("Processing webhook event {}: {}", event.id, event.type_);

    match event.type_ {
        EventType::CheckoutSessionCompleted => {
            if let EventObject::CheckoutSession(session) = event.data.object {
                let checkout = match completed_checkout(&session) {
                    Ok(checkout) => checkout,
                    Err(e) => {
                        // retrying cannot fix missing metadata
                        log::error!("Ignoring checkout session {}: {}", session.id, e);
                        return Ok(());
                    }
                };
                if let Some(purchase) =
                    record_checkout(pool, event.id.as_str(), &checkout, Utc::now()).await?
                {
                    log::info!(
                        "Payment {} recorded for checkout session {}",
                        purchase.payment.id,
                        checkout.session_id
                    );
                    send_purchase_emails(mailer, &purchase).await;
                }
            }
        }
        EventType::PaymentIntentPaymentFailed => {
            if let EventObject::PaymentIntent(payment_intent) = event.data.object {
                log::warn!("Payment failed: {}", payment_intent.id);
            }
        }
        _ => {
            log::info!("Unhandled event type: {}", event.type_);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn identity_is_read_from_metadata() {
        let user_id = Uuid::new_v4();
        let course_id = Uuid::new_v4();
        let m = metadata(&[
            ("userId", &user_id.to_string()),
            ("courseId", &course_id.to_string()),
            ("discountCode", ""),
        ]);
        assert_eq!(
            checkout_identity(Some(&m)).unwrap(),
            (user_id, course_id, None)
        );

        let m = metadata(&[
            ("userId", &user_id.to_string()),
            ("courseId", &course_id.to_string()),
            ("discountCode", "RAMADAN"),
        ]);
        assert_eq!(
            checkout_identity(Some(&m)).unwrap().2.as_deref(),
            Some("RAMADAN")
        );
    }

    #[test]
    fn missing_or_malformed_metadata_is_rejected() {
        assert_eq!(checkout_identity(None).unwrap_err().status(), 400);
        let m = metadata(&[("userId", "42"), ("courseId", "abc")]);
        assert!(checkout_identity(Some(&m)).is_err());
    }

    #[test]
    fn bad_signature_is_a_webhook_error() {
        let err = construct_event("{}", "t=1,v1=deadbeef", "whsec_test").unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.public_message().starts_with("Webhook Error"));
    }

    fn sale(user_id: Uuid, course_id: Uuid) -> CompletedCheckout {
        CompletedCheckout {
            session_id: format!("cs_{}", Uuid::new_v4().simple()),
            user_id,
            course_id,
            discount_code: None,
            amount: 19900,
            currency: "MAD".into(),
            payment_intent_id: Some(format!("pi_{}", Uuid::new_v4().simple())),
            customer_id: Some("cus_test".into()),
        }
    }

    fn event_id() -> String {
        format!("evt_{}", Uuid::new_v4().simple())
    }

    #[actix_web::test]
    #[ignore = "requires postgres"]
    async fn redelivered_checkout_is_applied_once() {
        use common::misc::Role;
        use db::testing::{database, stored_course, stored_user};

        let pool = database().await;
        let student = stored_user(&pool, Role::Student).await;
        let author = stored_user(&pool, Role::Instructor).await;
        let course = stored_course(&pool, author.id, 19900).await;
        let checkout = sale(student.id, course.id);
        let event = event_id();
        let now = Utc::now();

        let first = record_checkout(&pool, &event, &checkout, now).await.unwrap();
        assert!(first.is_some());
        // same event delivered again
        assert!(record_checkout(&pool, &event, &checkout, now).await.unwrap().is_none());
        // new event for a payment intent already recorded
        assert!(
            record_checkout(&pool, &event_id(), &checkout, now)
                .await
                .unwrap()
                .is_none()
        );

        let payments = db::payment::list_user_payments(&*pool, student.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert!(
            db::enrollment::is_enrolled(&*pool, student.id, course.id)
                .await
                .unwrap()
        );
        let stored = db::course::get_course_by_id(&*pool, course.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.students_count, 1);
    }

    #[actix_web::test]
    #[ignore = "requires postgres"]
    async fn checkout_for_a_missing_user_is_acknowledged() {
        use common::misc::Role;
        use db::testing::{database, stored_course, stored_user};

        let pool = database().await;
        let author = stored_user(&pool, Role::Instructor).await;
        let course = stored_course(&pool, author.id, 19900).await;
        let event = event_id();

        let outcome = record_checkout(&pool, &event, &sale(Uuid::new_v4(), course.id), Utc::now())
            .await
            .unwrap();
        assert!(outcome.is_none());
        // the event is marked processed, so redeliveries stop here
        assert!(
            !db::webhook::record_event(&*pool, &event, "checkout.session.completed")
                .await
                .unwrap()
        );
    }
}
