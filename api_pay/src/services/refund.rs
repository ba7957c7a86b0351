use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use db::dtos::payment::RefundRecord;
use db::models::payment::{
    Payment, PaymentStatus, REFUND_WINDOW_DAYS, within_refund_window,
};
use sqlx::PgPool;
use stripe::{Client, CreateRefund, PaymentIntentId, Refund, RefundReasonFilter};

pub const DEFAULT_REFUND_REASON: &str = "Demande client";

/// A payment can be refunded once, while succeeded, within the refund window.
pub fn ensure_refundable(payment: &Payment, now: DateTime<Utc>) -> Res<()> {
    if payment.status()? != PaymentStatus::Succeeded {
        return Err(AppError::BadRequest(format!(
            "Payment cannot be refunded in status {}",
            payment.status
        )));
    }
    let paid_at = payment
        .paid_at
        .ok_or_else(|| AppError::BadRequest("Payment has no payment date".to_string()))?;
    if !within_refund_window(paid_at, now) {
        return Err(AppError::BadRequest(format!(
            "Refunds are only possible within {} days of payment",
            REFUND_WINDOW_DAYS
        )));
    }
    Ok(())
}

/// Processes the refund of a given payment intent.
pub async fn process_refund(client: &Client, payment: &Payment) -> Res<Refund> {
    let intent = payment
        .stripe_payment_intent_id
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Payment has no Stripe payment intent".to_string()))?;
    let payment_intent_id = intent.parse::<PaymentIntentId>().map_err(|e| {
        AppError::Internal(format!(
            "Failed to parse payment intent id: {}. {}",
            intent, e
        ))
    })?;

    let mut params = CreateRefund::new();
    params.payment_intent = Some(payment_intent_id);
    params.reason = Some(RefundReasonFilter::RequestedByCustomer);

    Refund::create(client, params).await.map_err(AppError::from)
}

pub fn refund_record(refund: &Refund, reason: &str, now: DateTime<Utc>) -> RefundRecord {
    RefundRecord {
        amount: refund.amount,
        reason: reason.to_string(),
        stripe_refund_id: refund.id.to_string(),
        refunded_at: now,
    }
}

/// Marks the payment refunded, removes the enrollment and the student it counted.
pub async fn revoke_purchase(pool: &PgPool, payment: &Payment, record: RefundRecord) -> Res<Payment> {
    let mut tx = pool.begin().await?;
    let refunded = db::payment::mark_refunded(&mut *tx, payment.id, record)
        .await?
    .ok_or_else(|| AppError::BadRequest("Payment was already refunded".to_string()))?;

    if db::enrollment::delete_enrollment(&mut *tx, payment.user_id, payment.course_id).await? {
        db::course::decrement_students(&mut *tx, payment.course_id).await?;
    }
    tx.commit().await?;
    Ok(refunded)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use db::testing::payment;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn refund_allowed_within_fourteen_days() {
        let now = Utc::now();
        let mut paid = payment(Uuid::new_v4(), Uuid::new_v4());
        paid.paid_at = Some(now - Duration::days(13));
        assert!(ensure_refundable(&paid, now).is_ok());
        paid.paid_at = Some(now - Duration::days(14));
        assert!(ensure_refundable(&paid, now).is_ok());
    }

    #[test]
    fn late_refund_is_rejected() {
        let now = Utc::now();
        let mut paid = payment(Uuid::new_v4(), Uuid::new_v4());
        paid.paid_at = Some(now - Duration::days(15));
        assert_eq!(ensure_refundable(&paid, now).unwrap_err().status(), 400);
    }

    #[test]
    fn only_succeeded_payments_are_refunded() {
        let now = Utc::now();
        let mut paid = payment(Uuid::new_v4(), Uuid::new_v4());
        paid.status = "refunded".into();
        assert_eq!(ensure_refundable(&paid, now).unwrap_err().status(), 400);
        paid.status = "pending".into();
        assert!(ensure_refundable(&paid, now).is_err());
    }

    #[actix_web::test]
    #[ignore = "requires postgres"]
    async fn refund_revokes_the_purchase_once() {
        use common::misc::Role;
        use db::testing::{database, stored_course, stored_user};

        use crate::services::webhook::{CompletedCheckout, record_checkout};

        let pool = database().await;
        let student = stored_user(&pool, Role::Student).await;
        let author = stored_user(&pool, Role::Instructor).await;
        let course = stored_course(&pool, author.id, 10000).await;
        // a past month keeps invoice numbers apart from other database tests
        let paid_at = Utc::now() - Duration::days(400);
        let sale = CompletedCheckout {
            session_id: format!("cs_{}", Uuid::new_v4().simple()),
            user_id: student.id,
            course_id: course.id,
            discount_code: None,
            amount: 10000,
            currency: "MAD".into(),
            payment_intent_id: Some(format!("pi_{}", Uuid::new_v4().simple())),
            customer_id: None,
        };
        let event = format!("evt_{}", Uuid::new_v4().simple());
        let purchase = record_checkout(&pool, &event, &sale, paid_at)
            .await
            .unwrap()
            .unwrap();

        let record = |id: &str| RefundRecord {
            amount: 10000,
            reason: DEFAULT_REFUND_REASON.to_string(),
            stripe_refund_id: id.to_string(),
            refunded_at: Utc::now(),
        };
        let refunded = revoke_purchase(&pool, &purchase.payment, record("re_1"))
            .await
            .unwrap();
        assert_eq!(refunded.status, "refunded");
        assert_eq!(refunded.refund_amount, Some(10000));
        assert!(
            !db::enrollment::is_enrolled(&*pool, student.id, course.id)
                .await
                .unwrap()
        );
        let stored = db::course::get_course_by_id(&*pool, course.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.students_count, 0);

        let again = revoke_purchase(&pool, &purchase.payment, record("re_2")).await;
        assert_eq!(again.unwrap_err().status(), 400);
    }
}
