use chrono::{DateTime, Datelike, TimeZone, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::payment::{PaymentInsert, RefundRecord},
    models::payment::{Payment, PaymentView},
};

/// Inserts a succeeded payment. A replayed payment intent yields `None`.
pub async fn insert_payment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    req: PaymentInsert,
) -> Res<Option<Payment>> {
    sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (
            user_id, course_id, amount, currency, original_price, discount_code,
            discount_percentage, stripe_payment_intent_id, stripe_customer_id,
            stripe_session_id, payment_method, status, invoice_number,
            invoice_generated_at, paid_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'card', 'succeeded', $11, $12, $12)
        ON CONFLICT (stripe_payment_intent_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(req.user_id)
    .bind(req.course_id)
    .bind(req.amount)
    .bind(req.currency)
    .bind(req.original_price)
    .bind(req.discount_code)
    .bind(req.discount_percentage)
    .bind(req.stripe_payment_intent_id)
    .bind(req.stripe_customer_id)
    .bind(req.stripe_session_id)
    .bind(req.invoice_number)
    .bind(req.paid_at)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Number of invoices already issued in the calendar month of `at`.
pub async fn count_invoices_in_month<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    at: DateTime<Utc>,
) -> Res<i64> {
    let start = Utc
        .with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| AppError::Internal(format!("Invalid invoice month for {}", at)))?;
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM payments
        WHERE invoice_generated_at >= $1
          AND invoice_generated_at < $1 + INTERVAL '1 month'
        "#,
    )
    .bind(start)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_user_payment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    payment_id: Uuid,
    user_id: Uuid,
) -> Res<Option<Payment>> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 AND user_id = $2")
        .bind(payment_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_payment_by_session<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session_id: &str,
) -> Res<Option<Payment>> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE stripe_session_id = $1")
        .bind(session_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn list_user_payments<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<PaymentView>> {
    sqlx::query_as::<_, PaymentView>(
        r#"
        SELECT p.id, p.course_id, c.title AS course_title, c.slug AS course_slug,
               p.amount, p.currency, p.status, p.invoice_number, p.refund_amount,
               p.refunded_at, p.paid_at, p.created_at
        FROM payments p
        JOIN courses c ON c.id = p.course_id
        WHERE p.user_id = $1
        ORDER BY p.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Marks a succeeded payment refunded. Returns `None` if it was not in `succeeded` anymore.
pub async fn mark_refunded<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    payment_id: Uuid,
    refund: RefundRecord,
) -> Res<Option<Payment>> {
    sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments SET
            status = 'refunded',
            refund_amount = $2,
            refund_reason = $3,
            stripe_refund_id = $4,
            refunded_at = $5,
            updated_at = now()
        WHERE id = $1 AND status = 'succeeded'
        RETURNING *
        "#,
    )
    .bind(payment_id)
    .bind(refund.amount)
    .bind(refund.reason)
    .bind(refund.stripe_refund_id)
    .bind(refund.refunded_at)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Revenue of succeeded payments, in minor units.
pub async fn total_revenue<'e, E: Executor<'e, Database = Postgres>>(executor: E) -> Res<i64> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::bigint FROM payments WHERE status = 'succeeded'",
    )
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
