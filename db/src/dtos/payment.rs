use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A completed Checkout Session, as recorded from the webhook.
pub struct PaymentInsert {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub original_price: i64,
    pub discount_code: Option<String>,
    pub discount_percentage: Option<i32>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_session_id: String,
    pub invoice_number: String,
    pub paid_at: DateTime<Utc>,
}

pub struct RefundRecord {
    pub amount: i64,
    pub reason: String,
    pub stripe_refund_id: String,
    pub refunded_at: DateTime<Utc>,
}
