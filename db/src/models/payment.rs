use std::fmt;

use chrono::{DateTime, Datelike, Duration, Utc};
use common::error::{AppError, Res};
use serde::Serialize;
use uuid::Uuid;

/// Days after `paid_at` during which a refund may be requested.
pub const REFUND_WINDOW_DAYS: i64 = 14;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Refunded,
    Cancelled,
}
impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Res<Self> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(AppError::Internal(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}
impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub original_price: Option<i64>,
    pub discount_code: Option<String>,
    pub discount_percentage: Option<i32>,
    #[serde(skip_serializing)]
    pub stripe_payment_intent_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_session_id: Option<String>,
    pub payment_method: String,
    pub status: String,
    pub invoice_number: Option<String>,
    pub invoice_generated_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
    pub refund_reason: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_refund_id: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment history row with the purchased course title.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub course_slug: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub invoice_number: Option<String>,
    pub refund_amount: Option<i64>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> Res<PaymentStatus> {
        PaymentStatus::from_str(&self.status)
    }
}

/// Whether a payment made at `paid_at` can still be refunded at `now`.
pub fn within_refund_window(paid_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - paid_at <= Duration::days(REFUND_WINDOW_DAYS)
}

/// Invoice number `SKM-YYYYMM-NNNNN` where `sequence` counts the month's invoices from 1.
pub fn invoice_number(at: DateTime<Utc>, sequence: i64) -> String {
    format!("SKM-{}{:02}-{:05}", at.year(), at.month(), sequence)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn refund_window_is_fourteen_days() {
        let paid = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        assert!(within_refund_window(paid, paid + Duration::days(13)));
        assert!(within_refund_window(paid, paid + Duration::days(14)));
        assert!(!within_refund_window(paid, paid + Duration::days(15)));
        assert!(!within_refund_window(
            paid,
            paid + Duration::days(14) + Duration::seconds(1)
        ));
    }

    #[test]
    fn invoice_numbers_are_zero_padded() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(invoice_number(at, 1), "SKM-202503-00001");
        assert_eq!(invoice_number(at, 1234), "SKM-202503-01234");
    }

    #[test]
    fn statuses_parse() {
        assert_eq!(
            PaymentStatus::from_str("refunded").unwrap(),
            PaymentStatus::Refunded
        );
        assert!(PaymentStatus::from_str("lost").is_err());
    }
}
