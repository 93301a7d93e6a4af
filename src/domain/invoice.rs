use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub booking_id: Uuid,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub payment_date: DateTime<Utc>,
    pub payment_method: String,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Paid,
    Refunded,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "paid" => Some(InvoiceStatus::Paid),
            "refunded" => Some(InvoiceStatus::Refunded),
            _ => None,
        }
    }
}

/// Amounts printed on an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceAmounts {
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
}

impl InvoiceAmounts {
    /// `redeem_rate` is the number of points worth one rupiah.
    pub fn compute(price: i64, points_redeemed: i64, redeem_rate: i64) -> Self {
        let discount = if redeem_rate > 0 {
            points_redeemed.max(0) / redeem_rate
        } else {
            0
        };
        Self {
            subtotal: price,
            discount,
            total: (price - discount).max(0),
        }
    }
}

/// `INV-YYYYMMDD-XXXXXXXX`, the suffix taken from a fresh UUID.
pub fn invoice_number(date: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("INV-{}-{}", date.format("%Y%m%d"), suffix)
}
