use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};

/// Payment record for a booking. Invariant: `total_amount == amount + admin_fee`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub admin_fee: i64,
    pub total_amount: i64,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub proof_path: Option<String>,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub refund_amount: Option<i64>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(booking_id: Uuid, amount: i64, admin_fee: i64, payment_method: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            admin_fee,
            total_amount: amount + admin_fee,
            payment_method: payment_method.to_string(),
            status: PaymentStatus::Pending,
            proof_path: None,
            confirmed_by: None,
            confirmed_at: None,
            rejection_reason: None,
            refund_amount: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    WaitingConfirmation,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::WaitingConfirmation => "waiting_confirmation",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "waiting_confirmation" => Some(PaymentStatus::WaitingConfirmation),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Forward-only, with the refund branch leaving from `Paid`.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, WaitingConfirmation)
                | (Pending, Paid)
                | (Pending, Failed)
                | (WaitingConfirmation, Paid)
                | (WaitingConfirmation, Failed)
                | (Paid, Refunded)
        )
    }

    pub fn transition(self, next: PaymentStatus) -> Result<PaymentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidTransition(format!(
                "payment cannot move from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub fee_type: FeeType,
    /// Rupiah for `Fixed`, percent for `Percentage`.
    pub fee_value: f64,
    pub instructions: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    pub fn admin_fee(&self, amount: i64) -> i64 {
        admin_fee(self.fee_type, self.fee_value, amount)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    Fixed,
    Percentage,
}

impl FeeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeType::Fixed => "fixed",
            FeeType::Percentage => "percentage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Some(FeeType::Fixed),
            "percentage" => Some(FeeType::Percentage),
            _ => None,
        }
    }
}

pub fn admin_fee(fee_type: FeeType, fee_value: f64, amount: i64) -> i64 {
    let fee = match fee_type {
        FeeType::Fixed => fee_value.round() as i64,
        FeeType::Percentage => (amount as f64 * fee_value / 100.0).round() as i64,
    };
    fee.max(0)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePaymentMethodRequest {
    #[validate(length(min = 1, max = 40))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub fee_type: FeeType,
    #[validate(range(min = 0.0))]
    pub fee_value: f64,
    pub instructions: Option<String>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdatePaymentMethodRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub fee_type: Option<FeeType>,
    #[validate(range(min = 0.0))]
    pub fee_value: Option<f64>,
    pub instructions: Option<String>,
    pub is_active: Option<bool>,
    pub display_order: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_fee() {
        assert_eq!(admin_fee(FeeType::Fixed, 4000.0, 150_000), 4000);
        assert_eq!(admin_fee(FeeType::Percentage, 0.7, 150_000), 1050);
        assert_eq!(admin_fee(FeeType::Percentage, 2.5, 99_999), 2500);
        assert_eq!(admin_fee(FeeType::Fixed, 0.0, 150_000), 0);
    }

    #[test]
    fn test_transaction_total() {
        let tx = Transaction::new(Uuid::new_v4(), 100_000, 2_500, "bank_transfer");
        assert_eq!(tx.total_amount, 102_500);
        assert_eq!(tx.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_payment_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(WaitingConfirmation));
        assert!(WaitingConfirmation.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Refunded));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Failed.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Refunded));
    }
}
