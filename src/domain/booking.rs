use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::payment::PaymentStatus;
use super::schedule::{TimeOfDay, TimeRange};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Short human-readable reference handed to the customer.
    pub code: String,
    pub venue_id: Uuid,
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub booking_date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub price: i64,
    pub points_redeemed: i64,
    pub points_earned: i64,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancellation_type: Option<CancellationType>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn slot(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Local start of play.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.start_time.on(self.booking_date)
    }

    /// Local end of play.
    pub fn ends_at(&self) -> NaiveDateTime {
        self.end_time.on(self.booking_date)
    }

    /// Whether this booking holds its slot.
    pub fn occupies_slot(&self) -> bool {
        self.status != BookingStatus::Cancelled && self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }

    /// Validate a lifecycle step and return the new status.
    pub fn transition(self, next: BookingStatus) -> Result<BookingStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidTransition(format!(
                "booking cannot move from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancellationType {
    Customer,
    Admin,
    /// Cancelled by a sweep, e.g. unpaid past the payment window.
    System,
}

impl CancellationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationType::Customer => "customer",
            CancellationType::Admin => "admin",
            CancellationType::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "customer" => Some(CancellationType::Customer),
            "admin" => Some(CancellationType::Admin),
            "system" => Some(CancellationType::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub venue_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[validate(length(min = 1, max = 100))]
    pub customer_name: String,
    #[validate(length(min = 6, max = 20))]
    pub customer_phone: String,
    #[validate(email)]
    pub customer_email: Option<String>,
    /// Payment method code.
    #[validate(length(min = 1))]
    pub payment_method: String,
    /// Points to redeem against the invoice; requires a signed-in customer.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub points_to_redeem: i64,
    pub notes: Option<String>,
}

impl CreateBookingRequest {
    pub fn slot(&self) -> Result<TimeRange> {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
    pub cancellation_type: CancellationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleBookingRequest {
    pub booking_date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

/// Filters for the admin booking list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub venue_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub include_deleted: bool,
}
