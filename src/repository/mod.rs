use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::{AppError, Result};

pub mod booking_repository;
pub mod invoice_repository;
pub mod payment_method_repository;
pub mod payment_repository;
pub mod points_repository;
pub mod user_repository;
pub mod venue_repository;

pub use booking_repository::SqliteBookingRepository;
pub use invoice_repository::SqliteInvoiceRepository;
pub use payment_method_repository::SqlitePaymentMethodRepository;
pub use payment_repository::SqliteTransactionRepository;
pub use points_repository::SqlitePointsRepository;
pub use user_repository::SqliteUserRepository;
pub use venue_repository::SqliteVenueRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, request: CreateUserRequest, password_hash: String) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
}

#[async_trait]
pub trait VenueRepository: Send + Sync {
    async fn create(&self, venue: Venue) -> Result<Venue>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Venue>>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<Venue>>;
    async fn update(&self, id: Uuid, venue: Venue) -> Result<Venue>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn count_bookings(&self, id: Uuid) -> Result<i64>;
}

/// Everything written when a booking is cancelled, applied atomically.
#[derive(Debug, Clone)]
pub struct CancellationRecord {
    pub reason: Option<String>,
    pub cancellation_type: CancellationType,
    pub cancelled_at: DateTime<Utc>,
    pub refund_amount: i64,
    /// Payment status the booking and its transaction end up in.
    pub payment_status: PaymentStatus,
    /// Redeemed points handed back to the holder, if any.
    pub returned_points: Option<NewPointEntry>,
    /// Take back the points this booking earned, as far as the holder's
    /// balance allows.
    pub reverse_earned: bool,
}

/// New payable amounts for a booking whose payment has not gone through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repricing {
    pub amount: i64,
    pub admin_fee: i64,
}

/// Points movements a committed cancellation made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointsSettlement {
    pub returned: i64,
    pub reversed: i64,
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert the booking, its transaction and an optional redemption in one
    /// storage transaction. Fails with `SlotConflict` if the slot is taken.
    async fn create(
        &self,
        booking: Booking,
        transaction: Transaction,
        redemption: Option<NewPointEntry>,
    ) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Booking>>;
    async fn list(&self, filter: &BookingFilter, limit: i64, offset: i64) -> Result<Vec<Booking>>;
    /// Bookings holding a slot on `date` at `venue_id`.
    async fn list_occupying(&self, venue_id: Uuid, date: NaiveDate) -> Result<Vec<Booking>>;
    /// Compare-and-swap the lifecycle status. `false` if `from` no longer holds.
    async fn transition(&self, id: Uuid, from: BookingStatus, to: BookingStatus) -> Result<bool>;
    /// Compare-and-swap to `cancelled`. `None` if `from` no longer holds.
    async fn cancel(
        &self,
        id: Uuid,
        from: BookingStatus,
        record: CancellationRecord,
    ) -> Result<Option<PointsSettlement>>;
    /// Move to another slot, re-checking overlap. `SlotConflict` if taken.
    /// With `repricing`, the unpaid transaction takes the new amounts in the
    /// same storage transaction.
    async fn reschedule(
        &self,
        id: Uuid,
        date: NaiveDate,
        slot: TimeRange,
        price: i64,
        repricing: Option<Repricing>,
    ) -> Result<Booking>;
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;
    /// Undo a soft delete, re-checking overlap. `SlotConflict` if taken.
    async fn restore(&self, id: Uuid) -> Result<Booking>;
    /// Confirmed bookings whose end has passed at local time `now`.
    async fn list_due_for_completion(&self, now: NaiveDateTime) -> Result<Vec<Booking>>;
    /// Confirmed bookings on `date` that have not had a reminder.
    async fn list_needing_reminder(&self, date: NaiveDate) -> Result<Vec<Booking>>;
    /// Mark the reminder as sent. `false` if another sweep got there first.
    async fn claim_reminder(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    /// Pending bookings with no payment in flight, created before `cutoff`.
    async fn list_unpaid_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Transaction>>;
    async fn list_by_status(&self, status: Option<PaymentStatus>, limit: i64, offset: i64) -> Result<Vec<Transaction>>;
    async fn submit_proof(&self, id: Uuid, proof_path: &str) -> Result<bool>;
    /// Mark paid and confirm a pending booking in one storage transaction.
    async fn confirm(&self, id: Uuid, confirmed_by: Option<Uuid>, at: DateTime<Utc>) -> Result<bool>;
    async fn reject(&self, id: Uuid, reason: &str) -> Result<bool>;
}

#[async_trait]
pub trait PaymentMethodRepository: Send + Sync {
    async fn create(&self, method: PaymentMethod) -> Result<PaymentMethod>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentMethod>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<PaymentMethod>>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>>;
    async fn update(&self, id: Uuid, method: PaymentMethod) -> Result<PaymentMethod>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert unless the booking already has an invoice. `None` when it does.
    async fn create_if_absent(&self, invoice: Invoice) -> Result<Option<Invoice>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Invoice>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>>;
}

#[async_trait]
pub trait PointsRepository: Send + Sync {
    /// Append one entry, updating the holder's balance under a version check.
    async fn append(&self, entry: NewPointEntry) -> Result<PointEntry>;
    async fn balance(&self, holder_id: Uuid) -> Result<i64>;
    async fn history(&self, holder_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointEntry>>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_time(s: &str) -> Result<TimeOfDay> {
    s.parse()
        .map_err(|_| AppError::Database(format!("Invalid stored time: {}", s)))
}

pub(crate) fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}
