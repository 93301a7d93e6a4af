use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::BookingConfig,
    domain::{
        availability::ensure_within_hours, refund::RefundTier, Booking, BookingFilter, BookingStatus,
        CancellationType, CreateBookingRequest, NewPointEntry, PaymentStatus, PointsPolicy,
        RescheduleBookingRequest, TimeRange, Transaction, User,
    },
    error::{AppError, Result},
    events::{DomainEvent, EventBus},
    notifications::{Dispatcher, Notification, NotificationKind},
    repository::{
        BookingRepository, CancellationRecord, PaymentMethodRepository, Repricing,
        TransactionRepository, VenueRepository,
    },
    service::venue_service::quote,
};

/// Outcome of a periodic sweep. Failed items are logged and counted; the
/// sweep carries on with the rest.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub refund_amount: i64,
    pub refund_tier: Option<RefundTier>,
    pub points_returned: i64,
    pub points_reversed: i64,
}

pub struct BookingService {
    venue_repo: Arc<dyn VenueRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    payment_method_repo: Arc<dyn PaymentMethodRepository>,
    event_bus: Arc<EventBus>,
    notifier: Arc<Dispatcher>,
    config: BookingConfig,
    points_policy: PointsPolicy,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        venue_repo: Arc<dyn VenueRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        transaction_repo: Arc<dyn TransactionRepository>,
        payment_method_repo: Arc<dyn PaymentMethodRepository>,
        event_bus: Arc<EventBus>,
        notifier: Arc<Dispatcher>,
        config: BookingConfig,
        points_policy: PointsPolicy,
    ) -> Self {
        Self {
            venue_repo,
            booking_repo,
            transaction_repo,
            payment_method_repo,
            event_bus,
            notifier,
            config,
            points_policy,
        }
    }

    pub async fn create_booking(&self, request: CreateBookingRequest, user: Option<&User>) -> Result<Booking> {
        self.create_booking_at(request, user, self.config.local_now()).await
    }

    /// Create a booking as if the venue's local clock read `now`.
    pub async fn create_booking_at(
        &self,
        request: CreateBookingRequest,
        user: Option<&User>,
        now: NaiveDateTime,
    ) -> Result<Booking> {
        request.validate()?;
        let slot = request.slot()?;

        let venue = self
            .venue_repo
            .find_by_id(request.venue_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Venue not found".to_string()))?;
        if !venue.is_bookable() {
            return Err(AppError::BadRequest(format!(
                "{} is not accepting bookings ({})",
                venue.title,
                venue.status.as_str()
            )));
        }

        ensure_not_past(request.booking_date, &slot, now)?;
        ensure_within_hours(&slot, &venue.operating_hours())?;

        let price = quote(&venue, request.booking_date, &slot, &self.config.weekend_days())?.total;

        let method = self
            .payment_method_repo
            .find_by_code(&request.payment_method)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| {
                AppError::Validation(format!("Unknown payment method: {}", request.payment_method))
            })?;

        let points = request.points_to_redeem;
        let holder = match (points > 0, user) {
            (false, _) => None,
            (true, Some(user)) => Some(user.id),
            (true, None) => {
                return Err(AppError::Validation(
                    "Sign in to redeem points".to_string(),
                ))
            }
        };
        let discount = self.redemption_discount(points);
        if discount > price {
            return Err(AppError::Validation(format!(
                "Redeeming {} points exceeds the booking price",
                points
            )));
        }

        let now_utc = Utc::now();
        let booking_id = Uuid::new_v4();
        let code = booking_code(request.booking_date);
        let amount = price - discount;

        let booking = Booking {
            id: booking_id,
            code: code.clone(),
            venue_id: venue.id,
            user_id: user.map(|u| u.id),
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            customer_email: request
                .customer_email
                .or_else(|| user.map(|u| u.email.clone())),
            booking_date: request.booking_date,
            start_time: slot.start,
            end_time: slot.end,
            price,
            points_redeemed: points,
            points_earned: 0,
            payment_method: method.code.clone(),
            payment_status: PaymentStatus::Pending,
            status: BookingStatus::Pending,
            notes: request.notes,
            cancellation_reason: None,
            cancellation_type: None,
            cancelled_at: None,
            refund_amount: None,
            refunded_at: None,
            reminder_sent_at: None,
            deleted_at: None,
            created_at: now_utc,
            updated_at: now_utc,
        };
        let transaction = Transaction::new(booking_id, amount, method.admin_fee(amount), &method.code);
        let redemption = holder.map(|holder_id| NewPointEntry::redeemed(holder_id, points, booking_id, &code));

        let booking = self
            .booking_repo
            .create(booking, transaction.clone(), redemption)
            .await?;
        tracing::info!(
            "Created booking {} for {} on {} {}",
            booking.code,
            venue.title,
            booking.booking_date,
            booking.slot()
        );

        self.event_bus
            .publish(DomainEvent::BookingCreated {
                booking: booking.clone(),
                transaction,
            })
            .await;

        Ok(booking)
    }

    /// Rupiah discount bought by redeeming `points`.
    fn redemption_discount(&self, points: i64) -> i64 {
        if self.points_policy.redeem_rate > 0 {
            points / self.points_policy.redeem_rate
        } else {
            0
        }
    }

    /// New charge for an unpaid booking moving to `price`. The redeemed
    /// points keep their discount and the method's fee is recomputed.
    async fn reprice(&self, booking: &Booking, price: i64) -> Result<Repricing> {
        let discount = self.redemption_discount(booking.points_redeemed);
        if discount > price {
            return Err(AppError::Validation(format!(
                "Redeemed {} points exceed the new price of {}",
                booking.points_redeemed, price
            )));
        }
        let amount = price - discount;

        let admin_fee = match self.payment_method_repo.find_by_code(&booking.payment_method).await? {
            Some(method) => method.admin_fee(amount),
            None => self
                .transaction_repo
                .find_by_booking(booking.id)
                .await?
                .map(|t| t.admin_fee)
                .unwrap_or(0),
        };

        Ok(Repricing { amount, admin_fee })
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    /// Customer-facing lookup. Deleted bookings are hidden.
    pub async fn get_by_code(&self, code: &str) -> Result<Booking> {
        self.booking_repo
            .find_by_code(code)
            .await?
            .filter(|b| b.deleted_at.is_none())
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    pub async fn list(&self, filter: &BookingFilter, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        self.booking_repo.list(filter, limit, offset).await
    }

    pub async fn list_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let filter = BookingFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.booking_repo.list(&filter, limit, offset).await
    }

    pub async fn confirm_booking(&self, id: Uuid) -> Result<Booking> {
        let booking = self.get(id).await?;
        if !self
            .booking_repo
            .transition(id, booking.status, BookingStatus::Confirmed)
            .await?
        {
            return Err(self.lost_race(id).await);
        }

        let confirmed = self.get(id).await?;
        tracing::info!("Confirmed booking {}", confirmed.code);
        self.event_bus
            .publish(DomainEvent::BookingConfirmed(confirmed.clone()))
            .await;
        Ok(confirmed)
    }

    pub async fn cancel_booking(
        &self,
        id: Uuid,
        reason: Option<String>,
        cancellation_type: CancellationType,
    ) -> Result<CancellationOutcome> {
        self.cancel_booking_at(id, reason, cancellation_type, self.config.local_now())
            .await
    }

    /// Cancel as if the venue's local clock read `now`, which decides the
    /// refund tier.
    pub async fn cancel_booking_at(
        &self,
        id: Uuid,
        reason: Option<String>,
        cancellation_type: CancellationType,
        now: NaiveDateTime,
    ) -> Result<CancellationOutcome> {
        let booking = self.get(id).await?;
        booking.status.transition(BookingStatus::Cancelled)?;

        let policy = self.config.refund_policy();
        let (payment_status, refund_amount, refund_tier) = match booking.payment_status {
            PaymentStatus::Paid => {
                let transaction = self
                    .transaction_repo
                    .find_by_booking(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;
                let tier = policy.tier(booking.starts_at(), now);
                let refund = policy.refund_amount(transaction.amount, booking.starts_at(), now);
                let status = if refund > 0 {
                    PaymentStatus::Refunded
                } else {
                    PaymentStatus::Paid
                };
                (status, refund, Some(tier))
            }
            PaymentStatus::Refunded => (PaymentStatus::Refunded, 0, None),
            PaymentStatus::Pending | PaymentStatus::WaitingConfirmation | PaymentStatus::Failed => {
                (PaymentStatus::Failed, 0, None)
            }
        };

        let nothing_paid = booking.payment_status != PaymentStatus::Paid;
        let returned_points = match booking.user_id {
            Some(holder_id)
                if booking.points_redeemed > 0
                    && (nothing_paid || refund_tier == Some(RefundTier::Full)) =>
            {
                Some(NewPointEntry::adjusted(
                    holder_id,
                    booking.points_redeemed,
                    Some(booking.id),
                    format!("Points returned for cancelled booking {}", booking.code),
                ))
            }
            _ => None,
        };

        let record = CancellationRecord {
            reason,
            cancellation_type,
            cancelled_at: Utc::now(),
            refund_amount,
            payment_status,
            returned_points,
            reverse_earned: refund_tier == Some(RefundTier::Full),
        };

        let Some(settlement) = self.booking_repo.cancel(id, booking.status, record).await? else {
            return Err(self.lost_race(id).await);
        };

        let cancelled = self.get(id).await?;
        tracing::info!(
            "Cancelled booking {} ({}), refund {}",
            cancelled.code,
            cancellation_type.as_str(),
            refund_amount
        );
        self.event_bus
            .publish(DomainEvent::BookingCancelled {
                booking: cancelled.clone(),
                refund_amount,
            })
            .await;

        Ok(CancellationOutcome {
            booking: cancelled,
            refund_amount,
            refund_tier,
            points_returned: settlement.returned,
            points_reversed: settlement.reversed,
        })
    }

    pub async fn reschedule_booking(&self, id: Uuid, request: RescheduleBookingRequest) -> Result<Booking> {
        self.reschedule_booking_at(id, request, self.config.local_now()).await
    }

    pub async fn reschedule_booking_at(
        &self,
        id: Uuid,
        request: RescheduleBookingRequest,
        now: NaiveDateTime,
    ) -> Result<Booking> {
        let old = self.get(id).await?;
        if old.status.is_terminal() || old.deleted_at.is_some() {
            return Err(AppError::InvalidTransition(format!(
                "booking {} is {} and cannot be rescheduled",
                old.code,
                old.status.as_str()
            )));
        }

        let slot = TimeRange::new(request.start_time, request.end_time)?;
        let venue = self
            .venue_repo
            .find_by_id(old.venue_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Venue not found".to_string()))?;
        ensure_not_past(request.booking_date, &slot, now)?;
        ensure_within_hours(&slot, &venue.operating_hours())?;

        // A paid booking keeps the price it was paid at.
        let (price, repricing) = if old.payment_status == PaymentStatus::Paid {
            (old.price, None)
        } else {
            let price = quote(&venue, request.booking_date, &slot, &self.config.weekend_days())?.total;
            (price, Some(self.reprice(&old, price).await?))
        };

        let new = self
            .booking_repo
            .reschedule(id, request.booking_date, slot, price, repricing)
            .await?;
        tracing::info!(
            "Rescheduled booking {} from {} {} to {} {}",
            new.code,
            old.booking_date,
            old.slot(),
            new.booking_date,
            new.slot()
        );

        self.event_bus
            .publish(DomainEvent::BookingRescheduled {
                old,
                new: new.clone(),
            })
            .await;
        Ok(new)
    }

    pub async fn delete_booking(&self, id: Uuid) -> Result<Booking> {
        let deleted_now = self.booking_repo.soft_delete(id).await?;
        let booking = self.get(id).await?;
        if deleted_now {
            tracing::info!("Deleted booking {}", booking.code);
            self.event_bus
                .publish(DomainEvent::BookingDeleted(booking.clone()))
                .await;
        }
        Ok(booking)
    }

    pub async fn restore_booking(&self, id: Uuid) -> Result<Booking> {
        let before = self.get(id).await?;
        let restored = self.booking_repo.restore(id).await?;
        if before.deleted_at.is_some() {
            tracing::info!("Restored booking {}", restored.code);
            self.event_bus
                .publish(DomainEvent::BookingRestored(restored.clone()))
                .await;
        }
        Ok(restored)
    }

    /// Confirmed bookings whose play time is over become `completed`.
    pub async fn complete_finished(&self) -> Result<SweepReport> {
        self.complete_finished_at(self.config.local_now()).await
    }

    pub async fn complete_finished_at(&self, now: NaiveDateTime) -> Result<SweepReport> {
        let due = self.booking_repo.list_due_for_completion(now).await?;
        let mut report = SweepReport::default();

        for booking in due {
            match self
                .booking_repo
                .transition(booking.id, BookingStatus::Confirmed, BookingStatus::Completed)
                .await
            {
                Ok(true) => {
                    report.processed += 1;
                    let mut completed = booking;
                    completed.status = BookingStatus::Completed;
                    self.event_bus
                        .publish(DomainEvent::BookingCompleted(completed))
                        .await;
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Failed to complete booking {}: {}", booking.code, e);
                }
            }
        }

        if report.processed > 0 || report.failed > 0 {
            tracing::info!("Completion sweep: {:?}", report);
        }
        Ok(report)
    }

    /// Cancel pending bookings left unpaid past the payment timeout.
    pub async fn expire_unpaid(&self) -> Result<SweepReport> {
        self.expire_unpaid_at(Utc::now()).await
    }

    pub async fn expire_unpaid_at(&self, now: chrono::DateTime<Utc>) -> Result<SweepReport> {
        let cutoff = now - Duration::minutes(self.config.payment_timeout_minutes);
        let local_now = now.with_timezone(&self.config.utc_offset()).naive_local();
        let stale = self.booking_repo.list_unpaid_before(cutoff).await?;
        let mut report = SweepReport::default();

        for booking in stale {
            match self
                .cancel_booking_at(
                    booking.id,
                    Some("Payment not received in time".to_string()),
                    CancellationType::System,
                    local_now,
                )
                .await
            {
                Ok(_) => report.processed += 1,
                Err(AppError::InvalidTransition(_)) | Err(AppError::PersistenceConflict(_)) => {
                    report.skipped += 1
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Failed to expire booking {}: {}", booking.code, e);
                }
            }
        }

        if report.processed > 0 || report.failed > 0 {
            tracing::info!("Expiry sweep: {:?}", report);
        }
        Ok(report)
    }

    /// Remind customers of today's confirmed bookings, once per booking.
    pub async fn send_reminders(&self) -> Result<SweepReport> {
        self.send_reminders_for(self.config.local_now().date()).await
    }

    pub async fn send_reminders_for(&self, date: NaiveDate) -> Result<SweepReport> {
        let bookings = self.booking_repo.list_needing_reminder(date).await?;
        let mut report = SweepReport::default();

        for booking in bookings {
            match self.booking_repo.claim_reminder(booking.id, Utc::now()).await {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Failed to claim reminder for {}: {}", booking.code, e);
                    continue;
                }
            }

            let venue_title = match self.venue_repo.find_by_id(booking.venue_id).await {
                Ok(Some(venue)) => venue.title,
                Ok(None) => "your venue".to_string(),
                Err(e) => {
                    tracing::warn!("Venue lookup failed for reminder {}: {}", booking.code, e);
                    "your venue".to_string()
                }
            };

            let notification = Notification::new(NotificationKind::BookingReminder, booking, venue_title);
            self.notifier.dispatch(&notification).await;
            report.processed += 1;
        }

        if report.processed > 0 || report.failed > 0 {
            tracing::info!("Reminder sweep: {:?}", report);
        }
        Ok(report)
    }

    /// The error to report after a compare-and-swap found the booking changed.
    async fn lost_race(&self, id: Uuid) -> AppError {
        match self.get(id).await {
            Ok(latest) if latest.status.is_terminal() => AppError::InvalidTransition(format!(
                "booking {} is already {}",
                latest.code,
                latest.status.as_str()
            )),
            Ok(latest) => AppError::PersistenceConflict(format!(
                "booking {} changed concurrently",
                latest.code
            )),
            Err(e) => e,
        }
    }
}

fn ensure_not_past(date: NaiveDate, slot: &TimeRange, now: NaiveDateTime) -> Result<()> {
    if slot.start.on(date) <= now {
        return Err(AppError::Validation(format!(
            "{} {} is in the past",
            date, slot
        )));
    }
    Ok(())
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// `BK-YYYYMMDD-XXXXXX` over an alphabet without look-alike characters.
pub fn booking_code(date: NaiveDate) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("BK-{}-{}", date.format("%Y%m%d"), suffix)
}
