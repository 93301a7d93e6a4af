use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::Result,
    events::{DomainEvent, EventHandler},
    notifications::{Dispatcher, Notification, NotificationKind},
    repository::VenueRepository,
    service::{availability_service::SlotCache, invoice_service::InvoiceService, points_service::PointsService},
};

/// Drops cached availability for exactly the (venue, date) keys an event touches.
pub struct SlotCacheInvalidator {
    cache: Arc<SlotCache>,
}

impl SlotCacheInvalidator {
    pub fn new(cache: Arc<SlotCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl EventHandler for SlotCacheInvalidator {
    fn name(&self) -> &str {
        "slot_cache"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::BookingCreated { booking: b, .. }
            | DomainEvent::BookingConfirmed(b)
            | DomainEvent::BookingCompleted(b)
            | DomainEvent::BookingDeleted(b)
            | DomainEvent::BookingRestored(b)
            | DomainEvent::BookingCancelled { booking: b, .. } => {
                self.cache.invalidate_key(b.venue_id, b.booking_date).await;
            }
            DomainEvent::BookingRescheduled { old, new } => {
                self.cache.invalidate_key(old.venue_id, old.booking_date).await;
                self.cache.invalidate_key(new.venue_id, new.booking_date).await;
            }
            DomainEvent::VenueUpdated(venue) => {
                self.cache.invalidate_venue(venue.id).await;
            }
            DomainEvent::PaymentSubmitted { .. }
            | DomainEvent::PaymentConfirmed { .. }
            | DomainEvent::PaymentRejected { .. } => {}
        }
        Ok(())
    }
}

/// Issues the invoice once a payment is confirmed.
pub struct InvoiceHandler {
    invoices: Arc<InvoiceService>,
}

impl InvoiceHandler {
    pub fn new(invoices: Arc<InvoiceService>) -> Self {
        Self { invoices }
    }
}

#[async_trait]
impl EventHandler for InvoiceHandler {
    fn name(&self) -> &str {
        "invoice"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        if let DomainEvent::PaymentConfirmed { booking, .. } = event {
            self.invoices.generate_for_booking(booking.id).await?;
        }
        Ok(())
    }
}

/// Credits loyalty points for paid bookings of signed-in customers.
pub struct PointsHandler {
    points: Arc<PointsService>,
}

impl PointsHandler {
    pub fn new(points: Arc<PointsService>) -> Self {
        Self { points }
    }
}

#[async_trait]
impl EventHandler for PointsHandler {
    fn name(&self) -> &str {
        "points"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        if let DomainEvent::PaymentConfirmed { booking, .. } = event {
            self.points.earn(booking).await?;
        }
        Ok(())
    }
}

pub struct NotificationHandler {
    dispatcher: Arc<Dispatcher>,
    venue_repo: Arc<dyn VenueRepository>,
}

impl NotificationHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, venue_repo: Arc<dyn VenueRepository>) -> Self {
        Self {
            dispatcher,
            venue_repo,
        }
    }
}

#[async_trait]
impl EventHandler for NotificationHandler {
    fn name(&self) -> &str {
        "notifications"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        let (kind, booking) = match event {
            DomainEvent::BookingCreated { booking, transaction } => (
                NotificationKind::BookingCreated {
                    total_amount: transaction.total_amount,
                },
                booking,
            ),
            DomainEvent::PaymentConfirmed { booking, .. } => (NotificationKind::PaymentConfirmed, booking),
            DomainEvent::PaymentRejected { booking, transaction } => (
                NotificationKind::PaymentRejected {
                    reason: transaction.rejection_reason.clone(),
                },
                booking,
            ),
            DomainEvent::BookingCancelled { booking, refund_amount } => (
                NotificationKind::BookingCancelled {
                    refund_amount: *refund_amount,
                },
                booking,
            ),
            _ => return Ok(()),
        };

        let venue_title = self
            .venue_repo
            .find_by_id(booking.venue_id)
            .await?
            .map(|v| v.title)
            .unwrap_or_else(|| "your venue".to_string());

        let notification = Notification::new(kind, booking.clone(), venue_title);
        self.dispatcher.dispatch(&notification).await;
        Ok(())
    }
}
