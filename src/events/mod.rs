use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{Booking, Transaction, Venue};
use crate::error::Result;

pub mod handlers;

pub use handlers::{InvoiceHandler, NotificationHandler, PointsHandler, SlotCacheInvalidator};

/// Something that happened to a booking, payment or venue, published after
/// the change is committed.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    BookingCreated { booking: Booking, transaction: Transaction },
    BookingConfirmed(Booking),
    BookingCancelled { booking: Booking, refund_amount: i64 },
    BookingCompleted(Booking),
    BookingRescheduled { old: Booking, new: Booking },
    BookingDeleted(Booking),
    BookingRestored(Booking),
    PaymentSubmitted { booking: Booking, transaction: Transaction },
    PaymentConfirmed { booking: Booking, transaction: Transaction },
    PaymentRejected { booking: Booking, transaction: Transaction },
    VenueUpdated(Venue),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated { .. } => "booking_created",
            DomainEvent::BookingConfirmed(_) => "booking_confirmed",
            DomainEvent::BookingCancelled { .. } => "booking_cancelled",
            DomainEvent::BookingCompleted(_) => "booking_completed",
            DomainEvent::BookingRescheduled { .. } => "booking_rescheduled",
            DomainEvent::BookingDeleted(_) => "booking_deleted",
            DomainEvent::BookingRestored(_) => "booking_restored",
            DomainEvent::PaymentSubmitted { .. } => "payment_submitted",
            DomainEvent::PaymentConfirmed { .. } => "payment_confirmed",
            DomainEvent::PaymentRejected { .. } => "payment_rejected",
            DomainEvent::VenueUpdated(_) => "venue_updated",
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool {
        true
    }
    async fn handle(&self, event: &DomainEvent) -> Result<()>;
}

pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        if handler.is_enabled() {
            tracing::info!("Registered event handler: {}", handler.name());
            self.handlers.write().await.push(handler);
        }
    }

    /// Run every handler in registration order. A failing handler is logged
    /// and the remaining handlers still run.
    pub async fn publish(&self, event: DomainEvent) {
        let handlers = self.handlers.read().await;

        for handler in handlers.iter() {
            if !handler.is_enabled() {
                continue;
            }

            match handler.handle(&event).await {
                Ok(_) => {
                    tracing::debug!(
                        "Handler {} processed {} event",
                        handler.name(),
                        event.name()
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Handler {} failed on {} event: {:?}",
                        handler.name(),
                        event.name(),
                        e
                    );
                }
            }
        }
    }

    pub async fn handler_names(&self) -> Vec<String> {
        self.handlers
            .read()
            .await
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        fail: bool,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for Counting {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, _event: &DomainEvent) -> Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AppError::Internal("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn venue() -> Venue {
        use crate::domain::{TimeOfDay, VenueStatus};
        let now = chrono::Utc::now();
        Venue {
            id: uuid::Uuid::new_v4(),
            title: "Court A".to_string(),
            category: "futsal".to_string(),
            description: None,
            price: Some(100_000),
            weekday_price: None,
            weekend_price: None,
            peak_hours: None,
            open_time: TimeOfDay::MIDNIGHT,
            close_time: TimeOfDay::END_OF_DAY,
            status: VenueStatus::Active,
            maintenance_reason: None,
            maintenance_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_others() {
        let bus = EventBus::new();
        let failing = Arc::new(Counting { name: "failing", fail: true, seen: AtomicUsize::new(0) });
        let healthy = Arc::new(Counting { name: "healthy", fail: false, seen: AtomicUsize::new(0) });
        bus.register(failing.clone()).await;
        bus.register(healthy.clone()).await;

        bus.publish(DomainEvent::VenueUpdated(venue())).await;

        assert_eq!(failing.seen.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_names().await, vec!["failing", "healthy"]);
    }
}
