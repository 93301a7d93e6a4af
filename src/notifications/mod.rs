//! Customer notifications and the channels that deliver them.
//!
//! A [`Notification`] is rendered once per channel through
//! [`NotificationChannel::format`]; a channel that cannot reach the customer
//! (no email address, for example) returns `None` and is skipped. Delivery
//! failures are logged by the [`Dispatcher`] and never reach the caller.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::NotificationConfig;
use crate::domain::Booking;
use crate::error::Result;

pub mod email;
pub mod whatsapp;

pub use email::EmailChannel;
pub use whatsapp::{normalize_phone, WhatsAppChannel};

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    /// Booking placed, awaiting payment of `total_amount` (price plus admin fee).
    BookingCreated { total_amount: i64 },
    PaymentConfirmed,
    PaymentRejected { reason: Option<String> },
    BookingCancelled { refund_amount: i64 },
    BookingReminder,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub booking: Booking,
    pub venue_title: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, booking: Booking, venue_title: impl Into<String>) -> Self {
        Self {
            kind,
            booking,
            venue_title: venue_title.into(),
        }
    }

    pub fn subject(&self) -> String {
        let code = &self.booking.code;
        match &self.kind {
            NotificationKind::BookingCreated { .. } => format!("Booking {} received", code),
            NotificationKind::PaymentConfirmed => format!("Booking {} confirmed", code),
            NotificationKind::PaymentRejected { .. } => format!("Payment for {} rejected", code),
            NotificationKind::BookingCancelled { .. } => format!("Booking {} cancelled", code),
            NotificationKind::BookingReminder => format!("Reminder: booking {} today", code),
        }
    }

    pub fn body(&self) -> String {
        let b = &self.booking;
        let when = format!(
            "{} {} on {}",
            self.venue_title,
            b.slot(),
            b.booking_date.format("%d %b %Y")
        );

        let detail = match &self.kind {
            NotificationKind::BookingCreated { total_amount } => format!(
                "Your booking for {} has been received.\nPlease pay {} using {} to confirm it.",
                when,
                format_rupiah(*total_amount),
                b.payment_method
            ),
            NotificationKind::PaymentConfirmed => format!(
                "Your payment has been confirmed. See you at {}.",
                when
            ),
            NotificationKind::PaymentRejected { reason } => format!(
                "Your payment for {} was rejected{}.\nPlease contact us to arrange payment.",
                when,
                reason
                    .as_deref()
                    .map(|r| format!(": {}", r))
                    .unwrap_or_default()
            ),
            NotificationKind::BookingCancelled { refund_amount } => {
                let refund = if *refund_amount > 0 {
                    format!("\nA refund of {} will be processed.", format_rupiah(*refund_amount))
                } else {
                    String::new()
                };
                format!("Your booking for {} has been cancelled.{}", when, refund)
            }
            NotificationKind::BookingReminder => format!(
                "This is a reminder of your booking today: {}.",
                when
            ),
        };

        format!(
            "Hi {},\n\n{}\n\nBooking code: {}",
            b.customer_name, detail, b.code
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    /// Address and render the notification, or `None` if this channel has
    /// no way to reach the customer.
    fn format(&self, notification: &Notification) -> Option<OutboundMessage>;
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Writes notifications to the log instead of delivering them.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn format(&self, notification: &Notification) -> Option<OutboundMessage> {
        Some(OutboundMessage {
            recipient: notification.booking.customer_phone.clone(),
            subject: notification.subject(),
            body: notification.body(),
        })
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        tracing::info!(
            recipient = %message.recipient,
            subject = %message.subject,
            "Notification:\n{}",
            message.body
        );
        Ok(())
    }
}

pub struct Dispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Build the channels named in `notifications.channels`. Unknown names
    /// and channels without usable configuration are skipped with a warning.
    pub fn from_config(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        for name in &config.channels {
            match name.trim().to_lowercase().as_str() {
                "log" => channels.push(Arc::new(LogChannel)),
                "whatsapp" => match WhatsAppChannel::new(config.whatsapp.clone()) {
                    Ok(Some(channel)) => channels.push(Arc::new(channel)),
                    Ok(None) => tracing::warn!("WhatsApp channel requested but not enabled"),
                    Err(e) => tracing::error!("Failed to set up WhatsApp channel: {}", e),
                },
                "email" => match EmailChannel::new(config.email.clone()) {
                    Ok(Some(channel)) => channels.push(Arc::new(channel)),
                    Ok(None) => tracing::warn!("Email channel requested but not enabled"),
                    Err(e) => tracing::error!("Failed to set up email channel: {}", e),
                },
                other => tracing::warn!("Unknown notification channel: {}", other),
            }
        }

        for channel in &channels {
            tracing::info!("Notification channel enabled: {}", channel.name());
        }

        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    /// Deliver through every channel that can reach the customer. Returns the
    /// number of successful deliveries.
    pub async fn dispatch(&self, notification: &Notification) -> usize {
        let mut delivered = 0;

        for channel in &self.channels {
            let Some(message) = channel.format(notification) else {
                tracing::debug!(
                    "Channel {} cannot reach customer of booking {}",
                    channel.name(),
                    notification.booking.code
                );
                continue;
            };

            match channel.send(&message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::error!(
                        "Channel {} failed to deliver notification for booking {}: {}",
                        channel.name(),
                        notification.booking.code,
                        e
                    );
                }
            }
        }

        delivered
    }
}

/// `Rp 150.000`
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{BookingStatus, PaymentStatus, TimeOfDay};
    use crate::error::AppError;
    use chrono::{NaiveDate, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    pub(crate) fn sample_booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            code: "BK-20240110-ABCD1234".to_string(),
            venue_id: Uuid::new_v4(),
            user_id: None,
            customer_name: "Budi".to_string(),
            customer_phone: "081234567890".to_string(),
            customer_email: None,
            booking_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            start_time: TimeOfDay::new(18, 0).unwrap(),
            end_time: TimeOfDay::new(19, 0).unwrap(),
            price: 100_000,
            points_redeemed: 0,
            points_earned: 0,
            payment_method: "bca".to_string(),
            payment_status: PaymentStatus::Pending,
            status: BookingStatus::Pending,
            notes: None,
            cancellation_reason: None,
            cancellation_type: None,
            cancelled_at: None,
            refund_amount: None,
            refunded_at: None,
            reminder_sent_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct Recording {
        fail: bool,
        sent: AtomicUsize,
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn format(&self, notification: &Notification) -> Option<OutboundMessage> {
            LogChannel.format(notification)
        }

        async fn send(&self, _message: &OutboundMessage) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::NotificationDeliveryFailed("down".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(999), "Rp 999");
        assert_eq!(format_rupiah(1_000), "Rp 1.000");
        assert_eq!(format_rupiah(149_980), "Rp 149.980");
        assert_eq!(format_rupiah(1_250_000), "Rp 1.250.000");
        assert_eq!(format_rupiah(-5_000), "-Rp 5.000");
    }

    #[test]
    fn test_cancel_body_mentions_refund() {
        let n = Notification::new(
            NotificationKind::BookingCancelled { refund_amount: 50_000 },
            sample_booking(),
            "Court A",
        );
        let body = n.body();
        assert!(body.contains("Rp 50.000"));
        assert!(body.contains("18:00-19:00"));
        assert!(body.contains("BK-20240110-ABCD1234"));

        let none = Notification::new(
            NotificationKind::BookingCancelled { refund_amount: 0 },
            sample_booking(),
            "Court A",
        );
        assert!(!none.body().contains("refund"));
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let failing = Arc::new(Recording { fail: true, sent: AtomicUsize::new(0) });
        let working = Arc::new(Recording { fail: false, sent: AtomicUsize::new(0) });
        let dispatcher = Dispatcher::new(vec![failing.clone(), working.clone()]);

        let n = Notification::new(NotificationKind::BookingReminder, sample_booking(), "Court A");
        let delivered = dispatcher.dispatch(&n).await;

        assert_eq!(delivered, 1);
        assert_eq!(failing.sent.load(Ordering::SeqCst), 1);
        assert_eq!(working.sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_skips_unusable_channels() {
        let config = NotificationConfig {
            channels: vec!["log".to_string(), "whatsapp".to_string(), "pigeon".to_string()],
            whatsapp: None,
            email: None,
        };
        let dispatcher = Dispatcher::from_config(&config);
        assert_eq!(dispatcher.channel_names(), vec!["log"]);
    }
}
