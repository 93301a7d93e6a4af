#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use lapangan::{
    config::Settings,
    domain::{
        CreateBookingRequest, CreatePaymentMethodRequest, CreateUserRequest, CreateVenueRequest, FeeType,
        TimeOfDay, User, UserRole, Venue,
    },
    error::Result as AppResult,
    notifications::{Dispatcher, Notification, NotificationChannel, OutboundMessage},
    service::ServiceContext,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};

/// Channel that records every message it is asked to send.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingChannel {
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn format(&self, notification: &Notification) -> Option<OutboundMessage> {
        Some(OutboundMessage {
            recipient: notification.booking.customer_phone.clone(),
            subject: notification.subject(),
            body: notification.body(),
        })
    }

    async fn send(&self, message: &OutboundMessage) -> AppResult<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub ctx: Arc<ServiceContext>,
    pub settings: Settings,
    pub outbox: Arc<RecordingChannel>,
    pub venue: Venue,
    pub admin: User,
    pub customer: User,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    setup_on(pool).await
}

/// File-backed database behind a pool of several connections, so that
/// concurrent requests really run on separate connections.
pub async fn setup_shared(connections: u32) -> anyhow::Result<TestApp> {
    let path = std::env::temp_dir().join(format!("lapangan-test-{}.db", uuid::Uuid::new_v4()));
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(connections)
        .connect_with(options)
        .await?;
    setup_on(pool).await
}

pub async fn setup_on(pool: SqlitePool) -> anyhow::Result<TestApp> {
    sqlx::migrate!("./migrations").run(&pool).await?;

    let mut settings = Settings::default();
    settings.storage.uploads_dir = std::env::temp_dir()
        .join(format!("lapangan-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    let outbox = Arc::new(RecordingChannel::default());
    let dispatcher = Arc::new(Dispatcher::new(vec![outbox.clone() as Arc<dyn NotificationChannel>]));
    let ctx = Arc::new(ServiceContext::with_dispatcher(pool, &settings, dispatcher).await);

    ctx.payment_service
        .create_method(CreatePaymentMethodRequest {
            code: "bca".to_string(),
            name: "BCA Transfer".to_string(),
            fee_type: FeeType::Fixed,
            fee_value: 0.0,
            instructions: None,
            display_order: None,
        })
        .await?;

    let venue = ctx
        .venue_service
        .create(CreateVenueRequest {
            title: "Court A".to_string(),
            category: "futsal".to_string(),
            description: None,
            price: Some(100_000),
            weekday_price: None,
            weekend_price: None,
            peak_hours: None,
            open_time: Some(t(8, 0)),
            close_time: Some(t(23, 0)),
        })
        .await?;

    let admin = ctx
        .user_service
        .create(CreateUserRequest {
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            phone: None,
            password: "admin12345".to_string(),
            role: UserRole::Admin,
        })
        .await?;

    let customer = ctx
        .user_service
        .register(CreateUserRequest {
            name: "Budi".to_string(),
            email: "budi@example.com".to_string(),
            phone: Some("081234567890".to_string()),
            password: "password123".to_string(),
            role: UserRole::Customer,
        })
        .await?;

    Ok(TestApp {
        ctx,
        settings,
        outbox,
        venue,
        admin,
        customer,
    })
}

pub fn t(hour: u16, minute: u16) -> TimeOfDay {
    TimeOfDay::new(hour, minute).unwrap()
}

/// Wednesday 2024-01-10, the booking date used throughout.
pub fn play_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

/// Venue-local "now" two days before play.
pub fn two_days_before() -> NaiveDateTime {
    at(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(), 9, 0)
}

pub fn booking_request(venue: &Venue, start: TimeOfDay, end: TimeOfDay) -> CreateBookingRequest {
    CreateBookingRequest {
        venue_id: venue.id,
        booking_date: play_date(),
        start_time: start,
        end_time: end,
        customer_name: "Budi".to_string(),
        customer_phone: "081234567890".to_string(),
        customer_email: None,
        payment_method: "bca".to_string(),
        points_to_redeem: 0,
        notes: None,
    }
}
