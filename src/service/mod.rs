pub mod availability_service;
pub mod booking_service;
pub mod invoice_service;
pub mod payment_service;
pub mod points_service;
pub mod user_service;
pub mod venue_service;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Settings;
use crate::events::{EventBus, InvoiceHandler, NotificationHandler, PointsHandler, SlotCacheInvalidator};
use crate::notifications::Dispatcher;
use crate::repository::*;
use availability_service::{AvailabilityService, SlotCache};
use booking_service::BookingService;
use invoice_service::InvoiceService;
use payment_service::PaymentService;
use points_service::PointsService;
use user_service::UserService;
use venue_service::VenueService;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub venue_repo: Arc<dyn VenueRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub transaction_repo: Arc<dyn TransactionRepository>,
    pub event_bus: Arc<EventBus>,
    pub dispatcher: Arc<Dispatcher>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub venue_service: Arc<VenueService>,
    pub availability_service: Arc<AvailabilityService>,
    pub booking_service: Arc<BookingService>,
    pub payment_service: Arc<PaymentService>,
    pub invoice_service: Arc<InvoiceService>,
    pub points_service: Arc<PointsService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    /// Build every repository and service on top of `db_pool` and register
    /// the event handlers in the order they run: cache, invoice, points,
    /// then notifications.
    pub async fn new(db_pool: SqlitePool, settings: &Settings) -> Self {
        let dispatcher = Arc::new(Dispatcher::from_config(&settings.notifications));
        Self::with_dispatcher(db_pool, settings, dispatcher).await
    }

    pub async fn with_dispatcher(db_pool: SqlitePool, settings: &Settings, dispatcher: Arc<Dispatcher>) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let venue_repo: Arc<dyn VenueRepository> = Arc::new(SqliteVenueRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> = Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let transaction_repo: Arc<dyn TransactionRepository> =
            Arc::new(SqliteTransactionRepository::new(db_pool.clone()));
        let method_repo: Arc<dyn PaymentMethodRepository> =
            Arc::new(SqlitePaymentMethodRepository::new(db_pool.clone()));
        let invoice_repo: Arc<dyn InvoiceRepository> = Arc::new(SqliteInvoiceRepository::new(db_pool.clone()));
        let points_repo: Arc<dyn PointsRepository> = Arc::new(SqlitePointsRepository::new(db_pool.clone()));

        let event_bus = Arc::new(EventBus::new());
        let cache = Arc::new(SlotCache::new());
        let points_policy = settings.points.policy();

        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            user_repo.clone(),
            settings.auth.clone(),
        ));
        let user_service = Arc::new(UserService::new(user_repo.clone(), auth_service.clone()));
        let venue_service = Arc::new(VenueService::new(
            venue_repo.clone(),
            event_bus.clone(),
            settings.booking.weekend_days(),
            settings.booking.default_hours(),
        ));
        let availability_service = Arc::new(AvailabilityService::new(
            venue_repo.clone(),
            booking_repo.clone(),
            cache.clone(),
        ));
        let booking_service = Arc::new(BookingService::new(
            venue_repo.clone(),
            booking_repo.clone(),
            transaction_repo.clone(),
            method_repo.clone(),
            event_bus.clone(),
            dispatcher.clone(),
            settings.booking.clone(),
            points_policy,
        ));
        let payment_service = Arc::new(PaymentService::new(
            transaction_repo.clone(),
            booking_repo.clone(),
            method_repo,
            event_bus.clone(),
        ));
        let invoice_service = Arc::new(InvoiceService::new(
            invoice_repo,
            booking_repo.clone(),
            transaction_repo.clone(),
            points_policy.redeem_rate,
        ));
        let points_service = Arc::new(PointsService::new(points_repo, points_policy));

        event_bus.register(Arc::new(SlotCacheInvalidator::new(cache))).await;
        event_bus.register(Arc::new(InvoiceHandler::new(invoice_service.clone()))).await;
        event_bus.register(Arc::new(PointsHandler::new(points_service.clone()))).await;
        event_bus
            .register(Arc::new(NotificationHandler::new(dispatcher.clone(), venue_repo.clone())))
            .await;

        Self {
            user_repo,
            venue_repo,
            booking_repo,
            transaction_repo,
            event_bus,
            dispatcher,
            auth_service,
            user_service,
            venue_service,
            availability_service,
            booking_service,
            payment_service,
            invoice_service,
            points_service,
            db_pool,
        }
    }
}
