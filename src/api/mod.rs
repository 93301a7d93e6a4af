pub mod handlers;
pub mod middleware;
pub mod state;
pub mod uploads;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let uploads_dir = settings.storage.uploads_dir.clone();
    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .nest("/api", api_routes(app_state.clone()))
        .nest("/admin", admin_routes(app_state.clone()))
        .nest_service("/storage", ServeDir::new(uploads_dir))
        .with_state(app_state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/venues", get(handlers::venues::list))
        .route("/venues/:id", get(handlers::venues::get))
        .route("/venues/:id/slots", get(handlers::venues::slots))
        .route("/venues/:id/price", get(handlers::venues::price))
        .route("/payment-methods", get(handlers::payments::list_methods))
        .merge(booking_routes(state.clone()))
        .nest("/me", me_routes(state))
}

fn booking_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings", post(handlers::bookings::create))
        .route("/bookings/:code", get(handlers::bookings::get))
        .route("/bookings/:code/cancel", post(handlers::bookings::cancel))
        .route(
            "/bookings/:code/payment-proof",
            post(handlers::bookings::submit_payment_proof),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::optional_auth,
        ))
}

fn me_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::me::profile))
        .route("/bookings", get(handlers::me::bookings))
        .route("/points", get(handlers::me::points))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    use handlers::{admin, payments, venues};

    Router::new()
        .route("/venues", get(venues::admin_list).post(venues::create))
        .route("/venues/:id", put(venues::update).delete(venues::delete))
        .route(
            "/payment-methods",
            get(payments::admin_list_methods).post(payments::create_method),
        )
        .route(
            "/payment-methods/:id",
            put(payments::update_method).delete(payments::delete_method),
        )
        .route("/bookings", get(admin::list_bookings))
        .route("/bookings/:id", get(admin::get_booking).delete(admin::delete_booking))
        .route("/bookings/:id/confirm", post(admin::confirm_booking))
        .route("/bookings/:id/cancel", post(admin::cancel_booking))
        .route("/bookings/:id/reschedule", post(admin::reschedule_booking))
        .route("/bookings/:id/restore", post(admin::restore_booking))
        .route("/bookings/:id/invoice", post(admin::generate_invoice))
        .route("/transactions", get(payments::list_transactions))
        .route("/transactions/:id", get(payments::get_transaction))
        .route("/transactions/:id/confirm", post(payments::confirm))
        .route("/transactions/:id/reject", post(payments::reject))
        .route("/invoices", get(admin::list_invoices))
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/:id/points", get(admin::user_points))
        .route("/points/adjust", post(admin::adjust_points))
        .route("/sweeps/complete", post(admin::run_completion))
        .route("/sweeps/expire", post(admin::run_expiry))
        .route("/sweeps/remind", post(admin::run_reminders))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ))
        .with_state(state)
}
