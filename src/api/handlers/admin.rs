use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{
        Booking, BookingFilter, BookingStatus, CancellationType, CreateUserRequest, Invoice, PointEntry,
        RescheduleBookingRequest, User,
    },
    error::{AppError, Result},
    service::booking_service::{CancellationOutcome, SweepReport},
};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct BookingListParams {
    pub venue_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdminCancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustPointsRequest {
    pub user_id: Uuid,
    pub delta: i64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct UserPoints {
    pub user_id: Uuid,
    pub balance: i64,
    pub history: Vec<PointEntry>,
}

// Bookings

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(params): Query<BookingListParams>,
) -> Result<Json<Vec<Booking>>> {
    let status = match params.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(
            BookingStatus::from_str(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown booking status: {}", s)))?,
        ),
    };
    let filter = BookingFilter {
        venue_id: params.venue_id,
        date: params.date,
        status,
        user_id: params.user_id,
        include_deleted: params.include_deleted,
    };

    let bookings = state
        .service_context
        .booking_service
        .list(&filter, params.limit, params.offset)
        .await?;
    Ok(Json(bookings))
}

pub async fn get_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Booking>> {
    Ok(Json(state.service_context.booking_service.get(id).await?))
}

pub async fn confirm_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Booking>> {
    Ok(Json(state.service_context.booking_service.confirm_booking(id).await?))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminCancelRequest>,
) -> Result<Json<CancellationOutcome>> {
    let outcome = state
        .service_context
        .booking_service
        .cancel_booking(id, req.reason, CancellationType::Admin)
        .await?;
    Ok(Json(outcome))
}

pub async fn reschedule_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RescheduleBookingRequest>,
) -> Result<Json<Booking>> {
    Ok(Json(
        state
            .service_context
            .booking_service
            .reschedule_booking(id, req)
            .await?,
    ))
}

pub async fn delete_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Booking>> {
    Ok(Json(state.service_context.booking_service.delete_booking(id).await?))
}

pub async fn restore_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Booking>> {
    Ok(Json(state.service_context.booking_service.restore_booking(id).await?))
}

/// Issue the invoice for a paid booking if the automatic run missed it.
pub async fn generate_invoice(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Invoice>> {
    Ok(Json(
        state
            .service_context
            .invoice_service
            .generate_for_booking(id)
            .await?,
    ))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<Invoice>>> {
    Ok(Json(
        state
            .service_context
            .invoice_service
            .list(params.limit, params.offset)
            .await?,
    ))
}

// Points

pub async fn adjust_points(
    State(state): State<AppState>,
    Json(req): Json<AdjustPointsRequest>,
) -> Result<(StatusCode, Json<PointEntry>)> {
    state.service_context.user_service.get(req.user_id).await?;
    let entry = state
        .service_context
        .points_service
        .adjust(req.user_id, req.delta, &req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn user_points(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<Json<UserPoints>> {
    let points = &state.service_context.points_service;
    Ok(Json(UserPoints {
        user_id,
        balance: points.balance(user_id).await?,
        history: points.history(user_id, params.limit, params.offset).await?,
    }))
}

// Users

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(
        state
            .service_context
            .user_service
            .list(params.limit, params.offset)
            .await?,
    ))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.service_context.user_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

// Sweeps

pub async fn run_completion(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    Ok(Json(state.service_context.booking_service.complete_finished().await?))
}

pub async fn run_expiry(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    Ok(Json(state.service_context.booking_service.expire_unpaid().await?))
}

pub async fn run_reminders(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    Ok(Json(state.service_context.booking_service.send_reminders().await?))
}
