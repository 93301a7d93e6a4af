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
    domain::{pricing::PriceQuote, CreateVenueRequest, TimeOfDay, TimeRange, UpdateVenueRequest, Venue},
    error::Result,
    service::availability_service::AvailableSlots,
};

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

#[derive(Debug, Deserialize)]
pub struct AdminListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub venue_id: Uuid,
    pub date: NaiveDate,
    pub slot: TimeRange,
    #[serde(flatten)]
    pub quote: PriceQuote,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Venue>>> {
    let venues = state.service_context.venue_service.list(false).await?;
    Ok(Json(venues))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Venue>> {
    let venue = state.service_context.venue_service.get(id).await?;
    Ok(Json(venue))
}

pub async fn slots(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<AvailableSlots>> {
    let slots = state
        .service_context
        .availability_service
        .compute_available_slots(id, query.date)
        .await?;
    Ok(Json(slots))
}

pub async fn price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PriceResponse>> {
    let slot = TimeRange::new(query.start, query.end)?;
    let quote = state
        .service_context
        .venue_service
        .compute_price(id, query.date, &slot)
        .await?;
    Ok(Json(PriceResponse {
        venue_id: id,
        date: query.date,
        slot,
        quote,
    }))
}

// Admin

pub async fn admin_list(
    State(state): State<AppState>,
    Query(params): Query<AdminListParams>,
) -> Result<Json<Vec<Venue>>> {
    let venues = state
        .service_context
        .venue_service
        .list(params.include_inactive)
        .await?;
    Ok(Json(venues))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateVenueRequest>,
) -> Result<(StatusCode, Json<Venue>)> {
    let venue = state.service_context.venue_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(venue)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateVenueRequest>,
) -> Result<Json<Venue>> {
    let venue = state.service_context.venue_service.update(id, req).await?;
    Ok(Json(venue))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.service_context.venue_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
