use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Booking, PointEntry, User},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct PointsSummary {
    pub balance: i64,
    /// Points per rupiah of discount.
    pub redeem_rate: i64,
    pub history: Vec<PointEntry>,
}

pub async fn profile(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}

pub async fn bookings(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Booking>>> {
    let bookings = state
        .service_context
        .booking_service
        .list_for_user(current.user.id, params.limit, params.offset)
        .await?;
    Ok(Json(bookings))
}

pub async fn points(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<PointsSummary>> {
    let points = &state.service_context.points_service;
    let balance = points.balance(current.user.id).await?;
    let history = points.history(current.user.id, params.limit, params.offset).await?;
    Ok(Json(PointsSummary {
        balance,
        redeem_rate: points.policy().redeem_rate,
        history,
    }))
}
