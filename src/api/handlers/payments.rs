use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreatePaymentMethodRequest, PaymentMethod, PaymentStatus, Transaction, UpdatePaymentMethodRequest},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct TransactionListParams {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct MethodListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_methods(State(state): State<AppState>) -> Result<Json<Vec<PaymentMethod>>> {
    let methods = state.service_context.payment_service.list_methods(false).await?;
    Ok(Json(methods))
}

// Admin

pub async fn admin_list_methods(
    State(state): State<AppState>,
    Query(params): Query<MethodListParams>,
) -> Result<Json<Vec<PaymentMethod>>> {
    let methods = state
        .service_context
        .payment_service
        .list_methods(params.include_inactive)
        .await?;
    Ok(Json(methods))
}

pub async fn create_method(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentMethodRequest>,
) -> Result<(StatusCode, Json<PaymentMethod>)> {
    let method = state.service_context.payment_service.create_method(req).await?;
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn update_method(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePaymentMethodRequest>,
) -> Result<Json<PaymentMethod>> {
    let method = state.service_context.payment_service.update_method(id, req).await?;
    Ok(Json(method))
}

pub async fn delete_method(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.service_context.payment_service.delete_method(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<TransactionListParams>,
) -> Result<Json<Vec<Transaction>>> {
    let status = match params.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(
            PaymentStatus::from_str(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown payment status: {}", s)))?,
        ),
    };
    let transactions = state
        .service_context
        .payment_service
        .list(status, params.limit, params.offset)
        .await?;
    Ok(Json(transactions))
}

pub async fn get_transaction(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Transaction>> {
    let transaction = state.service_context.payment_service.get(id).await?;
    Ok(Json(transaction))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>> {
    let transaction = state
        .service_context
        .payment_service
        .confirm_payment(id, Some(admin.user.id))
        .await?;
    Ok(Json(transaction))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Transaction>> {
    if req.reason.trim().is_empty() {
        return Err(AppError::Validation("A rejection reason is required".to_string()));
    }
    let transaction = state
        .service_context
        .payment_service
        .reject_payment(id, req.reason.trim())
        .await?;
    Ok(Json(transaction))
}
