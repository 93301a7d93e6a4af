use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState, uploads},
    domain::{Booking, CancellationType, CreateBookingRequest, Invoice, PaymentMethod, Transaction},
    error::{AppError, Result},
    service::booking_service::CancellationOutcome,
};

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub transaction: Option<Transaction>,
    pub payment_method: Option<PaymentMethod>,
    pub invoice: Option<Invoice>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerCancelRequest {
    pub reason: Option<String>,
    /// Required for guest bookings: the phone number the booking was made with.
    pub customer_phone: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDetail>)> {
    let user = user.map(|Extension(current)| current.user);
    let booking = state
        .service_context
        .booking_service
        .create_booking(req, user.as_ref())
        .await?;

    let detail = detail(&state, booking).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get(State(state): State<AppState>, Path(code): Path<String>) -> Result<Json<BookingDetail>> {
    let booking = state.service_context.booking_service.get_by_code(&code).await?;
    Ok(Json(detail(&state, booking).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(code): Path<String>,
    Json(req): Json<CustomerCancelRequest>,
) -> Result<Json<CancellationOutcome>> {
    let user = user.map(|Extension(current)| current.user);
    let booking = state.service_context.booking_service.get_by_code(&code).await?;
    let cancellation_type = authorize(&booking, user.as_ref(), req.customer_phone.as_deref())?;

    let outcome = state
        .service_context
        .booking_service
        .cancel_booking(booking.id, req.reason, cancellation_type)
        .await?;
    Ok(Json(outcome))
}

/// Multipart upload with a `proof` image field and, for guest bookings, a
/// `customer_phone` text field.
pub async fn submit_payment_proof(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Transaction>> {
    let user = user.map(|Extension(current)| current.user);
    let booking = state.service_context.booking_service.get_by_code(&code).await?;

    let mut proof: Option<(String, Vec<u8>)> = None;
    let mut phone: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("proof") => {
                let filename = field.file_name().unwrap_or("proof").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
                proof = Some((filename, data.to_vec()));
            }
            Some("customer_phone") => {
                phone = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Invalid phone field: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    authorize(&booking, user.as_ref(), phone.as_deref())?;
    let (filename, data) = proof.ok_or_else(|| AppError::Validation("Missing proof file".to_string()))?;

    let uploads_dir = &state.settings.storage.uploads_dir;
    let previous = state
        .service_context
        .payment_service
        .for_booking(booking.id)
        .await?
        .proof_path;
    let path = uploads::save_payment_proof(uploads_dir, &filename, &data).await?;

    let transaction = match state
        .service_context
        .payment_service
        .submit_proof(&booking, &path)
        .await
    {
        Ok(transaction) => transaction,
        Err(e) => {
            if let Err(cleanup) = uploads::delete_payment_proof(uploads_dir, &path).await {
                tracing::warn!("Failed to remove unused proof {}: {}", path, cleanup);
            }
            return Err(e);
        }
    };

    if let Some(previous) = previous.filter(|p| *p != path) {
        if let Err(e) = uploads::delete_payment_proof(uploads_dir, &previous).await {
            tracing::warn!("Failed to remove replaced proof {}: {}", previous, e);
        }
    }

    Ok(Json(transaction))
}

async fn detail(state: &AppState, booking: Booking) -> Result<BookingDetail> {
    let ctx = &state.service_context;
    let transaction = ctx.transaction_repo.find_by_booking(booking.id).await?;
    let payment_method = ctx
        .payment_service
        .list_methods(true)
        .await?
        .into_iter()
        .find(|m| m.code == booking.payment_method);
    let invoice = ctx.invoice_service.find_by_booking(booking.id).await?;

    Ok(BookingDetail {
        booking,
        transaction,
        payment_method,
        invoice,
    })
}

/// The signed-in owner or an admin may act on a booking; a guest booking
/// also accepts the phone number it was made with.
fn authorize(booking: &Booking, user: Option<&crate::domain::User>, phone: Option<&str>) -> Result<CancellationType> {
    if let Some(user) = user {
        if user.is_admin() {
            return Ok(CancellationType::Admin);
        }
        if booking.user_id == Some(user.id) {
            return Ok(CancellationType::Customer);
        }
    }

    if booking.user_id.is_none() {
        if let Some(phone) = phone {
            if digits(phone) == digits(&booking.customer_phone) && !digits(phone).is_empty() {
                return Ok(CancellationType::Customer);
            }
        }
    }

    if user.is_some() {
        Err(AppError::Forbidden)
    } else {
        Err(AppError::Unauthorized)
    }
}

fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::tests::sample_booking;

    #[test]
    fn test_guest_booking_accepts_matching_phone() {
        let mut booking = sample_booking();
        booking.user_id = None;
        booking.customer_phone = "0812-3456-789".to_string();

        assert_eq!(
            authorize(&booking, None, Some("081234 56789")).unwrap(),
            CancellationType::Customer
        );
        assert!(matches!(
            authorize(&booking, None, Some("0899")),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(authorize(&booking, None, None), Err(AppError::Unauthorized)));
    }
}
