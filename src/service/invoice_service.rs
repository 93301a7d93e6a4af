use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{invoice_number, Invoice, InvoiceAmounts, InvoiceStatus, PaymentStatus},
    error::{AppError, Result},
    repository::{BookingRepository, InvoiceRepository, TransactionRepository},
};

pub struct InvoiceService {
    invoice_repo: Arc<dyn InvoiceRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    redeem_rate: i64,
}

impl InvoiceService {
    pub fn new(
        invoice_repo: Arc<dyn InvoiceRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        transaction_repo: Arc<dyn TransactionRepository>,
        redeem_rate: i64,
    ) -> Self {
        Self {
            invoice_repo,
            booking_repo,
            transaction_repo,
            redeem_rate,
        }
    }

    /// Invoice a paid booking, returning the existing invoice if one was
    /// already issued. Safe to call repeatedly.
    pub async fn generate_for_booking(&self, booking_id: Uuid) -> Result<Invoice> {
        match self.issue(booking_id).await {
            Err(AppError::DuplicateInvoice(id)) => {
                tracing::debug!("Invoice for booking {} already exists", id);
                self.invoice_repo
                    .find_by_booking(id)
                    .await?
                    .ok_or_else(|| AppError::Database("Invoice vanished after conflict".to_string()))
            }
            other => other,
        }
    }

    /// Insert a new invoice. `DuplicateInvoice` if the booking has one.
    pub async fn issue(&self, booking_id: Uuid) -> Result<Invoice> {
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        let transaction = self
            .transaction_repo
            .find_by_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

        if transaction.status != PaymentStatus::Paid {
            return Err(AppError::InvalidTransition(format!(
                "booking {} is not paid (payment is {})",
                booking.code,
                transaction.status.as_str()
            )));
        }

        let amounts = InvoiceAmounts::compute(booking.price, booking.points_redeemed, self.redeem_rate);
        let payment_date = transaction.confirmed_at.unwrap_or_else(Utc::now);
        let now = Utc::now();

        let invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: invoice_number(payment_date.date_naive()),
            booking_id,
            subtotal: amounts.subtotal,
            discount: amounts.discount,
            total: amounts.total,
            payment_date,
            payment_method: transaction.payment_method,
            status: InvoiceStatus::Paid,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .invoice_repo
            .create_if_absent(invoice)
            .await?
            .ok_or(AppError::DuplicateInvoice(booking_id))?;

        tracing::info!(
            "Issued invoice {} for booking {}",
            created.invoice_number,
            booking.code
        );
        Ok(created)
    }

    pub async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Invoice>> {
        self.invoice_repo.find_by_booking(booking_id).await
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        self.invoice_repo.list(limit, offset).await
    }
}
