use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        Booking, BookingStatus, CreatePaymentMethodRequest, PaymentMethod, PaymentStatus, Transaction,
        UpdatePaymentMethodRequest,
    },
    error::{AppError, Result},
    events::{DomainEvent, EventBus},
    repository::{BookingRepository, PaymentMethodRepository, TransactionRepository},
};

pub struct PaymentService {
    transaction_repo: Arc<dyn TransactionRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    method_repo: Arc<dyn PaymentMethodRepository>,
    event_bus: Arc<EventBus>,
}

impl PaymentService {
    pub fn new(
        transaction_repo: Arc<dyn TransactionRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        method_repo: Arc<dyn PaymentMethodRepository>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            transaction_repo,
            booking_repo,
            method_repo,
            event_bus,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Transaction> {
        self.transaction_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))
    }

    pub async fn for_booking(&self, booking_id: Uuid) -> Result<Transaction> {
        self.transaction_repo
            .find_by_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))
    }

    pub async fn list(&self, status: Option<PaymentStatus>, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        self.transaction_repo.list_by_status(status, limit, offset).await
    }

    /// Attach a proof of payment and wait for an admin to check it.
    pub async fn submit_proof(&self, booking: &Booking, proof_path: &str) -> Result<Transaction> {
        if booking.status != BookingStatus::Pending || booking.deleted_at.is_some() {
            return Err(AppError::InvalidTransition(format!(
                "booking {} is {} and no longer takes payment",
                booking.code,
                booking.status.as_str()
            )));
        }

        let transaction = self.for_booking(booking.id).await?;
        if !self.transaction_repo.submit_proof(transaction.id, proof_path).await? {
            let latest = self.get(transaction.id).await?;
            return Err(AppError::InvalidTransition(format!(
                "payment is {} and cannot take a proof",
                latest.status.as_str()
            )));
        }

        let transaction = self.get(transaction.id).await?;
        let booking = self.require_booking(booking.id).await?;
        tracing::info!("Payment proof submitted for booking {}", booking.code);

        self.event_bus
            .publish(DomainEvent::PaymentSubmitted {
                booking,
                transaction: transaction.clone(),
            })
            .await;
        Ok(transaction)
    }

    /// Mark a payment as received. Confirming an already paid transaction
    /// returns it unchanged and publishes nothing.
    pub async fn confirm_payment(&self, transaction_id: Uuid, confirmed_by: Option<Uuid>) -> Result<Transaction> {
        let transaction = self.get(transaction_id).await?;
        if transaction.status == PaymentStatus::Paid {
            tracing::debug!("Transaction {} already paid", transaction_id);
            return Ok(transaction);
        }
        transaction.status.transition(PaymentStatus::Paid)?;

        if !self
            .transaction_repo
            .confirm(transaction_id, confirmed_by, Utc::now())
            .await?
        {
            let latest = self.get(transaction_id).await?;
            if latest.status == PaymentStatus::Paid {
                return Ok(latest);
            }
            latest.status.transition(PaymentStatus::Paid)?;
            return Err(AppError::PersistenceConflict(format!(
                "transaction {} changed concurrently",
                transaction_id
            )));
        }

        let transaction = self.get(transaction_id).await?;
        let booking = self.require_booking(transaction.booking_id).await?;
        tracing::info!(
            "Payment {} confirmed for booking {}",
            transaction.id,
            booking.code
        );

        self.event_bus
            .publish(DomainEvent::PaymentConfirmed {
                booking,
                transaction: transaction.clone(),
            })
            .await;
        Ok(transaction)
    }

    pub async fn reject_payment(&self, transaction_id: Uuid, reason: &str) -> Result<Transaction> {
        let transaction = self.get(transaction_id).await?;
        transaction.status.transition(PaymentStatus::Failed)?;

        if !self.transaction_repo.reject(transaction_id, reason).await? {
            let latest = self.get(transaction_id).await?;
            latest.status.transition(PaymentStatus::Failed)?;
            return Err(AppError::PersistenceConflict(format!(
                "transaction {} changed concurrently",
                transaction_id
            )));
        }

        let transaction = self.get(transaction_id).await?;
        let booking = self.require_booking(transaction.booking_id).await?;
        tracing::info!("Payment {} rejected: {}", transaction.id, reason);

        self.event_bus
            .publish(DomainEvent::PaymentRejected {
                booking,
                transaction: transaction.clone(),
            })
            .await;
        Ok(transaction)
    }

    pub async fn list_methods(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>> {
        self.method_repo.list(include_inactive).await
    }

    pub async fn get_method(&self, id: Uuid) -> Result<PaymentMethod> {
        self.method_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment method not found".to_string()))
    }

    pub async fn create_method(&self, request: CreatePaymentMethodRequest) -> Result<PaymentMethod> {
        request.validate()?;
        let code = request.code.trim().to_lowercase();
        if self.method_repo.find_by_code(&code).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Payment method '{}' already exists",
                code
            )));
        }

        let now = Utc::now();
        self.method_repo
            .create(PaymentMethod {
                id: Uuid::new_v4(),
                code,
                name: request.name,
                fee_type: request.fee_type,
                fee_value: request.fee_value,
                instructions: request.instructions,
                is_active: true,
                display_order: request.display_order.unwrap_or(0),
                created_at: now,
                updated_at: now,
            })
            .await
    }

    pub async fn update_method(&self, id: Uuid, request: UpdatePaymentMethodRequest) -> Result<PaymentMethod> {
        request.validate()?;
        let mut method = self.get_method(id).await?;

        if let Some(name) = request.name {
            method.name = name;
        }
        if let Some(fee_type) = request.fee_type {
            method.fee_type = fee_type;
        }
        if let Some(fee_value) = request.fee_value {
            method.fee_value = fee_value;
        }
        if request.instructions.is_some() {
            method.instructions = request.instructions;
        }
        if let Some(active) = request.is_active {
            method.is_active = active;
        }
        if let Some(order) = request.display_order {
            method.display_order = order;
        }

        self.method_repo.update(id, method).await
    }

    pub async fn delete_method(&self, id: Uuid) -> Result<()> {
        self.method_repo.delete(id).await
    }

    async fn require_booking(&self, id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }
}
