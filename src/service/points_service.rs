use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{Booking, NewPointEntry, PointEntry, PointsPolicy},
    error::{AppError, Result},
    repository::PointsRepository,
};

pub struct PointsService {
    repo: Arc<dyn PointsRepository>,
    policy: PointsPolicy,
}

impl PointsService {
    pub fn new(repo: Arc<dyn PointsRepository>, policy: PointsPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> PointsPolicy {
        self.policy
    }

    /// Award points for a paid booking. Guest bookings earn nothing, and a
    /// booking that already earned is left alone.
    pub async fn earn(&self, booking: &Booking) -> Result<Option<PointEntry>> {
        let Some(holder_id) = booking.user_id else {
            return Ok(None);
        };
        let points = self.policy.points_for(booking.price);
        if points == 0 {
            return Ok(None);
        }

        match self
            .repo
            .append(NewPointEntry::earned(holder_id, points, booking.id, &booking.code))
            .await
        {
            Ok(entry) => {
                tracing::info!(
                    "Holder {} earned {} points from booking {}",
                    holder_id,
                    points,
                    booking.code
                );
                Ok(Some(entry))
            }
            Err(AppError::Conflict(_)) => {
                tracing::debug!("Points for booking {} already earned", booking.code);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn redeem(&self, holder_id: Uuid, points: i64, booking: &Booking) -> Result<PointEntry> {
        if points <= 0 {
            return Err(AppError::Validation("Points to redeem must be positive".to_string()));
        }
        self.repo
            .append(NewPointEntry::redeemed(holder_id, points, booking.id, &booking.code))
            .await
    }

    pub async fn adjust(&self, holder_id: Uuid, delta: i64, reason: &str) -> Result<PointEntry> {
        if delta == 0 {
            return Err(AppError::Validation("Adjustment cannot be zero".to_string()));
        }
        if reason.trim().is_empty() {
            return Err(AppError::Validation("Adjustment needs a reason".to_string()));
        }

        let entry = self
            .repo
            .append(NewPointEntry::adjusted(holder_id, delta, None, reason.trim()))
            .await?;
        tracing::info!(
            "Adjusted points of {} by {} (balance {})",
            holder_id,
            delta,
            entry.balance_after
        );
        Ok(entry)
    }

    pub async fn balance(&self, holder_id: Uuid) -> Result<i64> {
        self.repo.balance(holder_id).await
    }

    pub async fn history(&self, holder_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointEntry>> {
        self.repo.history(holder_id, limit, offset).await
    }

    /// Rupiah discount that `points` buy.
    pub fn discount_for(&self, points: i64) -> i64 {
        if self.policy.redeem_rate <= 0 {
            return 0;
        }
        points.max(0) / self.policy.redeem_rate
    }
}
