use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointEntry {
    pub id: Uuid,
    pub holder_id: Uuid,
    pub entry_type: PointEntryType,
    /// Signed delta applied by this entry.
    pub points: i64,
    pub balance_after: i64,
    pub booking_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PointEntryType {
    Earned,
    Redeemed,
    Adjusted,
}

impl PointEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointEntryType::Earned => "earned",
            PointEntryType::Redeemed => "redeemed",
            PointEntryType::Adjusted => "adjusted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "earned" => Some(PointEntryType::Earned),
            "redeemed" => Some(PointEntryType::Redeemed),
            "adjusted" => Some(PointEntryType::Adjusted),
            _ => None,
        }
    }
}

/// An entry to append to a holder's ledger.
#[derive(Debug, Clone)]
pub struct NewPointEntry {
    pub holder_id: Uuid,
    pub entry_type: PointEntryType,
    pub points: i64,
    pub booking_id: Option<Uuid>,
    pub description: String,
}

impl NewPointEntry {
    pub fn earned(holder_id: Uuid, points: i64, booking_id: Uuid, code: &str) -> Self {
        Self {
            holder_id,
            entry_type: PointEntryType::Earned,
            points,
            booking_id: Some(booking_id),
            description: format!("Points earned from booking {}", code),
        }
    }

    /// `points` is the positive number of points spent.
    pub fn redeemed(holder_id: Uuid, points: i64, booking_id: Uuid, code: &str) -> Self {
        Self {
            holder_id,
            entry_type: PointEntryType::Redeemed,
            points: -points,
            booking_id: Some(booking_id),
            description: format!("Points redeemed for booking {}", code),
        }
    }

    pub fn adjusted(holder_id: Uuid, delta: i64, booking_id: Option<Uuid>, reason: impl Into<String>) -> Self {
        Self {
            holder_id,
            entry_type: PointEntryType::Adjusted,
            points: delta,
            booking_id,
            description: reason.into(),
        }
    }
}

/// Balance after applying `delta`, refusing to go negative.
pub fn next_balance(current: i64, delta: i64) -> Result<i64> {
    let next = current + delta;
    if next < 0 {
        return Err(AppError::InsufficientPoints {
            requested: -delta,
            available: current,
        });
    }
    Ok(next)
}

/// Conversion between rupiah and points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsPolicy {
    /// Rupiah spent per point earned.
    pub earn_divisor: i64,
    /// Points per rupiah of discount.
    pub redeem_rate: i64,
}

impl PointsPolicy {
    pub fn points_for(&self, price: i64) -> i64 {
        if self.earn_divisor <= 0 {
            return 0;
        }
        price.max(0) / self.earn_divisor
    }
}

impl Default for PointsPolicy {
    fn default() -> Self {
        Self {
            earn_divisor: 1000,
            redeem_rate: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_balance() {
        assert_eq!(next_balance(500, 100).unwrap(), 600);
        assert_eq!(next_balance(500, -500).unwrap(), 0);
        match next_balance(500, -600) {
            Err(AppError::InsufficientPoints { requested, available }) => {
                assert_eq!(requested, 600);
                assert_eq!(available, 500);
            }
            other => panic!("expected InsufficientPoints, got {:?}", other),
        }
    }

    #[test]
    fn test_points_for_price() {
        let policy = PointsPolicy::default();
        assert_eq!(policy.points_for(150_000), 150);
        assert_eq!(policy.points_for(999), 0);
        assert_eq!(policy.points_for(-10), 0);
    }

    #[test]
    fn test_redeemed_entry_is_negative() {
        let entry = NewPointEntry::redeemed(Uuid::new_v4(), 300, Uuid::new_v4(), "BK-1");
        assert_eq!(entry.points, -300);
        assert_eq!(entry.entry_type, PointEntryType::Redeemed);
    }
}
