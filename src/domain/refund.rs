use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// How much of a paid booking is returned on cancellation.
///
/// Notice is measured from the cancellation to the start of play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    /// Strictly more notice than this refunds everything.
    pub full_refund_hours: i64,
    /// Strictly more notice than this (but not enough for a full refund)
    /// refunds `partial_refund_percent`.
    pub partial_refund_hours: i64,
    pub partial_refund_percent: i64,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            full_refund_hours: 24,
            partial_refund_hours: 12,
            partial_refund_percent: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundTier {
    Full,
    Partial,
    None,
}

impl RefundPolicy {
    pub fn tier(&self, starts_at: NaiveDateTime, cancelled_at: NaiveDateTime) -> RefundTier {
        let notice_minutes = (starts_at - cancelled_at).num_minutes();
        if notice_minutes > self.full_refund_hours * 60 {
            RefundTier::Full
        } else if notice_minutes > self.partial_refund_hours * 60 {
            RefundTier::Partial
        } else {
            RefundTier::None
        }
    }

    /// Refund owed on `paid_amount`, rounded down to whole rupiah.
    pub fn refund_amount(&self, paid_amount: i64, starts_at: NaiveDateTime, cancelled_at: NaiveDateTime) -> i64 {
        match self.tier(starts_at, cancelled_at) {
            RefundTier::Full => paid_amount,
            RefundTier::Partial => paid_amount * self.partial_refund_percent.clamp(0, 100) / 100,
            RefundTier::None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_tiers() {
        let policy = RefundPolicy::default();
        assert_eq!(policy.tier(start(), start() - Duration::hours(48)), RefundTier::Full);
        assert_eq!(policy.tier(start(), start() - Duration::hours(24)), RefundTier::Partial);
        assert_eq!(policy.tier(start(), start() - Duration::hours(13)), RefundTier::Partial);
        assert_eq!(policy.tier(start(), start() - Duration::hours(12)), RefundTier::None);
        assert_eq!(policy.tier(start(), start() + Duration::hours(1)), RefundTier::None);
    }

    #[test]
    fn test_amounts() {
        let policy = RefundPolicy::default();
        assert_eq!(policy.refund_amount(150_000, start(), start() - Duration::days(3)), 150_000);
        assert_eq!(policy.refund_amount(150_001, start(), start() - Duration::hours(20)), 75_000);
        assert_eq!(policy.refund_amount(150_000, start(), start() - Duration::hours(1)), 0);
    }
}
