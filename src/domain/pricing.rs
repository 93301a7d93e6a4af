use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use super::schedule::TimeRange;
use super::venue::{PeakHours, Venue};
use crate::error::{AppError, Result};

/// Pricing fields of a venue. Rates are per hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VenuePricing {
    pub price: Option<i64>,
    pub weekday_price: Option<i64>,
    pub weekend_price: Option<i64>,
    pub peak_hours: Option<PeakHours>,
}

impl From<&Venue> for VenuePricing {
    fn from(venue: &Venue) -> Self {
        Self {
            price: venue.price,
            weekday_price: venue.weekday_price,
            weekend_price: venue.weekend_price,
            peak_hours: venue.peak_hours,
        }
    }
}

impl VenuePricing {
    /// Check the fields can price at least some booking.
    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("price", self.price),
            ("weekday_price", self.weekday_price),
            ("weekend_price", self.weekend_price),
        ] {
            if matches!(rate, Some(r) if r < 0) {
                return Err(AppError::InvalidPricingConfig(format!("{} cannot be negative", name)));
            }
        }
        if self.price.is_none() && self.weekday_price.is_none() && self.weekend_price.is_none() {
            return Err(AppError::InvalidPricingConfig(
                "neither a flat nor a tiered price is configured".to_string(),
            ));
        }
        if let Some(peak) = self.peak_hours {
            if !peak.multiplier.is_finite() || peak.multiplier <= 0.0 {
                return Err(AppError::InvalidPricingConfig(format!(
                    "peak multiplier must be positive, got {}",
                    peak.multiplier
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    pub hourly_rate: i64,
    pub duration_minutes: i64,
    pub weekend: bool,
    pub peak_applied: bool,
    pub multiplier: f64,
    pub total: i64,
}

/// Price a booking.
///
/// The weekend or weekday rate is chosen by `date`, falling back to the flat
/// rate when that tier is not set. When the slot touches the peak window the
/// multiplier applies to the whole booking.
pub fn compute_price(
    pricing: &VenuePricing,
    date: NaiveDate,
    slot: &TimeRange,
    weekend_days: &[Weekday],
) -> Result<PriceQuote> {
    pricing.validate()?;

    let weekend = weekend_days.contains(&date.weekday());
    let tiered = if weekend {
        pricing.weekend_price
    } else {
        pricing.weekday_price
    };
    let hourly_rate = tiered.or(pricing.price).ok_or_else(|| {
        AppError::InvalidPricingConfig(format!(
            "no {} or flat price configured",
            if weekend { "weekend" } else { "weekday" }
        ))
    })?;

    let duration_minutes = slot.duration_minutes();
    let (peak_applied, multiplier) = match pricing.peak_hours {
        Some(peak) if peak.window.overlaps(slot) => (true, peak.multiplier),
        _ => (false, 1.0),
    };

    let base = (hourly_rate * duration_minutes) as f64 / 60.0;
    let total = (base * multiplier).round().max(0.0) as i64;

    Ok(PriceQuote {
        hourly_rate,
        duration_minutes,
        weekend,
        peak_applied,
        multiplier,
        total,
    })
}

pub fn default_weekend_days() -> Vec<Weekday> {
    vec![Weekday::Sat, Weekday::Sun]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn r(start: &str, end: &str) -> TimeRange {
        TimeRange::parse(start, end).unwrap()
    }

    fn flat(price: i64) -> VenuePricing {
        VenuePricing {
            price: Some(price),
            weekday_price: None,
            weekend_price: None,
            peak_hours: None,
        }
    }

    #[test]
    fn test_flat_hourly_price() {
        // 2024-01-10 is a Wednesday
        let quote = compute_price(&flat(100_000), d(2024, 1, 10), &r("18:00", "19:00"), &default_weekend_days()).unwrap();
        assert_eq!(quote.total, 100_000);
        assert!(!quote.weekend);
        assert!(!quote.peak_applied);
    }

    #[test]
    fn test_partial_hours() {
        let quote = compute_price(&flat(100_000), d(2024, 1, 10), &r("18:00", "19:30"), &default_weekend_days()).unwrap();
        assert_eq!(quote.total, 150_000);
        let quote = compute_price(&flat(100_000), d(2024, 1, 10), &r("18:00", "18:20"), &default_weekend_days()).unwrap();
        assert_eq!(quote.total, 33_333);
    }

    #[test]
    fn test_weekend_tier_with_fallback() {
        let pricing = VenuePricing {
            price: Some(90_000),
            weekday_price: Some(80_000),
            weekend_price: Some(120_000),
            peak_hours: None,
        };
        let saturday = d(2024, 1, 13);
        let wednesday = d(2024, 1, 10);
        let slot = r("10:00", "11:00");
        let weekend = default_weekend_days();
        assert_eq!(compute_price(&pricing, saturday, &slot, &weekend).unwrap().total, 120_000);
        assert_eq!(compute_price(&pricing, wednesday, &slot, &weekend).unwrap().total, 80_000);

        let weekday_only = VenuePricing {
            weekend_price: None,
            ..pricing
        };
        assert_eq!(compute_price(&weekday_only, saturday, &slot, &weekend).unwrap().total, 90_000);
    }

    #[test]
    fn test_configured_weekend_days() {
        let pricing = VenuePricing {
            price: None,
            weekday_price: Some(80_000),
            weekend_price: Some(120_000),
            peak_hours: None,
        };
        // Friday counted as weekend
        let friday = d(2024, 1, 12);
        let quote = compute_price(&pricing, friday, &r("10:00", "11:00"), &[Weekday::Fri]).unwrap();
        assert_eq!(quote.total, 120_000);
    }

    #[test]
    fn test_peak_multiplier_applies_to_whole_booking() {
        let pricing = VenuePricing {
            peak_hours: Some(PeakHours {
                window: r("17:00", "21:00"),
                multiplier: 1.5,
            }),
            ..flat(100_000)
        };
        let weekend = default_weekend_days();
        let date = d(2024, 1, 10);

        let inside = compute_price(&pricing, date, &r("18:00", "19:00"), &weekend).unwrap();
        assert_eq!(inside.total, 150_000);
        assert!(inside.peak_applied);

        let straddling = compute_price(&pricing, date, &r("16:00", "18:00"), &weekend).unwrap();
        assert_eq!(straddling.total, 300_000);

        let touching = compute_price(&pricing, date, &r("16:00", "17:00"), &weekend).unwrap();
        assert_eq!(touching.total, 100_000);
        assert!(!touching.peak_applied);
    }

    #[test]
    fn test_missing_price_is_invalid_config() {
        let pricing = VenuePricing {
            price: None,
            weekday_price: None,
            weekend_price: None,
            peak_hours: None,
        };
        let result = compute_price(&pricing, d(2024, 1, 10), &r("10:00", "11:00"), &default_weekend_days());
        assert!(matches!(result, Err(AppError::InvalidPricingConfig(_))));

        let weekend_only = VenuePricing {
            weekend_price: Some(100_000),
            ..pricing
        };
        let result = compute_price(&weekend_only, d(2024, 1, 10), &r("10:00", "11:00"), &default_weekend_days());
        assert!(matches!(result, Err(AppError::InvalidPricingConfig(_))));
    }

    #[test]
    fn test_bad_multiplier_is_invalid_config() {
        let pricing = VenuePricing {
            peak_hours: Some(PeakHours {
                window: r("17:00", "21:00"),
                multiplier: 0.0,
            }),
            ..flat(100_000)
        };
        assert!(matches!(pricing.validate(), Err(AppError::InvalidPricingConfig(_))));
    }

    #[test]
    fn test_pricing_is_deterministic() {
        let pricing = VenuePricing {
            peak_hours: Some(PeakHours {
                window: r("17:00", "21:00"),
                multiplier: 1.25,
            }),
            ..flat(87_500)
        };
        let a = compute_price(&pricing, d(2024, 3, 2), &r("16:15", "17:45"), &default_weekend_days()).unwrap();
        let b = compute_price(&pricing, d(2024, 3, 2), &r("16:15", "17:45"), &default_weekend_days()).unwrap();
        assert_eq!(a, b);
    }
}
