use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::schedule::{TimeOfDay, TimeRange};

/// A bookable sports facility (lapangan).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    /// Flat hourly rate, used when no tiered rate applies.
    pub price: Option<i64>,
    pub weekday_price: Option<i64>,
    pub weekend_price: Option<i64>,
    pub peak_hours: Option<PeakHours>,
    pub open_time: TimeOfDay,
    pub close_time: TimeOfDay,
    pub status: VenueStatus,
    pub maintenance_reason: Option<String>,
    pub maintenance_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Venue {
    pub fn operating_hours(&self) -> TimeRange {
        TimeRange {
            start: self.open_time,
            end: self.close_time,
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.status == VenueStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PeakHours {
    pub window: TimeRange,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VenueStatus {
    Active,
    Inactive,
    Maintenance,
}

impl VenueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueStatus::Active => "active",
            VenueStatus::Inactive => "inactive",
            VenueStatus::Maintenance => "maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(VenueStatus::Active),
            "inactive" => Some(VenueStatus::Inactive),
            "maintenance" => Some(VenueStatus::Maintenance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateVenueRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub weekday_price: Option<i64>,
    #[validate(range(min = 0))]
    pub weekend_price: Option<i64>,
    pub peak_hours: Option<PeakHours>,
    /// Defaults to the configured opening time.
    pub open_time: Option<TimeOfDay>,
    /// Defaults to the configured closing time.
    pub close_time: Option<TimeOfDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateVenueRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub weekday_price: Option<i64>,
    #[validate(range(min = 0))]
    pub weekend_price: Option<i64>,
    pub peak_hours: Option<PeakHours>,
    /// Removes the peak window when set.
    #[serde(default)]
    pub clear_peak_hours: bool,
    pub open_time: Option<TimeOfDay>,
    pub close_time: Option<TimeOfDay>,
    pub status: Option<VenueStatus>,
    pub maintenance_reason: Option<String>,
    pub maintenance_until: Option<DateTime<Utc>>,
}
