use chrono::{NaiveDate, Utc, Weekday};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        pricing::{compute_price, PriceQuote, VenuePricing},
        CreateVenueRequest, TimeOfDay, TimeRange, UpdateVenueRequest, Venue, VenueStatus,
    },
    error::{AppError, Result},
    events::{DomainEvent, EventBus},
    repository::VenueRepository,
};

pub struct VenueService {
    repo: Arc<dyn VenueRepository>,
    event_bus: Arc<EventBus>,
    weekend_days: Vec<Weekday>,
    default_hours: (TimeOfDay, TimeOfDay),
}

impl VenueService {
    pub fn new(
        repo: Arc<dyn VenueRepository>,
        event_bus: Arc<EventBus>,
        weekend_days: Vec<Weekday>,
        default_hours: (TimeOfDay, TimeOfDay),
    ) -> Self {
        Self {
            repo,
            event_bus,
            weekend_days,
            default_hours,
        }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Venue>> {
        self.repo.list(include_inactive).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Venue> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Venue not found".to_string()))
    }

    pub async fn create(&self, request: CreateVenueRequest) -> Result<Venue> {
        request.validate()?;

        let now = Utc::now();
        let venue = Venue {
            id: Uuid::new_v4(),
            title: request.title,
            category: request.category,
            description: request.description,
            price: request.price,
            weekday_price: request.weekday_price,
            weekend_price: request.weekend_price,
            peak_hours: request.peak_hours,
            open_time: request.open_time.unwrap_or(self.default_hours.0),
            close_time: request.close_time.unwrap_or(self.default_hours.1),
            status: VenueStatus::Active,
            maintenance_reason: None,
            maintenance_until: None,
            created_at: now,
            updated_at: now,
        };
        validate_venue(&venue)?;

        let venue = self.repo.create(venue).await?;
        tracing::info!("Created venue {} ({})", venue.title, venue.id);
        Ok(venue)
    }

    pub async fn update(&self, id: Uuid, request: UpdateVenueRequest) -> Result<Venue> {
        request.validate()?;
        let mut venue = self.get(id).await?;

        if let Some(title) = request.title {
            venue.title = title;
        }
        if let Some(category) = request.category {
            venue.category = category;
        }
        if request.description.is_some() {
            venue.description = request.description;
        }
        if request.price.is_some() {
            venue.price = request.price;
        }
        if request.weekday_price.is_some() {
            venue.weekday_price = request.weekday_price;
        }
        if request.weekend_price.is_some() {
            venue.weekend_price = request.weekend_price;
        }
        if request.clear_peak_hours {
            venue.peak_hours = None;
        } else if request.peak_hours.is_some() {
            venue.peak_hours = request.peak_hours;
        }
        if let Some(open) = request.open_time {
            venue.open_time = open;
        }
        if let Some(close) = request.close_time {
            venue.close_time = close;
        }
        if let Some(status) = request.status {
            venue.status = status;
            if status != VenueStatus::Maintenance {
                venue.maintenance_reason = None;
                venue.maintenance_until = None;
            }
        }
        if venue.status == VenueStatus::Maintenance {
            if request.maintenance_reason.is_some() {
                venue.maintenance_reason = request.maintenance_reason;
            }
            if request.maintenance_until.is_some() {
                venue.maintenance_until = request.maintenance_until;
            }
        }
        validate_venue(&venue)?;

        let updated = self.repo.update(id, venue).await?;
        self.event_bus
            .publish(DomainEvent::VenueUpdated(updated.clone()))
            .await;

        Ok(updated)
    }

    /// Venues with booking history cannot be removed; deactivate them instead.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let venue = self.get(id).await?;
        let bookings = self.repo.count_bookings(id).await?;
        if bookings > 0 {
            return Err(AppError::Conflict(format!(
                "Venue has {} bookings; set it inactive instead",
                bookings
            )));
        }

        self.repo.delete(id).await?;
        self.event_bus.publish(DomainEvent::VenueUpdated(venue)).await;
        Ok(())
    }

    pub async fn compute_price(&self, venue_id: Uuid, date: NaiveDate, slot: &TimeRange) -> Result<PriceQuote> {
        let venue = self.get(venue_id).await?;
        quote(&venue, date, slot, &self.weekend_days)
    }

    pub fn weekend_days(&self) -> &[Weekday] {
        &self.weekend_days
    }
}

pub fn quote(venue: &Venue, date: NaiveDate, slot: &TimeRange, weekend_days: &[Weekday]) -> Result<PriceQuote> {
    compute_price(&VenuePricing::from(venue), date, slot, weekend_days)
}

fn validate_venue(venue: &Venue) -> Result<()> {
    if venue.open_time >= venue.close_time {
        return Err(AppError::Validation(format!(
            "Opening time {} must be before closing time {}",
            venue.open_time, venue.close_time
        )));
    }
    VenuePricing::from(venue).validate()?;
    if let Some(peak) = venue.peak_hours {
        TimeRange::new(peak.window.start, peak.window.end)?;
    }
    if venue.price.is_none() && (venue.weekday_price.is_none() || venue.weekend_price.is_none()) {
        return Err(AppError::InvalidPricingConfig(
            "set a flat price or both weekday and weekend prices".to_string(),
        ));
    }
    Ok(())
}
