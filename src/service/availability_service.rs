use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    domain::{availability::DayAvailability, TimeRange},
    error::{AppError, Result},
    repository::{BookingRepository, VenueRepository},
};

/// Free and booked ranges of one venue on one date.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableSlots {
    pub venue_id: Uuid,
    pub date: NaiveDate,
    pub open: TimeRange,
    pub free: Vec<TimeRange>,
    pub booked: Vec<TimeRange>,
}

/// Computed availability keyed by (venue, date).
///
/// Every invalidation stamps the key (or the whole venue) with a fresh
/// generation. A reader takes the generation before querying and `put`
/// refuses its result if an invalidation landed in between.
#[derive(Default)]
pub struct SlotCache {
    state: RwLock<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<(Uuid, NaiveDate), DayAvailability>,
    key_stamps: HashMap<(Uuid, NaiveDate), u64>,
    venue_stamps: HashMap<Uuid, u64>,
    clock: u64,
}

impl CacheState {
    fn generation(&self, venue_id: Uuid, date: NaiveDate) -> u64 {
        let key = self.key_stamps.get(&(venue_id, date)).copied().unwrap_or(0);
        let venue = self.venue_stamps.get(&venue_id).copied().unwrap_or(0);
        key.max(venue)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl SlotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, venue_id: Uuid, date: NaiveDate) -> Option<DayAvailability> {
        self.state.read().await.entries.get(&(venue_id, date)).cloned()
    }

    /// Current generation of a key. Read it before loading what `put` stores.
    pub async fn generation(&self, venue_id: Uuid, date: NaiveDate) -> u64 {
        self.state.read().await.generation(venue_id, date)
    }

    /// Store `availability` unless the key was invalidated since `seen` was
    /// read. Returns whether it was stored.
    pub async fn put(&self, venue_id: Uuid, date: NaiveDate, availability: DayAvailability, seen: u64) -> bool {
        let mut state = self.state.write().await;
        if state.generation(venue_id, date) != seen {
            tracing::debug!("Dropped stale slot cache fill for venue {} on {}", venue_id, date);
            return false;
        }
        state.entries.insert((venue_id, date), availability);
        true
    }

    pub async fn invalidate_key(&self, venue_id: Uuid, date: NaiveDate) {
        let mut state = self.state.write().await;
        let stamp = state.tick();
        state.key_stamps.insert((venue_id, date), stamp);
        if state.entries.remove(&(venue_id, date)).is_some() {
            tracing::debug!("Invalidated slot cache for venue {} on {}", venue_id, date);
        }
    }

    pub async fn invalidate_venue(&self, venue_id: Uuid) {
        let mut state = self.state.write().await;
        let stamp = state.tick();
        state.venue_stamps.insert(venue_id, stamp);
        let before = state.entries.len();
        state.entries.retain(|(venue, _), _| *venue != venue_id);
        tracing::debug!(
            "Invalidated {} slot cache entries for venue {}",
            before - state.entries.len(),
            venue_id
        );
    }

    /// Drop entries and stamps for dates before `floor`.
    pub async fn evict_before(&self, floor: NaiveDate) -> usize {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|(_, date), _| *date >= floor);
        state.key_stamps.retain(|(_, date), _| *date >= floor);
        before - state.entries.len()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

pub struct AvailabilityService {
    venue_repo: Arc<dyn VenueRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    cache: Arc<SlotCache>,
}

impl AvailabilityService {
    pub fn new(
        venue_repo: Arc<dyn VenueRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        cache: Arc<SlotCache>,
    ) -> Self {
        Self {
            venue_repo,
            booking_repo,
            cache,
        }
    }

    pub fn cache(&self) -> Arc<SlotCache> {
        self.cache.clone()
    }

    pub async fn compute_available_slots(&self, venue_id: Uuid, date: NaiveDate) -> Result<AvailableSlots> {
        let day = match self.cache.get(venue_id, date).await {
            Some(day) => day,
            None => {
                let seen = self.cache.generation(venue_id, date).await;
                let venue = self
                    .venue_repo
                    .find_by_id(venue_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Venue not found".to_string()))?;

                let booked = self
                    .booking_repo
                    .list_occupying(venue_id, date)
                    .await?
                    .iter()
                    .map(|b| b.slot())
                    .collect();

                let day = DayAvailability::compute(venue.operating_hours(), booked);

                // Dates in the past are served but never cached.
                let floor = Utc::now().date_naive() - Duration::days(1);
                if self.cache.evict_before(floor).await > 0 {
                    tracing::debug!("Evicted slot cache entries before {}", floor);
                }
                if date >= floor {
                    self.cache.put(venue_id, date, day.clone(), seen).await;
                }
                day
            }
        };

        Ok(AvailableSlots {
            venue_id,
            date,
            open: day.open,
            free: day.free,
            booked: day.booked,
        })
    }
}
