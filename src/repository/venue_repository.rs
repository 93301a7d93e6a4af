use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{PeakHours, TimeRange, Venue, VenueStatus},
    error::{AppError, Result},
    repository::{parse_time, parse_uuid, to_utc, VenueRepository},
};

#[derive(FromRow)]
struct VenueRow {
    id: String,
    title: String,
    category: String,
    description: Option<String>,
    price: Option<i64>,
    weekday_price: Option<i64>,
    weekend_price: Option<i64>,
    peak_start: Option<String>,
    peak_end: Option<String>,
    peak_multiplier: Option<f64>,
    open_time: String,
    close_time: String,
    status: String,
    maintenance_reason: Option<String>,
    maintenance_until: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const VENUE_COLUMNS: &str = r#"
    id, title, category, description, price, weekday_price, weekend_price,
    peak_start, peak_end, peak_multiplier, open_time, close_time, status,
    maintenance_reason, maintenance_until, created_at, updated_at
"#;

pub struct SqliteVenueRepository {
    pool: SqlitePool,
}

impl SqliteVenueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_venue(row: VenueRow) -> Result<Venue> {
        let peak_hours = match (row.peak_start, row.peak_end, row.peak_multiplier) {
            (Some(start), Some(end), Some(multiplier)) => Some(PeakHours {
                window: TimeRange {
                    start: parse_time(&start)?,
                    end: parse_time(&end)?,
                },
                multiplier,
            }),
            _ => None,
        };

        Ok(Venue {
            id: parse_uuid(&row.id)?,
            title: row.title,
            category: row.category,
            description: row.description,
            price: row.price,
            weekday_price: row.weekday_price,
            weekend_price: row.weekend_price,
            peak_hours,
            open_time: parse_time(&row.open_time)?,
            close_time: parse_time(&row.close_time)?,
            status: VenueStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid venue status: {}", row.status)))?,
            maintenance_reason: row.maintenance_reason,
            maintenance_until: row.maintenance_until.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }
}

#[async_trait]
impl VenueRepository for SqliteVenueRepository {
    async fn create(&self, venue: Venue) -> Result<Venue> {
        let now = Utc::now().naive_utc();
        let peak = venue.peak_hours;

        sqlx::query(
            r#"
            INSERT INTO venues (
                id, title, category, description, price, weekday_price,
                weekend_price, peak_start, peak_end, peak_multiplier,
                open_time, close_time, status, maintenance_reason,
                maintenance_until, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(venue.id.to_string())
        .bind(&venue.title)
        .bind(&venue.category)
        .bind(&venue.description)
        .bind(venue.price)
        .bind(venue.weekday_price)
        .bind(venue.weekend_price)
        .bind(peak.map(|p| p.window.start.to_string()))
        .bind(peak.map(|p| p.window.end.to_string()))
        .bind(peak.map(|p| p.multiplier))
        .bind(venue.open_time.to_string())
        .bind(venue.close_time.to_string())
        .bind(venue.status.as_str())
        .bind(&venue.maintenance_reason)
        .bind(venue.maintenance_until.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(venue.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created venue".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Venue>> {
        let sql = format!("SELECT {} FROM venues WHERE id = ?", VENUE_COLUMNS);
        let row = sqlx::query_as::<_, VenueRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_venue).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Venue>> {
        let sql = if include_inactive {
            format!("SELECT {} FROM venues ORDER BY category, title", VENUE_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM venues WHERE status != 'inactive' ORDER BY category, title",
                VENUE_COLUMNS
            )
        };
        let rows = sqlx::query_as::<_, VenueRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_venue).collect()
    }

    async fn update(&self, id: Uuid, venue: Venue) -> Result<Venue> {
        let peak = venue.peak_hours;

        let result = sqlx::query(
            r#"
            UPDATE venues
            SET title = ?, category = ?, description = ?, price = ?,
                weekday_price = ?, weekend_price = ?, peak_start = ?,
                peak_end = ?, peak_multiplier = ?, open_time = ?,
                close_time = ?, status = ?, maintenance_reason = ?,
                maintenance_until = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&venue.title)
        .bind(&venue.category)
        .bind(&venue.description)
        .bind(venue.price)
        .bind(venue.weekday_price)
        .bind(venue.weekend_price)
        .bind(peak.map(|p| p.window.start.to_string()))
        .bind(peak.map(|p| p.window.end.to_string()))
        .bind(peak.map(|p| p.multiplier))
        .bind(venue.open_time.to_string())
        .bind(venue.close_time.to_string())
        .bind(venue.status.as_str())
        .bind(&venue.maintenance_reason)
        .bind(venue.maintenance_until.map(|dt| dt.naive_utc()))
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Venue not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated venue".to_string())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM venues WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Venue not found".to_string()));
        }
        Ok(())
    }

    async fn count_bookings(&self, id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE venue_id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
