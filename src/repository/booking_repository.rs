use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingFilter, BookingStatus, CancellationType, NewPointEntry, PaymentStatus,
        TimeOfDay, TimeRange, Transaction,
    },
    error::{AppError, Result},
    repository::{
        format_date, parse_date, parse_time, parse_uuid, points_repository::append_entry, to_utc,
        BookingRepository, CancellationRecord, PointsSettlement, Repricing,
    },
};

const BOOKING_COLUMNS: &str = r#"
    id, code, venue_id, user_id, customer_name, customer_phone, customer_email,
    booking_date, start_time, end_time, price, points_redeemed, points_earned,
    payment_method, payment_status, status, notes, cancellation_reason,
    cancellation_type, cancelled_at, refund_amount, refunded_at,
    reminder_sent_at, deleted_at, created_at, updated_at
"#;

/// Matches bookings still holding a slot that overlaps `[?, ?)` at a venue
/// on a date. Binds: venue_id, booking_date, end_time, start_time.
const OVERLAP_PREDICATE: &str = r#"
    SELECT 1 FROM bookings AS other
    WHERE other.venue_id = ?
      AND other.booking_date = ?
      AND other.status != 'cancelled'
      AND other.deleted_at IS NULL
      AND other.start_time < ?
      AND other.end_time > ?
"#;

#[derive(FromRow)]
struct BookingRow {
    id: String,
    code: String,
    venue_id: String,
    user_id: Option<String>,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    booking_date: String,
    start_time: String,
    end_time: String,
    price: i64,
    points_redeemed: i64,
    points_earned: i64,
    payment_method: String,
    payment_status: String,
    status: String,
    notes: Option<String>,
    cancellation_reason: Option<String>,
    cancellation_type: Option<String>,
    cancelled_at: Option<NaiveDateTime>,
    refund_amount: Option<i64>,
    refunded_at: Option<NaiveDateTime>,
    reminder_sent_at: Option<NaiveDateTime>,
    deleted_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: parse_uuid(&row.id)?,
            code: row.code,
            venue_id: parse_uuid(&row.venue_id)?,
            user_id: row.user_id.as_deref().map(parse_uuid).transpose()?,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            booking_date: parse_date(&row.booking_date)?,
            start_time: parse_time(&row.start_time)?,
            end_time: parse_time(&row.end_time)?,
            price: row.price,
            points_redeemed: row.points_redeemed,
            points_earned: row.points_earned,
            payment_method: row.payment_method,
            payment_status: PaymentStatus::from_str(&row.payment_status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.payment_status)))?,
            status: BookingStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid booking status: {}", row.status)))?,
            notes: row.notes,
            cancellation_reason: row.cancellation_reason,
            cancellation_type: row
                .cancellation_type
                .as_deref()
                .map(|t| {
                    CancellationType::from_str(t)
                        .ok_or_else(|| AppError::Database(format!("Invalid cancellation type: {}", t)))
                })
                .transpose()?,
            cancelled_at: row.cancelled_at.map(to_utc),
            refund_amount: row.refund_amount,
            refunded_at: row.refunded_at.map(to_utc),
            reminder_sent_at: row.reminder_sent_at.map(to_utc),
            deleted_at: row.deleted_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn fetch_where(&self, clause: &str, bind: String) -> Result<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE {} = ?", BOOKING_COLUMNS, clause);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn require(&self, id: Uuid) -> Result<Booking> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    fn conflict(venue_id: Uuid, date: NaiveDate, slot: &TimeRange) -> AppError {
        AppError::SlotConflict(format!(
            "venue {} is already booked on {} within {}",
            venue_id, date, slot
        ))
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create(
        &self,
        booking: Booking,
        transaction: Transaction,
        redemption: Option<NewPointEntry>,
    ) -> Result<Booking> {
        let id_str = booking.id.to_string();
        let venue_id_str = booking.venue_id.to_string();
        let date_str = format_date(booking.booking_date);
        let start_str = booking.start_time.to_string();
        let end_str = booking.end_time.to_string();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        // One statement: the overlap check and the insert cannot interleave
        // with another writer.
        let sql = format!(
            r#"
            INSERT INTO bookings (
                id, code, venue_id, user_id, customer_name, customer_phone,
                customer_email, booking_date, start_time, end_time, price,
                points_redeemed, points_earned, payment_method, payment_status,
                status, notes, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS ({})
            "#,
            OVERLAP_PREDICATE
        );

        let inserted = sqlx::query(&sql)
            .bind(&id_str)
            .bind(&booking.code)
            .bind(&venue_id_str)
            .bind(booking.user_id.map(|u| u.to_string()))
            .bind(&booking.customer_name)
            .bind(&booking.customer_phone)
            .bind(&booking.customer_email)
            .bind(&date_str)
            .bind(&start_str)
            .bind(&end_str)
            .bind(booking.price)
            .bind(booking.points_redeemed)
            .bind(&booking.payment_method)
            .bind(booking.payment_status.as_str())
            .bind(booking.status.as_str())
            .bind(&booking.notes)
            .bind(now)
            .bind(now)
            .bind(&venue_id_str)
            .bind(&date_str)
            .bind(&end_str)
            .bind(&start_str)
            .execute(&mut *tx)
            .await?;

        if inserted.rows_affected() == 0 {
            return Err(Self::conflict(booking.venue_id, booking.booking_date, &booking.slot()));
        }

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, booking_id, amount, admin_fee, total_amount,
                payment_method, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(&id_str)
        .bind(transaction.amount)
        .bind(transaction.admin_fee)
        .bind(transaction.total_amount)
        .bind(&transaction.payment_method)
        .bind(transaction.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(entry) = redemption {
            append_entry(&mut *tx, &entry).await?;
        }

        tx.commit().await?;

        self.find_by_id(booking.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created booking".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        self.fetch_where("id", id.to_string()).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Booking>> {
        self.fetch_where("code", code.to_uppercase()).await
    }

    async fn list(&self, filter: &BookingFilter, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM bookings WHERE 1 = 1", BOOKING_COLUMNS));

        if let Some(venue_id) = filter.venue_id {
            query.push(" AND venue_id = ").push_bind(venue_id.to_string());
        }
        if let Some(date) = filter.date {
            query.push(" AND booking_date = ").push_bind(format_date(date));
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id.to_string());
        }
        if !filter.include_deleted {
            query.push(" AND deleted_at IS NULL");
        }
        query
            .push(" ORDER BY booking_date DESC, start_time DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<BookingRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_occupying(&self, venue_id: Uuid, date: NaiveDate) -> Result<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE venue_id = ? AND booking_date = ?
              AND status != 'cancelled' AND deleted_at IS NULL
            ORDER BY start_time
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(venue_id.to_string())
            .bind(format_date(date))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn transition(&self, id: Uuid, from: BookingStatus, to: BookingStatus) -> Result<bool> {
        from.transition(to)?;

        let result = sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel(
        &self,
        id: Uuid,
        from: BookingStatus,
        record: CancellationRecord,
    ) -> Result<Option<PointsSettlement>> {
        from.transition(BookingStatus::Cancelled)?;

        let id_str = id.to_string();
        let now = Utc::now().naive_utc();
        let cancelled_at = record.cancelled_at.naive_utc();
        let refunded_at = (record.refund_amount > 0).then_some(cancelled_at);

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled',
                cancellation_reason = ?,
                cancellation_type = ?,
                cancelled_at = ?,
                refund_amount = ?,
                refunded_at = ?,
                payment_status = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(&record.reason)
        .bind(record.cancellation_type.as_str())
        .bind(cancelled_at)
        .bind((record.refund_amount > 0).then_some(record.refund_amount))
        .bind(refunded_at)
        .bind(record.payment_status.as_str())
        .bind(now)
        .bind(&id_str)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        match record.payment_status {
            PaymentStatus::Refunded => {
                sqlx::query(
                    r#"
                    UPDATE transactions
                    SET status = 'refunded', refund_amount = ?, refunded_at = ?, updated_at = ?
                    WHERE booking_id = ? AND status = 'paid'
                    "#,
                )
                .bind(record.refund_amount)
                .bind(refunded_at)
                .bind(now)
                .bind(&id_str)
                .execute(&mut *tx)
                .await?;

                sqlx::query("UPDATE invoices SET status = 'refunded', updated_at = ? WHERE booking_id = ?")
                    .bind(now)
                    .bind(&id_str)
                    .execute(&mut *tx)
                    .await?;
            }
            PaymentStatus::Failed => {
                sqlx::query(
                    r#"
                    UPDATE transactions
                    SET status = 'failed', rejection_reason = 'booking cancelled', updated_at = ?
                    WHERE booking_id = ? AND status IN ('pending', 'waiting_confirmation')
                    "#,
                )
                .bind(now)
                .bind(&id_str)
                .execute(&mut *tx)
                .await?;
            }
            _ => {}
        }

        let mut settlement = PointsSettlement::default();

        if let Some(entry) = &record.returned_points {
            append_entry(&mut *tx, entry).await?;
            settlement.returned = entry.points;
        }

        if record.reverse_earned {
            let (code, holder, earned): (String, Option<String>, i64) =
                sqlx::query_as("SELECT code, user_id, points_earned FROM bookings WHERE id = ?")
                    .bind(&id_str)
                    .fetch_one(&mut *tx)
                    .await?;

            if let (Some(holder), true) = (holder, earned > 0) {
                let balance: i64 =
                    sqlx::query_scalar("SELECT balance FROM point_balances WHERE holder_id = ?")
                        .bind(&holder)
                        .fetch_optional(&mut *tx)
                        .await?
                        .unwrap_or(0);

                let reversed = earned.min(balance.max(0));
                if reversed > 0 {
                    let entry = NewPointEntry::adjusted(
                        parse_uuid(&holder)?,
                        -reversed,
                        Some(id),
                        format!("Earned points reversed for refunded booking {}", code),
                    );
                    append_entry(&mut *tx, &entry).await?;
                }
                if reversed < earned {
                    tracing::warn!(
                        "Booking {} earned {} points but only {} could be reversed",
                        code,
                        earned,
                        reversed
                    );
                }
                settlement.reversed = reversed;
            }
        }

        tx.commit().await?;
        Ok(Some(settlement))
    }

    async fn reschedule(
        &self,
        id: Uuid,
        date: NaiveDate,
        slot: TimeRange,
        price: i64,
        repricing: Option<Repricing>,
    ) -> Result<Booking> {
        let current = self.require(id).await?;
        let id_str = id.to_string();
        let venue_id_str = current.venue_id.to_string();
        let date_str = format_date(date);
        let start_str = slot.start.to_string();
        let end_str = slot.end.to_string();
        let now = Utc::now().naive_utc();

        // A repriced booking must still be unpaid when the move lands.
        let unpaid_guard = if repricing.is_some() {
            "AND payment_status IN ('pending', 'waiting_confirmation', 'failed')"
        } else {
            ""
        };
        let sql = format!(
            r#"
            UPDATE bookings
            SET booking_date = ?, start_time = ?, end_time = ?, price = ?,
                reminder_sent_at = NULL, updated_at = ?
            WHERE id = ? AND status IN ('pending', 'confirmed') AND deleted_at IS NULL
              {}
              AND NOT EXISTS ({} AND other.id != ?)
            "#,
            unpaid_guard, OVERLAP_PREDICATE
        );

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(&sql)
            .bind(&date_str)
            .bind(&start_str)
            .bind(&end_str)
            .bind(price)
            .bind(now)
            .bind(&id_str)
            .bind(&venue_id_str)
            .bind(&date_str)
            .bind(&end_str)
            .bind(&start_str)
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            drop(tx);
            let latest = self.require(id).await?;
            if latest.status.is_terminal() || latest.deleted_at.is_some() {
                return Err(AppError::InvalidTransition(format!(
                    "booking {} is {} and cannot be rescheduled",
                    latest.code,
                    latest.status.as_str()
                )));
            }
            if repricing.is_some() && latest.payment_status == PaymentStatus::Paid {
                return Err(AppError::PersistenceConflict(format!(
                    "booking {} was paid while being rescheduled",
                    latest.code
                )));
            }
            return Err(Self::conflict(current.venue_id, date, &slot));
        }

        if let Some(repricing) = repricing {
            sqlx::query(
                r#"
                UPDATE transactions
                SET amount = ?, admin_fee = ?, total_amount = ?, updated_at = ?
                WHERE booking_id = ? AND status IN ('pending', 'waiting_confirmation')
                "#,
            )
            .bind(repricing.amount)
            .bind(repricing.admin_fee)
            .bind(repricing.amount + repricing.admin_fee)
            .bind(now)
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.require(id).await
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query("UPDATE bookings SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn restore(&self, id: Uuid) -> Result<Booking> {
        let current = self.require(id).await?;
        if current.deleted_at.is_none() {
            return Ok(current);
        }

        let id_str = id.to_string();
        let date_str = format_date(current.booking_date);
        let sql = format!(
            r#"
            UPDATE bookings
            SET deleted_at = NULL, updated_at = ?
            WHERE id = ? AND deleted_at IS NOT NULL
              AND (status = 'cancelled' OR NOT EXISTS ({} AND other.id != ?))
            "#,
            OVERLAP_PREDICATE
        );

        let updated = sqlx::query(&sql)
            .bind(Utc::now().naive_utc())
            .bind(&id_str)
            .bind(current.venue_id.to_string())
            .bind(&date_str)
            .bind(current.end_time.to_string())
            .bind(current.start_time.to_string())
            .bind(&id_str)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            let latest = self.require(id).await?;
            if latest.deleted_at.is_none() {
                return Ok(latest);
            }
            return Err(Self::conflict(current.venue_id, current.booking_date, &current.slot()));
        }

        self.require(id).await
    }

    async fn list_due_for_completion(&self, now: NaiveDateTime) -> Result<Vec<Booking>> {
        let today = format_date(now.date());
        let now_time = TimeOfDay::from_naive_time(now.time()).to_string();
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE status = 'confirmed' AND deleted_at IS NULL
              AND (booking_date < ? OR (booking_date = ? AND end_time <= ?))
            ORDER BY booking_date, end_time
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(&today)
            .bind(&today)
            .bind(now_time)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_needing_reminder(&self, date: NaiveDate) -> Result<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE status = 'confirmed' AND deleted_at IS NULL
              AND reminder_sent_at IS NULL AND booking_date = ?
            ORDER BY start_time
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(format_date(date))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn claim_reminder(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET reminder_sent_at = ? WHERE id = ? AND reminder_sent_at IS NULL AND status = 'confirmed'",
        )
        .bind(at.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_unpaid_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE status = 'pending' AND payment_status IN ('pending', 'failed')
              AND deleted_at IS NULL AND created_at < ?
            ORDER BY created_at
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(cutoff.naive_utc())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }
}
