use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{next_balance, NewPointEntry, PointEntry, PointEntryType},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, PointsRepository},
};

#[derive(FromRow)]
struct PointEntryRow {
    id: String,
    holder_id: String,
    entry_type: String,
    points: i64,
    balance_after: i64,
    booking_id: Option<String>,
    description: String,
    created_at: NaiveDateTime,
}

fn row_to_entry(row: PointEntryRow) -> Result<PointEntry> {
    Ok(PointEntry {
        id: parse_uuid(&row.id)?,
        holder_id: parse_uuid(&row.holder_id)?,
        entry_type: PointEntryType::from_str(&row.entry_type)
            .ok_or_else(|| AppError::Database(format!("Invalid point entry type: {}", row.entry_type)))?,
        points: row.points,
        balance_after: row.balance_after,
        booking_id: row.booking_id.as_deref().map(parse_uuid).transpose()?,
        description: row.description,
        created_at: to_utc(row.created_at),
    })
}

/// Append a ledger entry on an open connection, normally inside a transaction.
///
/// The holder's balance row is bumped with a version check, so two writers
/// that read the same balance cannot both commit.
pub(crate) async fn append_entry(conn: &mut SqliteConnection, entry: &NewPointEntry) -> Result<PointEntry> {
    let holder = entry.holder_id.to_string();
    let now = Utc::now().naive_utc();

    sqlx::query(
        "INSERT OR IGNORE INTO point_balances (holder_id, balance, version, updated_at) VALUES (?, 0, 0, ?)",
    )
    .bind(&holder)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let (balance, version): (i64, i64) =
        sqlx::query_as("SELECT balance, version FROM point_balances WHERE holder_id = ?")
            .bind(&holder)
            .fetch_one(&mut *conn)
            .await?;

    let balance_after = next_balance(balance, entry.points)?;

    let updated = sqlx::query(
        r#"
        UPDATE point_balances
        SET balance = ?, version = version + 1, updated_at = ?
        WHERE holder_id = ? AND version = ?
        "#,
    )
    .bind(balance_after)
    .bind(now)
    .bind(&holder)
    .bind(version)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::PersistenceConflict(format!(
            "points balance for {} changed concurrently",
            entry.holder_id
        )));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO point_entries (
            id, holder_id, entry_type, points, balance_after,
            booking_id, description, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&holder)
    .bind(entry.entry_type.as_str())
    .bind(entry.points)
    .bind(balance_after)
    .bind(entry.booking_id.map(|b| b.to_string()))
    .bind(&entry.description)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if let (PointEntryType::Earned, Some(booking_id)) = (entry.entry_type, entry.booking_id) {
        sqlx::query("UPDATE bookings SET points_earned = points_earned + ?, updated_at = ? WHERE id = ?")
            .bind(entry.points)
            .bind(now)
            .bind(booking_id.to_string())
            .execute(&mut *conn)
            .await?;
    }

    Ok(PointEntry {
        id,
        holder_id: entry.holder_id,
        entry_type: entry.entry_type,
        points: entry.points,
        balance_after,
        booking_id: entry.booking_id,
        description: entry.description.clone(),
        created_at: to_utc(now),
    })
}

pub struct SqlitePointsRepository {
    pool: SqlitePool,
}

impl SqlitePointsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PointsRepository for SqlitePointsRepository {
    async fn append(&self, entry: NewPointEntry) -> Result<PointEntry> {
        let mut tx = self.pool.begin().await?;
        let appended = append_entry(&mut *tx, &entry).await?;
        tx.commit().await?;

        tracing::debug!(
            "Points {} {} for holder {} (balance {})",
            appended.entry_type.as_str(),
            appended.points,
            appended.holder_id,
            appended.balance_after
        );
        Ok(appended)
    }

    async fn balance(&self, holder_id: Uuid) -> Result<i64> {
        let balance = sqlx::query_scalar::<_, i64>("SELECT balance FROM point_balances WHERE holder_id = ?")
            .bind(holder_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance.unwrap_or(0))
    }

    async fn history(&self, holder_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointEntry>> {
        let rows = sqlx::query_as::<_, PointEntryRow>(
            r#"
            SELECT id, holder_id, entry_type, points, balance_after,
                   booking_id, description, created_at
            FROM point_entries
            WHERE holder_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(holder_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_entry).collect()
    }
}
