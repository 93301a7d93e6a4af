use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{PaymentStatus, Transaction},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, TransactionRepository},
};

#[derive(FromRow)]
struct TransactionRow {
    id: String,
    booking_id: String,
    amount: i64,
    admin_fee: i64,
    total_amount: i64,
    payment_method: String,
    status: String,
    proof_path: Option<String>,
    confirmed_by: Option<String>,
    confirmed_at: Option<NaiveDateTime>,
    rejection_reason: Option<String>,
    refund_amount: Option<i64>,
    refunded_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const TRANSACTION_COLUMNS: &str = r#"
    id, booking_id, amount, admin_fee, total_amount, payment_method, status,
    proof_path, confirmed_by, confirmed_at, rejection_reason, refund_amount,
    refunded_at, created_at, updated_at
"#;

pub struct SqliteTransactionRepository {
    pool: SqlitePool,
}

impl SqliteTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_transaction(row: TransactionRow) -> Result<Transaction> {
        Ok(Transaction {
            id: parse_uuid(&row.id)?,
            booking_id: parse_uuid(&row.booking_id)?,
            amount: row.amount,
            admin_fee: row.admin_fee,
            total_amount: row.total_amount,
            payment_method: row.payment_method,
            status: PaymentStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
            proof_path: row.proof_path,
            confirmed_by: row.confirmed_by.as_deref().map(parse_uuid).transpose()?,
            confirmed_at: row.confirmed_at.map(to_utc),
            rejection_reason: row.rejection_reason,
            refund_amount: row.refund_amount,
            refunded_at: row.refunded_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn fetch_where(&self, column: &str, value: String) -> Result<Option<Transaction>> {
        let sql = format!("SELECT {} FROM transactions WHERE {} = ?", TRANSACTION_COLUMNS, column);
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_transaction).transpose()
    }
}

#[async_trait]
impl TransactionRepository for SqliteTransactionRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        self.fetch_where("id", id.to_string()).await
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Transaction>> {
        self.fetch_where("booking_id", booking_id.to_string()).await
    }

    async fn list_by_status(&self, status: Option<PaymentStatus>, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE (? IS NULL OR status = ?)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
            TRANSACTION_COLUMNS
        );
        let status_str = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(status_str)
            .bind(status_str)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }

    async fn submit_proof(&self, id: Uuid, proof_path: &str) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        // Re-uploading while waiting replaces the proof. Failed payments stay failed.
        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'waiting_confirmation', proof_path = ?, updated_at = ?
            WHERE id = ? AND status IN ('pending', 'waiting_confirmation')
            "#,
        )
        .bind(proof_path)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE bookings SET payment_status = 'waiting_confirmation', updated_at = ?
            WHERE id = (SELECT booking_id FROM transactions WHERE id = ?)
            "#,
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn confirm(&self, id: Uuid, confirmed_by: Option<Uuid>, at: DateTime<Utc>) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'paid', confirmed_by = ?, confirmed_at = ?, updated_at = ?
            WHERE id = ? AND status IN ('pending', 'waiting_confirmation')
            "#,
        )
        .bind(confirmed_by.map(|u| u.to_string()))
        .bind(at.naive_utc())
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        let booking = sqlx::query(
            r#"
            UPDATE bookings
            SET payment_status = 'paid',
                status = CASE WHEN status = 'pending' THEN 'confirmed' ELSE status END,
                updated_at = ?
            WHERE id = (SELECT booking_id FROM transactions WHERE id = ?)
              AND status IN ('pending', 'confirmed')
              AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if booking.rows_affected() == 0 {
            return Err(AppError::InvalidTransition(
                "payment cannot be confirmed for a cancelled, completed or deleted booking".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn reject(&self, id: Uuid, reason: &str) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'failed', rejection_reason = ?, updated_at = ?
            WHERE id = ? AND status IN ('pending', 'waiting_confirmation')
            "#,
        )
        .bind(reason)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE bookings SET payment_status = 'failed', updated_at = ?
            WHERE id = (SELECT booking_id FROM transactions WHERE id = ?)
            "#,
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
