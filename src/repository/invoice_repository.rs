use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Invoice, InvoiceStatus},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, InvoiceRepository},
};

#[derive(FromRow)]
struct InvoiceRow {
    id: String,
    invoice_number: String,
    booking_id: String,
    subtotal: i64,
    discount: i64,
    total: i64,
    payment_date: NaiveDateTime,
    payment_method: String,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, booking_id, subtotal, discount, total,
    payment_date, payment_method, status, created_at, updated_at
"#;

pub struct SqliteInvoiceRepository {
    pool: SqlitePool,
}

impl SqliteInvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_invoice(row: InvoiceRow) -> Result<Invoice> {
        Ok(Invoice {
            id: parse_uuid(&row.id)?,
            invoice_number: row.invoice_number,
            booking_id: parse_uuid(&row.booking_id)?,
            subtotal: row.subtotal,
            discount: row.discount,
            total: row.total,
            payment_date: to_utc(row.payment_date),
            payment_method: row.payment_method,
            status: InvoiceStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid invoice status: {}", row.status)))?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }
}

#[async_trait]
impl InvoiceRepository for SqliteInvoiceRepository {
    async fn create_if_absent(&self, invoice: Invoice) -> Result<Option<Invoice>> {
        let now = Utc::now().naive_utc();

        // The unique index on booking_id makes this the compare-and-swap.
        let result = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, booking_id, subtotal, discount, total,
                payment_date, payment_method, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(booking_id) DO NOTHING
            "#,
        )
        .bind(invoice.id.to_string())
        .bind(&invoice.invoice_number)
        .bind(invoice.booking_id.to_string())
        .bind(invoice.subtotal)
        .bind(invoice.discount)
        .bind(invoice.total)
        .bind(invoice.payment_date.naive_utc())
        .bind(&invoice.payment_method)
        .bind(invoice.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(invoice.id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>> {
        let sql = format!("SELECT {} FROM invoices WHERE id = ?", INVOICE_COLUMNS);
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_invoice).transpose()
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Invoice>> {
        let sql = format!("SELECT {} FROM invoices WHERE booking_id = ?", INVOICE_COLUMNS);
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(booking_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_invoice).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        let sql = format!(
            "SELECT {} FROM invoices ORDER BY created_at DESC LIMIT ? OFFSET ?",
            INVOICE_COLUMNS
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_invoice).collect()
    }
}
