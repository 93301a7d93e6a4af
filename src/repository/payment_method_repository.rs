use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{FeeType, PaymentMethod},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, PaymentMethodRepository},
};

#[derive(FromRow)]
struct PaymentMethodRow {
    id: String,
    code: String,
    name: String,
    fee_type: String,
    fee_value: f64,
    instructions: Option<String>,
    is_active: i32,
    display_order: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const METHOD_COLUMNS: &str = r#"
    id, code, name, fee_type, fee_value, instructions, is_active,
    display_order, created_at, updated_at
"#;

pub struct SqlitePaymentMethodRepository {
    pool: SqlitePool,
}

impl SqlitePaymentMethodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_method(row: PaymentMethodRow) -> Result<PaymentMethod> {
        Ok(PaymentMethod {
            id: parse_uuid(&row.id)?,
            code: row.code,
            name: row.name,
            fee_type: FeeType::from_str(&row.fee_type)
                .ok_or_else(|| AppError::Database(format!("Invalid fee type: {}", row.fee_type)))?,
            fee_value: row.fee_value,
            instructions: row.instructions,
            is_active: row.is_active != 0,
            display_order: row.display_order,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }
}

#[async_trait]
impl PaymentMethodRepository for SqlitePaymentMethodRepository {
    async fn create(&self, method: PaymentMethod) -> Result<PaymentMethod> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payment_methods (
                id, code, name, fee_type, fee_value, instructions,
                is_active, display_order, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(method.id.to_string())
        .bind(&method.code)
        .bind(&method.name)
        .bind(method.fee_type.as_str())
        .bind(method.fee_value)
        .bind(&method.instructions)
        .bind(if method.is_active { 1i32 } else { 0i32 })
        .bind(method.display_order)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(method.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment method".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentMethod>> {
        let sql = format!("SELECT {} FROM payment_methods WHERE id = ?", METHOD_COLUMNS);
        let row = sqlx::query_as::<_, PaymentMethodRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_method).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PaymentMethod>> {
        let sql = format!("SELECT {} FROM payment_methods WHERE code = ?", METHOD_COLUMNS);
        let row = sqlx::query_as::<_, PaymentMethodRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_method).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>> {
        let sql = format!(
            "SELECT {} FROM payment_methods WHERE is_active = 1 OR ? ORDER BY display_order, name",
            METHOD_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentMethodRow>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_method).collect()
    }

    async fn update(&self, id: Uuid, method: PaymentMethod) -> Result<PaymentMethod> {
        let result = sqlx::query(
            r#"
            UPDATE payment_methods
            SET name = ?, fee_type = ?, fee_value = ?, instructions = ?,
                is_active = ?, display_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&method.name)
        .bind(method.fee_type.as_str())
        .bind(method.fee_value)
        .bind(&method.instructions)
        .bind(if method.is_active { 1i32 } else { 0i32 })
        .bind(method.display_order)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Payment method not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payment method".to_string())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Payment method not found".to_string()));
        }
        Ok(())
    }
}
