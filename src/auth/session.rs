use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    error::Result,
    repository::{parse_uuid, to_utc},
};

/// Activity within this window does not rewrite `last_used_at`.
const TOUCH_INTERVAL_MINUTES: i64 = 5;

/// A signed-in customer or admin. The bearer token itself is never stored.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    expires_at: NaiveDateTime,
    last_used_at: NaiveDateTime,
}

impl SessionRow {
    fn into_session(self) -> Result<Session> {
        Ok(Session {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            expires_at: to_utc(self.expires_at),
            last_used_at: to_utc(self.last_used_at),
        })
    }
}

/// Sessions keyed by the SHA-256 of their token.
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a session for `user_id` lasting `ttl`. Returns the session and
    /// the token to hand to the client.
    pub async fn open(&self, user_id: Uuid, ttl: Duration) -> Result<(Session, String)> {
        let token = new_token();
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            expires_at: now + ttl,
            last_used_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at, last_used_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(user_id.to_string())
        .bind(hash_token(&token))
        .bind(session.expires_at.naive_utc())
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok((session, token))
    }

    /// The live session behind `token`, if any.
    pub async fn resolve(&self, token: &str) -> Result<Option<Session>> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, expires_at, last_used_at
            FROM sessions
            WHERE token_hash = ? AND expires_at > ?
            "#,
        )
        .bind(hash_token(token))
        .bind(now.naive_utc())
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut session) = row.map(SessionRow::into_session).transpose()? else {
            return Ok(None);
        };

        if now - session.last_used_at >= Duration::minutes(TOUCH_INTERVAL_MINUTES) {
            sqlx::query("UPDATE sessions SET last_used_at = ? WHERE id = ?")
                .bind(now.naive_utc())
                .bind(session.id.to_string())
                .execute(&self.pool)
                .await?;
            session.last_used_at = now;
        }

        Ok(Some(session))
    }

    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().naive_utc())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
