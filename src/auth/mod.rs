//! Password hashing and cookie sessions for customers and admins.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Duration;
use cookie::{Cookie, SameSite};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    domain::User,
    error::{AppError, Result},
    repository::UserRepository,
};

pub mod session;

use session::SessionStore;

pub const SESSION_COOKIE: &str = "session";

pub struct AuthService {
    sessions: SessionStore,
    users: Arc<dyn UserRepository>,
    pool: SqlitePool,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(pool: SqlitePool, users: Arc<dyn UserRepository>, config: AuthConfig) -> Self {
        Self {
            sessions: SessionStore::new(pool.clone()),
            users,
            pool,
            config,
        }
    }

    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Stored password hash is unreadable: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Account id and password hash for a sign-in email.
    pub async fn login_credentials(&self, email: &str) -> Result<Option<(Uuid, String)>> {
        let row = sqlx::query_as::<_, (String, String)>("SELECT id, password_hash FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(id, hash)| Ok((crate::repository::parse_uuid(&id)?, hash)))
            .transpose()
    }

    /// Open a session for `user` and build the cookie that carries it.
    pub async fn sign_in(&self, user: &User) -> Result<Cookie<'static>> {
        let ttl = Duration::hours(self.config.session_duration_hours);
        let (session, token) = self.sessions.open(user.id, ttl).await?;
        tracing::debug!("Opened session {} for {} {}", session.id, user.role.as_str(), user.id);

        Ok(Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(self.config.secure_cookies)
            .max_age(cookie::time::Duration::hours(self.config.session_duration_hours))
            .build())
    }

    /// Revoke the session behind `token` and return a cookie that clears it
    /// on the client. A failed revoke is logged; the client is signed out
    /// regardless.
    pub async fn sign_out(&self, token: Option<&str>) -> Cookie<'static> {
        if let Some(token) = token {
            if let Err(e) = self.sessions.revoke(token).await {
                tracing::warn!("Failed to revoke session on sign-out: {}", e);
            }
        }

        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(cookie::time::Duration::seconds(0))
            .build()
    }

    /// The account signed in with `token`, if the session is live and the
    /// account still exists.
    pub async fn current_user(&self, token: &str) -> Result<Option<User>> {
        match self.sessions.resolve(token).await? {
            Some(session) => self.users.find_by_id(session.user_id).await,
            None => Ok(None),
        }
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.sessions.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = AuthService::hash_password("correct horse").unwrap();
        assert!(AuthService::verify_password("correct horse", &hash).unwrap());
        assert!(!AuthService::verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(matches!(
            AuthService::verify_password("x", "not-a-phc-string"),
            Err(AppError::Internal(_))
        ));
    }
}
