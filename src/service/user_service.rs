use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthService,
    domain::{CreateUserRequest, User, UserRole},
    error::{AppError, Result},
    repository::UserRepository,
};

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, auth: Arc<AuthService>) -> Self {
        Self { repo, auth }
    }

    /// Self-service sign-up always yields a customer account.
    pub async fn register(&self, mut request: CreateUserRequest) -> Result<User> {
        request.role = UserRole::Customer;
        self.create(request).await
    }

    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        request.validate()?;
        let password_hash = AuthService::hash_password(&request.password)?;
        let user = self.repo.create(request, password_hash).await?;
        tracing::info!("Created {} account {}", user.role.as_str(), user.id);
        Ok(user)
    }

    /// Resolve credentials to a user. Unknown email and wrong password
    /// produce the same error.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let (id, hash) = self
            .auth
            .login_credentials(email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !AuthService::verify_password(password, &hash)? {
            return Err(AppError::Unauthorized);
        }

        self.repo.find_by_id(id).await?.ok_or(AppError::Unauthorized)
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        self.repo.list(limit, offset).await
    }
}
