use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    api::state::AppState,
    auth::SESSION_COOKIE,
    domain::{CreateUserRequest, User, UserRole},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: User,
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<User>)> {
    let user = state
        .service_context
        .user_service
        .register(CreateUserRequest {
            name: req.name,
            email: req.email,
            phone: req.phone,
            password: req.password,
            role: UserRole::Customer,
        })
        .await?;

    let jar = start_session(&state, jar, &user).await?;
    Ok((StatusCode::CREATED, jar, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let user = state
        .service_context
        .user_service
        .authenticate(&req.email, &req.password)
        .await?;

    let jar = start_session(&state, jar, &user).await?;
    Ok((
        jar,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user,
        }),
    ))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let cookie = state
        .service_context
        .auth_service
        .sign_out(token.as_deref())
        .await;
    (jar.add(cookie), StatusCode::NO_CONTENT)
}

async fn start_session(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar> {
    let cookie = state.service_context.auth_service.sign_in(user).await?;
    Ok(jar.add(cookie))
}
