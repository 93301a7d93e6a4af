use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::SESSION_COOKIE,
    domain::User,
    error::{AppError, Result},
};

#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

async fn session_user(state: &AppState, jar: &CookieJar) -> Result<Option<User>> {
    match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.service_context.auth_service.current_user(cookie.value()).await,
        None => Ok(None),
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = session_user(&state, &jar).await?.ok_or(AppError::Unauthorized)?;
    request.extensions_mut().insert(CurrentUser { user });
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = session_user(&state, &jar).await?.ok_or(AppError::Unauthorized)?;
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    request.extensions_mut().insert(CurrentUser { user });
    Ok(next.run(request).await)
}

/// Attach the signed-in user when there is one; guests pass through.
pub async fn optional_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match session_user(&state, &jar).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser { user });
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Session lookup failed, continuing as guest: {}", e),
    }
    next.run(request).await
}
