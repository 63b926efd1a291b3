use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::identity::{accounts, session, UserId};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: SessionUser,
    pub access_token: String,
}

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name,
        token,
        max_age_hours * 3600
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

fn session_response(
    state: &AppState,
    status: StatusCode,
    id: &UserId,
    email: String,
    token: String,
) -> Response {
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );
    let body = SessionResponse {
        user: SessionUser {
            id: id.to_string(),
            email,
        },
        access_token: token,
    };
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

/// Create an identity and its profile, then open a session.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Response> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }

    let id = accounts::create_account(&state.db, &req.email, &req.password)?;

    // The profile goes through the store as the new identity, so the insert
    // policy applies exactly as it would for any later write.
    let full_name = req
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Err(e) = state
        .client(id.clone())
        .create_profile(&username, full_name)
        .await
    {
        tracing::warn!(account = %id, "profile creation failed, removing account: {}", e);
        if let Err(rollback) = accounts::delete_account(&state.db, &id) {
            tracing::error!(account = %id, "account rollback failed: {}", rollback);
        }
        return Err(e.into());
    }

    let token = session::create_session(&state.db, &id, state.config.auth.session_hours)?;
    let email = req.email.trim().to_lowercase();
    Ok(session_response(&state, StatusCode::CREATED, &id, email, token))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let id = accounts::verify_credentials(&state.db, &req.email, &req.password)?
        .ok_or(AppError::Unauthorized)?;

    let token = session::create_session(&state.db, &id, state.config.auth.session_hours)?;
    tracing::info!(account = %id, "login");
    let email = req.email.trim().to_lowercase();
    Ok(session_response(&state, StatusCode::OK, &id, email, token))
}

pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    session::delete_session(&state.db, &user.token)?;
    let cookie = clear_session_cookie(&state.config.auth.cookie_name);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

pub async fn me(user: CurrentUser) -> Json<SessionUser> {
    Json(SessionUser {
        id: user.id.to_string(),
        email: user.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_format() {
        let cookie = session_cookie("kith_session", "tok", 2);
        assert!(cookie.starts_with("kith_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=7200"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie("kith_session");
        assert!(cookie.starts_with("kith_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
