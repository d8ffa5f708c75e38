use crate::db;
use crate::domain::models::UserRole;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{self, AuthUser};
use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};
use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub employee_id: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub name: String,
    pub role: UserRole,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

fn session_cookie(token: &str) -> HeaderMap {
    let is_production = std::env::var("PRODUCTION").is_ok();
    let secure_flag = if is_production { "; Secure" } else { "" };

    let mut headers = HeaderMap::new();
    if let Ok(value) = format!(
        "{}={token}; HttpOnly; SameSite=Lax; Path=/{}",
        session::SESSION_COOKIE,
        secure_flag
    )
    .parse()
    {
        headers.insert(axum::http::header::SET_COOKIE, value);
    }
    headers
}

async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = addr.ip().to_string();
    if !state.login_limiter.check(&ip).await {
        tracing::warn!("Login rate limit exceeded for IP: {}", ip);
        return Err(ApiError::TooManyRequests);
    }

    let employee_id = payload.employee_id.trim();
    if employee_id.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("employee id and password are required"));
    }

    let user = db::find_user_by_employee_id(&state.pool, employee_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.hash).map_err(|_| ApiError::Unauthorized)?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let token = sign_or_internal(user.id, user.role, &state.session_key)?;

    tracing::info!("User {} logged in", user.employee_id);

    Ok((
        session_cookie(&token),
        Json(LoginResponse {
            success: true,
            user_id: user.id,
            name: user.name,
            role: user.role,
        }),
    ))
}

fn sign_or_internal(user_id: Uuid, role: UserRole, key: &[u8]) -> Result<String, ApiError> {
    session::sign_session(user_id, role, key)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to sign session: {}", e)))
}

async fn logout() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Ok(value) = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        session::SESSION_COOKIE
    )
    .parse()
    {
        headers.insert(axum::http::header::SET_COOKIE, value);
    }
    (headers, Json(json!({ "success": true })))
}

async fn me(AuthUser(user): AuthUser) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "user_id": user.id,
        "employee_id": user.employee_id,
        "name": user.name,
        "role": user.role,
        "department_id": user.department_id,
        "hod_level": user.hod_level,
    }))
}
