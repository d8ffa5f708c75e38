pub mod admin;
pub mod api;
pub mod auth;
pub mod employee;
pub mod error;
pub mod hod;
pub mod session;

use crate::domain::period::PeriodKey;
use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

/// Parse an explicit period key, or derive the current one from the
/// deployment's period mode when the caller omits it.
pub fn parse_period_or_current(
    state: &SharedState,
    raw: Option<&str>,
) -> Result<PeriodKey, ApiError> {
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::validation("invalid period key")),
        None => Ok(PeriodKey::current(state.period_mode, chrono::Utc::now())),
    }
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/admin", admin::router(state.clone()))
        .nest("/hod", hod::router(state.clone()))
        .nest("/employee", employee::router(state.clone()))
        .nest("/api", api::router(state))
}
