use crate::domain::period::PeriodMode;
use crate::middleware::RateLimiter;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub session_key: Vec<u8>,
    pub period_mode: PeriodMode,
    pub login_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;
