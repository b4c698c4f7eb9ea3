//! Health check endpoint for service monitoring.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` whenever this answers 200
    pub status: &'static str,

    /// Database connection status
    pub database: &'static str,

    pub version: &'static str,

    /// Hosts currently held by the public tenant cache
    pub cached_tenants: usize,

    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "version": "0.1.0",
///   "cached_tenants": 12,
///   "timestamp": "2025-07-01T09:00:00Z"
/// }
/// ```
///
/// An unreachable database answers 500 with the standard error body.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Database unreachable from health check"))?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        version: env!("CARGO_PKG_VERSION"),
        cached_tenants: state.tenant_cache.entry_count(),
        timestamp: Utc::now(),
    }))
}
