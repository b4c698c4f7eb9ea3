//! Webhook endpoint administration.
//!
//! Tenants register HTTPS endpoints that receive signed booking events
//! (`booking.created`, `booking.confirmed`, `booking.cancelled`, ...).
//! Everything here is a settings operation: reading needs settings.read,
//! changing endpoints settings.write.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::webhook::{WebhookDelivery, WebhookEndpointRequest, WebhookEndpointResponse},
    services::webhook_service,
};

/// Register an endpoint.
///
/// # Request Body
///
/// ```json
/// { "url": "https://channel.example.com/hooks/villa" }
/// ```
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "url": "https://channel.example.com/hooks/villa",
///   "secret": "9f86d081884c7d65...",
///   "is_active": true,
///   "created_at": "2025-06-01T08:00:00Z"
/// }
/// ```
///
/// The `secret` signs every delivery and is never shown again.
pub async fn create_webhook(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<WebhookEndpointRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::SettingsWrite)?;
    let endpoint =
        webhook_service::create_webhook_endpoint(&pool, auth.tenant_id, request).await?;
    tracing::info!(tenant_id = %auth.tenant_id, webhook_id = %endpoint.id, "Webhook registered");

    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// Active endpoints of the tenant, without secrets.
pub async fn list_webhooks(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<WebhookEndpointResponse>>, AppError> {
    auth.require(Permission::SettingsRead)?;
    let endpoints = webhook_service::list_webhook_endpoints(&pool, auth.tenant_id).await?;

    Ok(Json(endpoints))
}

/// Deactivate an endpoint. Its delivery history is kept.
pub async fn delete_webhook(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::SettingsWrite)?;
    webhook_service::delete_webhook_endpoint(&pool, auth.tenant_id, webhook_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DeliveryQuery {
    #[serde(default = "default_delivery_limit")]
    pub limit: i64,
}

fn default_delivery_limit() -> i64 {
    20
}

/// Recent delivery attempts of an endpoint.
///
/// `GET /api/v1/webhooks/{id}/deliveries?limit=20` (at most 100), newest
/// first. `response_status` is null when the receiver was unreachable.
pub async fn list_deliveries(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
    Query(query): Query<DeliveryQuery>,
) -> Result<Json<Vec<WebhookDelivery>>, AppError> {
    auth.require(Permission::SettingsRead)?;
    let deliveries =
        webhook_service::list_deliveries(&pool, auth.tenant_id, webhook_id, query.limit).await?;

    Ok(Json(deliveries))
}
