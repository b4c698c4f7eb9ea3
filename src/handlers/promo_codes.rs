//! Promo code administration.
//!
//! Codes are a pricing concern: reading needs properties.read, changing
//! them properties.write, statistics analytics.read. The public
//! validation endpoint lives in
//! [`crate::handlers::public`].

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::promo_code::{CreatePromoCodeRequest, PromoCode, PromoCodeStats, UpdatePromoCodeRequest},
    services::promo_service,
};

pub async fn list_promo_codes(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PromoCode>>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let codes = promo_service::list(&mut conn, auth.tenant_id).await?;

    Ok(Json(codes))
}

pub async fn get_promo_code(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PromoCode>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let code = promo_service::get(&mut conn, auth.tenant_id, id).await?;

    Ok(Json(code))
}

/// How a code performed.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "code": "ETE25",
///   "current_uses": 12,
///   "max_uses": 100,
///   "usage_rate": 12.0,
///   "total_bookings": 13,
///   "total_discount_cents": 48210,
///   "revenue_cents": 433890,
///   "recent_bookings": [ ... ]
/// }
/// ```
pub async fn promo_code_stats(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PromoCodeStats>, AppError> {
    auth.require(Permission::AnalyticsRead)?;
    let mut conn = pool.acquire().await?;
    let stats = promo_service::stats(&mut conn, auth.tenant_id, id).await?;

    Ok(Json(stats))
}

/// Create a promo code.
///
/// # Request Body
///
/// ```json
/// {
///   "code": "ete25",
///   "discount_type": "PERCENTAGE",
///   "discount_value": 10,
///   "valid_from": "2025-06-01T00:00:00Z",
///   "valid_until": "2025-08-31T23:59:59Z",
///   "min_nights": 3,
///   "max_uses": 100
/// }
/// ```
///
/// The code is stored upper-case. A duplicate code answers 409.
pub async fn create_promo_code(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePromoCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    let code = promo_service::create(&mut conn, auth.tenant_id, request).await?;

    Ok((StatusCode::CREATED, Json(code)))
}

pub async fn update_promo_code(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePromoCodeRequest>,
) -> Result<Json<PromoCode>, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    let code = promo_service::update(&mut conn, auth.tenant_id, id, request).await?;

    Ok(Json(code))
}

pub async fn delete_promo_code(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    promo_service::delete(&mut conn, auth.tenant_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
