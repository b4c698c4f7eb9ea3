//! Pricing period endpoints.
//!
//! Reading periods needs properties.read, changing them properties.write.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::period::{CreatePeriodRequest, Period, PeriodFilter, UpdatePeriodRequest},
    services::period_service,
};

/// `GET /api/v1/periods?property_id=...`
///
/// With a property filter, tenant-wide periods are included since they
/// price that property too.
pub async fn list_periods(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<PeriodFilter>,
) -> Result<Json<Vec<Period>>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let periods = period_service::list_periods(&mut conn, auth.tenant_id, &filter).await?;

    Ok(Json(periods))
}

pub async fn get_period(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(period_id): Path<Uuid>,
) -> Result<Json<Period>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let period = period_service::get_period(&mut conn, auth.tenant_id, period_id).await?;

    Ok(Json(period))
}

pub async fn create_period(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePeriodRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    let period = period_service::create_period(&mut conn, auth.tenant_id, request).await?;

    Ok((StatusCode::CREATED, Json(period)))
}

pub async fn update_period(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(period_id): Path<Uuid>,
    Json(request): Json<UpdatePeriodRequest>,
) -> Result<Json<Period>, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    let period =
        period_service::update_period(&mut conn, auth.tenant_id, period_id, request).await?;

    Ok(Json(period))
}

/// Returns 409 while live bookings overlap the period.
pub async fn delete_period(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(period_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    period_service::delete_period(&mut conn, auth.tenant_id, period_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
