//! Booking reports. All require analytics.read.
//!
//! - GET /api/v1/analytics/overview
//! - GET /api/v1/analytics/occupancy
//! - GET /api/v1/analytics/revenue
//! - GET /api/v1/analytics/top-properties
//! - GET /api/v1/analytics/booking-sources
//! - GET /api/v1/analytics/export (text/csv)

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::analytics::{
        AnalyticsOverview, AnalyticsQuery, DateRange, OccupancyReport, PropertyPerformance,
        RevenueReport, SourceShare, TopPropertiesQuery,
    },
    services::analytics_service,
};

fn range_of(query: &AnalyticsQuery) -> Result<DateRange, AppError> {
    query
        .range(Utc::now().date_naive())
        .map_err(AppError::InvalidRequest)
}

/// Headline figures for the range.
///
/// # Query Parameters
///
/// - `start_date`, `end_date`: inclusive, `YYYY-MM-DD`; default is the
///   current month and the two before it
/// - `property_id`: restrict to one property
pub async fn overview(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsOverview>, AppError> {
    auth.require(Permission::AnalyticsRead)?;
    let range = range_of(&query)?;
    let mut conn = pool.acquire().await?;
    let overview =
        analytics_service::overview(&mut conn, auth.tenant_id, &range, query.property_id).await?;

    Ok(Json(overview))
}

pub async fn occupancy(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<OccupancyReport>, AppError> {
    auth.require(Permission::AnalyticsRead)?;
    let range = range_of(&query)?;
    let mut conn = pool.acquire().await?;
    let report =
        analytics_service::occupancy_report(&mut conn, auth.tenant_id, &range, query.property_id)
            .await?;

    Ok(Json(report))
}

pub async fn revenue(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<RevenueReport>, AppError> {
    auth.require(Permission::AnalyticsRead)?;
    let range = range_of(&query)?;
    let mut conn = pool.acquire().await?;
    let stays =
        analytics_service::load_stays(&mut conn, auth.tenant_id, &range, query.property_id)
            .await?;

    Ok(Json(analytics_service::revenue(&range, &stays)))
}

/// `?limit=1..50` (default 10), `?sort_by=revenue|bookings`.
pub async fn top_properties(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TopPropertiesQuery>,
) -> Result<Json<Vec<PropertyPerformance>>, AppError> {
    auth.require(Permission::AnalyticsRead)?;
    query.validate().map_err(AppError::InvalidRequest)?;
    let range = query
        .range(Utc::now().date_naive())
        .map_err(AppError::InvalidRequest)?;
    let mut conn = pool.acquire().await?;
    let stays = analytics_service::load_stays(&mut conn, auth.tenant_id, &range, None).await?;

    Ok(Json(analytics_service::top_properties(
        &range,
        &stays,
        query.limit,
        query.sort_by,
    )))
}

pub async fn booking_sources(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<SourceShare>>, AppError> {
    auth.require(Permission::AnalyticsRead)?;
    let range = range_of(&query)?;
    let mut conn = pool.acquire().await?;
    let stays =
        analytics_service::load_stays(&mut conn, auth.tenant_id, &range, query.property_id)
            .await?;

    Ok(Json(analytics_service::booking_sources(&stays)))
}

/// The stays of the range as a CSV attachment.
pub async fn export(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::AnalyticsRead)?;
    let range = range_of(&query)?;
    let mut conn = pool.acquire().await?;
    let stays =
        analytics_service::load_stays(&mut conn, auth.tenant_id, &range, query.property_id)
            .await?;
    let disposition = format!(
        "attachment; filename=\"bookings-{}-{}.csv\"",
        range.start, range.end
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        analytics_service::to_csv(&stays),
    ))
}
