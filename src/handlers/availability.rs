//! Availability endpoints: blocked periods, checks, calendars and iCal sync.
//!
//! - GET/POST /api/v1/availability/blocked-periods
//! - PATCH/DELETE /api/v1/availability/blocked-periods/{id}
//! - GET /api/v1/availability/check
//! - GET /api/v1/availability/calendar
//! - POST /api/v1/availability/ical/import
//! - GET /api/v1/availability/ical/{property_id}/url

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::period::{
        AvailabilityQuery, BlockedPeriod, BlockedPeriodFilter, CalendarQuery,
        CreateBlockedPeriodRequest, IcalImportRequest, UpdateBlockedPeriodRequest,
    },
    services::{
        availability::{self, Availability, CalendarDay, ImportSummary},
        property_service,
    },
    state::AppState,
};

pub async fn list_blocked_periods(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<BlockedPeriodFilter>,
) -> Result<Json<Vec<BlockedPeriod>>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let periods = availability::list_blocked_periods(&mut conn, auth.tenant_id, &filter).await?;

    Ok(Json(periods))
}

/// Block nights of a property.
///
/// # Request Body
///
/// ```json
/// {
///   "property_id": "550e8400-e29b-41d4-a716-446655440000",
///   "start_date": "2025-11-03",
///   "end_date": "2025-11-09",
///   "reason": "Travaux"
/// }
/// ```
///
/// Both dates are blocked nights.
///
/// # Response
///
/// - **Success (201 Created)**: the blocked period
/// - **Error (409)**: live bookings overlap, their references are listed in `error.bookings`
pub async fn create_blocked_period(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateBlockedPeriodRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut tx = pool.begin().await?;
    let period = availability::create_blocked_period(&mut tx, auth.tenant_id, request).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(period)))
}

pub async fn update_blocked_period(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBlockedPeriodRequest>,
) -> Result<Json<BlockedPeriod>, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut tx = pool.begin().await?;
    let period =
        availability::update_blocked_period(&mut tx, auth.tenant_id, id, request).await?;
    tx.commit().await?;

    Ok(Json(period))
}

pub async fn delete_blocked_period(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    availability::delete_blocked_period(&mut conn, auth.tenant_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Whether a stay can be booked. Always 200; `available` carries the answer.
pub async fn check_availability(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    auth.require(Permission::BookingsRead)?;
    let mut conn = pool.acquire().await?;
    let property =
        property_service::get_property(&mut conn, auth.tenant_id, query.property_id).await?;
    let result = availability::check(
        &mut conn,
        &property,
        query.check_in,
        query.check_out,
        query.exclude_booking_id,
        Utc::now().date_naive(),
    )
    .await?;

    Ok(Json(result))
}

pub async fn calendar(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Vec<CalendarDay>>, AppError> {
    auth.require(Permission::BookingsRead)?;
    let mut conn = pool.acquire().await?;
    let property =
        property_service::get_property(&mut conn, auth.tenant_id, query.property_id).await?;
    let days = availability::calendar(
        &mut conn,
        &property,
        query.start_date,
        query.end_date,
        Utc::now().date_naive(),
    )
    .await?;

    Ok(Json(days))
}

/// Import an iCal feed as blocked periods.
///
/// # Request Body
///
/// One of:
///
/// ```json
/// { "property_id": "550e8400-...", "url": "https://www.airbnb.fr/calendar/ical/123.ics" }
/// { "property_id": "550e8400-...", "content": "BEGIN:VCALENDAR\r\n..." }
/// ```
///
/// # Response (200 OK)
///
/// ```json
/// { "imported": 3, "skipped": 1, "errors": ["Conflict with existing booking VS25070004"] }
/// ```
///
/// A feed that cannot be fetched answers 502.
pub async fn import_ical(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<IcalImportRequest>,
) -> Result<Json<ImportSummary>, AppError> {
    auth.require(Permission::PropertiesWrite)?;

    let content = match (request.content, request.url.as_deref()) {
        (Some(content), _) if !content.trim().is_empty() => content,
        (_, Some(url)) if !url.trim().is_empty() => {
            availability::fetch_calendar(&state.http, url.trim()).await?
        }
        _ => {
            return Err(AppError::InvalidRequest(
                "Either url or content is required".to_string(),
            ));
        }
    };

    let mut tx = state.pool.begin().await?;
    let property =
        property_service::get_property(&mut tx, auth.tenant_id, request.property_id).await?;
    let summary =
        availability::import_calendar(&mut tx, &property, &content, Utc::now().date_naive())
            .await?;
    tx.commit().await?;

    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct IcalUrl {
    pub url: String,
}

/// Public export URL of a property's calendar, to paste into channel managers.
pub async fn ical_url(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(property_id): Path<Uuid>,
) -> Result<Json<IcalUrl>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = state.pool.acquire().await?;
    let property = property_service::get_property(&mut conn, auth.tenant_id, property_id).await?;

    Ok(Json(IcalUrl {
        url: export_url(&state.config.public_api_url, property.id),
    }))
}

pub fn export_url(public_api_url: &str, property_id: Uuid) -> String {
    format!(
        "{}/api/public/ical/{property_id}.ics",
        public_api_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_url_has_no_double_slash() {
        let id = Uuid::nil();
        assert_eq!(
            export_url("https://api.villa.test/", id),
            "https://api.villa.test/api/public/ical/00000000-0000-0000-0000-000000000000.ics"
        );
    }
}
