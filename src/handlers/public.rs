//! Public booking site API.
//!
//! Two kinds of routes live here:
//!
//! - **Lookups** (`/api/public/tenant-by-domain/...`, `/domain-lookup/...`,
//!   `/subdomain/check`, `/ical/...`) work without a tenant, they are what a
//!   front-end calls to find one.
//! - **Tenant routes** (properties, pricing, availability, bookings, promo
//!   codes) run behind [`crate::middleware::tenant::public_tenant`] and only
//!   ever see PUBLISHED properties of the resolved tenant.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        booking::{CreateBookingRequest, StayRequest},
        period::{AvailabilityQuery, CalendarQuery},
        promo_code::{PromoCodeValidation, ValidatePromoCodeRequest},
        property::{PropertyDetail, PublicPropertyList, PublicPropertyQuery},
        tenant::{PublicTenant, TenantSiteResponse},
        webhook::BookingEvent,
    },
    services::{
        availability::{self, Availability, CalendarDay},
        booking_service::{self, BookingOrigin, PriceCalculation},
        promo_service, property_service,
        subdomain::{self, SubdomainCheck},
        tenant_resolver::{self, DomainLookup},
        webhook_service,
    },
    state::AppState,
};

/// Tenant and site settings served on a full domain.
///
/// `GET /api/public/tenant-by-domain/{domain}`
pub async fn tenant_by_domain(
    State(pool): State<DbPool>,
    Path(domain): Path<String>,
) -> Result<Json<TenantSiteResponse>, AppError> {
    let mut conn = pool.acquire().await?;
    let site = tenant_resolver::site_by_domain(&mut conn, &domain)
        .await?
        .ok_or(AppError::TenantNotFound)?;

    Ok(Json(site))
}

/// `GET /api/public/tenant/{subdomain}`
pub async fn tenant_by_subdomain(
    State(pool): State<DbPool>,
    Path(subdomain): Path<String>,
) -> Result<Json<TenantSiteResponse>, AppError> {
    let mut conn = pool.acquire().await?;
    let site = tenant_resolver::site_by_subdomain(&mut conn, &subdomain.to_lowercase())
        .await?
        .ok_or(AppError::TenantNotFound)?;

    Ok(Json(site))
}

/// What a domain serves.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "found": true,
///   "type": "property",
///   "property": { "id": "...", "subdomain": "oliviers", "custom_domain": null },
///   "tenant": { "id": "...", "subdomain": "azur" }
/// }
/// ```
///
/// `type` is `property` for single-property sites and `tenant` otherwise.
/// Unknown domains answer 404.
pub async fn domain_lookup(
    State(pool): State<DbPool>,
    Path(domain): Path<String>,
) -> Result<Json<DomainLookup>, AppError> {
    let mut conn = pool.acquire().await?;
    let lookup = tenant_resolver::domain_lookup(&mut conn, &domain).await?;

    Ok(Json(lookup))
}

#[derive(Debug, Deserialize)]
pub struct SubdomainCheckRequest {
    pub subdomain: String,
}

/// Whether a subdomain can be used for signup, with free alternatives.
///
/// # Response (200 OK)
///
/// ```json
/// { "available": false, "subdomain": "azur", "suggestions": ["azur1", "azur2", "azur3", "azur4", "azur5"] }
/// ```
pub async fn check_subdomain(
    State(pool): State<DbPool>,
    Json(request): Json<SubdomainCheckRequest>,
) -> Result<Json<SubdomainCheck>, AppError> {
    let mut conn = pool.acquire().await?;
    let result = subdomain::check(&mut conn, &request.subdomain).await?;

    Ok(Json(result))
}

/// iCal feed of a published property.
///
/// `GET /api/public/ical/{property_id}.ics`, polled by channel managers.
pub async fn export_ical(
    State(pool): State<DbPool>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let property_id = parse_ics_file_name(&file).ok_or(AppError::PropertyNotFound)?;

    let mut conn = pool.acquire().await?;
    let property = property_service::find_published(&mut conn, property_id).await?;
    let body = availability::export_calendar(&mut conn, &property).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.ics\"", property.slug),
            ),
        ],
        body,
    ))
}

/// `<uuid>.ics` (or a bare `<uuid>`) to the property id.
pub fn parse_ics_file_name(file: &str) -> Option<Uuid> {
    let id = file.strip_suffix(".ics").unwrap_or(file);
    Uuid::parse_str(id).ok()
}

/// The tenant the request resolved to.
pub async fn current_tenant(Extension(tenant): Extension<PublicTenant>) -> Json<PublicTenant> {
    Json(tenant)
}

/// Search the tenant's published properties.
///
/// # Query Parameters
///
/// - `search`: name or city, case-insensitive
/// - `city`, `guests`, `bedrooms` (minimum), `min_price_cents`, `max_price_cents`
/// - `property_type`: comma-separated, e.g. `VILLA,HOUSE`
/// - `check_in`, `check_out`: only properties free on those nights
/// - `sort_by`: `created_at` (default), `base_price`, `name`; `sort_order`: `asc` or `desc`
/// - `page` (default 1), `limit` (default 12, max 50)
pub async fn list_properties(
    State(pool): State<DbPool>,
    Extension(tenant): Extension<PublicTenant>,
    Query(query): Query<PublicPropertyQuery>,
) -> Result<Json<PublicPropertyList>, AppError> {
    let mut conn = pool.acquire().await?;
    let list = property_service::search_public(&mut conn, tenant.id, &query).await?;

    Ok(Json(list))
}

pub async fn get_property(
    State(pool): State<DbPool>,
    Extension(tenant): Extension<PublicTenant>,
    Path(property_id): Path<Uuid>,
) -> Result<Json<PropertyDetail>, AppError> {
    let mut conn = pool.acquire().await?;
    let property =
        property_service::get_published_property(&mut conn, tenant.id, property_id).await?;
    let detail =
        property_service::property_detail(&mut conn, property, Utc::now().date_naive()).await?;

    Ok(Json(detail))
}

/// Price a stay for a guest. Same body and answers as the admin endpoint.
pub async fn calculate_price(
    State(state): State<AppState>,
    Extension(tenant): Extension<PublicTenant>,
    Json(request): Json<StayRequest>,
) -> Result<Json<PriceCalculation>, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    let mut conn = state.pool.acquire().await?;
    let price = booking_service::calculate_price(
        &mut conn,
        tenant.id,
        &request,
        BookingOrigin::Public,
        state.config.commission_rate_bps,
    )
    .await?;

    Ok(Json(price))
}

pub async fn check_availability(
    State(pool): State<DbPool>,
    Extension(tenant): Extension<PublicTenant>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    let mut conn = pool.acquire().await?;
    let property =
        property_service::get_published_property(&mut conn, tenant.id, query.property_id).await?;
    let result = availability::check(
        &mut conn,
        &property,
        query.check_in,
        query.check_out,
        None,
        Utc::now().date_naive(),
    )
    .await?;

    Ok(Json(result))
}

pub async fn calendar(
    State(pool): State<DbPool>,
    Extension(tenant): Extension<PublicTenant>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Vec<CalendarDay>>, AppError> {
    let mut conn = pool.acquire().await?;
    let property =
        property_service::get_published_property(&mut conn, tenant.id, query.property_id).await?;
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

/// Book a stay from the public site.
///
/// Instant-booking properties confirm the booking at once, others leave it
/// `PENDING` for the owner.
///
/// # Response
///
/// - **Success (201 Created)**: the booking
/// - **Error (404)**: unknown or unpublished property
/// - **Error (409)**: dates taken in the meantime
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(tenant): Extension<PublicTenant>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = booking_service::create_booking(
        &state.pool,
        tenant.id,
        request,
        BookingOrigin::Public,
        state.config.commission_rate_bps,
    )
    .await?;

    webhook_service::dispatch_booking_event(
        state.pool.clone(),
        state.http.clone(),
        BookingEvent::Created,
        booking.clone(),
    );

    Ok((StatusCode::CREATED, Json(booking)))
}

/// Check a promo code against a prospective stay.
///
/// Rule failures (expired, too short, ...) answer 200 with `valid: false`
/// and an `error`; malformed stays answer 400.
pub async fn validate_promo_code(
    State(pool): State<DbPool>,
    Extension(tenant): Extension<PublicTenant>,
    Json(request): Json<ValidatePromoCodeRequest>,
) -> Result<Json<PromoCodeValidation>, AppError> {
    let mut conn = pool.acquire().await?;
    let validation = promo_service::validate_for_stay(&mut conn, tenant.id, &request).await?;

    Ok(Json(validation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ics_suffix_is_optional() {
        let id = Uuid::new_v4();
        assert_eq!(parse_ics_file_name(&format!("{id}.ics")), Some(id));
        assert_eq!(parse_ics_file_name(&id.to_string()), Some(id));
        assert_eq!(parse_ics_file_name("calendar.ics"), None);
    }
}
