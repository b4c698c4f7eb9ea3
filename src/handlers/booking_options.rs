//! Booking option endpoints: the tenant catalog and per-property settings.
//!
//! Options are priced with the stay, so they follow the property
//! permissions: properties.read to look, properties.write to change.

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
    models::booking_option::{
        BookingOption, CreateBookingOptionRequest, PropertyBookingOption, PropertyOptionRequest,
        PropertyOptionSettings, UpdateBookingOptionRequest,
    },
    services::option_service,
};

pub async fn list_options(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<BookingOption>>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let options = option_service::list(&mut conn, auth.tenant_id).await?;

    Ok(Json(options))
}

pub async fn get_option(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(option_id): Path<Uuid>,
) -> Result<Json<BookingOption>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let option = option_service::get(&mut conn, auth.tenant_id, option_id).await?;

    Ok(Json(option))
}

/// Add an option to the catalog.
///
/// # Request Body
///
/// ```json
/// {
///   "name": { "fr": "Ménage final", "en": "Final cleaning" },
///   "category": "CLEANING",
///   "pricing_type": "FIXED",
///   "price_per_unit_cents": 8000,
///   "pricing_period": "PER_STAY",
///   "is_mandatory": true
/// }
/// ```
pub async fn create_option(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateBookingOptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    let option = option_service::create(&mut conn, auth.tenant_id, request).await?;

    Ok((StatusCode::CREATED, Json(option)))
}

pub async fn update_option(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(option_id): Path<Uuid>,
    Json(request): Json<UpdateBookingOptionRequest>,
) -> Result<Json<BookingOption>, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    let option = option_service::update(&mut conn, auth.tenant_id, option_id, request).await?;

    Ok(Json(option))
}

/// Returns 409 once a booking has used the option.
pub async fn delete_option(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(option_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    option_service::delete(&mut conn, auth.tenant_id, option_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/properties/{id}/booking-options`
pub async fn list_property_options(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(property_id): Path<Uuid>,
) -> Result<Json<Vec<PropertyBookingOption>>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let options = option_service::property_options(&mut conn, auth.tenant_id, property_id).await?;

    Ok(Json(options))
}

/// `PUT /api/v1/properties/{id}/booking-options/{option_id}`
pub async fn set_property_option(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path((property_id, option_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<PropertyOptionRequest>,
) -> Result<Json<PropertyOptionSettings>, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    let settings = option_service::set_property_option(
        &mut conn,
        auth.tenant_id,
        property_id,
        option_id,
        request,
    )
    .await?;

    Ok(Json(settings))
}

pub async fn disable_property_option(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path((property_id, option_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    option_service::disable_property_option(&mut conn, auth.tenant_id, property_id, option_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
