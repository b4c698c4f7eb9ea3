//! Property management HTTP handlers.
//!
//! This module implements the admin property endpoints:
//! - GET /api/v1/properties - List the tenant's properties
//! - POST /api/v1/properties - Create a draft property
//! - GET /api/v1/properties/{id} - Property with images and periods
//! - PATCH /api/v1/properties/{id} - Partial update
//! - DELETE /api/v1/properties/{id} - Delete (refused while bookings are live)
//! - POST /api/v1/properties/{id}/images - Register an image URL
//! - DELETE /api/v1/properties/{id}/images/{image_id} - Remove an image

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::property::{
        CreateImageRequest, CreatePropertyRequest, Property, PropertyDetail, UpdatePropertyRequest,
    },
    services::property_service,
    state::AppState,
};

/// List all properties of the tenant, newest first, whatever their status.
pub async fn list_properties(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Property>>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let properties = property_service::list_properties(&mut conn, auth.tenant_id).await?;

    Ok(Json(properties))
}

/// Create a property.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Villa Les Oliviers",
///   "property_type": "VILLA",
///   "address": "12 chemin des Oliviers",
///   "city": "Saint-Tropez",
///   "postal_code": "83990",
///   "country": "FR",
///   "bedrooms": 4,
///   "bathrooms": 3,
///   "max_guests": 8,
///   "base_price_cents": 45000,
///   "cleaning_fee_cents": 15000
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the property, in `DRAFT`, with a generated slug
/// - **Error (400)**: invalid fields
/// - **Error (403)**: caller lacks properties.write
pub async fn create_property(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePropertyRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    let property = property_service::create_property(&mut conn, auth.tenant_id, request).await?;

    Ok((StatusCode::CREATED, Json(property)))
}

/// Get a property with its images and upcoming active periods.
///
/// Returns 404 if the property doesn't exist OR belongs to another tenant.
pub async fn get_property(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(property_id): Path<Uuid>,
) -> Result<Json<PropertyDetail>, AppError> {
    auth.require(Permission::PropertiesRead)?;
    let mut conn = pool.acquire().await?;
    let property = property_service::get_property(&mut conn, auth.tenant_id, property_id).await?;
    let detail =
        property_service::property_detail(&mut conn, property, Utc::now().date_naive()).await?;

    Ok(Json(detail))
}

pub async fn update_property(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(property_id): Path<Uuid>,
    Json(request): Json<UpdatePropertyRequest>,
) -> Result<Json<Property>, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let reroutes =
        request.subdomain.is_some() || request.custom_domain.is_some() || request.status.is_some();
    let mut conn = state.pool.acquire().await?;
    let property = property_service::update_property(
        &mut conn,
        &state.config.base_domain,
        auth.tenant_id,
        property_id,
        request,
    )
    .await?;

    // Published properties route on their own subdomain and domain
    if reroutes {
        state.tenant_cache.invalidate_tenant(auth.tenant_id);
    }
    Ok(Json(property))
}

/// Delete a property.
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (409)**: the property still has PENDING or CONFIRMED bookings
pub async fn delete_property(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(property_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::PropertiesDelete)?;
    let mut conn = state.pool.acquire().await?;
    property_service::delete_property(&mut conn, auth.tenant_id, property_id).await?;
    state.tenant_cache.invalidate_tenant(auth.tenant_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Register an already hosted image. Uploading is the front-end's job.
pub async fn add_image(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(property_id): Path<Uuid>,
    Json(request): Json<CreateImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut tx = pool.begin().await?;
    let image = property_service::add_image(&mut tx, auth.tenant_id, property_id, request).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn delete_image(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path((property_id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::PropertiesWrite)?;
    let mut conn = pool.acquire().await?;
    property_service::delete_image(&mut conn, auth.tenant_id, property_id, image_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
