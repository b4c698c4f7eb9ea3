//! Tenant settings and public site configuration.
//!
//! - GET /api/v1/tenant
//! - PATCH /api/v1/tenant
//! - GET /api/v1/public-site
//! - PATCH /api/v1/public-site
//! - GET /api/v1/public-site/check-domain

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::{
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::tenant::{PublicSite, Tenant, UpdatePublicSiteRequest, UpdateTenantRequest},
    services::tenant_service::{self, DomainCheck},
    state::AppState,
};

pub async fn get_tenant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Tenant>, AppError> {
    auth.require(Permission::TenantRead)?;
    let mut conn = state.pool.acquire().await?;
    let tenant = tenant_service::get_tenant(&mut conn, auth.tenant_id).await?;

    Ok(Json(tenant))
}

/// Update name, contact email or currency. Owner only.
pub async fn update_tenant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<UpdateTenantRequest>,
) -> Result<Json<Tenant>, AppError> {
    auth.require(Permission::TenantWrite)?;
    let mut conn = state.pool.acquire().await?;
    let tenant = tenant_service::update_tenant(&mut conn, auth.tenant_id, request).await?;

    Ok(Json(tenant))
}

pub async fn get_public_site(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<PublicSite>, AppError> {
    auth.require(Permission::SettingsRead)?;
    let mut conn = state.pool.acquire().await?;
    let site = tenant_service::get_public_site(&mut conn, auth.tenant_id).await?;

    Ok(Json(site))
}

/// Update the booking site settings.
///
/// # Request Body
///
/// ```json
/// {
///   "domain": "www.azur-villas.com",
///   "theme": { "primaryColor": "#0a5" },
///   "locales": ["fr", "en", "de"]
/// }
/// ```
///
/// `"domain": ""` removes the custom domain.
///
/// # Response
///
/// - **Success (200 OK)**: the updated site
/// - **Error (400)**: malformed domain, or default locale not in locales
/// - **Error (409)**: domain already used by another tenant
pub async fn update_public_site(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<UpdatePublicSiteRequest>,
) -> Result<Json<PublicSite>, AppError> {
    auth.require(Permission::SettingsWrite)?;
    let mut conn = state.pool.acquire().await?;
    let site = tenant_service::update_public_site(
        &mut conn,
        &state.tenant_cache,
        &state.config.base_domain,
        auth.tenant_id,
        request,
    )
    .await?;

    Ok(Json(site))
}

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: String,
}

/// `?domain=www.azur-villas.com`: whether the booking site could use it.
pub async fn check_domain(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<DomainCheck>, AppError> {
    auth.require(Permission::SettingsRead)?;
    let mut conn = state.pool.acquire().await?;
    let check = tenant_service::check_domain(
        &mut conn,
        &state.config.base_domain,
        auth.tenant_id,
        &query.domain,
    )
    .await?;

    Ok(Json(check))
}
