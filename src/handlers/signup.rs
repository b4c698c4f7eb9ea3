//! Tenant onboarding.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{
    db::DbPool, error::AppError, models::tenant::SignupRequest, services::tenant_service,
};

/// Create a tenant with its public site, owner and first API key.
///
/// # Endpoint
///
/// `POST /api/signup`
///
/// # Response
///
/// - **Success (201 Created)**: tenant, owner user, public site and the raw API key
/// - **Error (400)**: invalid fields or malformed subdomain
/// - **Error (409)**: subdomain reserved or taken
pub async fn signup(
    State(pool): State<DbPool>,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = tenant_service::signup(&pool, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}
