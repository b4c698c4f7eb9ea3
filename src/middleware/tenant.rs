//! Tenant resolution for the public booking API.
//!
//! Public routes carry no credentials: the tenant is whoever owns the host
//! the request was sent to (or the one named by `X-Tenant`). See
//! [`crate::services::tenant_resolver`] for the lookup rules.

use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, services::tenant_resolver, state::AppState};

/// Header naming the tenant subdomain explicitly, for front-ends served
/// from a host that is not the tenant's (previews, local development).
pub const TENANT_HEADER: &str = "X-Tenant";

/// Resolve the tenant of a public request.
///
/// # Flow
///
/// 1. Read `X-Tenant`, else `Host` (the platform apex addresses no tenant)
/// 2. Resolve through the cache, then the database
/// 3. Inject [`crate::models::tenant::PublicTenant`] and call the next handler
///
/// Answers 404 `tenant_not_found` when nothing identifies an active tenant.
pub async fn public_tenant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Owned copies: the request must not stay borrowed across the lookup
    let (explicit, host) = {
        let headers = request.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        (header(TENANT_HEADER), header(HOST.as_str()))
    };

    let target = tenant_resolver::request_target(
        &state.config.base_domain,
        explicit.as_deref(),
        host.as_deref(),
    )
    .ok_or_else(|| {
        tracing::debug!(?host, "Public request without a tenant host");
        AppError::TenantNotFound
    })?;

    let tenant = tenant_resolver::resolve(&state.pool, &state.tenant_cache, &target)
        .await?
        .ok_or_else(|| {
            tracing::debug!(?target, "No tenant for public request");
            AppError::TenantNotFound
        })?;

    request.extensions_mut().insert(tenant);
    Ok(next.run(request).await)
}
