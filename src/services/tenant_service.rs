//! Tenant onboarding and tenant-level settings.
//!
//! Signup creates, in a single transaction:
//! 1. the tenant
//! 2. its public site on the same subdomain
//! 3. the OWNER user
//! 4. the owner's first API key
//!
//! so a failed step never leaves a tenant nobody can log into.

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, is_unique_violation},
    middleware::auth::{generate_api_key, hash_api_key},
    models::{
        tenant::{
            PublicSite, SignupRequest, SignupResponse, Tenant, UpdatePublicSiteRequest,
            UpdateTenantRequest,
        },
        user::User,
    },
    services::{
        subdomain,
        tenant_resolver::{self, HostKind, TenantCache},
    },
};

pub async fn signup(pool: &DbPool, request: SignupRequest) -> Result<SignupResponse, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    let label = request.subdomain.trim().to_lowercase();
    subdomain::validate_subdomain(&label).map_err(AppError::InvalidRequest)?;
    if subdomain::is_reserved(&label) {
        return Err(AppError::Conflict(format!("Subdomain '{label}' is reserved")));
    }

    let mut tx = pool.begin().await?;

    if subdomain::is_taken(&mut tx, &label).await? {
        return Err(AppError::Conflict(format!(
            "Subdomain '{label}' is already taken"
        )));
    }

    let email = request.owner_email.trim().to_lowercase();
    let tenant = sqlx::query_as::<_, Tenant>(
        r#"
        INSERT INTO tenants (name, subdomain, contact_email, currency)
        VALUES ($1, $2, $3, COALESCE($4, 'EUR'))
        RETURNING *
        "#,
    )
    .bind(request.company_name.trim())
    .bind(&label)
    .bind(&email)
    .bind(&request.currency)
    .fetch_one(&mut *tx)
    .await
    .map_err(subdomain_conflict)?;

    let public_site = sqlx::query_as::<_, PublicSite>(
        r#"
        INSERT INTO public_sites (tenant_id, subdomain, default_locale, locales)
        VALUES ($1, $2, 'fr', ARRAY['fr', 'en'])
        RETURNING *
        "#,
    )
    .bind(tenant.id)
    .bind(&label)
    .fetch_one(&mut *tx)
    .await
    .map_err(subdomain_conflict)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (tenant_id, email, first_name, last_name, role)
        VALUES ($1, $2, $3, $4, 'OWNER')
        RETURNING *
        "#,
    )
    .bind(tenant.id)
    .bind(&email)
    .bind(request.owner_first_name.trim())
    .bind(request.owner_last_name.trim())
    .fetch_one(&mut *tx)
    .await?;

    let api_key = generate_api_key();
    sqlx::query("INSERT INTO api_keys (user_id, key_hash, label) VALUES ($1, $2, 'default')")
        .bind(user.id)
        .bind(hash_api_key(&api_key))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, "Tenant signed up");
    Ok(SignupResponse {
        tenant,
        user,
        public_site,
        api_key,
    })
}

fn subdomain_conflict(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Subdomain is already taken".to_string())
    } else {
        err.into()
    }
}

pub async fn get_tenant(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Tenant, AppError> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::TenantNotFound)
}

pub async fn update_tenant(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: UpdateTenantRequest,
) -> Result<Tenant, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    sqlx::query_as::<_, Tenant>(
        r#"
        UPDATE tenants SET
            name = COALESCE($2, name),
            contact_email = COALESCE($3, contact_email),
            currency = COALESCE($4, currency),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(request.name.map(|n| n.trim().to_string()))
    .bind(request.contact_email.map(|e| e.trim().to_lowercase()))
    .bind(request.currency)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::TenantNotFound)
}

pub async fn get_public_site(
    conn: &mut PgConnection,
    tenant_id: Uuid,
) -> Result<PublicSite, AppError> {
    sqlx::query_as::<_, PublicSite>("SELECT * FROM public_sites WHERE tenant_id = $1")
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::PublicSiteNotFound)
}

/// Normalize a requested custom domain. `Ok(None)` clears it.
///
/// Hosts under the platform's own domain are refused: those are reached
/// through the subdomain.
pub fn normalize_custom_domain(raw: &str, base_domain: &str) -> Result<Option<String>, AppError> {
    let Some(domain) = tenant_resolver::normalize_host(raw) else {
        return Ok(None);
    };
    if !tenant_resolver::is_valid_hostname(&domain) {
        return Err(AppError::InvalidRequest(format!(
            "'{domain}' is not a valid domain name"
        )));
    }
    if !matches!(
        tenant_resolver::classify_host(&domain, base_domain),
        HostKind::CustomDomain(_)
    ) {
        return Err(AppError::InvalidRequest(format!(
            "Custom domain cannot be under {base_domain}"
        )));
    }
    Ok(Some(domain))
}

/// Response of `GET /api/v1/public-site/check-domain`.
#[derive(Debug, Serialize)]
pub struct DomainCheck {
    pub available: bool,
    pub domain: String,
}

/// Whether another tenant's booking site, or any property, routes on `domain`.
async fn domain_in_use(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    domain: &str,
) -> Result<bool, AppError> {
    let used: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(SELECT 1 FROM public_sites WHERE domain = $1 AND tenant_id <> $2)
            OR EXISTS(SELECT 1 FROM properties WHERE custom_domain = $1)
        "#,
    )
    .bind(domain)
    .bind(tenant_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(used)
}

/// Whether the tenant's booking site could move to `raw`.
///
/// # Errors
///
/// `InvalidRequest` when the domain is empty, malformed or under `base_domain`.
pub async fn check_domain(
    conn: &mut PgConnection,
    base_domain: &str,
    tenant_id: Uuid,
    raw: &str,
) -> Result<DomainCheck, AppError> {
    let domain = normalize_custom_domain(raw, base_domain)?
        .ok_or_else(|| AppError::InvalidRequest("Domain is required".to_string()))?;
    let available = !domain_in_use(conn, tenant_id, &domain).await?;

    Ok(DomainCheck { available, domain })
}

/// Apply a partial update to the tenant's public site.
///
/// Any change drops the tenant from the host cache so routing and
/// `is_active` take effect on the next request.
pub async fn update_public_site(
    conn: &mut PgConnection,
    cache: &TenantCache,
    base_domain: &str,
    tenant_id: Uuid,
    request: UpdatePublicSiteRequest,
) -> Result<PublicSite, AppError> {
    let current = get_public_site(conn, tenant_id).await?;

    let domain = match request.domain.as_deref() {
        Some(raw) => Some(normalize_custom_domain(raw, base_domain)?),
        None => None,
    };

    if let Some(Some(domain)) = &domain {
        if domain_in_use(conn, tenant_id, domain).await? {
            return Err(AppError::Conflict(format!(
                "Domain '{domain}' is already in use"
            )));
        }
    }

    let locales = request.locales.as_ref().unwrap_or(&current.locales);
    let default_locale = request
        .default_locale
        .as_ref()
        .unwrap_or(&current.default_locale);
    if locales.is_empty() || !locales.contains(default_locale) {
        return Err(AppError::InvalidRequest(
            "Default locale must be one of the site locales".to_string(),
        ));
    }

    let site = sqlx::query_as::<_, PublicSite>(
        r#"
        UPDATE public_sites SET
            domain = CASE WHEN $2 THEN $3 ELSE domain END,
            theme = COALESCE($4, theme),
            metadata = COALESCE($5, metadata),
            logo = COALESCE($6, logo),
            favicon = COALESCE($7, favicon),
            default_locale = COALESCE($8, default_locale),
            locales = COALESCE($9, locales),
            is_active = COALESCE($10, is_active),
            updated_at = NOW()
        WHERE tenant_id = $1
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(domain.is_some())
    .bind(domain.flatten())
    .bind(request.theme)
    .bind(request.metadata)
    .bind(request.logo)
    .bind(request.favicon)
    .bind(request.default_locale)
    .bind(request.locales)
    .bind(request.is_active)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Domain is already in use".to_string())
        } else {
            e.into()
        }
    })?;

    cache.invalidate_tenant(tenant_id);
    Ok(site)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_domain_clears_it() {
        assert_eq!(normalize_custom_domain("", "villa.test").unwrap(), None);
        assert_eq!(normalize_custom_domain("  ", "villa.test").unwrap(), None);
    }

    #[test]
    fn custom_domain_is_normalized() {
        assert_eq!(
            normalize_custom_domain("WWW.Azur-Villas.com.", "villa.test").unwrap(),
            Some("www.azur-villas.com".to_string())
        );
    }

    #[test]
    fn platform_hosts_cannot_be_custom_domains() {
        assert!(normalize_custom_domain("azur.villa.test", "villa.test").is_err());
        assert!(normalize_custom_domain("villa.test", "villa.test").is_err());
    }

    #[test]
    fn malformed_domains_are_rejected() {
        assert!(normalize_custom_domain("localhost", "villa.test").is_err());
        assert!(normalize_custom_domain("bad_domain.com", "villa.test").is_err());
    }
}
