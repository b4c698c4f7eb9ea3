//! Host → tenant resolution for the public booking API.
//!
//! # Host classification
//!
//! The `Host` header is lower-cased and stripped of its port and trailing dot,
//! then compared with `BASE_DOMAIN`:
//!
//! | host                         | meaning |
//! |------------------------------|---------|
//! | `villa.test`, `www.villa.test` | platform apex, no tenant |
//! | `azur.villa.test`            | tenant subdomain `azur` |
//! | anything else                | custom domain of a public site or property |
//!
//! Positive lookups are cached in a [`TenantCache`] for `TENANT_CACHE_TTL_SECS`.
//! Misses are never cached, so a freshly created tenant is reachable at once.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::tenant::{PublicTenant, TenantSiteResponse},
};

/// What a request host points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    /// The platform itself (`BASE_DOMAIN` or `www.BASE_DOMAIN`)
    Apex,
    /// A single label under `BASE_DOMAIN`
    Subdomain(String),
    /// Any other host
    CustomDomain(String),
}

/// Lower-case a host, drop its port and trailing dot. `None` when nothing is left.
pub fn normalize_host(raw: &str) -> Option<String> {
    let host = raw.trim().to_ascii_lowercase();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
        _ => host,
    };
    let host = host.trim_end_matches('.');
    (!host.is_empty()).then(|| host.to_string())
}

/// Classify a normalized host against the platform's base domain.
pub fn classify_host(host: &str, base_domain: &str) -> HostKind {
    if host == base_domain || host.strip_prefix("www.") == Some(base_domain) {
        return HostKind::Apex;
    }
    if let Some(label) = host
        .strip_suffix(base_domain)
        .and_then(|rest| rest.strip_suffix('.'))
    {
        if !label.is_empty() && !label.contains('.') {
            return HostKind::Subdomain(label.to_string());
        }
    }
    HostKind::CustomDomain(host.to_string())
}

/// Syntactic hostname check for custom domains (at least two labels, LDH rule).
pub fn is_valid_hostname(host: &str) -> bool {
    if host.len() > 253 || !host.contains('.') {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

struct CacheEntry {
    tenant: PublicTenant,
    expires_at: Instant,
}

/// In-process TTL cache of resolved hosts, keyed by normalized host or `@subdomain`.
pub struct TenantCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl TenantCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<PublicTenant> {
        let entry = self.entries.get(key)?;
        if entry.expires_at > Instant::now() {
            return Some(entry.tenant.clone());
        }
        drop(entry);
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: String, tenant: PublicTenant) {
        self.entries.insert(
            key,
            CacheEntry {
                tenant,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every entry resolving to `tenant_id`.
    pub fn invalidate_tenant(&self, tenant_id: Uuid) {
        self.entries.retain(|_, entry| entry.tenant.id != tenant_id);
        tracing::info!(%tenant_id, "Tenant cache invalidated");
    }

    /// Entries currently held, expired ones included until next touched.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Active tenant owning `subdomain`, either as its own subdomain or its public site's.
pub async fn find_by_subdomain(
    conn: &mut PgConnection,
    subdomain: &str,
) -> Result<Option<PublicTenant>, AppError> {
    let tenant = sqlx::query_as::<_, PublicTenant>(
        r#"
        SELECT t.id, t.name, t.subdomain, t.currency
        FROM tenants t
        LEFT JOIN public_sites ps ON ps.tenant_id = t.id
        WHERE t.is_active = true
          AND (t.subdomain = $1 OR (ps.subdomain = $1 AND ps.is_active = true))
        LIMIT 1
        "#,
    )
    .bind(subdomain)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(tenant)
}

/// Active tenant serving `domain`: public site domain first, then a published
/// property's custom domain.
pub async fn find_by_custom_domain(
    conn: &mut PgConnection,
    domain: &str,
) -> Result<Option<PublicTenant>, AppError> {
    let tenant = sqlx::query_as::<_, PublicTenant>(
        r#"
        SELECT t.id, t.name, t.subdomain, t.currency
        FROM tenants t
        JOIN public_sites ps ON ps.tenant_id = t.id
        WHERE ps.domain = $1 AND ps.is_active = true AND t.is_active = true
        UNION ALL
        SELECT t.id, t.name, t.subdomain, t.currency
        FROM tenants t
        JOIN properties p ON p.tenant_id = t.id
        WHERE p.custom_domain = $1 AND p.status = 'PUBLISHED' AND t.is_active = true
        LIMIT 1
        "#,
    )
    .bind(domain)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(tenant)
}

/// What a public request addresses, before any lookup.
///
/// `explicit` is the `X-Tenant` header and wins over `host`.
/// Returns `None` for the platform apex and when neither is usable.
pub fn request_target(
    base_domain: &str,
    explicit: Option<&str>,
    host: Option<&str>,
) -> Option<HostKind> {
    let kind = match (explicit, host) {
        (Some(subdomain), _) => HostKind::Subdomain(subdomain.trim().to_ascii_lowercase()),
        (None, Some(host)) => classify_host(&normalize_host(host)?, base_domain),
        (None, None) => return None,
    };
    (kind != HostKind::Apex).then_some(kind)
}

/// Resolve a request target to an active tenant, through the cache.
///
/// Only cache misses touch the database.
pub async fn resolve(
    pool: &DbPool,
    cache: &TenantCache,
    target: &HostKind,
) -> Result<Option<PublicTenant>, AppError> {
    let key = match target {
        HostKind::Apex => return Ok(None),
        HostKind::Subdomain(label) => format!("@{label}"),
        HostKind::CustomDomain(domain) => domain.clone(),
    };

    if let Some(tenant) = cache.get(&key) {
        return Ok(Some(tenant));
    }

    let mut conn = pool.acquire().await?;
    let found = match target {
        HostKind::Subdomain(label) => find_by_subdomain(&mut conn, label).await?,
        HostKind::CustomDomain(domain) => find_by_custom_domain(&mut conn, domain).await?,
        HostKind::Apex => None,
    };

    if let Some(tenant) = &found {
        tracing::debug!(%key, tenant_id = %tenant.id, "Tenant resolved");
        cache.insert(key, tenant.clone());
    }
    Ok(found)
}

const SITE_COLUMNS: &str = r#"
    SELECT t.id, t.name, t.subdomain, t.currency,
           ps.domain, ps.theme, ps.metadata, ps.logo, ps.favicon,
           ps.default_locale, ps.locales
    FROM tenants t
    LEFT JOIN public_sites ps ON ps.tenant_id = t.id
"#;

/// Tenant and site settings for a subdomain.
pub async fn site_by_subdomain(
    conn: &mut PgConnection,
    subdomain: &str,
) -> Result<Option<TenantSiteResponse>, AppError> {
    let sql = format!(
        "{SITE_COLUMNS} WHERE t.is_active = true \
         AND (t.subdomain = $1 OR (ps.subdomain = $1 AND ps.is_active = true)) LIMIT 1"
    );
    let site = sqlx::query_as::<_, TenantSiteResponse>(&sql)
        .bind(subdomain)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(site)
}

/// Tenant and site settings for a full domain: custom domain first, then its first label
/// as a subdomain.
pub async fn site_by_domain(
    conn: &mut PgConnection,
    domain: &str,
) -> Result<Option<TenantSiteResponse>, AppError> {
    let domain = normalize_host(domain).ok_or(AppError::TenantNotFound)?;

    let sql = format!(
        "{SITE_COLUMNS} WHERE t.is_active = true AND ps.domain = $1 AND ps.is_active = true"
    );
    let by_domain = sqlx::query_as::<_, TenantSiteResponse>(&sql)
        .bind(&domain)
        .fetch_optional(&mut *conn)
        .await?;
    if by_domain.is_some() {
        return Ok(by_domain);
    }

    let label = domain.split('.').next().unwrap_or_default();
    site_by_subdomain(conn, label).await
}

#[derive(Debug, Serialize)]
pub struct DomainLookupProperty {
    pub id: Uuid,
    pub subdomain: Option<String>,
    pub custom_domain: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DomainLookupTenant {
    pub id: Uuid,
    pub subdomain: String,
}

/// Answer of `GET /api/public/domain-lookup/{domain}`.
#[derive(Debug, Serialize)]
pub struct DomainLookup {
    pub found: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<DomainLookupProperty>,
    pub tenant: DomainLookupTenant,
}

#[derive(sqlx::FromRow)]
struct PropertyDomainRow {
    id: Uuid,
    subdomain: Option<String>,
    custom_domain: Option<String>,
    tenant_id: Uuid,
    tenant_subdomain: String,
}

/// What a domain serves: a single-property site first, then a tenant site.
pub async fn domain_lookup(
    conn: &mut PgConnection,
    domain: &str,
) -> Result<DomainLookup, AppError> {
    let domain = normalize_host(domain).ok_or(AppError::TenantNotFound)?;
    let label = domain.split('.').next().unwrap_or_default().to_string();

    let property = sqlx::query_as::<_, PropertyDomainRow>(
        r#"
        SELECT p.id, p.subdomain, p.custom_domain,
               t.id AS tenant_id, t.subdomain AS tenant_subdomain
        FROM properties p
        JOIN tenants t ON t.id = p.tenant_id
        WHERE (p.custom_domain = $1 OR p.subdomain = $2)
          AND p.status = 'PUBLISHED'
          AND t.is_active = true
        LIMIT 1
        "#,
    )
    .bind(&domain)
    .bind(&label)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = property {
        return Ok(DomainLookup {
            found: true,
            kind: "property",
            property: Some(DomainLookupProperty {
                id: row.id,
                subdomain: row.subdomain,
                custom_domain: row.custom_domain,
            }),
            tenant: DomainLookupTenant {
                id: row.tenant_id,
                subdomain: row.tenant_subdomain,
            },
        });
    }

    let tenant = sqlx::query_as::<_, DomainLookupTenant>(
        r#"
        SELECT t.id, t.subdomain
        FROM tenants t
        LEFT JOIN public_sites ps ON ps.tenant_id = t.id
        WHERE t.is_active = true
          AND ((ps.domain = $1 AND ps.is_active = true) OR t.subdomain = $2)
        LIMIT 1
        "#,
    )
    .bind(&domain)
    .bind(&label)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::TenantNotFound)?;

    Ok(DomainLookup {
        found: true,
        kind: "tenant",
        property: None,
        tenant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "villa.test";

    fn tenant(subdomain: &str) -> PublicTenant {
        PublicTenant {
            id: Uuid::new_v4(),
            name: subdomain.to_string(),
            subdomain: subdomain.to_string(),
            currency: "EUR".to_string(),
        }
    }

    #[test]
    fn normalizes_case_port_and_trailing_dot() {
        assert_eq!(normalize_host("Azur.Villa.Test:8080").as_deref(), Some("azur.villa.test"));
        assert_eq!(normalize_host("azur.villa.test.").as_deref(), Some("azur.villa.test"));
        assert_eq!(normalize_host("  "), None);
    }

    #[test]
    fn apex_and_www_have_no_tenant() {
        assert_eq!(classify_host("villa.test", BASE), HostKind::Apex);
        assert_eq!(classify_host("www.villa.test", BASE), HostKind::Apex);
    }

    #[test]
    fn single_label_is_a_subdomain() {
        assert_eq!(
            classify_host("azur.villa.test", BASE),
            HostKind::Subdomain("azur".into())
        );
    }

    #[test]
    fn nested_labels_and_lookalikes_are_custom_domains() {
        assert_eq!(
            classify_host("a.b.villa.test", BASE),
            HostKind::CustomDomain("a.b.villa.test".into())
        );
        assert_eq!(
            classify_host("evilvilla.test", BASE),
            HostKind::CustomDomain("evilvilla.test".into())
        );
        assert_eq!(
            classify_host("www.azur-villas.com", BASE),
            HostKind::CustomDomain("www.azur-villas.com".into())
        );
    }

    #[test]
    fn tenant_header_wins_over_host() {
        assert_eq!(
            request_target("villa.test", Some(" Azur "), Some("other.villa.test")),
            Some(HostKind::Subdomain("azur".into()))
        );
    }

    #[test]
    fn apex_or_missing_host_has_no_target() {
        assert_eq!(request_target("villa.test", None, Some("www.villa.test:443")), None);
        assert_eq!(request_target("villa.test", None, None), None);
        assert_eq!(
            request_target("villa.test", None, Some("www.azur-villas.com")),
            Some(HostKind::CustomDomain("www.azur-villas.com".into()))
        );
    }

    #[test]
    fn hostname_validation() {
        assert!(is_valid_hostname("www.azur-villas.com"));
        assert!(!is_valid_hostname("localhost"));
        assert!(!is_valid_hostname("azur_villas.com"));
        assert!(!is_valid_hostname("-azur.com"));
        assert!(!is_valid_hostname("azur..com"));
    }

    #[test]
    fn cache_returns_fresh_entries() {
        let cache = TenantCache::new(Duration::from_secs(60));
        let azur = tenant("azur");
        cache.insert("@azur".into(), azur.clone());
        assert_eq!(cache.get("@azur"), Some(azur));
        assert_eq!(cache.get("@other"), None);
    }

    #[test]
    fn cache_expires_entries() {
        let cache = TenantCache::new(Duration::ZERO);
        cache.insert("@azur".into(), tenant("azur"));
        assert_eq!(cache.get("@azur"), None);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn invalidation_drops_every_key_of_the_tenant() {
        let cache = TenantCache::new(Duration::from_secs(60));
        let azur = tenant("azur");
        let other = tenant("other");
        cache.insert("@azur".into(), azur.clone());
        cache.insert("www.azur-villas.com".into(), azur.clone());
        cache.insert("@other".into(), other.clone());

        cache.invalidate_tenant(azur.id);

        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.get("@other"), Some(other));
    }
}
