//! Tenant subdomain rules and availability checks.

use chrono::{Datelike, Utc};
use serde::Serialize;
use sqlx::PgConnection;

use crate::error::AppError;

/// Labels that can never be claimed by a tenant.
pub const RESERVED_SUBDOMAINS: &[&str] = &[
    "www", "app", "api", "admin", "dashboard", "blog", "shop", "store", "help", "support", "docs",
    "documentation", "status", "mail", "email", "ftp", "ssh", "vpn", "test", "dev", "staging",
    "prod", "production", "demo", "example", "sample", "preview", "beta", "alpha", "auth",
    "login", "signup", "register", "account", "user", "users", "profile", "settings", "config",
    "configuration", "public", "private", "secure", "villa", "villasaas", "villa-saas", "tenant",
    "client", "customer",
];

const MAX_SUGGESTIONS: usize = 5;

/// Response of `POST /api/public/subdomain/check`.
#[derive(Debug, Serialize)]
pub struct SubdomainCheck {
    pub available: bool,
    pub subdomain: String,
    pub suggestions: Vec<String>,
}

/// Check the shape of a subdomain label.
///
/// 3 to 30 characters of `[a-z0-9-]`, starting and ending with a letter or digit.
pub fn validate_subdomain(subdomain: &str) -> Result<(), String> {
    if subdomain.len() < 3 || subdomain.len() > 30 {
        return Err("Subdomain must be between 3 and 30 characters".to_string());
    }
    if !subdomain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(
            "Subdomain may only contain lowercase letters, digits and hyphens".to_string(),
        );
    }
    if subdomain.starts_with('-') || subdomain.ends_with('-') {
        return Err("Subdomain must start and end with a letter or digit".to_string());
    }
    Ok(())
}

pub fn is_reserved(subdomain: &str) -> bool {
    RESERVED_SUBDOMAINS.contains(&subdomain)
}

/// Alternative labels derived from `base`, most natural first.
pub fn suggestion_candidates(base: &str, year: i32) -> Vec<String> {
    let clean: String = base
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    let mut candidates: Vec<String> = (1..=5).map(|i| format!("{clean}{i}")).collect();
    for suffix in ["villa", "home", "house", "place", "stay"] {
        candidates.push(format!("{clean}-{suffix}"));
        candidates.push(format!("{clean}{suffix}"));
    }
    candidates.push(format!("{clean}-{year}"));
    candidates.push(format!("{clean}{year}"));

    candidates.retain(|c| validate_subdomain(c).is_ok() && !is_reserved(c));
    candidates
}

/// Whether a tenant, a public site or a property already uses `subdomain`.
pub async fn is_taken(conn: &mut PgConnection, subdomain: &str) -> Result<bool, AppError> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(SELECT 1 FROM tenants WHERE subdomain = $1)
            OR EXISTS(SELECT 1 FROM public_sites WHERE subdomain = $1)
            OR EXISTS(SELECT 1 FROM properties WHERE subdomain = $1)
        "#,
    )
    .bind(subdomain)
    .fetch_one(&mut *conn)
    .await?;

    Ok(taken)
}

/// Availability of `subdomain`, with up to five free alternatives when it is not.
///
/// # Errors
///
/// `InvalidRequest` when the label is malformed.
pub async fn check(conn: &mut PgConnection, subdomain: &str) -> Result<SubdomainCheck, AppError> {
    let subdomain = subdomain.trim().to_lowercase();
    validate_subdomain(&subdomain).map_err(AppError::InvalidRequest)?;

    let available = !is_reserved(&subdomain) && !is_taken(conn, &subdomain).await?;
    if available {
        return Ok(SubdomainCheck {
            available,
            subdomain,
            suggestions: Vec::new(),
        });
    }

    let candidates = suggestion_candidates(&subdomain, Utc::now().year());
    let taken: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT subdomain FROM tenants WHERE subdomain = ANY($1)
        UNION
        SELECT subdomain FROM public_sites WHERE subdomain = ANY($1)
        UNION
        SELECT subdomain FROM properties WHERE subdomain = ANY($1)
        "#,
    )
    .bind(&candidates)
    .fetch_all(&mut *conn)
    .await?;

    let suggestions = candidates
        .into_iter()
        .filter(|c| !taken.contains(c))
        .take(MAX_SUGGESTIONS)
        .collect();

    Ok(SubdomainCheck {
        available,
        subdomain,
        suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_labels() {
        assert!(validate_subdomain("azur").is_ok());
        assert!(validate_subdomain("azur-villas-06").is_ok());
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(validate_subdomain("ab").is_err());
        assert!(validate_subdomain(&"a".repeat(31)).is_err());
        assert!(validate_subdomain("Azur").is_err());
        assert!(validate_subdomain("azur_villas").is_err());
        assert!(validate_subdomain("-azur").is_err());
        assert!(validate_subdomain("azur-").is_err());
    }

    #[test]
    fn reserved_labels_are_known() {
        assert!(is_reserved("www"));
        assert!(is_reserved("villa-saas"));
        assert!(!is_reserved("azur"));
    }

    #[test]
    fn suggestions_start_with_numeric_suffixes() {
        let candidates = suggestion_candidates("azur", 2025);
        assert_eq!(&candidates[..3], ["azur1", "azur2", "azur3"]);
        assert!(candidates.contains(&"azur-villa".to_string()));
        assert!(candidates.contains(&"azur2025".to_string()));
    }

    #[test]
    fn suggestions_drop_hyphens_from_base_and_stay_valid() {
        let candidates = suggestion_candidates("cote-azur", 2025);
        assert_eq!(candidates[0], "coteazur1");
        assert!(candidates.iter().all(|c| validate_subdomain(c).is_ok()));
    }
}
