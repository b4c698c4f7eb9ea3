//! Tenant and public site models.
//!
//! A tenant is a property-management company. Every other row in the
//! database carries (directly or through its property) a `tenant_id`,
//! and every admin query filters on it.
//!
//! A public site is the tenant's booking website configuration: which
//! subdomain / custom domain it answers on and how it is themed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a tenant record from the database.
///
/// # Database Table
///
/// Maps to the `tenants` table. `subdomain` is globally unique and is also
/// reserved on `public_sites`, see [`crate::services::subdomain`].
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub contact_email: String,

    /// ISO 4217 code all prices of this tenant are expressed in.
    pub currency: String,

    /// Inactive tenants fail authentication and host resolution.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `PATCH /api/v1/tenant`.
#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub currency: Option<String>,
}

impl UpdateTenantRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() || name.len() > 100 {
                return Err("Name must be between 1 and 100 characters".to_string());
            }
        }
        if let Some(email) = &self.contact_email {
            if !looks_like_email(email) {
                return Err("Invalid contact email".to_string());
            }
        }
        if let Some(currency) = &self.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err("Currency must be a 3-letter ISO 4217 code".to_string());
            }
        }
        Ok(())
    }
}

/// Public booking site configuration (one per tenant).
///
/// # Database Table
///
/// Maps to the `public_sites` table.
///
/// - `subdomain` is unique and matched against `<subdomain>.<BASE_DOMAIN>`
/// - `domain` is an optional custom domain, unique across tenants
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PublicSite {
    pub id: Uuid,
    #[serde(skip)]
    pub tenant_id: Uuid,
    pub subdomain: String,
    pub domain: Option<String>,
    pub is_active: bool,
    pub theme: serde_json::Value,
    pub metadata: serde_json::Value,
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub default_locale: String,
    pub locales: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `PATCH /api/v1/public-site`.
///
/// `domain: ""` removes the custom domain; an absent field leaves it untouched.
#[derive(Debug, Deserialize)]
pub struct UpdatePublicSiteRequest {
    pub domain: Option<String>,
    pub theme: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub default_locale: Option<String>,
    pub locales: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Tenant identity resolved from the request host for public routes.
///
/// Inserted into request extensions by [`crate::middleware::tenant::public_tenant`].
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct PublicTenant {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub currency: String,
}

/// Tenant plus its site settings, as served to booking front-ends.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Azur Villas",
///   "subdomain": "azur",
///   "domain": "www.azur-villas.com",
///   "theme": { "primaryColor": "#0a5" },
///   "default_locale": "fr",
///   "locales": ["fr", "en"]
/// }
/// ```
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TenantSiteResponse {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub currency: String,
    pub domain: Option<String>,
    pub theme: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub default_locale: Option<String>,
    pub locales: Option<Vec<String>>,
}

/// Request body for `POST /api/signup`.
///
/// # JSON Example
///
/// ```json
/// {
///   "company_name": "Azur Villas",
///   "subdomain": "azur",
///   "owner_email": "owner@azur-villas.com",
///   "owner_first_name": "Claire",
///   "owner_last_name": "Martin"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub company_name: String,
    pub subdomain: String,
    pub owner_email: String,
    pub owner_first_name: String,
    pub owner_last_name: String,
    pub currency: Option<String>,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.company_name.trim().is_empty() || self.company_name.len() > 100 {
            return Err("Company name must be between 1 and 100 characters".to_string());
        }
        if !looks_like_email(&self.owner_email) {
            return Err("Invalid owner email".to_string());
        }
        if self.owner_first_name.trim().is_empty() || self.owner_last_name.trim().is_empty() {
            return Err("Owner first and last name are required".to_string());
        }
        if let Some(currency) = &self.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err("Currency must be a 3-letter ISO 4217 code".to_string());
            }
        }
        Ok(())
    }
}

/// Everything a new tenant needs to start calling the admin API.
///
/// `api_key` is shown only in this response.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub tenant: Tenant,
    pub user: crate::models::user::User,
    pub public_site: PublicSite,
    pub api_key: String,
}

/// Minimal address check; deliverability is the mail provider's problem.
pub fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_check_accepts_plain_addresses() {
        assert!(looks_like_email("owner@azur-villas.com"));
        assert!(!looks_like_email("owner@localhost"));
        assert!(!looks_like_email("@azur.com"));
        assert!(!looks_like_email("owner azur@azur.com"));
    }

    #[test]
    fn signup_requires_owner_names() {
        let request: SignupRequest = serde_json::from_value(serde_json::json!({
            "company_name": "Azur Villas",
            "subdomain": "azur",
            "owner_email": "owner@azur-villas.com",
            "owner_first_name": " ",
            "owner_last_name": "Martin"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn tenant_update_rejects_lowercase_currency() {
        let request = UpdateTenantRequest {
            name: None,
            contact_email: None,
            currency: Some("eur".into()),
        };
        assert!(request.validate().is_err());
    }
}
