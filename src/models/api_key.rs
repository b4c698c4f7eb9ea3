//! API Key model for authentication.
//!
//! API keys authenticate admin-API callers. Each key belongs to a user, and
//! through the user to a tenant. They are stored in the database as SHA-256
//! hashes; the raw key is only ever returned once, at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `user_id`: Owner of the key
/// - `key_hash`: SHA-256 hash of the actual API key
/// - `label`: Free-form name ("dashboard", "channel manager", ...)
/// - `is_active`: Whether the key is currently valid
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    ///
    /// When a request comes in with "Bearer vk_abc123", we:
    /// 1. Hash "vk_abc123" with SHA-256
    /// 2. Look up this hash in the database
    /// 3. If found and active (and its user and tenant are active), authenticate the request
    pub key_hash: String,

    pub label: String,

    /// Inactive keys are rejected during authentication. Revoking flips this
    /// flag instead of deleting the row.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /api/v1/api-keys`.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub label: String,
}

/// API key as returned to clients. `key` is only set on creation.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            label: key.label,
            key: None,
            is_active: key.is_active,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
        }
    }
}

impl ApiKeyResponse {
    /// Attach the raw key (only for the creation response).
    pub fn with_key(mut self, raw: String) -> Self {
        self.key = Some(raw);
        self
    }
}
