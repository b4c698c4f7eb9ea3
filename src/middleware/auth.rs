//! API key authentication and role-based access control.
//!
//! This middleware intercepts every admin request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and verify it belongs to an active user of an active tenant
//! 3. Inject an [`AuthContext`] into the request
//! 4. Reject unauthorized requests with HTTP 401
//!
//! Handlers then call [`AuthContext::require`] with the [`Permission`]
//! their operation needs; missing permissions answer HTTP 403.

use crate::{db::DbPool, error::AppError, models::user::Role};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix of every raw API key, so leaked keys are easy to grep for.
pub const API_KEY_PREFIX: &str = "vk_";

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthContext {
    /// Tenant every query of this request is scoped to
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub api_key_id: Uuid,
}

/// Operations guarded by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    TenantRead,
    TenantWrite,
    UsersRead,
    UsersWrite,
    UsersDelete,
    PropertiesRead,
    PropertiesWrite,
    PropertiesDelete,
    BookingsRead,
    BookingsWrite,
    AnalyticsRead,
    SettingsRead,
    SettingsWrite,
}

impl Role {
    /// Whether this role grants `permission`.
    ///
    /// | role  | grants |
    /// |-------|--------|
    /// | OWNER | everything |
    /// | ADMIN | everything except tenant.write and users.delete |
    /// | USER  | tenant.read, properties.read, bookings.read, analytics.read |
    pub fn grants(self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::Owner => true,
            Role::Admin => !matches!(permission, TenantWrite | UsersDelete),
            Role::User => matches!(
                permission,
                TenantRead | PropertiesRead | BookingsRead | AnalyticsRead
            ),
        }
    }
}

impl AuthContext {
    /// Fail with 403 unless the caller's role grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.grants(permission) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                role = ?self.role,
                ?permission,
                "Permission denied"
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// SHA-256 hex digest of a raw API key, as stored in `api_keys.key_hash`.
pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fresh raw API key: `vk_` followed by 64 hex characters (32 random bytes).
pub fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("{API_KEY_PREFIX}{}", hex::encode(bytes))
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Look up an active key whose user and tenant are active too
/// 4. If found: record `last_used_at`, inject `AuthContext`, call next handler
/// 5. If not found: return 401 Unauthorized error
///
/// # Headers
///
/// ```text
/// Authorization: Bearer vk_3f9a...
/// ```
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    let api_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidApiKey)?;

    let key_hash = hash_api_key(api_key.trim());

    let auth_context = sqlx::query_as::<_, AuthContext>(
        r#"
        SELECT u.tenant_id, u.id AS user_id, u.role, k.id AS api_key_id
        FROM api_keys k
        JOIN users u ON u.id = k.user_id
        JOIN tenants t ON t.id = u.tenant_id
        WHERE k.key_hash = $1
          AND k.is_active = true
          AND u.is_active = true
          AND t.is_active = true
        "#,
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
        .bind(auth_context.api_key_id)
        .execute(&pool)
        .await?;

    // Route handlers extract this with Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_can_do_everything() {
        assert!(Role::Owner.grants(Permission::TenantWrite));
        assert!(Role::Owner.grants(Permission::UsersDelete));
        assert!(Role::Owner.grants(Permission::PropertiesDelete));
    }

    #[test]
    fn admin_cannot_touch_tenant_or_delete_users() {
        assert!(Role::Admin.grants(Permission::PropertiesWrite));
        assert!(Role::Admin.grants(Permission::SettingsWrite));
        assert!(Role::Admin.grants(Permission::UsersWrite));
        assert!(!Role::Admin.grants(Permission::TenantWrite));
        assert!(!Role::Admin.grants(Permission::UsersDelete));
        assert!(Role::Admin.grants(Permission::AnalyticsRead));
    }

    #[test]
    fn user_is_read_only() {
        assert!(Role::User.grants(Permission::BookingsRead));
        assert!(Role::User.grants(Permission::PropertiesRead));
        assert!(!Role::User.grants(Permission::BookingsWrite));
        assert!(!Role::User.grants(Permission::SettingsRead));
        assert!(!Role::User.grants(Permission::UsersRead));
    }

    #[test]
    fn require_maps_to_forbidden() {
        let ctx = AuthContext {
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: Role::User,
            api_key_id: Uuid::new_v4(),
        };
        assert!(matches!(
            ctx.require(Permission::PropertiesDelete),
            Err(AppError::InsufficientPermissions)
        ));
        assert!(ctx.require(Permission::PropertiesRead).is_ok());
    }

    #[test]
    fn generated_keys_have_prefix_and_hash_to_64_hex() {
        let key = generate_api_key();
        assert!(key.starts_with("vk_"));
        assert_eq!(key.len(), 3 + 64);

        let hash = hash_api_key(&key);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_api_key(), key);
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
