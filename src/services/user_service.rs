//! Users of a tenant and their API keys.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{AppError, is_unique_violation},
    middleware::auth::{AuthContext, generate_api_key, hash_api_key},
    models::{
        api_key::{ApiKey, ApiKeyResponse, CreateApiKeyRequest},
        user::{CreateUserRequest, Role, UpdateUserRequest, User},
    },
};

/// Only an owner may hand out the owner role.
pub fn ensure_can_assign(actor: Role, role: Role) -> Result<(), AppError> {
    if role == Role::Owner && actor != Role::Owner {
        return Err(AppError::InsufficientPermissions);
    }
    Ok(())
}

pub async fn list_users(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE tenant_id = $1 ORDER BY created_at",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(users)
}

pub async fn get_user(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    user_id: Uuid,
) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND tenant_id = $2")
        .bind(user_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::UserNotFound)
}

pub async fn create_user(
    conn: &mut PgConnection,
    actor: &AuthContext,
    request: CreateUserRequest,
) -> Result<User, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    ensure_can_assign(actor.role, request.role)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (tenant_id, email, first_name, last_name, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(actor.tenant_id)
    .bind(request.email.trim().to_lowercase())
    .bind(request.first_name.trim())
    .bind(request.last_name.trim())
    .bind(request.role)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("A user with this email already exists".to_string())
        } else {
            e.into()
        }
    })?;

    tracing::info!(tenant_id = %actor.tenant_id, user_id = %user.id, role = ?user.role, "User created");
    Ok(user)
}

pub async fn update_user(
    conn: &mut PgConnection,
    actor: &AuthContext,
    user_id: Uuid,
    request: UpdateUserRequest,
) -> Result<User, AppError> {
    for name in [&request.first_name, &request.last_name].into_iter().flatten() {
        if name.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "First and last name cannot be blank".to_string(),
            ));
        }
    }

    let current = get_user(conn, actor.tenant_id, user_id).await?;
    if let Some(role) = request.role {
        ensure_can_assign(actor.role, role)?;
    }
    // Demoting or touching an owner is an owner's business
    if current.role == Role::Owner && actor.role != Role::Owner {
        return Err(AppError::InsufficientPermissions);
    }
    if user_id == actor.user_id && request.is_active == Some(false) {
        return Err(AppError::InvalidRequest(
            "You cannot deactivate yourself".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            role = COALESCE($5, role),
            is_active = COALESCE($6, is_active),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(actor.tenant_id)
    .bind(request.first_name.map(|n| n.trim().to_string()))
    .bind(request.last_name.map(|n| n.trim().to_string()))
    .bind(request.role)
    .bind(request.is_active)
    .fetch_one(&mut *conn)
    .await?;

    Ok(user)
}

/// Deactivate a user. Their API keys stop authenticating with them.
pub async fn deactivate_user(
    conn: &mut PgConnection,
    actor: &AuthContext,
    user_id: Uuid,
) -> Result<(), AppError> {
    if user_id == actor.user_id {
        return Err(AppError::InvalidRequest(
            "You cannot deactivate yourself".to_string(),
        ));
    }

    let result = sqlx::query(
        "UPDATE users SET is_active = false, updated_at = NOW() WHERE id = $1 AND tenant_id = $2",
    )
    .bind(user_id)
    .bind(actor.tenant_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::UserNotFound);
    }

    tracing::info!(tenant_id = %actor.tenant_id, %user_id, "User deactivated");
    Ok(())
}

pub async fn list_api_keys(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<ApiKeyResponse>, AppError> {
    let keys = sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(keys.into_iter().map(Into::into).collect())
}

/// Issue a key for the caller. The raw key is returned only here.
pub async fn create_api_key(
    conn: &mut PgConnection,
    user_id: Uuid,
    request: CreateApiKeyRequest,
) -> Result<ApiKeyResponse, AppError> {
    let label = request.label.trim();
    if label.is_empty() || label.len() > 100 {
        return Err(AppError::InvalidRequest(
            "Label must be between 1 and 100 characters".to_string(),
        ));
    }

    let raw = generate_api_key();
    let key = sqlx::query_as::<_, ApiKey>(
        "INSERT INTO api_keys (user_id, key_hash, label) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(user_id)
    .bind(hash_api_key(&raw))
    .bind(label)
    .fetch_one(&mut *conn)
    .await?;

    Ok(ApiKeyResponse::from(key).with_key(raw))
}

pub async fn revoke_api_key(
    conn: &mut PgConnection,
    user_id: Uuid,
    key_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE api_keys SET is_active = false WHERE id = $1 AND user_id = $2 AND is_active = true",
    )
    .bind(key_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::ApiKeyNotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_cannot_create_owners() {
        assert!(matches!(
            ensure_can_assign(Role::Admin, Role::Owner),
            Err(AppError::InsufficientPermissions)
        ));
        assert!(ensure_can_assign(Role::Admin, Role::Admin).is_ok());
        assert!(ensure_can_assign(Role::Owner, Role::Owner).is_ok());
    }
}
