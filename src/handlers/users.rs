//! User and API key management.
//!
//! - GET /api/v1/users
//! - POST /api/v1/users
//! - PATCH /api/v1/users/{id}
//! - DELETE /api/v1/users/{id}
//! - GET /api/v1/api-keys
//! - POST /api/v1/api-keys
//! - DELETE /api/v1/api-keys/{id}

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::{
        api_key::{ApiKeyResponse, CreateApiKeyRequest},
        user::{CreateUserRequest, UpdateUserRequest, User},
    },
    services::user_service,
};

pub async fn list_users(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<User>>, AppError> {
    auth.require(Permission::UsersRead)?;
    let mut conn = pool.acquire().await?;
    let users = user_service::list_users(&mut conn, auth.tenant_id).await?;

    Ok(Json(users))
}

/// Add a user to the caller's tenant.
///
/// # Response
///
/// - **Success (201 Created)**: the user
/// - **Error (403)**: caller lacks users.write, or a non-owner asked for the OWNER role
/// - **Error (409)**: email already used in this tenant
pub async fn create_user(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::UsersWrite)?;
    let mut conn = pool.acquire().await?;
    let user = user_service::create_user(&mut conn, &auth, request).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    auth.require(Permission::UsersWrite)?;
    let mut conn = pool.acquire().await?;
    let user = user_service::update_user(&mut conn, &auth, user_id, request).await?;

    Ok(Json(user))
}

/// Deactivate a user (soft delete). Returns 204 No Content.
pub async fn delete_user(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::UsersDelete)?;
    let mut conn = pool.acquire().await?;
    user_service::deactivate_user(&mut conn, &auth, user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the caller's own API keys (never the raw keys).
pub async fn list_api_keys(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let mut conn = pool.acquire().await?;
    let keys = user_service::list_api_keys(&mut conn, auth.user_id).await?;

    Ok(Json(keys))
}

/// Issue a new API key for the caller.
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "label": "channel manager",
///   "key": "vk_3f9a...",
///   "is_active": true,
///   "created_at": "2025-07-01T10:00:00Z",
///   "last_used_at": null
/// }
/// ```
///
/// The `key` field is only present in this response.
pub async fn create_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let key = user_service::create_api_key(&mut conn, auth.user_id, request).await?;

    Ok((StatusCode::CREATED, Json(key)))
}

pub async fn revoke_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(key_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut conn = pool.acquire().await?;
    user_service::revoke_api_key(&mut conn, auth.user_id, key_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
