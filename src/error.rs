//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing API keys, missing permissions
/// - **Resource Errors**: Requested resources not found (or owned by another tenant)
/// - **Business Logic Errors**: Operations that violate booking or pricing rules
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, revoked, or its user is inactive.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Authenticated, but the role does not grant the operation.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Public site not found")]
    PublicSiteNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Property not found")]
    PropertyNotFound,

    #[error("Image not found")]
    ImageNotFound,

    #[error("Period not found")]
    PeriodNotFound,

    #[error("Blocked period not found")]
    BlockedPeriodNotFound,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Promo code not found")]
    PromoCodeNotFound,

    #[error("Webhook not found")]
    WebhookNotFound,

    #[error("Booking option not found")]
    BookingOptionNotFound,

    #[error("API key not found")]
    ApiKeyNotFound,

    #[error("Invalid webhook URL")]
    InvalidWebhookUrl(String),

    /// Request body or parameters are invalid, or a business rule rejected them.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Requested stay collides with a booking or blocked period.
    #[error("Dates not available")]
    DatesUnavailable(String),

    /// Blocking would cover existing bookings. Holds their references.
    #[error("Cannot block period with existing bookings")]
    OverlappingBookings(Vec<String>),

    /// Uniqueness or state conflict (taken subdomain, referenced row, ...).
    #[error("Conflict")]
    Conflict(String),

    /// A remote resource we depend on (e.g. an iCal feed) failed.
    #[error("Upstream error")]
    Upstream(String),

    #[error("Internal error")]
    Internal(String),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// `OverlappingBookings` additionally carries `"bookings": [references]`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "insufficient_permissions",
                self.to_string(),
            ),
            AppError::TenantNotFound => {
                (StatusCode::NOT_FOUND, "tenant_not_found", self.to_string())
            }
            AppError::PublicSiteNotFound => (
                StatusCode::NOT_FOUND,
                "public_site_not_found",
                self.to_string(),
            ),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "user_not_found", self.to_string()),
            AppError::PropertyNotFound => (
                StatusCode::NOT_FOUND,
                "property_not_found",
                self.to_string(),
            ),
            AppError::ImageNotFound => (StatusCode::NOT_FOUND, "image_not_found", self.to_string()),
            AppError::PeriodNotFound => {
                (StatusCode::NOT_FOUND, "period_not_found", self.to_string())
            }
            AppError::BlockedPeriodNotFound => (
                StatusCode::NOT_FOUND,
                "blocked_period_not_found",
                self.to_string(),
            ),
            AppError::BookingNotFound => {
                (StatusCode::NOT_FOUND, "booking_not_found", self.to_string())
            }
            AppError::PromoCodeNotFound => (
                StatusCode::NOT_FOUND,
                "promo_code_not_found",
                self.to_string(),
            ),
            AppError::WebhookNotFound => {
                (StatusCode::NOT_FOUND, "webhook_not_found", self.to_string())
            }
            AppError::BookingOptionNotFound => (
                StatusCode::NOT_FOUND,
                "booking_option_not_found",
                self.to_string(),
            ),
            AppError::ApiKeyNotFound => {
                (StatusCode::NOT_FOUND, "api_key_not_found", self.to_string())
            }
            AppError::InvalidWebhookUrl(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_webhook_url", msg.clone())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::DatesUnavailable(ref msg) => {
                (StatusCode::CONFLICT, "dates_unavailable", msg.clone())
            }
            AppError::OverlappingBookings(ref references) => {
                let body = Json(json!({
                    "error": {
                        "code": "overlapping_bookings",
                        "message": self.to_string(),
                        "bookings": references,
                    }
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Upstream(ref msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg.clone()),
            AppError::Database(ref e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// True when a sqlx error is a unique-constraint violation.
///
/// Lets callers turn races on UNIQUE columns into a 409 instead of a 500.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_errors_map_to_404() {
        let response = AppError::BookingNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "booking_not_found");
    }

    #[tokio::test]
    async fn dates_unavailable_is_a_conflict() {
        let response = AppError::DatesUnavailable("Dates already booked".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Dates already booked");
    }

    #[tokio::test]
    async fn overlapping_bookings_lists_references() {
        let response =
            AppError::OverlappingBookings(vec!["VS25070001".into(), "VS25070002".into()])
                .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["bookings"][1], "VS25070002");
    }

    #[tokio::test]
    async fn database_errors_hide_details() {
        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }
}
