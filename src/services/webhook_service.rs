//! Webhook service for managing endpoints and sending booking events.
//!
//! This module handles webhook endpoint registration, event delivery,
//! and HMAC signature generation for secure webhook verification.

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::booking::Booking;
use crate::models::webhook::{
    BookingEvent, NewWebhookEvent, WebhookDelivery, WebhookEndpoint, WebhookEndpointRequest,
    WebhookEndpointResponse, WebhookPayload,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Create a new webhook endpoint.
///
/// # Process
///
/// 1. Validate URL format
/// 2. Generate cryptographically secure secret (32 bytes)
/// 3. Store endpoint in database
/// 4. Return endpoint with secret (only shown once)
///
/// # Security
///
/// - HTTPS is required for production endpoints
/// - HTTP localhost is allowed for testing
/// - Secret is 64 hex characters (32 bytes of randomness)
pub async fn create_webhook_endpoint(
    pool: &DbPool,
    tenant_id: Uuid,
    request: WebhookEndpointRequest,
) -> Result<WebhookEndpointResponse, AppError> {
    validate_webhook_url(&request.url)?;

    let secret = generate_secret();

    let endpoint = sqlx::query_as::<_, WebhookEndpoint>(
        r#"
        INSERT INTO webhook_endpoints (tenant_id, url, secret)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(&request.url)
    .bind(&secret)
    .fetch_one(pool)
    .await?;

    Ok(WebhookEndpointResponse::from(endpoint).with_secret(secret))
}

/// List the tenant's active webhook endpoints. Secrets are not returned.
pub async fn list_webhook_endpoints(
    pool: &DbPool,
    tenant_id: Uuid,
) -> Result<Vec<WebhookEndpointResponse>, AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE tenant_id = $1 AND is_active = true ORDER BY created_at DESC",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(endpoints.into_iter().map(|e| e.into()).collect())
}

/// Delete a webhook endpoint (soft delete, event history is kept).
pub async fn delete_webhook_endpoint(
    pool: &DbPool,
    tenant_id: Uuid,
    endpoint_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE webhook_endpoints SET is_active = false WHERE id = $1 AND tenant_id = $2 AND is_active = true",
    )
    .bind(endpoint_id)
    .bind(tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::WebhookNotFound);
    }

    Ok(())
}

/// Most recent delivery attempts of one of the tenant's endpoints, newest first.
///
/// Deleted endpoints keep their history and can still be inspected.
pub async fn list_deliveries(
    pool: &DbPool,
    tenant_id: Uuid,
    endpoint_id: Uuid,
    limit: i64,
) -> Result<Vec<WebhookDelivery>, AppError> {
    let owned: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM webhook_endpoints WHERE id = $1 AND tenant_id = $2)",
    )
    .bind(endpoint_id)
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;
    if !owned {
        return Err(AppError::WebhookNotFound);
    }

    let deliveries = sqlx::query_as::<_, WebhookDelivery>(
        r#"
        SELECT id, booking_id, event_type, sent_at, response_status
        FROM webhook_events
        WHERE webhook_endpoint_id = $1
        ORDER BY sent_at DESC
        LIMIT $2
        "#,
    )
    .bind(endpoint_id)
    .bind(limit.clamp(1, 100))
    .fetch_all(pool)
    .await?;

    let failed = deliveries.iter().filter(|d| !d.succeeded()).count();
    tracing::debug!(%endpoint_id, failed, "Listed webhook deliveries");
    Ok(deliveries)
}

/// Deliver `event` for `booking` in the background.
///
/// Delivery failures are logged and recorded, never reported to the caller,
/// so a slow receiver cannot fail or delay a booking operation.
pub fn dispatch_booking_event(
    pool: DbPool,
    http: reqwest::Client,
    event: BookingEvent,
    booking: Booking,
) {
    tokio::spawn(async move {
        if let Err(e) = notify_booking_webhooks(&pool, &http, event, &booking).await {
            tracing::error!(
                booking_id = %booking.id,
                event = event.as_str(),
                "Webhook dispatch failed: {e}"
            );
        }
    });
}

/// Send a booking event to every active endpoint of the booking's tenant.
///
/// Individual webhook failures are logged but don't fail the overall operation.
pub async fn notify_booking_webhooks(
    pool: &DbPool,
    http: &reqwest::Client,
    event: BookingEvent,
    booking: &Booking,
) -> Result<(), AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE tenant_id = $1 AND is_active = true",
    )
    .bind(booking.tenant_id)
    .fetch_all(pool)
    .await?;

    for endpoint in endpoints {
        if let Err(e) = send_webhook(pool, http, &endpoint, event, booking).await {
            tracing::error!("Failed to send webhook to {}: {:?}", endpoint.url, e);
        }
    }

    Ok(())
}

/// Send a single webhook with HMAC signature and record the attempt.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Webhook-Signature: sha256=<hex>`
/// - `X-Webhook-Event-Id: <uuid>`
/// - `X-Webhook-Event: booking.<event>`
async fn send_webhook(
    pool: &DbPool,
    http: &reqwest::Client,
    endpoint: &WebhookEndpoint,
    event: BookingEvent,
    booking: &Booking,
) -> Result<(), AppError> {
    let event_id = Uuid::new_v4();

    let payload = WebhookPayload::new(event_id, event, booking);
    let payload_value = serde_json::to_value(&payload)
        .map_err(|e| AppError::Internal(format!("Failed to serialize payload: {e}")))?;
    let payload_json = payload_value.to_string();

    let signature = generate_signature(&endpoint.secret, &payload_json)?;

    let response = http
        .post(&endpoint.url)
        .header("Content-Type", "application/json")
        .header("X-Webhook-Signature", &signature)
        .header("X-Webhook-Event-Id", event_id.to_string())
        .header("X-Webhook-Event", event.as_str())
        .body(payload_json)
        .send()
        .await;

    let (status, body) = match response {
        Ok(resp) => {
            let status = i32::from(resp.status().as_u16());
            if !resp.status().is_success() {
                tracing::warn!(url = %endpoint.url, status, "Webhook receiver answered with an error");
            }
            (Some(status), resp.text().await.ok())
        }
        Err(e) => {
            let error_msg = format!("Request failed: {e}");
            tracing::error!("{}", error_msg);
            (None, Some(error_msg))
        }
    };

    let record = NewWebhookEvent {
        id: event_id,
        webhook_endpoint_id: endpoint.id,
        booking_id: booking.id,
        event_type: event.as_str(),
        payload: payload_value,
        response_status: status,
        response_body: body,
    };

    sqlx::query(
        r#"
        INSERT INTO webhook_events (
            id,
            webhook_endpoint_id,
            booking_id,
            event_type,
            payload,
            response_status,
            response_body
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.id)
    .bind(record.webhook_endpoint_id)
    .bind(record.booking_id)
    .bind(record.event_type)
    .bind(record.payload)
    .bind(record.response_status)
    .bind(record.response_body)
    .execute(pool)
    .await?;

    Ok(())
}

/// Generate HMAC-SHA256 signature for webhook payload.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
///
/// # Verification
///
/// Clients should:
/// 1. Extract signature from `X-Webhook-Signature` header
/// 2. Compute HMAC-SHA256(secret, request_body)
/// 3. Compare using constant-time comparison
pub fn generate_signature(secret: &str, payload: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid HMAC key: {e}")))?;
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    Ok(format!("sha256={}", hex::encode(result.into_bytes())))
}

/// 64 hex characters (32 random bytes).
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Validate webhook URL format.
///
/// # Rules
///
/// - Must be valid URL
/// - Must be HTTPS (HTTP localhost allowed for development)
/// - Maximum 2048 characters
pub fn validate_webhook_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidWebhookUrl(
            "URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidWebhookUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            if matches!(parsed.host_str(), Some("localhost" | "127.0.0.1" | "0.0.0.0")) {
                Ok(())
            } else {
                Err(AppError::InvalidWebhookUrl(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidWebhookUrl(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_urls_are_accepted() {
        assert!(validate_webhook_url("https://channel.example.com/hooks/villa").is_ok());
    }

    #[test]
    fn plain_http_only_for_localhost() {
        assert!(validate_webhook_url("http://localhost:4000/hook").is_ok());
        assert!(validate_webhook_url("http://127.0.0.1/hook").is_ok());
        assert!(matches!(
            validate_webhook_url("http://channel.example.com/hook"),
            Err(AppError::InvalidWebhookUrl(_))
        ));
    }

    #[test]
    fn other_schemes_and_garbage_are_rejected() {
        assert!(validate_webhook_url("ftp://example.com/hook").is_err());
        assert!(validate_webhook_url("not a url").is_err());
        let long = format!("https://example.com/{}", "a".repeat(2048));
        assert!(validate_webhook_url(&long).is_err());
    }

    #[test]
    fn signature_matches_known_vector() {
        // RFC 4231 test case 2
        let signature = generate_signature("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn secrets_are_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
