//! Webhook models for endpoint registration and event delivery.
//!
//! # Webhook Flow
//!
//! 1. Tenant registers a webhook endpoint via `POST /api/v1/webhooks`
//! 2. System generates a secret for HMAC signature verification
//! 3. When a booking is created or changes status, system sends a signed payload
//! 4. Receiver verifies signature using the secret
//!
//! # Security
//!
//! - Secrets are only shown once during registration
//! - Payloads are signed using HMAC-SHA256
//! - HTTPS is required for non-local endpoints

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::booking::{Booking, BookingStatus};

/// Webhook endpoint registered by a tenant.
///
/// The `secret` is stored in plaintext (required for HMAC generation)
/// but never returned in list operations.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub url: String,
    pub secret: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request to register a new webhook endpoint.
///
/// ```json
/// { "url": "https://channel-manager.example.com/hooks/villa" }
/// ```
#[derive(Debug, Deserialize)]
pub struct WebhookEndpointRequest {
    pub url: String,
}

/// Response when registering or listing webhook endpoints.
///
/// The `secret` field is ONLY included when creating a new endpoint.
#[derive(Debug, Serialize)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for WebhookEndpointResponse {
    fn from(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id,
            url: endpoint.url,
            secret: None,
            is_active: endpoint.is_active,
            created_at: endpoint.created_at,
        }
    }
}

impl WebhookEndpointResponse {
    /// Create response with secret included (only for registration).
    pub fn with_secret(mut self, secret: String) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// Booking lifecycle events pushed to webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    Created,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingEvent::Created => "booking.created",
            BookingEvent::Confirmed => "booking.confirmed",
            BookingEvent::Cancelled => "booking.cancelled",
            BookingEvent::Completed => "booking.completed",
            BookingEvent::NoShow => "booking.no_show",
        }
    }

    /// Event emitted when a booking enters `status` through a transition.
    pub fn for_status(status: BookingStatus) -> Option<Self> {
        match status {
            BookingStatus::Confirmed => Some(BookingEvent::Confirmed),
            BookingStatus::Cancelled => Some(BookingEvent::Cancelled),
            BookingStatus::Completed => Some(BookingEvent::Completed),
            BookingStatus::NoShow => Some(BookingEvent::NoShow),
            BookingStatus::Pending => None,
        }
    }
}

/// Row inserted in `webhook_events` for each delivery attempt.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub id: Uuid,
    pub webhook_endpoint_id: Uuid,
    pub booking_id: Uuid,
    pub event_type: &'static str,
    pub payload: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
}

/// A recorded delivery attempt, as listed to the tenant.
///
/// `response_status` is absent when the receiver could not be reached.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub event_type: String,
    pub sent_at: DateTime<Utc>,
    pub response_status: Option<i32>,
}

impl WebhookDelivery {
    pub fn succeeded(&self) -> bool {
        self.response_status.is_some_and(|s| (200..300).contains(&s))
    }
}

/// Webhook payload sent to the registered endpoint.
///
/// # Example
///
/// ```json
/// {
///   "event_type": "booking.confirmed",
///   "event_id": "550e8400-e29b-41d4-a716-446655440000",
///   "created_at": "2025-06-15T10:30:00Z",
///   "data": {
///     "booking": {
///       "id": "...",
///       "reference": "VS25060012",
///       "property_id": "...",
///       "check_in": "2025-07-12",
///       "check_out": "2025-07-19",
///       "status": "CONFIRMED",
///       "total_cents": 187400
///     }
///   }
/// }
/// ```
///
/// # Signature Verification
///
/// The webhook includes an `X-Webhook-Signature` header with format
/// `sha256=<hex_encoded_hmac>`, computed as HMAC-SHA256(secret, json_body).
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event_type: String,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub data: WebhookData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookData {
    pub booking: BookingWebhookData,
}

/// Subset of the booking relevant to webhook consumers (no guest contact data).
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingWebhookData {
    pub id: Uuid,
    pub reference: String,
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i32,
    pub status: BookingStatus,
    pub total_cents: i64,
    pub payout_cents: i64,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Booking> for BookingWebhookData {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            reference: b.reference.clone(),
            property_id: b.property_id,
            check_in: b.check_in,
            check_out: b.check_out,
            nights: b.nights,
            status: b.status,
            total_cents: b.total_cents,
            payout_cents: b.payout_cents,
            source: b.source.clone(),
            created_at: b.created_at,
        }
    }
}

impl WebhookPayload {
    pub fn new(event_id: Uuid, event: BookingEvent, booking: &Booking) -> Self {
        Self {
            event_type: event.as_str().to_string(),
            event_id,
            created_at: Utc::now(),
            data: WebhookData {
                booking: booking.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_map_to_events() {
        assert_eq!(
            BookingEvent::for_status(BookingStatus::Cancelled),
            Some(BookingEvent::Cancelled)
        );
        assert_eq!(BookingEvent::for_status(BookingStatus::Pending), None);
        assert_eq!(BookingEvent::NoShow.as_str(), "booking.no_show");
    }

    #[test]
    fn only_2xx_answers_count_as_delivered() {
        let delivery = |status| WebhookDelivery {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            event_type: "booking.created".to_string(),
            sent_at: Utc::now(),
            response_status: status,
        };
        assert!(delivery(Some(204)).succeeded());
        assert!(!delivery(Some(500)).succeeded());
        assert!(!delivery(None).succeeded());
    }
}
