//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Checks the caller's permission (admin routes)
//! 3. Delegates to a service
//! 4. Returns HTTP response (JSON, status code)

/// Occupancy, revenue and source reports
pub mod analytics;
/// Blocked periods, availability checks, calendars and iCal import
pub mod availability;
/// Booking option catalog and per-property settings
pub mod booking_options;
/// Booking pricing, creation and lifecycle
pub mod bookings;
/// Liveness and database connectivity
pub mod health;
/// Pricing periods
pub mod periods;
/// Discount codes
pub mod promo_codes;
/// Property and image management
pub mod properties;
/// Tenant-resolved booking site API
pub mod public;
/// Tenant onboarding
pub mod signup;
/// Tenant settings and public site configuration
pub mod tenants;
/// Users and API keys
pub mod users;
/// Webhook endpoint management
pub mod webhooks;
