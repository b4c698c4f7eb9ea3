//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request and response bodies built around them.

/// Booking reports
pub mod analytics;
/// API key authentication model
pub mod api_key;
/// Guest bookings
pub mod booking;
/// Extras offered with a stay
pub mod booking_option;
/// Pricing and blocked periods
pub mod period;
/// Discount codes
pub mod promo_code;
/// Rentable properties and their images
pub mod property;
/// Tenants and public booking sites
pub mod tenant;
/// Admin users and roles
pub mod user;
/// Booking event webhooks
pub mod webhook;
