//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and complex operations.
//! Most take a `&mut PgConnection` so handlers can run them on a pooled
//! connection or inside a transaction.

pub mod analytics_service;
pub mod availability;
pub mod booking_service;
pub mod ical;
pub mod option_service;
pub mod period_service;
pub mod pricing;
pub mod promo_service;
pub mod property_service;
pub mod subdomain;
pub mod tenant_resolver;
pub mod tenant_service;
pub mod user_service;
pub mod webhook_service;
