//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Resolve the tenant a public request is addressed to
//! - Short-circuit requests (reject unauthorized or unknown hosts)

/// API key authentication middleware
pub mod auth;
/// Host based tenant resolution for public routes
pub mod tenant;
