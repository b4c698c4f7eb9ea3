//! Villa API - Main Application Entry Point
//!
//! This is a multi-tenant REST API for vacation-rental management companies.
//! Each tenant manages its properties, pricing periods, availability and
//! bookings, and publishes a booking site reached through its own subdomain
//! or custom domain.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing, role-based permissions
//! - **Public API**: tenant resolved from the request host
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::Config, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(base_domain = %config.base_domain, "Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.max_db_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState::new(pool, config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble every route group with its middleware.
///
/// - **admin** (`/api/v1/*`): API key authentication
/// - **public tenant routes**: tenant resolved from `X-Tenant` or `Host`
/// - **lookups, signup, health**: no authentication
pub fn build_router(state: AppState) -> Router {
    use handlers::{
        analytics, availability, booking_options, bookings, health, periods, promo_codes,
        properties, public, signup, tenants, users, webhooks,
    };

    let admin_routes = Router::new()
        // Tenant and site settings
        .route(
            "/api/v1/tenant",
            get(tenants::get_tenant).patch(tenants::update_tenant),
        )
        .route(
            "/api/v1/public-site",
            get(tenants::get_public_site).patch(tenants::update_public_site),
        )
        .route(
            "/api/v1/public-site/check-domain",
            get(tenants::check_domain),
        )
        // Users and keys
        .route(
            "/api/v1/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/v1/users/{id}",
            patch(users::update_user).delete(users::delete_user),
        )
        .route(
            "/api/v1/api-keys",
            get(users::list_api_keys).post(users::create_api_key),
        )
        .route(
            "/api/v1/api-keys/{id}",
            delete(users::revoke_api_key),
        )
        // Properties
        .route(
            "/api/v1/properties",
            get(properties::list_properties).post(properties::create_property),
        )
        .route(
            "/api/v1/properties/{id}",
            get(properties::get_property)
                .patch(properties::update_property)
                .delete(properties::delete_property),
        )
        .route(
            "/api/v1/properties/{id}/images",
            post(properties::add_image),
        )
        .route(
            "/api/v1/properties/{id}/images/{image_id}",
            delete(properties::delete_image),
        )
        .route(
            "/api/v1/properties/{id}/booking-options",
            get(booking_options::list_property_options),
        )
        .route(
            "/api/v1/properties/{id}/booking-options/{option_id}",
            put(booking_options::set_property_option)
                .delete(booking_options::disable_property_option),
        )
        // Booking options
        .route(
            "/api/v1/booking-options",
            get(booking_options::list_options).post(booking_options::create_option),
        )
        .route(
            "/api/v1/booking-options/{id}",
            get(booking_options::get_option)
                .patch(booking_options::update_option)
                .delete(booking_options::delete_option),
        )
        // Pricing periods
        .route(
            "/api/v1/periods",
            get(periods::list_periods).post(periods::create_period),
        )
        .route(
            "/api/v1/periods/{id}",
            get(periods::get_period)
                .patch(periods::update_period)
                .delete(periods::delete_period),
        )
        // Availability
        .route(
            "/api/v1/availability/blocked-periods",
            get(availability::list_blocked_periods).post(availability::create_blocked_period),
        )
        .route(
            "/api/v1/availability/blocked-periods/{id}",
            patch(availability::update_blocked_period)
                .delete(availability::delete_blocked_period),
        )
        .route(
            "/api/v1/availability/check",
            get(availability::check_availability),
        )
        .route("/api/v1/availability/calendar", get(availability::calendar))
        .route(
            "/api/v1/availability/ical/import",
            post(availability::import_ical),
        )
        .route(
            "/api/v1/availability/ical/{id}/url",
            get(availability::ical_url),
        )
        // Bookings
        .route(
            "/api/v1/bookings/calculate-price",
            post(bookings::calculate_price),
        )
        .route("/api/v1/bookings/stats", get(bookings::booking_stats))
        .route(
            "/api/v1/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/api/v1/bookings/{id}",
            get(bookings::get_booking).patch(bookings::update_booking),
        )
        .route(
            "/api/v1/bookings/{id}/confirm",
            post(bookings::confirm_booking),
        )
        .route("/api/v1/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route(
            "/api/v1/bookings/{id}/complete",
            post(bookings::complete_booking),
        )
        .route(
            "/api/v1/bookings/{id}/no-show",
            post(bookings::no_show_booking),
        )
        // Promo codes
        .route(
            "/api/v1/promocodes",
            get(promo_codes::list_promo_codes).post(promo_codes::create_promo_code),
        )
        .route(
            "/api/v1/promocodes/{id}",
            get(promo_codes::get_promo_code)
                .patch(promo_codes::update_promo_code)
                .delete(promo_codes::delete_promo_code),
        )
        .route(
            "/api/v1/promocodes/{id}/stats",
            get(promo_codes::promo_code_stats),
        )
        // Reports
        .route("/api/v1/analytics/overview", get(analytics::overview))
        .route("/api/v1/analytics/occupancy", get(analytics::occupancy))
        .route("/api/v1/analytics/revenue", get(analytics::revenue))
        .route(
            "/api/v1/analytics/top-properties",
            get(analytics::top_properties),
        )
        .route(
            "/api/v1/analytics/booking-sources",
            get(analytics::booking_sources),
        )
        .route("/api/v1/analytics/export", get(analytics::export))
        // Webhooks
        .route(
            "/api/v1/webhooks",
            get(webhooks::list_webhooks).post(webhooks::create_webhook),
        )
        .route(
            "/api/v1/webhooks/{id}",
            delete(webhooks::delete_webhook),
        )
        .route(
            "/api/v1/webhooks/{id}/deliveries",
            get(webhooks::list_deliveries),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let tenant_routes = Router::new()
        .route("/api/public/tenant", get(public::current_tenant))
        .route("/api/public/properties", get(public::list_properties))
        .route("/api/public/properties/{id}", get(public::get_property))
        .route("/api/public/pricing/calculate", post(public::calculate_price))
        .route("/api/public/availability", get(public::check_availability))
        .route("/api/public/calendar", get(public::calendar))
        .route("/api/public/bookings", post(public::create_booking))
        .route(
            "/api/public/promocodes/validate",
            post(public::validate_promo_code),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::tenant::public_tenant,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/signup", post(signup::signup))
        .route(
            "/api/public/tenant-by-domain/{domain}",
            get(public::tenant_by_domain),
        )
        .route(
            "/api/public/tenant/{subdomain}",
            get(public::tenant_by_subdomain),
        )
        .route(
            "/api/public/domain-lookup/{domain}",
            get(public::domain_lookup),
        )
        .route("/api/public/subdomain/check", post(public::check_subdomain))
        .route("/api/public/ical/{file}", get(public::export_ical))
        .merge(tenant_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured front-end origins. No origin is allowed when none is configured.
fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-tenant"),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    /// Router over a pool that never connects: only paths rejected before
    /// any query can be exercised.
    fn test_state() -> AppState {
        let config = config::test_config();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        AppState::new(pool, config).unwrap()
    }

    fn app() -> Router {
        build_router(test_state())
    }

    /// Router whose tenant cache already knows `azur`.
    fn app_with_cached_tenant() -> (Router, uuid::Uuid) {
        let state = test_state();
        let tenant = models::tenant::PublicTenant {
            id: uuid::Uuid::new_v4(),
            name: "Azur Villas".to_string(),
            subdomain: "azur".to_string(),
            currency: "EUR".to_string(),
        };
        let id = tenant.id;
        state.tenant_cache.insert("@azur".to_string(), tenant);
        (build_router(state), id)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn error_code(response: axum::response::Response) -> String {
        let body = json_body(response).await;
        body["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn admin_routes_require_an_api_key() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/bookings")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "invalid_api_key");
    }

    #[tokio::test]
    async fn report_and_option_routes_are_behind_authentication() {
        let promo = uuid::Uuid::new_v4();
        for uri in [
            "/api/v1/analytics/overview".to_string(),
            "/api/v1/analytics/occupancy".to_string(),
            "/api/v1/analytics/revenue".to_string(),
            "/api/v1/analytics/top-properties".to_string(),
            "/api/v1/analytics/booking-sources".to_string(),
            "/api/v1/analytics/export".to_string(),
            "/api/v1/booking-options".to_string(),
            "/api/v1/public-site/check-domain?domain=azur-villas.com".to_string(),
            format!("/api/v1/promocodes/{promo}/stats"),
        ] {
            let response = app()
                .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn non_bearer_credentials_are_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/properties")
                    .header("Authorization", "Basic dXNlcjpwYXNz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn public_routes_without_host_find_no_tenant() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/public/properties")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_code(response).await, "tenant_not_found");
    }

    #[tokio::test]
    async fn platform_apex_is_not_a_tenant() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/public/tenant")
                    .header("Host", "www.villa.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tenant_subdomain_host_reaches_public_routes() {
        let (app, tenant_id) = app_with_cached_tenant();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/public/tenant")
                    .header("Host", "Azur.villa.test:443")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], tenant_id.to_string());
        assert_eq!(body["subdomain"], "azur");
    }

    #[tokio::test]
    async fn tenant_header_overrides_host() {
        let (app, tenant_id) = app_with_cached_tenant();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/public/tenant")
                    .header("Host", "www.villa.test")
                    .header("X-Tenant", "azur")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["id"], tenant_id.to_string());
    }

    #[tokio::test]
    async fn public_stay_length_is_bounded_before_any_lookup() {
        let (app, _) = app_with_cached_tenant();
        let body = serde_json::json!({
            "property_id": uuid::Uuid::new_v4(),
            "check_in": "2030-01-01",
            "check_out": "9999-12-31",
            "adults": 2
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/public/pricing/calculate")
                    .header("Host", "azur.villa.test")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v2/nothing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
