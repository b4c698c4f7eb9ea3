//! Shared application state handed to every handler.

use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;

use crate::{config::Config, db::DbPool, services::tenant_resolver::TenantCache};

/// State shared across requests.
///
/// Cloning is cheap: everything heavy sits behind an `Arc` or is already
/// reference counted (the pool and the reqwest client).
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub tenant_cache: Arc<TenantCache>,
    /// Outbound client for webhook delivery and iCal imports.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.webhook_timeout_secs))
            .build()?;
        let tenant_cache = TenantCache::new(Duration::from_secs(config.tenant_cache_ttl_secs));

        Ok(Self {
            pool,
            config: Arc::new(config),
            tenant_cache: Arc::new(tenant_cache),
            http,
        })
    }
}

/// Lets handlers that only need the database keep extracting `State<DbPool>`.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
