use std::sync::Arc;

use crate::config::Config;
use crate::mail::Mailer;
use crate::store::IdentityStore;

/// Shared application state injected into all route handlers via Axum
/// extractors. The store and mailer handles are constructed once in `main`
/// and live for the whole process; nothing reaches for ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IdentityStore>,
    pub mailer: Arc<dyn Mailer>,
    /// Shared HTTP client for federated-provider token exchange.
    pub http: reqwest::Client,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    /// State over the given store, for extractor and middleware tests.
    pub fn for_tests(store: Arc<dyn IdentityStore>) -> Self {
        AppState {
            store,
            mailer: Arc::new(crate::mail::LogMailer),
            http: reqwest::Client::new(),
            config: Config {
                database_url: String::new(),
                port: 0,
                rust_log: "info".to_string(),
                app_base_url: "http://localhost:3000".to_string(),
                api_base_url: "http://localhost:8080".to_string(),
                session_secret: "test-session-secret".to_string(),
                session_ttl_hours: 1,
                with_storage_enrichment: true,
                perimeter_user: "admin".to_string(),
                perimeter_password: "s3cret".to_string(),
                production: false,
                smtp: None,
                google: None,
                github: None,
            },
        }
    }
}
