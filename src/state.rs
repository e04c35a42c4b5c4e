use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Backend path of the session endpoint.
pub const SESSION_PATH: &str = "/user";
/// Backend path that starts the SSO flow.
pub const SSO_LOGIN_PATH: &str = "/saml/login";
/// Backend path that invalidates the session.
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// The application's state, shared by every session controller.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Pooled client for backend calls; every request carries the
    /// configured timeout.
    pub http: reqwest::Client,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client: {}", e)))?;
        tracing::info!(
            "✅ Backend client initialized for {} (timeout {:?})",
            config.server_url,
            config.request_timeout
        );

        Ok(AppState {
            config: Arc::new(config.clone()),
            http,
        })
    }

    /// Resolves an endpoint against the backend origin. Anything starting
    /// with `http` is taken as absolute.
    pub fn backend_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.config.server_url, endpoint)
        } else {
            format!("{}/{}", self.config.server_url, endpoint)
        }
    }
}
