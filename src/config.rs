use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::aes::KEY_SIZES;

/// Default per-request timeout for backend calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Where the true role of a signed-in user comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoleSource {
    /// The backend `role` claim, or membership in one of `admin_groups`.
    Claims { admin_groups: Vec<String> },
    /// Every authenticated user is an admin. Kept for deployments that
    /// still depend on the old portal behavior.
    LegacyAdmin,
}

impl RoleSource {
    fn parse(source: &str, admin_groups: Vec<String>) -> Result<Self> {
        match source.trim() {
            "claims" => Ok(RoleSource::Claims { admin_groups }),
            "legacy-admin" => Ok(RoleSource::LegacyAdmin),
            other => anyhow::bail!("PORTAL_ROLE_SOURCE must be `claims` or `legacy-admin`, got `{}`", other),
        }
    }
}

impl Default for RoleSource {
    fn default() -> Self {
        RoleSource::Claims {
            admin_groups: vec!["admin".to_string()],
        }
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// Origin of the automation backend, always with a scheme and no trailing slash.
    pub server_url: String,
    /// Raw AES-GCM key used to open login tokens.
    pub token_key: Zeroizing<Vec<u8>>,
    /// Address the portal listens on.
    pub bind_addr: SocketAddr,
    /// Timeout applied to every backend request.
    pub request_timeout: Duration,
    /// How the true role is derived from the session payload.
    pub role_source: RoleSource,
    /// Whether cookies are marked `Secure`.
    pub secure_cookies: bool,
    /// Browser origins allowed by CORS.
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Creates a `Config` with defaults for everything but the backend
    /// origin and the token key.
    pub fn new(server: &str, token_key_base64: &str) -> Result<Self> {
        Ok(Self {
            server_url: normalize_server_url(server)?,
            token_key: decode_token_key(token_key_base64.to_string())?,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            role_source: RoleSource::default(),
            secure_cookies: false,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        })
    }

    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let server = env::var("PORTAL_SERVER").context("PORTAL_SERVER must be set")?;
        let token_key = env::var("PORTAL_TOKEN_KEY")
            .context("PORTAL_TOKEN_KEY must be set (generate with: openssl rand -base64 32)")?;

        let mut config = Self::new(&server, &token_key)?;

        if let Ok(addr) = env::var("PORTAL_BIND_ADDR") {
            config.bind_addr = addr.parse().context("Invalid PORTAL_BIND_ADDR")?;
        }

        config.request_timeout = Duration::from_secs(
            env::var("PORTAL_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .context("Invalid PORTAL_REQUEST_TIMEOUT_SECS")?,
        );

        let admin_groups = split_list(
            &env::var("PORTAL_ADMIN_GROUPS").unwrap_or_else(|_| "admin".to_string()),
        );
        config.role_source = RoleSource::parse(
            &env::var("PORTAL_ROLE_SOURCE").unwrap_or_else(|_| "claims".to_string()),
            admin_groups,
        )?;

        config.secure_cookies = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            == "production";

        if let Ok(origins) = env::var("PORTAL_ALLOWED_ORIGINS") {
            config.allowed_origins = split_list(&origins);
        }

        Ok(config)
    }

    pub fn with_role_source(mut self, role_source: RoleSource) -> Self {
        self.role_source = role_source;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Prepends `http://` to a bare `host[:port]` and strips trailing slashes.
fn normalize_server_url(server: &str) -> Result<String> {
    let server = server.trim().trim_end_matches('/');
    if server.is_empty() {
        anyhow::bail!("PORTAL_SERVER cannot be empty");
    }

    if server.contains("://") {
        Ok(server.to_string())
    } else {
        Ok(format!("http://{}", server))
    }
}

fn decode_token_key(mut encoded: String) -> Result<Zeroizing<Vec<u8>>> {
    let decoded = general_purpose::STANDARD.decode(encoded.trim());
    encoded.zeroize();

    let key = Zeroizing::new(decoded.context("PORTAL_TOKEN_KEY must be valid base64")?);
    if !KEY_SIZES.contains(&key.len()) {
        anyhow::bail!("PORTAL_TOKEN_KEY must decode to 16, 24 or 32 bytes, got {}", key.len());
    }

    Ok(key)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
