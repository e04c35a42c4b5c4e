use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use serde::Serialize;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::credentials::{CREDENTIAL_COOKIE, CredentialStore};
use crate::crypto::aes::{self, SessionKey};
use crate::error::{AppError, Result};
use crate::models::session::{Redirect, SessionOutcome, SessionState};
use crate::models::user::{Role, SessionPayload, User};
use crate::state::{AppState, LOGOUT_PATH, SESSION_PATH, SSO_LOGIN_PATH};

/// Request options for [`SessionController::auth_fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl FetchOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serializes `body` as JSON and sets the content type unless the
    /// caller already chose one.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let bytes = sonic_rs::to_vec(body)
            .map_err(|e| AppError::Internal(format!("Request serialization failed: {}", e)))?;
        self.body = Some(bytes);
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(self)
    }
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    last_error: Option<String>,
    /// Whether the session query has produced a result since the last reset.
    resolved: bool,
}

/// Owns the signed-in user, the session credential, and every call the
/// portal makes on the user's behalf.
pub struct SessionController {
    app: AppState,
    credentials: Arc<dyn CredentialStore>,
    inner: RwLock<Inner>,
    fetch_gate: Mutex<()>,
    loading: AtomicBool,
}

impl SessionController {
    pub fn new(app: AppState, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            app,
            credentials,
            inner: RwLock::new(Inner::default()),
            fetch_gate: Mutex::new(()),
            loading: AtomicBool::new(false),
        }
    }

    /// Resolves the session for the first time. Same as [`Self::session`].
    pub async fn init(&self) -> SessionOutcome {
        self.session().await
    }

    /// `endpoint` resolved against the backend origin.
    pub fn backend_url(&self, endpoint: &str) -> String {
        self.app.backend_url(endpoint)
    }

    /// Where to send the browser to start the SSO flow.
    pub fn initiate_login(&self) -> Redirect {
        Redirect::IdentityProvider(self.app.backend_url(SSO_LOGIN_PATH))
    }

    /// Exchanges an encrypted login token for a stored credential, then
    /// refetches the session.
    ///
    /// Nothing is stored when the token cannot be opened. A failed refetch
    /// after a successful exchange is not an error here; it resolves to no
    /// user.
    ///
    /// The fetch gate is held for the whole exchange, so [`Self::session`]
    /// callers arriving meanwhile wait for the refetched result.
    pub async fn handle_token(&self, encrypted_token: &str) -> Result<Option<User>> {
        let _gate = self.fetch_gate.lock().await;
        let (previous, was_resolved) = {
            let mut inner = self.write_inner();
            let previous = std::mem::replace(&mut inner.state, SessionState::Authenticating);
            (previous, std::mem::replace(&mut inner.resolved, false))
        };

        let credential = match self.open_token(encrypted_token) {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("❌ Login token rejected: {}", e);
                let mut inner = self.write_inner();
                inner.state = previous;
                inner.resolved = was_resolved;
                return Err(e);
            }
        };

        self.credentials.store(&credential);
        tracing::info!("🔑 Session credential stored ({} bytes)", credential.len());

        Ok(self.fetch_locked().await.user().cloned())
    }

    /// Handles the SSO callback and says where the browser goes next.
    pub async fn complete_login(&self, encrypted_token: Option<&str>) -> Redirect {
        let Some(token) = encrypted_token.filter(|t| !t.trim().is_empty()) else {
            tracing::warn!("❌ Callback without encrypted_token");
            return Redirect::Login;
        };

        match self.handle_token(token).await {
            Ok(Some(user)) => {
                tracing::info!("✅ User logged in: {}", user.id);
                Redirect::Home
            }
            Ok(None) => Redirect::Login,
            Err(_) => Redirect::Login,
        }
    }

    /// The session, fetched once and then cached. Concurrent callers share a
    /// single in-flight request.
    pub async fn session(&self) -> SessionOutcome {
        if let Some(outcome) = self.cached_outcome() {
            return outcome;
        }

        let _gate = self.fetch_gate.lock().await;
        if let Some(outcome) = self.cached_outcome() {
            return outcome;
        }
        self.fetch_locked().await
    }

    /// Fetches the session again, regardless of any cached result.
    pub async fn refresh(&self) -> SessionOutcome {
        let _gate = self.fetch_gate.lock().await;
        self.fetch_locked().await
    }

    /// Invalidates the session on the backend. Local state is only cleared
    /// once the backend confirms.
    pub async fn logout(&self) -> Result<Redirect> {
        let headers = self.credential_headers(&HeaderMap::new())?;
        let response = self
            .app
            .http
            .post(self.app.backend_url(LOGOUT_PATH))
            .headers(headers)
            .send()
            .await
            .map_err(|e| AppError::Logout(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Logout(format!("logout endpoint returned {}", status)));
        }

        let user_id = self.user().map(|user| user.id);
        self.clear();
        tracing::info!("👋 User logged out: {}", user_id.as_deref().unwrap_or("unknown"));

        Ok(Redirect::Login)
    }

    /// Sends a request to the backend with the session credential attached.
    ///
    /// Relative endpoints are resolved against the backend origin. The
    /// caller's options are only read. The raw response is returned for any
    /// status.
    pub async fn auth_fetch(&self, endpoint: &str, options: &FetchOptions) -> Result<reqwest::Response> {
        let url = self.app.backend_url(endpoint);
        let headers = self.credential_headers(&options.headers)?;

        let mut request = self
            .app
            .http
            .request(options.method.clone(), &url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        tracing::debug!("➡️ {} {}", options.method, url);
        Ok(request.send().await?)
    }

    /// Switches the role the views render as. Ignored unless the true role
    /// is admin; returns whether it applied.
    pub fn assume_role(&self, role: Role) -> bool {
        let mut inner = self.write_inner();
        match &mut inner.state {
            SessionState::Authenticated(user) => {
                let applied = user.assume(role);
                if applied {
                    tracing::debug!("🎭 {} now viewing as {}", user.id, role);
                }
                applied
            }
            _ => false,
        }
    }

    /// The assumed role, or `None` when no user is loaded.
    pub fn current_assumed_role(&self) -> Option<Role> {
        self.read_inner().state.user().map(|user| user.assume_role)
    }

    /// Whether the loaded user may switch roles.
    pub fn can_assume_role(&self) -> bool {
        self.read_inner().state.user().is_some_and(User::is_admin)
    }

    pub fn user(&self) -> Option<User> {
        self.read_inner().state.user().cloned()
    }

    pub fn state(&self) -> SessionState {
        self.read_inner().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Drops the user and the stored credential.
    pub fn clear(&self) {
        self.credentials.clear();
        let mut inner = self.write_inner();
        inner.state = SessionState::Unauthenticated;
        inner.last_error = None;
        inner.resolved = true;
    }

    fn open_token(&self, encrypted_token: &str) -> Result<Zeroizing<String>> {
        let key = SessionKey::from_bytes(&self.app.config.token_key)?;
        let credential = aes::decrypt_token(&key, encrypted_token)?;

        // The credential only ever travels in headers.
        if credential.is_empty() || HeaderValue::from_str(&credential).is_err() {
            return Err(AppError::TokenDecryption(
                "Credential is not a valid header value".to_string(),
            ));
        }

        Ok(credential)
    }

    async fn fetch_locked(&self) -> SessionOutcome {
        self.loading.store(true, Ordering::Release);

        let outcome = match self.fetch_session().await {
            Ok(Some(user)) => {
                tracing::debug!("✅ Session resolved for {}", user.id);
                SessionOutcome::Authenticated(user)
            }
            Ok(None) => {
                tracing::debug!("Session endpoint reported no user");
                SessionOutcome::Anonymous
            }
            Err(e) => {
                tracing::warn!("❌ {}", e);
                SessionOutcome::Failed(e.to_string())
            }
        };

        {
            let mut inner = self.write_inner();
            inner.state = match &outcome {
                SessionOutcome::Authenticated(user) => SessionState::Authenticated(user.clone()),
                _ => SessionState::Unauthenticated,
            };
            inner.last_error = match &outcome {
                SessionOutcome::Failed(message) => Some(message.clone()),
                _ => None,
            };
            inner.resolved = true;
        }

        self.loading.store(false, Ordering::Release);
        outcome
    }

    async fn fetch_session(&self) -> Result<Option<User>> {
        let headers = self.credential_headers(&HeaderMap::new())?;
        let response = self
            .app
            .http
            .get(self.app.backend_url(SESSION_PATH))
            .headers(headers)
            .send()
            .await
            .map_err(|e| AppError::SessionFetch(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SessionFetch(format!(
                "session endpoint returned {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::SessionFetch(describe_transport_error(&e)))?;
        let payload: SessionPayload = sonic_rs::from_slice(&body)
            .map_err(|e| AppError::SessionFetch(format!("invalid session payload: {}", e)))?;

        Ok(payload
            .user
            .map(|claims| claims.into_user(&self.app.config.role_source)))
    }

    /// Copies `base` and adds the bearer header and the credential cookie.
    /// A credential always wins over a caller-supplied `Authorization`.
    fn credential_headers(&self, base: &HeaderMap) -> Result<HeaderMap> {
        let mut headers = base.clone();
        let Some(credential) = self.credentials.credential() else {
            return Ok(headers);
        };

        let bearer = Zeroizing::new(format!("Bearer {}", credential.as_str()));
        headers.insert(header::AUTHORIZATION, sensitive_header(&bearer)?);

        let pair = Zeroizing::new(format!("{}={}", CREDENTIAL_COOKIE, credential.as_str()));
        let cookie = match headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => {
                Zeroizing::new(format!("{}; {}", existing, pair.as_str()))
            }
            _ => pair,
        };
        headers.insert(header::COOKIE, sensitive_header(&cookie)?);

        Ok(headers)
    }

    fn cached_outcome(&self) -> Option<SessionOutcome> {
        let inner = self.read_inner();
        if !inner.resolved || matches!(inner.state, SessionState::Authenticating) {
            return None;
        }

        Some(match (&inner.state, &inner.last_error) {
            (SessionState::Authenticated(user), _) => SessionOutcome::Authenticated(user.clone()),
            (_, Some(message)) => SessionOutcome::Failed(message.clone()),
            (_, None) => SessionOutcome::Anonymous,
        })
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn sensitive_header(value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| AppError::Internal("Credential is not a valid header value".to_string()))?;
    header.set_sensitive(true);
    Ok(header)
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "backend unreachable".to_string()
    } else {
        format!("transport error: {}", e)
    }
}
