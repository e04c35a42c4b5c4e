use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};
use zeroize::Zeroizing;

/// Name of the cookie holding the session credential.
pub const CREDENTIAL_COOKIE: &str = "token";
/// Name of the cookie remembering the assumed role.
pub const ASSUMED_ROLE_COOKIE: &str = "assume_role";
/// Lifetime of the credential cookie in seconds.
pub const CREDENTIAL_MAX_AGE_SECS: i64 = 86_400;

/// Storage for the session credential.
///
/// The controller is the only writer. Implementations must never log the
/// stored value.
pub trait CredentialStore: Send + Sync {
    /// Returns the current credential, if one is stored and unexpired.
    fn credential(&self) -> Option<Zeroizing<String>>;
    /// Stores a credential, replacing any previous one.
    fn store(&self, credential: &str);
    /// Drops the stored credential.
    fn clear(&self);
}

/// Builds a site-wide, strict same-site cookie living for one day.
pub fn session_cookie(name: &'static str, value: String, http_only: bool, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_max_age(Duration::seconds(CREDENTIAL_MAX_AGE_SECS));
    cookie.set_same_site(SameSite::Strict);
    cookie.set_http_only(http_only);
    if secure {
        cookie.set_secure(true);
    }
    cookie
}

/// Builds the cookie that removes `name` from the browser.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}

/// In-process cookie store for native clients and tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: RwLock<Option<StoredCookie>>,
}

struct StoredCookie {
    cookie: Cookie<'static>,
    expires_at: DateTime<Utc>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The credential as it would be seen at `now`. Expired cookies are dropped.
    pub fn credential_at(&self, now: DateTime<Utc>) -> Option<Zeroizing<String>> {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(stored) if now < stored.expires_at => {
                Some(Zeroizing::new(stored.cookie.value().to_string()))
            }
            Some(_) => {
                tracing::debug!("⌛ Session credential expired");
                *slot = None;
                None
            }
            None => None,
        }
    }

    /// The stored cookie with its attributes, for inspection.
    pub fn cookie(&self) -> Option<Cookie<'static>> {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|stored| stored.cookie.clone())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credential(&self) -> Option<Zeroizing<String>> {
        self.credential_at(Utc::now())
    }

    fn store(&self, credential: &str) {
        let cookie = session_cookie(CREDENTIAL_COOKIE, credential.to_string(), false, false);
        let stored = StoredCookie {
            cookie,
            expires_at: Utc::now() + chrono::Duration::seconds(CREDENTIAL_MAX_AGE_SECS),
        };
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(stored);
    }

    fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Keeps the credential in an HTTP-only cookie on the browser's side of a
/// request handled by the portal server.
#[derive(Clone)]
pub struct CookieCredentialStore {
    cookies: Cookies,
    secure: bool,
}

impl CookieCredentialStore {
    pub fn new(cookies: Cookies, secure: bool) -> Self {
        Self { cookies, secure }
    }
}

impl CredentialStore for CookieCredentialStore {
    fn credential(&self) -> Option<Zeroizing<String>> {
        self.cookies
            .get(CREDENTIAL_COOKIE)
            .map(|cookie| Zeroizing::new(cookie.value().to_string()))
            .filter(|value| !value.is_empty())
    }

    fn store(&self, credential: &str) {
        self.cookies.add(session_cookie(
            CREDENTIAL_COOKIE,
            credential.to_string(),
            true,
            self.secure,
        ));
    }

    fn clear(&self) {
        self.cookies.remove(removal_cookie(CREDENTIAL_COOKIE));
    }
}
