use crate::models::user::User;

/// Login entry point of the portal.
pub const LOGIN_PATH: &str = "/auth";
/// Landing page after a successful login.
pub const HOME_PATH: &str = "/";

/// A full-page navigation the caller should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// The portal's login entry point.
    Login,
    /// The portal's landing page.
    Home,
    /// The identity provider's login endpoint.
    IdentityProvider(String),
}

impl Redirect {
    /// The path or URL to navigate to.
    pub fn location(&self) -> &str {
        match self {
            Redirect::Login => LOGIN_PATH,
            Redirect::Home => HOME_PATH,
            Redirect::IdentityProvider(url) => url,
        }
    }
}

/// Lifecycle of the session owned by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No user; also the state after a failed fetch or a logout.
    #[default]
    Unauthenticated,
    /// A token exchange is in flight.
    Authenticating,
    Authenticated(User),
}

impl SessionState {
    /// The signed-in user, once authenticated.
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Result of resolving the session against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Authenticated(User),
    /// The backend answered but reported no user.
    Anonymous,
    /// The fetch failed; the message is safe to show.
    Failed(String),
}

impl SessionOutcome {
    /// The resolved user, if the fetch produced one.
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionOutcome::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Where to send the browser, if anywhere. Every outcome without a user
    /// leads back to the login entry point.
    pub fn redirect(&self) -> Option<Redirect> {
        match self {
            SessionOutcome::Authenticated(_) => None,
            _ => Some(Redirect::Login),
        }
    }
}
