use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    credentials::{ASSUMED_ROLE_COOKIE, CookieCredentialStore},
    error::AppError,
    models::{session::SessionOutcome, user::Role},
    services::session::SessionController,
    state::AppState,
};

/// Builds a controller whose credential lives in the request's cookies.
pub fn session_controller(state: &AppState, cookies: &Cookies) -> SessionController {
    let store = CookieCredentialStore::new(cookies.clone(), state.config.secure_cookies);
    SessionController::new(state.clone(), Arc::new(store))
}

/// Extracts the role the browser last chose to view as.
fn extract_assumed_role(cookies: &Cookies) -> Option<Role> {
    cookies
        .get(ASSUMED_ROLE_COOKIE)
        .and_then(|cookie| cookie.value().parse().ok())
}

/// A middleware that requires the backend to confirm a session.
///
/// On success the resolved controller is inserted into the request
/// extensions, with the remembered assumed role re-applied (and ignored for
/// non-admins).
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Resolving session...");

    let controller = Arc::new(session_controller(&state, &cookies));

    match controller.session().await {
        SessionOutcome::Authenticated(user) => {
            if let Some(role) = extract_assumed_role(&cookies) {
                controller.assume_role(role);
            }
            tracing::debug!("✅ User authenticated: {}", user.id);
        }
        SessionOutcome::Anonymous => {
            return Err(AppError::SessionFetch("no user in session".to_string()));
        }
        SessionOutcome::Failed(message) => {
            return Err(AppError::SessionFetch(message));
        }
    }

    request.extensions_mut().insert(controller);

    Ok(next.run(request).await)
}
