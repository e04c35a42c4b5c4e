use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::Redirect as HttpRedirect,
};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    credentials::{ASSUMED_ROLE_COOKIE, removal_cookie, session_cookie},
    error::{AppError, Result},
    middleware_layer::auth::session_controller,
    models::user::{Role, User},
    services::session::SessionController,
    state::AppState,
};

/// Query string of the SSO callback.
#[derive(Deserialize, Debug)]
pub struct CallbackQuery {
    pub encrypted_token: Option<String>,
}

/// The request payload for switching the assumed role.
#[derive(Deserialize, Debug)]
pub struct AssumeRoleRequest {
    pub role: Role,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// Sends the browser to the identity provider.
pub async fn login(State(state): State<AppState>, cookies: Cookies) -> HttpRedirect {
    let controller = session_controller(&state, &cookies);
    HttpRedirect::to(controller.initiate_login().location())
}

/// Consumes the identity provider's encrypted token.
pub async fn callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<CallbackQuery>,
) -> HttpRedirect {
    let controller = session_controller(&state, &cookies);
    let redirect = controller
        .complete_login(query.encrypted_token.as_deref())
        .await;

    HttpRedirect::to(redirect.location())
}

/// Returns the signed-in user.
pub async fn current_session(
    Extension(controller): Extension<Arc<SessionController>>,
) -> Result<Json<User>> {
    controller.user().map(Json).ok_or(AppError::Unauthorized)
}

/// Switches the role the portal renders as. Only users whose true role is
/// admin may switch.
pub async fn assume_role(
    State(state): State<AppState>,
    Extension(controller): Extension<Arc<SessionController>>,
    cookies: Cookies,
    Json(payload): Json<AssumeRoleRequest>,
) -> Result<Json<User>> {
    if !controller.assume_role(payload.role) {
        return Err(AppError::Unauthorized);
    }

    cookies.add(session_cookie(
        ASSUMED_ROLE_COOKIE,
        payload.role.to_string(),
        true,
        state.config.secure_cookies,
    ));

    controller.user().map(Json).ok_or(AppError::Unauthorized)
}

/// Handles user logout. Cookies are only removed once the backend confirms.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Json<AuthResponse>> {
    let controller = session_controller(&state, &cookies);
    controller.logout().await?;

    cookies.remove(removal_cookie(ASSUMED_ROLE_COOKIE));

    Ok(Json(AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    }))
}
