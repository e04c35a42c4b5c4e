//! Role and team rules the portal views apply on top of the session.
//!
//! These only decide what is shown. The backend enforces the true role on
//! every request independently.

use crate::models::session::{LOGIN_PATH, Redirect, SessionState};
use crate::models::user::User;

/// Section restricted to users whose true role is admin.
pub const ADMIN_PATH: &str = "/admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Identity is still resolving; render nothing yet.
    Wait,
    Allow,
    Redirect(Redirect),
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
}

/// Whether `path` belongs to the login flow and renders without a session.
pub fn is_public(path: &str) -> bool {
    under(path, LOGIN_PATH)
}

/// Decides whether `path` can be shown for the given session.
pub fn guard(path: &str, state: &SessionState, loading: bool) -> RouteDecision {
    let user = state.user();

    if is_public(path) {
        return match user {
            Some(_) if path == LOGIN_PATH => RouteDecision::Redirect(Redirect::Home),
            _ => RouteDecision::Allow,
        };
    }

    if loading || matches!(state, SessionState::Authenticating) {
        return RouteDecision::Wait;
    }

    match user {
        None => RouteDecision::Redirect(Redirect::Login),
        Some(user) if under(path, ADMIN_PATH) && !user.is_admin() => {
            RouteDecision::Redirect(Redirect::Home)
        }
        Some(_) => RouteDecision::Allow,
    }
}

/// History, users and automations: admins see every team, others their own.
pub fn can_see_team(user: &User, team: &str) -> bool {
    user.is_admin() || user.team == team
}

/// Audit and activity views follow the assumed role, so an admin viewing
/// as a user only sees their own team.
pub fn can_see_team_as_assumed(user: &User, team: &str) -> bool {
    user.viewing_as_admin() || user.team == team
}
