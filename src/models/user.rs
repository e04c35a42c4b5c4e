use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::RoleSource;
use crate::error::AppError;

/// Team assigned when the backend reports no group for a user.
pub const UNASSIGNED_TEAM: &str = " ";

/// A portal privilege level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(AppError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// The signed-in identity as seen by the portal.
///
/// `role` is the privilege the backend asserted. `assume_role` is what the
/// views currently render as; it can only differ from `role` by being
/// downgraded from admin to user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub team: String,
    pub role: Role,
    pub assume_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    /// Whether the backend-asserted role is admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether views should currently render admin content.
    pub fn viewing_as_admin(&self) -> bool {
        self.assume_role == Role::Admin
    }

    /// Switches the assumed role. Only admins may switch; for anyone else
    /// this is a no-op and returns `false`.
    pub fn assume(&mut self, role: Role) -> bool {
        if !self.is_admin() {
            return false;
        }
        self.assume_role = role;
        true
    }
}

/// Body of the backend's `GET /user` response.
#[derive(Debug, Deserialize)]
pub struct SessionPayload {
    #[serde(default)]
    pub user: Option<SessionClaims>,
}

/// Identity claims carried in the session payload.
#[derive(Debug, Deserialize)]
pub struct SessionClaims {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl SessionClaims {
    /// Projects the claims into a `User`. The assumed role starts equal to
    /// the true role.
    pub fn into_user(self, source: &RoleSource) -> User {
        let groups = self.groups.unwrap_or_default();

        let role = match source {
            RoleSource::LegacyAdmin => Role::Admin,
            RoleSource::Claims { admin_groups } => {
                let claimed_admin = self
                    .role
                    .as_deref()
                    .is_some_and(|role| role.eq_ignore_ascii_case("admin"));
                let group_admin = groups.iter().any(|group| admin_groups.contains(group));
                if claimed_admin || group_admin {
                    Role::Admin
                } else {
                    Role::User
                }
            }
        };

        let team = groups
            .into_iter()
            .next()
            .filter(|team| !team.is_empty())
            .unwrap_or_else(|| UNASSIGNED_TEAM.to_string());

        User {
            id: self.id.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            email: self.email,
            team,
            role,
            assume_role: role,
            avatar: self.avatar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(groups: Option<Vec<&str>>, role: Option<&str>) -> SessionClaims {
        SessionClaims {
            id: None,
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            groups: groups.map(|g| g.into_iter().map(str::to_string).collect()),
            role: role.map(str::to_string),
            avatar: None,
        }
    }

    fn claims_source() -> RoleSource {
        RoleSource::Claims {
            admin_groups: vec!["platform-admins".to_string()],
        }
    }

    #[test]
    fn legacy_source_makes_everyone_admin() {
        let user = claims(Some(vec!["Ops"]), None).into_user(&RoleSource::LegacyAdmin);
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.assume_role, Role::Admin);
        assert_eq!(user.team, "Ops");
        assert_eq!(user.id, "Alice");
    }

    #[test]
    fn claims_source_defaults_to_user() {
        let user = claims(Some(vec!["Ops"]), None).into_user(&claims_source());
        assert_eq!(user.role, Role::User);
        assert_eq!(user.assume_role, Role::User);
    }

    #[test]
    fn admin_group_or_role_claim_grants_admin() {
        let by_group = claims(Some(vec!["Ops", "platform-admins"]), None).into_user(&claims_source());
        let by_claim = claims(None, Some("Admin")).into_user(&claims_source());
        assert!(by_group.is_admin());
        assert!(by_claim.is_admin());
    }

    #[test]
    fn missing_or_empty_group_falls_back_to_space() {
        assert_eq!(claims(None, None).into_user(&claims_source()).team, UNASSIGNED_TEAM);
        assert_eq!(claims(Some(vec![]), None).into_user(&claims_source()).team, UNASSIGNED_TEAM);
        assert_eq!(claims(Some(vec![""]), None).into_user(&claims_source()).team, UNASSIGNED_TEAM);
    }

    #[test]
    fn non_admin_cannot_assume_admin() {
        let mut user = claims(None, None).into_user(&claims_source());
        assert!(!user.assume(Role::Admin));
        assert_eq!(user.assume_role, Role::User);
    }

    #[test]
    fn admin_can_downgrade_and_restore() {
        let mut user = claims(None, None).into_user(&RoleSource::LegacyAdmin);
        assert!(user.assume(Role::User));
        assert!(!user.viewing_as_admin());
        assert!(user.is_admin());
        assert!(user.assume(Role::Admin));
        assert!(user.viewing_as_admin());
    }

    #[test]
    fn serializes_with_camel_case_assumed_role() {
        let user = claims(Some(vec!["Ops"]), None).into_user(&RoleSource::LegacyAdmin);
        let json = sonic_rs::to_string(&user).unwrap();
        assert!(json.contains(r#""assumeRole":"admin""#));
        assert!(!json.contains("avatar"));
    }

    #[test]
    fn payload_without_name_still_maps() {
        let payload: SessionPayload =
            sonic_rs::from_str(r#"{"user":{"id":"u-7","groups":["Ops"]}}"#).unwrap();
        let user = payload.user.unwrap().into_user(&claims_source());
        assert_eq!(user.id, "u-7");
        assert_eq!(user.name, "");
        assert_eq!(user.email, "");
        assert_eq!(user.team, "Ops");
    }

    #[test]
    fn role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }
}
