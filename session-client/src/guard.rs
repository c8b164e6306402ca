// session-client/src/guard.rs
use common::models::Role;

use crate::state::SessionState;

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Access rule attached to a route or menu entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequirement {
    pub require_auth: bool,
    /// Empty means any authenticated role
    pub roles: Vec<Role>,
}

impl RouteRequirement {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            require_auth: true,
            roles: Vec::new(),
        }
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            require_auth: true,
            roles: roles.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still resolving; render a loading indicator
    Pending,
    RedirectToLogin { from: String },
    RedirectToUnauthorized,
    RedirectToDashboard,
    Render,
}

impl GuardDecision {
    /// Target path if the decision is a redirect
    pub fn redirect_path(&self) -> Option<&str> {
        match self {
            GuardDecision::RedirectToLogin { .. } => Some(LOGIN_PATH),
            GuardDecision::RedirectToUnauthorized => Some(UNAUTHORIZED_PATH),
            GuardDecision::RedirectToDashboard => Some(DASHBOARD_PATH),
            GuardDecision::Pending | GuardDecision::Render => None,
        }
    }
}

/// The one authorization decision shared by routes and menus
pub fn is_permitted(state: &SessionState, requirement: &RouteRequirement) -> bool {
    if !requirement.require_auth {
        return true;
    }
    if !state.is_authenticated() {
        return false;
    }
    requirement.roles.is_empty()
        || state
            .role()
            .map(|role| requirement.roles.contains(&role))
            .unwrap_or(false)
}

pub fn decide(state: &SessionState, requirement: &RouteRequirement, current_path: &str) -> GuardDecision {
    if state.is_loading() {
        return GuardDecision::Pending;
    }

    if requirement.require_auth {
        if !state.is_authenticated() {
            return GuardDecision::RedirectToLogin {
                from: current_path.to_string(),
            };
        }
        if !is_permitted(state, requirement) {
            return GuardDecision::RedirectToUnauthorized;
        }
        return GuardDecision::Render;
    }

    if state.is_authenticated() && matches!(current_path, LOGIN_PATH | REGISTER_PATH) {
        return GuardDecision::RedirectToDashboard;
    }
    GuardDecision::Render
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub path: String,
    pub requirement: RouteRequirement,
}

impl MenuItem {
    pub fn new(label: &str, path: &str, requirement: RouteRequirement) -> Self {
        Self {
            label: label.to_string(),
            path: path.to_string(),
            requirement,
        }
    }
}

pub fn visible_items<'a>(menu: &'a [MenuItem], state: &SessionState) -> Vec<&'a MenuItem> {
    menu.iter()
        .filter(|item| is_permitted(state, &item.requirement))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use common::models::{Identity, TokenPair};

    fn signed_in(role: Role) -> SessionState {
        let mut identity = Identity::new("alice", None);
        identity.role = role;
        SessionState {
            phase: Phase::Authenticated,
            identity: Some(identity),
            tokens: Some(TokenPair::bearer("a".into(), "r".into(), 1800)),
            ..SessionState::default()
        }
    }

    #[test]
    fn test_decision_table() {
        let anonymous = SessionState::default();
        let loading = SessionState {
            phase: Phase::Refreshing,
            ..SessionState::default()
        };
        let user = signed_in(Role::User);
        let admin_only = RouteRequirement::roles([Role::Admin]);

        assert_eq!(decide(&loading, &RouteRequirement::authenticated(), "/x"), GuardDecision::Pending);
        assert_eq!(
            decide(&anonymous, &RouteRequirement::authenticated(), "/settings"),
            GuardDecision::RedirectToLogin {
                from: "/settings".into()
            }
        );
        assert_eq!(decide(&user, &admin_only, "/admin"), GuardDecision::RedirectToUnauthorized);
        assert_eq!(decide(&signed_in(Role::Admin), &admin_only, "/admin"), GuardDecision::Render);
        assert_eq!(decide(&user, &RouteRequirement::authenticated(), "/x"), GuardDecision::Render);
        assert_eq!(decide(&user, &RouteRequirement::public(), LOGIN_PATH), GuardDecision::RedirectToDashboard);
        assert_eq!(decide(&user, &RouteRequirement::public(), REGISTER_PATH), GuardDecision::RedirectToDashboard);
        assert_eq!(decide(&user, &RouteRequirement::public(), "/about"), GuardDecision::Render);
        assert_eq!(decide(&anonymous, &RouteRequirement::public(), LOGIN_PATH), GuardDecision::Render);
    }

    #[test]
    fn test_redirect_targets() {
        let anonymous = SessionState::default();
        let user = signed_in(Role::User);
        let admin_only = RouteRequirement::roles([Role::Admin]);

        let to_login = decide(&anonymous, &RouteRequirement::authenticated(), "/settings");
        assert_eq!(to_login.redirect_path(), Some(LOGIN_PATH));
        assert_eq!(decide(&user, &admin_only, "/admin").redirect_path(), Some(UNAUTHORIZED_PATH));
        assert_eq!(
            decide(&user, &RouteRequirement::public(), LOGIN_PATH).redirect_path(),
            Some(DASHBOARD_PATH)
        );
        assert_eq!(decide(&user, &RouteRequirement::authenticated(), "/x").redirect_path(), None);
        assert_eq!(GuardDecision::Pending.redirect_path(), None);
    }

    #[test]
    fn test_menu_uses_same_rule() {
        let menu = vec![
            MenuItem::new("Home", "/", RouteRequirement::public()),
            MenuItem::new("Dashboard", DASHBOARD_PATH, RouteRequirement::authenticated()),
            MenuItem::new("Admin", "/admin", RouteRequirement::roles([Role::Admin, Role::Moderator])),
        ];

        let labels = |state: &SessionState| {
            visible_items(&menu, state)
                .into_iter()
                .map(|item| item.label.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(labels(&SessionState::default()), vec!["Home"]);
        assert_eq!(labels(&signed_in(Role::User)), vec!["Home", "Dashboard"]);
        assert_eq!(labels(&signed_in(Role::Moderator)), vec!["Home", "Dashboard", "Admin"]);
    }
}
