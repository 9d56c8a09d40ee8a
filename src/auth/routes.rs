//! Dashboard route table and role-aware navigation.

use serde::Serialize;

use super::guard::{GuardDecision, RouteGuard};
use crate::models::Role;
use crate::session_store::AuthState;

/// Who may open a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDef {
    pub path: &'static str,
    pub access: RouteAccess,
}

const fn route(path: &'static str, access: RouteAccess) -> RouteDef {
    RouteDef { path, access }
}

pub const ROUTES: &[RouteDef] = &[
    route("/auth/login", RouteAccess::Public),
    route("/auth/signup", RouteAccess::Public),
    route("/auth/forgot-password", RouteAccess::Public),
    route("/dashboard", RouteAccess::Authenticated),
    route("/company/digital-twins", RouteAccess::Role(Role::Company)),
    route("/company/campaigns", RouteAccess::Role(Role::Company)),
    route("/company/billing", RouteAccess::Role(Role::Company)),
    route("/agent/profile", RouteAccess::Role(Role::Agent)),
    route("/agent/campaigns", RouteAccess::Role(Role::Agent)),
    route("/agent/earnings", RouteAccess::Role(Role::Agent)),
    route("/admin/companies", RouteAccess::Role(Role::Admin)),
    route("/admin/settings", RouteAccess::Role(Role::Admin)),
];

/// Result of opening a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(&'static str),
    Loading,
    Redirect(String),
}

/// Route definition for `path`, ignoring any query string or trailing slash.
pub fn find_route(path: &str) -> Option<&'static RouteDef> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    ROUTES.iter().find(|route| route.path == path)
}

/// Resolve a path against the route table and the guard.
///
/// `/` and unknown paths redirect to the guard's landing screen.
pub fn navigate(guard: &RouteGuard, state: &AuthState, path: &str) -> Navigation {
    let Some(route) = find_route(path) else {
        return Navigation::Redirect(guard.default_path().to_string());
    };

    let required = match route.access {
        RouteAccess::Public => return Navigation::Render(route.path),
        RouteAccess::Authenticated => None,
        RouteAccess::Role(role) => Some(role),
    };

    match guard.evaluate(state, required) {
        GuardDecision::Loading => Navigation::Loading,
        GuardDecision::Allow => Navigation::Render(route.path),
        GuardDecision::RedirectToLogin(target) | GuardDecision::RedirectToDefault(target) => {
            Navigation::Redirect(target)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub name: &'static str,
    pub href: &'static str,
    #[serde(skip)]
    roles: &'static [Role],
}

const EVERY_ROLE: &[Role] = &Role::ALL;
const COMPANY: &[Role] = &[Role::Company];
const AGENT: &[Role] = &[Role::Agent];
const ADMIN: &[Role] = &[Role::Admin];

const fn item(name: &'static str, href: &'static str, roles: &'static [Role]) -> NavItem {
    NavItem { name, href, roles }
}

const NAV_ITEMS: &[NavItem] = &[
    item("Dashboard", "/dashboard", EVERY_ROLE),
    item("Digital Twins", "/company/digital-twins", COMPANY),
    item("Campaigns", "/company/campaigns", COMPANY),
    item("Agents", "/company/agents", COMPANY),
    item("Billing", "/company/billing", COMPANY),
    item("My Profile", "/agent/profile", AGENT),
    item("Available Campaigns", "/agent/campaigns", AGENT),
    item("My Earnings", "/agent/earnings", AGENT),
    item("Companies", "/admin/companies", ADMIN),
    item("All Agents", "/admin/agents", ADMIN),
    item("System Settings", "/admin/settings", ADMIN),
    item("Settings", "/settings", EVERY_ROLE),
];

/// Sidebar entries for a profile role. No profile means no entries.
pub fn navigation_for(role: Option<Role>) -> Vec<NavItem> {
    let Some(role) = role else {
        return Vec::new();
    };
    NAV_ITEMS
        .iter()
        .filter(|item| item.roles.contains(&role))
        .copied()
        .collect()
}
