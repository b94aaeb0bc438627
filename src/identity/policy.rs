use once_cell::sync::Lazy;
use tracing::warn;

use super::session::SessionStore;

/// Feature areas reachable from the navigation surface. Identifiers are the
/// route paths with the leading slash stripped; they double as the unit of
/// permission-table lookup.
pub const ROUTES: &[&str] = &[
    "dashboard",
    "sales",
    "purchase",
    "expenses",
    "loose-stock",
    "certified-stock",
    "jewellery-stock",
    "memo-give",
    "memo-take",
    "igi-issue",
    "igi-receive",
    "jewellery-management",
    "inventory-management",
    "reports",
    "user-management",
    "user-profile",
    "tasks",
    "role-login",
];

/// Reachable by every authenticated session regardless of role.
const ALWAYS_ALLOWED: &[&str] = &["", "dashboard", "user-profile"];

/// Gated to admin/manager ahead of any table lookup.
const ADMIN_AREA: &str = "user-management";

/// The login screen itself; reachable without a session.
const LOGIN_AREA: &str = "role-login";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Manager,
    Sales,
    Inventory,
    Accountant,
    Unknown(String),
}

impl Role {
    /// Role strings arrive from the backend and are matched case-insensitively.
    /// Anything unrecognized lands in `Unknown`, which carries no access.
    pub fn parse(s: &str) -> Role {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "sales" => Role::Sales,
            "inventory" => Role::Inventory,
            "accountant" => Role::Accountant,
            other => Role::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Sales => "sales",
            Role::Inventory => "inventory",
            Role::Accountant => "accountant",
            Role::Unknown(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Full,
    Areas(Vec<&'static str>),
}

/// Static role → access mapping. `ALWAYS_ALLOWED` areas are granted outside
/// the table; `ADMIN_AREA` is enforced ahead of it.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable(Vec<(Role, Access)>);

impl PermissionTable {
    pub fn new(entries: Vec<(Role, Access)>) -> Self { Self(entries) }

    pub fn get(&self, role: &Role) -> Option<&Access> {
        self.0.iter().find(|(r, _)| r == role).map(|(_, a)| a)
    }

    pub fn builtin() -> Self {
        Self(vec![
            (Role::Admin, Access::Full),
            (Role::Manager, Access::Full),
            (
                Role::Sales,
                Access::Areas(vec!["dashboard", "sales", "memo-give", "memo-take", "reports"]),
            ),
            (
                Role::Inventory,
                Access::Areas(vec![
                    "dashboard",
                    "loose-stock",
                    "certified-stock",
                    "jewellery-stock",
                    "inventory-management",
                    "jewellery-management",
                    "memo-give",
                    "memo-take",
                    "igi-issue",
                    "igi-receive",
                    "reports",
                ]),
            ),
            (
                Role::Accountant,
                Access::Areas(vec!["dashboard", "sales", "purchase", "expenses", "reports"]),
            ),
        ])
    }
}

/// Outcome of evaluating one navigation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectLogin,
    RedirectDashboard,
    Deny,
}

/// Route path → feature-area identifier.
pub fn area_from_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Evaluate a navigation event against the built-in permission table.
pub fn evaluate_route(store: &SessionStore, path: &str) -> RouteDecision {
    evaluate_route_with_table(store, path, &BUILTIN)
}

/// Same, with an explicit table. The `user-management` gate is checked before
/// the table lookup, so widening the table cannot widen that area.
pub fn evaluate_route_with_table(store: &SessionStore, path: &str, table: &PermissionTable) -> RouteDecision {
    let area = area_from_path(path);
    if area == LOGIN_AREA {
        return RouteDecision::Allow;
    }
    if !store.is_authenticated() {
        return RouteDecision::RedirectLogin;
    }
    let role = Role::parse(store.role().unwrap_or_default().as_str());
    if ALWAYS_ALLOWED.contains(&area) {
        return RouteDecision::Allow;
    }
    if area == ADMIN_AREA {
        if matches!(role, Role::Admin | Role::Manager) {
            return RouteDecision::Allow;
        }
        warn!(target: "policy", role = role.as_str(), area, "admin-only area, redirecting");
        return RouteDecision::RedirectDashboard;
    }
    if role == Role::Admin {
        return RouteDecision::Allow;
    }
    match table.get(&role) {
        Some(Access::Full) => RouteDecision::Allow,
        Some(Access::Areas(areas)) if areas.contains(&area) => RouteDecision::Allow,
        _ => {
            warn!(target: "policy", role = role.as_str(), area, "denied");
            RouteDecision::Deny
        }
    }
}

/// Feature areas the sidebar should show for the current session. Computed by
/// the same evaluation the route guard runs, so the two can never disagree.
pub fn visible_areas(store: &SessionStore) -> Vec<&'static str> {
    ROUTES
        .iter()
        .copied()
        .filter(|area| *area != LOGIN_AREA)
        .filter(|area| evaluate_route(store, area) == RouteDecision::Allow)
        .collect()
}

static BUILTIN: Lazy<PermissionTable> = Lazy::new(PermissionTable::builtin);
