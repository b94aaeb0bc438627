use super::policy::Role;

/// Resolved identity of the logged-in user, as reported by the backend's
/// current-user endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub role: Role,
    pub display_name: String,
}

/// Ad-hoc fields shown on the profile screen; all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub username: Option<String>,
    pub email: Option<String>,
    pub last_login: Option<String>,
}
