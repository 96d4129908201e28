//! Active environment resolution.

/// Primary environment selector variable.
pub const LDAP_ENV_VAR: &str = "LDAP_ENV";
/// Generic environment selector variable, consulted when the primary one is unset.
pub const GENERIC_ENV_VAR: &str = "ENV";
/// Environment used when no selector variable is set.
pub const DEFAULT_ENVIRONMENT: &str = "local";

/// Resolves the active environment name from a variable lookup.
///
/// The first non-empty value of [`LDAP_ENV_VAR`] then [`GENERIC_ENV_VAR`] wins, falling back to
/// [`DEFAULT_ENVIRONMENT`]. The name is not validated; an unknown name simply matches no
/// configured layer.
pub fn resolve_environment<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    [LDAP_ENV_VAR, GENERIC_ENV_VAR]
        .into_iter()
        .filter_map(&lookup)
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}
