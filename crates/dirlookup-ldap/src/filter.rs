//! Search filter construction and server address helpers.

use dirlookup_core::Identifier;

/// Escapes a value for literal use inside an LDAP search filter.
///
/// `*`, `(`, `)`, `\` and NUL are replaced with their `\XX` hex escapes so they match
/// literally instead of acting as filter syntax.
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Builds the equality filter matching the identifier's attribute.
#[must_use]
pub fn identifier_filter(identifier: &Identifier) -> String {
    format!(
        "({}={})",
        identifier.kind.attribute(),
        escape_filter_value(&identifier.value)
    )
}

/// Extracts the host name from a server address for TLS verification.
///
/// Strips a leading `scheme://`, then any `:port` or path suffix. Bracketed IPv6 literals are
/// returned without brackets.
#[must_use]
pub fn extract_hostname(address: &str) -> &str {
    let rest = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest);

    if let Some(bracketed) = rest.strip_prefix('[') {
        if let Some((host, _)) = bracketed.split_once(']') {
            return host;
        }
    }

    let end = rest.find(|ch: char| ch == ':' || ch == '/').unwrap_or(rest.len());
    &rest[..end]
}
