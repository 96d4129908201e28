//! Typed lookup identifiers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which directory attribute an identifier is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Login name, matched against `uid`.
    LoginName,
    /// Email address, matched against `mail`.
    EmailAddress,
}

impl IdentifierKind {
    /// Directory attribute matched for this kind.
    #[must_use]
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::LoginName => "uid",
            Self::EmailAddress => "mail",
        }
    }

    /// Stable textual name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoginName => "login",
            Self::EmailAddress => "email",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uid" | "login" | "login_name" => Ok(Self::LoginName),
            "mail" | "email" | "email_address" => Ok(Self::EmailAddress),
            _ => Err(Error::InvalidIdentifier(format!(
                "unknown identifier kind `{s}`"
            ))),
        }
    }
}

/// A value to look up together with the kind of attribute it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// Attribute kind
    pub kind: IdentifierKind,
    /// Raw value as supplied by the caller
    pub value: String,
}

impl Identifier {
    /// Creates an identifier of an explicit kind.
    #[must_use]
    pub fn new(kind: IdentifierKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Creates a login name identifier.
    #[must_use]
    pub fn login_name(value: impl Into<String>) -> Self {
        Self::new(IdentifierKind::LoginName, value)
    }

    /// Creates an email address identifier.
    #[must_use]
    pub fn email_address(value: impl Into<String>) -> Self {
        Self::new(IdentifierKind::EmailAddress, value)
    }

    /// Infers the kind from the value: anything containing `@` is an email address.
    #[must_use]
    pub fn infer(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.contains('@') {
            Self::email_address(value)
        } else {
            Self::login_name(value)
        }
    }

    /// Checks that the identifier can be used for a lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] when the value is empty.
    pub fn validate(&self) -> Result<()> {
        if self.value.is_empty() {
            return Err(Error::InvalidIdentifier(format!(
                "empty {} value",
                self.kind
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_attributes() {
        assert_eq!(IdentifierKind::LoginName.attribute(), "uid");
        assert_eq!(IdentifierKind::EmailAddress.attribute(), "mail");
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("uid".parse::<IdentifierKind>().unwrap(), IdentifierKind::LoginName);
        assert_eq!("Login".parse::<IdentifierKind>().unwrap(), IdentifierKind::LoginName);
        assert_eq!(
            "email".parse::<IdentifierKind>().unwrap(),
            IdentifierKind::EmailAddress
        );
        assert_eq!(
            "mail".parse::<IdentifierKind>().unwrap(),
            IdentifierKind::EmailAddress
        );
    }

    #[test]
    fn unknown_kind_names_offending_value() {
        let err = "phone".parse::<IdentifierKind>().unwrap_err();
        assert!(matches!(&err, Error::InvalidIdentifier(msg) if msg.contains("phone")));
    }

    #[test]
    fn infer_kind_from_value() {
        assert_eq!(
            Identifier::infer("jdoe@example.com").kind,
            IdentifierKind::EmailAddress
        );
        assert_eq!(Identifier::infer("jdoe").kind, IdentifierKind::LoginName);
    }

    #[test]
    fn empty_value_is_invalid() {
        assert!(Identifier::login_name("jdoe").validate().is_ok());
        let err = Identifier::email_address("").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn serde_representation() {
        let id = Identifier::login_name("jdoe");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"kind":"login_name","value":"jdoe"}"#);
    }
}
