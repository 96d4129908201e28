//! Error types for directory lookups.
//!
//! Every failure a lookup can report is a variant of [`Error`]. Protocol library errors are
//! converted at the connection seam so callers only ever match on this enum.

use thiserror::Error;

/// Main error type for directory lookup operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Dialling the directory server failed (network, DNS, refusal, bad address).
    #[error("failed to connect to LDAP server {address}: {message}")]
    ConnectionError {
        /// Address that was dialled
        address: String,
        /// Underlying failure
        message: String,
    },

    /// The encrypted upgrade of an open connection failed.
    #[error("failed to start TLS: {0}")]
    TlsError(String),

    /// The directory rejected the bind credentials.
    #[error("failed to bind to LDAP: {0}")]
    AuthError(String),

    /// A search was attempted on a searcher without a live connection.
    #[error("LDAP connection not established")]
    NotConnected,

    /// The identifier kind is unknown or the identifier value is unusable.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// No directory entry matched; carries the searched value as given.
    #[error("user not found in LDAP directory: {0}")]
    NotFound(String),

    /// The search request failed for any other reason.
    #[error("LDAP search failed: {0}")]
    SearchError(String),

    /// No server address was found in any configuration source.
    #[error("no server URL configured")]
    MissingServerUrl,

    /// No password was found in any configuration source.
    #[error("no password found in secrets or environment variables")]
    MissingPassword,

    /// A structured configuration document could not be parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Specialized result type for directory lookup operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConnectionError { .. } => "CONNECTION_ERROR",
            Self::TlsError(_) => "TLS_ERROR",
            Self::AuthError(_) => "AUTH_ERROR",
            Self::NotConnected => "NOT_CONNECTED",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::NotFound(_) => "NOT_FOUND",
            Self::SearchError(_) => "SEARCH_ERROR",
            Self::MissingServerUrl => "MISSING_SERVER_URL",
            Self::MissingPassword => "MISSING_PASSWORD",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError { .. }
                | Self::TlsError(_)
                | Self::SearchError(_)
                | Self::ConfigError(_)
        )
    }

    /// Returns true for the "no matching entry" outcome.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}
