//! Configuration structures for directory connections.
//!
//! [`DirectoryConfig`] is the fully resolved description of how to reach and authenticate
//! against a directory server. [`ConfigFile`] and [`EnvironmentLayer`] model the optional YAML
//! document the loader reads it from.

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Resolved connection configuration for a directory server.
///
/// A configuration is either completely empty (used for a searcher that never connects) or has
/// at least one server address. Only the first server is dialled; later entries are kept for
/// failover and are currently unused.
#[derive(Debug)]
pub struct DirectoryConfig {
    servers: Vec<String>,
    bind_identity: String,
    bind_secret: SecretString,
    search_base: String,
    use_start_tls: bool,
    verify_certificate: bool,
}

impl DirectoryConfig {
    /// Creates a configuration targeting a single server with anonymous access.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self::default().with_servers(vec![server.into()])
    }

    /// Replaces the server address list.
    #[must_use]
    pub fn with_servers(mut self, servers: Vec<String>) -> Self {
        self.servers = servers;
        self
    }

    /// Sets the bind identity and its secret.
    #[must_use]
    pub fn with_bind_credentials(
        mut self,
        identity: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.bind_identity = identity.into();
        self.bind_secret = SecretString::from(secret.into());
        self
    }

    /// Sets the subtree root searched by lookups.
    #[must_use]
    pub fn with_search_base(mut self, search_base: impl Into<String>) -> Self {
        self.search_base = search_base.into();
        self
    }

    /// Enables or disables the StartTLS upgrade after connecting.
    #[must_use]
    pub const fn with_start_tls(mut self, enabled: bool) -> Self {
        self.use_start_tls = enabled;
        self
    }

    /// Enables or disables server certificate verification during the upgrade.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_certificate = verify;
        self
    }

    /// Returns all configured server addresses.
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Returns the server address that will be dialled.
    #[must_use]
    pub fn primary_server(&self) -> Option<&str> {
        self.servers.first().map(String::as_str)
    }

    /// Returns the bind identity (usually a DN).
    #[must_use]
    pub fn bind_identity(&self) -> &str {
        &self.bind_identity
    }

    /// Returns the bind secret.
    #[must_use]
    pub const fn bind_secret(&self) -> &SecretString {
        &self.bind_secret
    }

    /// Returns true when a bind secret is present.
    #[must_use]
    pub fn has_bind_secret(&self) -> bool {
        !self.bind_secret.expose_secret().is_empty()
    }

    /// Returns true when both the identity and secret are present and a bind will be attempted.
    #[must_use]
    pub fn has_bind_credentials(&self) -> bool {
        !self.bind_identity.is_empty() && self.has_bind_secret()
    }

    /// Returns the search base distinguished name.
    #[must_use]
    pub fn search_base(&self) -> &str {
        &self.search_base
    }

    /// Returns whether the connection is upgraded with StartTLS.
    #[must_use]
    pub const fn use_start_tls(&self) -> bool {
        self.use_start_tls
    }

    /// Returns whether the server certificate is verified during the upgrade.
    #[must_use]
    pub const fn verify_certificate(&self) -> bool {
        self.verify_certificate
    }

    /// Returns true if no server address is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub(crate) fn set_servers(&mut self, servers: Vec<String>) {
        self.servers = servers;
    }

    pub(crate) fn set_bind_identity(&mut self, identity: String) {
        self.bind_identity = identity;
    }

    pub(crate) fn set_bind_secret(&mut self, secret: String) {
        self.bind_secret = SecretString::from(secret);
    }

    pub(crate) fn set_search_base(&mut self, search_base: String) {
        self.search_base = search_base;
    }

    pub(crate) fn set_start_tls(&mut self, enabled: bool) {
        self.use_start_tls = enabled;
    }

    pub(crate) fn set_tls_verification(&mut self, verify: bool) {
        self.verify_certificate = verify;
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            bind_identity: String::new(),
            bind_secret: SecretString::from(String::new()),
            search_base: String::new(),
            use_start_tls: false,
            verify_certificate: false,
        }
    }
}

impl Clone for DirectoryConfig {
    fn clone(&self) -> Self {
        Self {
            servers: self.servers.clone(),
            bind_identity: self.bind_identity.clone(),
            bind_secret: SecretString::from(self.bind_secret.expose_secret().to_owned()),
            search_base: self.search_base.clone(),
            use_start_tls: self.use_start_tls,
            verify_certificate: self.verify_certificate,
        }
    }
}

/// Partial configuration for one named environment, as written in the YAML file.
///
/// The bind secret is never stored inline; `password_file` points at a file holding it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentLayer {
    /// Server addresses, first one is dialled
    pub ldap_servers: Vec<String>,
    /// Bind identity
    pub username: String,
    /// Search base
    pub base_dn: String,
    /// Upgrade the connection with StartTLS
    pub use_start_tls: bool,
    /// Verify the server certificate during the upgrade
    pub verify_ssl: bool,
    /// Optional path to a file containing the bind secret (`~` expands to the home directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,
}

impl EnvironmentLayer {
    /// Converts the layer into a configuration without a bind secret.
    #[must_use]
    pub fn to_config(&self) -> DirectoryConfig {
        DirectoryConfig::default()
            .with_servers(self.ldap_servers.clone())
            .with_bind_credentials(self.username.clone(), String::new())
            .with_search_base(self.base_dn.clone())
            .with_start_tls(self.use_start_tls)
            .with_tls_verification(self.verify_ssl)
    }
}

/// Structured configuration document keyed by environment name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Environment layers by name (`local`, `dev`, `prod`, ...)
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentLayer>,
}

impl ConfigFile {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the document is not valid YAML or has the wrong shape.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Reads and parses a YAML document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            Error::ConfigError(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Returns the layer for the named environment, if present.
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&EnvironmentLayer> {
        self.environments.get(name)
    }
}
