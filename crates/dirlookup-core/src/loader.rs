//! Layered configuration loading.
//!
//! Resolution order for a [`DirectoryConfig`]:
//!
//! 1. The YAML layer for the active environment, from the first candidate file that has one.
//!    A `password_file` in that layer supplies the first password candidate.
//! 2. `LDAP_URL`, `LDAP_BIND_DN` and `LDAP_BASE_DN` fully override the file values when set.
//! 3. If no password yet: `LDAP_PASSWORD_FILE`, then `LDAP_PASSWORD`, then
//!    `~/.secrets/ldap/password`.
//! 4. `LDAP_STARTTLS` and `LDAP_VERIFY_SSL` override the file flags only when present, and are
//!    true only for the literal `"true"`.
//!
//! Loading never fails. Missing or malformed files contribute nothing and an unusable result is
//! reported by whoever tries to connect with it.

use crate::config::{ConfigFile, DirectoryConfig, EnvironmentLayer};
use crate::environment::resolve_environment;
use crate::secret::{expand_home, read_secret_file};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Server URL override.
pub const LDAP_URL_VAR: &str = "LDAP_URL";
/// Bind identity override.
pub const LDAP_BIND_DN_VAR: &str = "LDAP_BIND_DN";
/// Search base override.
pub const LDAP_BASE_DN_VAR: &str = "LDAP_BASE_DN";
/// Direct bind password.
pub const LDAP_PASSWORD_VAR: &str = "LDAP_PASSWORD";
/// Path to a file holding the bind password.
pub const LDAP_PASSWORD_FILE_VAR: &str = "LDAP_PASSWORD_FILE";
/// StartTLS flag override.
pub const LDAP_STARTTLS_VAR: &str = "LDAP_STARTTLS";
/// Certificate verification flag override.
pub const LDAP_VERIFY_SSL_VAR: &str = "LDAP_VERIFY_SSL";

/// File name looked up in the working directory and its `configs/` subdirectory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolves a [`DirectoryConfig`] from files, secrets and environment variables.
///
/// The loader works on a snapshot of variables and a home directory so it can be driven either
/// by the process environment ([`ConfigLoader::from_env`]) or by explicit values.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    vars: HashMap<String, String>,
    home_dir: Option<PathBuf>,
    search_paths: Option<Vec<PathBuf>>,
    extra_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader from the current process environment and home directory.
    #[must_use]
    pub fn from_env() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self {
            vars,
            home_dir: dirs::home_dir(),
            search_paths: None,
            extra_paths: Vec::new(),
        }
    }

    /// Creates a loader from explicit variables and no home directory.
    #[must_use]
    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Overrides the home directory used for `~` expansion and per-user paths.
    #[must_use]
    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    /// Replaces the default candidate file list.
    #[must_use]
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Adds a candidate file tried before all others.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_paths.push(path.into());
        self
    }

    /// Returns the candidate configuration files in lookup order.
    #[must_use]
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let defaults = self.search_paths.clone().unwrap_or_else(|| {
            let mut paths = vec![
                PathBuf::from(CONFIG_FILE_NAME),
                Path::new("configs").join(CONFIG_FILE_NAME),
            ];
            if let Some(home) = &self.home_dir {
                paths.push(home.join(".config").join("ldap").join(CONFIG_FILE_NAME));
            }
            paths
        });

        self.extra_paths.iter().cloned().chain(defaults).collect()
    }

    /// Returns the active environment name.
    #[must_use]
    pub fn environment(&self) -> String {
        resolve_environment(|name| self.vars.get(name).cloned())
    }

    /// Resolves the full layered configuration.
    #[must_use]
    pub fn load(&self) -> DirectoryConfig {
        let environment = self.environment();
        let mut config = DirectoryConfig::default();
        let mut password = String::new();

        match self.find_layer(&environment) {
            Some((path, layer)) => {
                debug!(
                    path = %path.display(),
                    environment = %environment,
                    "using structured configuration"
                );
                config = layer.to_config();
                if let Some(secret_path) = layer.password_file.as_deref().filter(|p| !p.is_empty())
                {
                    password = read_secret_file(expand_home(secret_path, self.home_dir.as_deref()));
                }
            }
            None => debug!(environment = %environment, "no structured configuration found"),
        }

        if let Some(url) = self.var(LDAP_URL_VAR) {
            config.set_servers(vec![url.to_string()]);
        }
        if let Some(bind_dn) = self.var(LDAP_BIND_DN_VAR) {
            config.set_bind_identity(bind_dn.to_string());
        }
        if let Some(base_dn) = self.var(LDAP_BASE_DN_VAR) {
            config.set_search_base(base_dn.to_string());
        }

        if password.is_empty() {
            password = self.password_from_env();
        }
        if password.is_empty() {
            if let Some(path) = self.default_secret_path() {
                password = read_secret_file(path);
            }
        }
        config.set_bind_secret(password);

        if let Some(value) = self.var(LDAP_STARTTLS_VAR) {
            config.set_start_tls(value == "true");
        }
        if let Some(value) = self.var(LDAP_VERIFY_SSL_VAR) {
            config.set_tls_verification(value == "true");
        }

        config
    }

    /// Resolves a configuration from environment variables alone, ignoring files.
    ///
    /// Certificate verification stays on unless `LDAP_VERIFY_SSL` is exactly `"false"`.
    #[must_use]
    pub fn load_env_only(&self) -> DirectoryConfig {
        let servers = self
            .var(LDAP_URL_VAR)
            .map(|url| vec![url.to_string()])
            .unwrap_or_default();

        DirectoryConfig::default()
            .with_servers(servers)
            .with_bind_credentials(
                self.var(LDAP_BIND_DN_VAR).unwrap_or_default(),
                self.password_from_env(),
            )
            .with_search_base(self.var(LDAP_BASE_DN_VAR).unwrap_or_default())
            .with_start_tls(self.var(LDAP_STARTTLS_VAR) == Some("true"))
            .with_tls_verification(self.var(LDAP_VERIFY_SSL_VAR) != Some("false"))
    }

    /// Returns the password from `LDAP_PASSWORD_FILE`, falling back to `LDAP_PASSWORD`.
    ///
    /// Returns an empty string when neither yields a value.
    #[must_use]
    pub fn password_from_env(&self) -> String {
        if let Some(path) = self.var(LDAP_PASSWORD_FILE_VAR) {
            let password = read_secret_file(expand_home(path, self.home_dir.as_deref()));
            if !password.is_empty() {
                return password;
            }
        }
        self.var(LDAP_PASSWORD_VAR).unwrap_or_default().to_string()
    }

    fn find_layer(&self, environment: &str) -> Option<(PathBuf, EnvironmentLayer)> {
        self.candidate_paths().into_iter().find_map(|path| {
            if !path.is_file() {
                return None;
            }
            match ConfigFile::from_path(&path) {
                Ok(file) => {
                    let layer = file.environment(environment).cloned();
                    if layer.is_none() {
                        debug!(
                            path = %path.display(),
                            environment = %environment,
                            "environment not present in configuration file"
                        );
                    }
                    layer.map(|layer| (path, layer))
                }
                Err(err) => {
                    warn!(path = %path.display(), "ignoring configuration file: {err}");
                    None
                }
            }
        })
    }

    fn default_secret_path(&self) -> Option<PathBuf> {
        self.home_dir
            .as_ref()
            .map(|home| home.join(".secrets").join("ldap").join("password"))
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Loads the layered configuration from the process environment.
#[must_use]
pub fn load_config() -> DirectoryConfig {
    ConfigLoader::from_env().load()
}
