//! Directory connection establishment and user lookup.

use crate::{
    filter::{extract_hostname, identifier_filter},
    Result,
};
use async_trait::async_trait;
use dirlookup_core::user::USER_ATTRIBUTES;
use dirlookup_core::{DirectoryConfig, Error, Identifier, UserRecord};
use ldap3::{
    DerefAliases, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, SearchOptions,
    SearchResult,
};
use native_tls::TlsConnector;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

const SUPPORTED_SCHEMES: &[&str] = &["ldap", "ldaps"];

/// LDAP entry representation used by the client.
#[derive(Debug, Clone, Default)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values preserved order from server).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Maps the entry onto a [`UserRecord`], leaving absent attributes empty.
    #[must_use]
    pub fn to_user_record(&self) -> UserRecord {
        UserRecord::from_attributes(|attribute| self.first(attribute))
    }
}

/// Address to dial and the optional StartTLS upgrade to perform on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DialTarget {
    pub(crate) url: String,
    pub(crate) start_tls: Option<TlsUpgrade>,
}

/// Scope, alias handling and limits sent with a search request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchSettings {
    pub(crate) scope: Scope,
    pub(crate) deref: DerefAliases,
    pub(crate) size_limit: i32,
    pub(crate) time_limit: i32,
}

impl SearchSettings {
    /// Whole subtree, aliases never dereferenced, no client-imposed limits.
    pub(crate) const USER_LOOKUP: Self = Self {
        scope: Scope::Subtree,
        deref: DerefAliases::Never,
        size_limit: 0,
        time_limit: 0,
    };

    fn options(self) -> SearchOptions {
        SearchOptions::new()
            .deref(self.deref)
            .sizelimit(self.size_limit)
            .timelimit(self.time_limit)
    }
}

/// Parameters of the in-protocol encrypted upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TlsUpgrade {
    pub(crate) server_name: String,
    pub(crate) verify: bool,
}

impl DialTarget {
    fn from_config(address: &str, config: &DirectoryConfig) -> Result<Self> {
        let url = dial_url(address)?;
        let start_tls = config.use_start_tls().then(|| TlsUpgrade {
            server_name: extract_hostname(address).to_string(),
            verify: config.verify_certificate(),
        });
        Ok(Self { url, start_tls })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;
    async fn search(
        &mut self,
        base_dn: &str,
        settings: SearchSettings,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>>;
    async fn unbind(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self, target: &DialTarget) -> Result<Box<dyn LdapSession>>;
}

/// A directory connection bound to one configuration.
///
/// The searcher owns its connection exclusively. Lookups take `&mut self`, so a single
/// connection never serves overlapping searches; use one searcher per concurrent caller.
pub struct Searcher {
    config: DirectoryConfig,
    session: Option<Box<dyn LdapSession>>,
}

impl Searcher {
    /// Establishes a connection described by `config`.
    ///
    /// With no server configured this returns a searcher without a connection, whose lookups
    /// fail with [`Error::NotConnected`]. Otherwise the first server is dialled, upgraded with
    /// StartTLS when enabled, and bound when both identity and secret are present. Nothing is
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionError`], [`Error::TlsError`] or [`Error::AuthError`] for the
    /// step that failed. The connection is closed before any error is returned.
    pub async fn connect(config: DirectoryConfig) -> Result<Self> {
        Self::connect_with(config, &RealLdapConnector).await
    }

    /// Validates that `config` names a server and carries a password, then connects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingServerUrl`] or [`Error::MissingPassword`] before dialling, or
    /// any error from [`Searcher::connect`].
    pub async fn connect_with_defaults(config: DirectoryConfig) -> Result<Self> {
        validate_for_defaults(&config)?;
        Self::connect(config).await
    }

    pub(crate) async fn connect_with(
        config: DirectoryConfig,
        connector: &dyn LdapConnector,
    ) -> Result<Self> {
        let Some(address) = config.primary_server() else {
            debug!("no directory server configured, searcher will stay disconnected");
            return Ok(Self {
                config,
                session: None,
            });
        };

        let target = DialTarget::from_config(address, &config)?;
        if let Some(upgrade) = &target.start_tls {
            debug!(
                url = %target.url,
                server_name = %upgrade.server_name,
                verify = upgrade.verify,
                "dialling directory server with StartTLS"
            );
        } else {
            debug!(url = %target.url, "dialling directory server");
        }

        let mut session = connector.connect(&target).await?;

        if config.has_bind_credentials() {
            let bound = session
                .simple_bind(
                    config.bind_identity(),
                    config.bind_secret().expose_secret(),
                )
                .await;
            if let Err(err) = bound {
                if let Err(unbind_err) = session.unbind().await {
                    warn!("failed to close connection after bind failure: {unbind_err}");
                }
                return Err(err);
            }
        }

        info!(
            url = %target.url,
            start_tls = target.start_tls.is_some(),
            bound = config.has_bind_credentials(),
            "connected to directory server"
        );

        Ok(Self {
            config,
            session: Some(session),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_session(config: DirectoryConfig, session: Box<dyn LdapSession>) -> Self {
        Self {
            config,
            session: Some(session),
        }
    }

    /// Returns the configuration this searcher was built from.
    #[must_use]
    pub const fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns true while the searcher holds a live connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Looks up exactly one user entry under the configured search base.
    ///
    /// The whole subtree is searched without dereferencing aliases. When several entries match,
    /// the first one returned by the server is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without any I/O when there is no connection,
    /// [`Error::InvalidIdentifier`] for an empty value, [`Error::NotFound`] carrying the
    /// searched value when nothing matches, or [`Error::SearchError`] when the request fails.
    pub async fn get_user(&mut self, identifier: &Identifier) -> Result<UserRecord> {
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;
        identifier.validate()?;

        let filter = identifier_filter(identifier);
        debug!(base = %self.config.search_base(), %filter, "searching directory");
        let entries = session
            .search(
                self.config.search_base(),
                SearchSettings::USER_LOOKUP,
                &filter,
                USER_ATTRIBUTES,
            )
            .await?;

        if entries.len() > 1 {
            debug!(
                matches = entries.len(),
                "multiple entries matched, using the first"
            );
        }

        let entry = entries
            .first()
            .ok_or_else(|| Error::NotFound(identifier.value.clone()))?;
        debug!(dn = %entry.dn, "matched directory entry");
        Ok(entry.to_user_record())
    }

    /// Unbinds and releases the connection. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the unbind request could not be sent; the connection is released
    /// either way.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.unbind().await?;
            debug!("directory connection closed");
        }
        Ok(())
    }
}

impl fmt::Debug for Searcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searcher")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn validate_for_defaults(config: &DirectoryConfig) -> Result<()> {
    if config.primary_server().map_or(true, str::is_empty) {
        return Err(Error::MissingServerUrl);
    }
    if !config.has_bind_secret() {
        return Err(Error::MissingPassword);
    }
    Ok(())
}

/// Normalizes a server address into an LDAP URL, defaulting to the `ldap` scheme.
fn dial_url(address: &str) -> Result<String> {
    let connection_error = |message: String| Error::ConnectionError {
        address: address.to_string(),
        message,
    };

    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(connection_error("empty server address".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("ldap://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|err| connection_error(err.to_string()))?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(connection_error(format!(
            "unsupported scheme `{}`",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(connection_error("missing host".to_string()));
    }

    Ok(candidate)
}

/// Real LDAP connector backed by `ldap3`.
struct RealLdapConnector;

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self, target: &DialTarget) -> Result<Box<dyn LdapSession>> {
        let settings = build_ldap_settings(target)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &target.url)
            .await
            .map_err(|err| map_connect_error(target, &err))?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession {
            inner: ldap,
            url: target.url.clone(),
        }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
    url: String,
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        self.inner
            .simple_bind(dn, password)
            .await
            .and_then(ldap3::LdapResult::success)
            .map_err(|err| Error::AuthError(err.to_string()))?;
        Ok(())
    }

    async fn search(
        &mut self,
        base_dn: &str,
        settings: SearchSettings,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>> {
        let (entries, _) = self
            .inner
            .with_search_options(settings.options())
            .search(base_dn, settings.scope, filter, attributes.to_vec())
            .await
            .and_then(SearchResult::success)
            .map_err(|err| Error::SearchError(err.to_string()))?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| LdapEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn unbind(&mut self) -> Result<()> {
        self.inner
            .unbind()
            .await
            .map_err(|err| Error::ConnectionError {
                address: self.url.clone(),
                message: err.to_string(),
            })
    }
}

fn build_ldap_settings(target: &DialTarget) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new();

    if let Some(upgrade) = &target.start_tls {
        settings = settings.set_starttls(true);
        if !upgrade.verify {
            let connector = TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|err| {
                    Error::TlsError(format!("failed to construct TLS connector: {err}"))
                })?;
            settings = settings.set_connector(connector).set_no_tls_verify(true);
        }
    }

    Ok(settings)
}

/// Splits dial failures into TLS upgrade failures and plain connection failures.
///
/// With StartTLS requested, a TLS handshake error or a rejected StartTLS extended operation
/// means the socket was open and the upgrade failed.
fn map_connect_error(target: &DialTarget, err: &LdapError) -> Error {
    let upgrade_failed = target.start_tls.is_some()
        && matches!(err, LdapError::NativeTLS { .. } | LdapError::LdapResult { .. });

    if upgrade_failed {
        Error::TlsError(err.to_string())
    } else {
        Error::ConnectionError {
            address: target.url.clone(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> DirectoryConfig {
        DirectoryConfig::new("ldap://test:389")
            .with_bind_credentials("uid=svc,dc=example,dc=com", "secret")
            .with_search_base("dc=example,dc=com")
    }

    fn entry(pairs: &[(&str, &str)]) -> LdapEntry {
        let attributes = pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), vec![(*value).to_string()]))
            .collect();
        LdapEntry {
            dn: "uid=jdoe,ou=users,dc=example,dc=com".to_string(),
            attributes,
        }
    }

    fn jdoe() -> LdapEntry {
        entry(&[("uid", "jdoe"), ("mail", "jdoe@example.com"), ("cn", "John Doe")])
    }

    #[tokio::test]
    async fn empty_config_yields_disconnected_searcher() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().never();

        let mut searcher = Searcher::connect_with(DirectoryConfig::default(), &connector)
            .await
            .unwrap();
        assert!(!searcher.is_connected());

        searcher.close().await.unwrap();
        searcher.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_user_without_connection_is_not_connected() {
        let mut searcher = Searcher::connect(DirectoryConfig::default()).await.unwrap();
        let err = searcher
            .get_user(&Identifier::login_name("jdoe"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::NotConnected);
        assert_eq!(err.to_string(), "LDAP connection not established");
    }

    #[tokio::test]
    async fn anonymous_connect_skips_bind() {
        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .withf(|target| target.url == "ldap://test:389" && target.start_tls.is_none())
            .times(1)
            .returning(|_| {
                let mut session = MockLdapSession::new();
                session.expect_simple_bind().never();
                Ok(Box::new(session))
            });

        let config = DirectoryConfig::new("ldap://test:389").with_search_base("dc=example,dc=com");
        let searcher = Searcher::connect_with(config, &connector).await.unwrap();
        assert!(searcher.is_connected());
    }

    #[tokio::test]
    async fn binds_with_configured_credentials() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().times(1).returning(|_| {
            let mut session = MockLdapSession::new();
            session
                .expect_simple_bind()
                .withf(|dn, password| dn == "uid=svc,dc=example,dc=com" && password == "secret")
                .times(1)
                .returning(|_, _| Ok(()));
            Ok(Box::new(session))
        });

        let searcher = Searcher::connect_with(sample_config(), &connector)
            .await
            .unwrap();
        assert!(searcher.is_connected());
    }

    #[tokio::test]
    async fn bind_failure_closes_connection() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().times(1).returning(|_| {
            let mut session = MockLdapSession::new();
            session
                .expect_simple_bind()
                .returning(|_, _| Err(Error::AuthError("invalid credentials".to_string())));
            session.expect_unbind().times(1).returning(|| Ok(()));
            Ok(Box::new(session))
        });

        let err = Searcher::connect_with(sample_config(), &connector)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthError(_)));
    }

    #[tokio::test]
    async fn start_tls_target_uses_extracted_hostname() {
        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .withf(|target| {
                target.url == "ldap://ldap.example.com:389"
                    && target.start_tls
                        == Some(TlsUpgrade {
                            server_name: "ldap.example.com".to_string(),
                            verify: false,
                        })
            })
            .times(1)
            .returning(|_| Err(Error::TlsError("handshake failure".to_string())));

        let config = DirectoryConfig::new("ldap://ldap.example.com:389").with_start_tls(true);
        let err = Searcher::connect_with(config, &connector)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TlsError(_)));
    }

    #[tokio::test]
    async fn dial_failure_is_connection_error() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().returning(|target| {
            Err(Error::ConnectionError {
                address: target.url.clone(),
                message: "connection refused".to_string(),
            })
        });

        let err = Searcher::connect_with(sample_config(), &connector)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::ConnectionError { ref address, .. } if address == "ldap://test:389")
        );
    }

    #[tokio::test]
    async fn unsupported_scheme_fails_before_dialling() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().never();

        let config = DirectoryConfig::new("invalid://bad-url");
        let err = Searcher::connect_with(config, &connector)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::ConnectionError { ref address, .. } if address == "invalid://bad-url")
        );
    }

    #[tokio::test]
    async fn get_user_maps_first_entry() {
        let mut session = MockLdapSession::new();
        session
            .expect_search()
            .withf(|base, settings, filter, attributes| {
                base == "dc=example,dc=com"
                    && matches!(settings.scope, Scope::Subtree)
                    && matches!(settings.deref, DerefAliases::Never)
                    && settings.size_limit == 0
                    && settings.time_limit == 0
                    && filter == "(uid=jdoe)"
                    && attributes == USER_ATTRIBUTES
            })
            .times(1)
            .returning(|_, _, _, _| Ok(vec![jdoe()]));

        let config = DirectoryConfig::new("ldap://test:389").with_search_base("dc=example,dc=com");
        let mut searcher = Searcher::with_session(config, Box::new(session));
        let user = searcher
            .get_user(&Identifier::login_name("jdoe"))
            .await
            .unwrap();
        assert_eq!(user.uid, "jdoe");
        assert_eq!(user.email, "jdoe@example.com");
        assert_eq!(user.display_name, "John Doe");
        assert!(user.title.is_empty());
    }

    #[tokio::test]
    async fn get_user_by_email_uses_mail_filter() {
        let mut session = MockLdapSession::new();
        session
            .expect_search()
            .withf(|_, _, filter, _| filter == "(mail=jdoe@example.com)")
            .returning(|_, _, _, _| Ok(vec![jdoe()]));

        let mut searcher = Searcher::with_session(sample_config(), Box::new(session));
        let user = searcher
            .get_user(&Identifier::email_address("jdoe@example.com"))
            .await
            .unwrap();
        assert_eq!(user.uid, "jdoe");
    }

    #[tokio::test]
    async fn not_found_carries_unescaped_value() {
        let mut session = MockLdapSession::new();
        session
            .expect_search()
            .withf(|_, _, filter, _| filter == "(uid=a\\2a\\28b\\29)")
            .returning(|_, _, _, _| Ok(Vec::new()));

        let mut searcher = Searcher::with_session(sample_config(), Box::new(session));
        let err = searcher
            .get_user(&Identifier::login_name("a*(b)"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::NotFound("a*(b)".to_string()));
    }

    // Duplicate matches are tolerated: the directory is expected to keep uid/mail unique.
    #[tokio::test]
    async fn duplicate_matches_use_first_entry() {
        let mut session = MockLdapSession::new();
        session.expect_search().returning(|_, _, _, _| {
            Ok(vec![
                entry(&[("uid", "first")]),
                entry(&[("uid", "second")]),
            ])
        });

        let mut searcher = Searcher::with_session(sample_config(), Box::new(session));
        let user = searcher
            .get_user(&Identifier::login_name("dup"))
            .await
            .unwrap();
        assert_eq!(user.uid, "first");
    }

    #[tokio::test]
    async fn search_failure_propagates() {
        let mut session = MockLdapSession::new();
        session
            .expect_search()
            .returning(|_, _, _, _| Err(Error::SearchError("busy".to_string())));

        let mut searcher = Searcher::with_session(sample_config(), Box::new(session));
        let err = searcher
            .get_user(&Identifier::login_name("jdoe"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::SearchError("busy".to_string()));
    }

    #[tokio::test]
    async fn empty_identifier_is_rejected_without_search() {
        let mut session = MockLdapSession::new();
        session.expect_search().never();

        let mut searcher = Searcher::with_session(sample_config(), Box::new(session));
        let err = searcher
            .get_user(&Identifier::login_name(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn close_unbinds_once() {
        let mut session = MockLdapSession::new();
        session.expect_unbind().times(1).returning(|| Ok(()));

        let mut searcher = Searcher::with_session(sample_config(), Box::new(session));
        searcher.close().await.unwrap();
        assert!(!searcher.is_connected());
        searcher.close().await.unwrap();

        let err = searcher
            .get_user(&Identifier::login_name("jdoe"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::NotConnected);
    }

    #[tokio::test]
    async fn defaults_require_server_then_password() {
        let err = Searcher::connect_with_defaults(DirectoryConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, Error::MissingServerUrl);

        let err = Searcher::connect_with_defaults(
            DirectoryConfig::new("ldap://test:389").with_bind_credentials("uid=svc", ""),
        )
        .await
        .unwrap_err();
        assert_eq!(err, Error::MissingPassword);
    }

    #[test]
    fn dial_url_normalization() {
        assert_eq!(dial_url("ldap://host:389").unwrap(), "ldap://host:389");
        assert_eq!(dial_url("host:389").unwrap(), "ldap://host:389");
        assert_eq!(dial_url("ldaps://host").unwrap(), "ldaps://host");
        assert!(matches!(
            dial_url("   "),
            Err(Error::ConnectionError { .. })
        ));
        assert!(matches!(
            dial_url("http://host"),
            Err(Error::ConnectionError { .. })
        ));
        assert!(matches!(
            dial_url("ldapi://%2fvar%2frun%2fslapd.sock"),
            Err(Error::ConnectionError { .. })
        ));
    }

    #[test]
    fn dial_url_requires_host() {
        for address in ["ldap:///", "ldap://", "ldap:///dc=example,dc=com"] {
            let err = dial_url(address).unwrap_err();
            assert_eq!(
                err,
                Error::ConnectionError {
                    address: address.to_string(),
                    message: "missing host".to_string(),
                },
                "{address}"
            );
        }
    }

    #[tokio::test]
    async fn hostless_url_fails_before_dialling() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().never();

        let err = Searcher::connect_with(DirectoryConfig::new("ldap:///"), &connector)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionError { ref message, .. } if message == "missing host"));
    }

    #[test]
    fn entry_maps_missing_attributes_to_empty() {
        let record = entry(&[("uid", "jdoe"), ("rhatTermDate", "20240101000000Z")]).to_user_record();
        assert_eq!(record.uid, "jdoe");
        assert!(record.is_terminated());
        assert!(record.email.is_empty());
    }
}
