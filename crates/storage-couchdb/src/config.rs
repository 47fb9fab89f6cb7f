//! Configuration for the CouchDB storage backend.
//!
//! [`CouchDbConfig`] carries the server location, the database name and two
//! credential pairs: the application credentials used for document CRUD and
//! the admin credentials used only while provisioning.

use std::{fmt, time::Duration};

use idp_storage::ConfigError;
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for [`CouchDbBackend`](crate::CouchDbBackend).
///
/// Passwords are held in [`Zeroizing`] buffers, are never serialized and are
/// redacted from `Debug` output.
///
/// # Example
///
/// ```
/// use idp_storage_couchdb::CouchDbConfig;
///
/// let config = CouchDbConfig::builder()
///     .url("http://localhost:5984")
///     .database("idp")
///     .username("idp")
///     .password("secret")
///     .build()?;
/// assert_eq!(config.database(), "idp");
/// # Ok::<(), idp_storage::ConfigError>(())
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouchDbConfig {
    /// Server base URL, e.g. `http://localhost:5984`.
    pub(crate) url: Url,

    /// Database holding every document.
    pub(crate) database: String,

    /// Application user for document operations.
    #[serde(default)]
    pub(crate) username: Option<String>,

    #[serde(default, skip_serializing)]
    pub(crate) password: Option<Zeroizing<String>>,

    /// Server admin used to create the database and its design documents.
    #[serde(default)]
    pub(crate) admin_username: Option<String>,

    #[serde(default, skip_serializing)]
    pub(crate) admin_password: Option<Zeroizing<String>>,

    /// Member granted access by the security document.
    #[serde(default)]
    pub(crate) service_account: Option<String>,

    /// Request timeout.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub(crate) timeout: Duration,

    /// Connection timeout.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub(crate) connect_timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl fmt::Debug for CouchDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &Option<Zeroizing<String>>| secret.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("CouchDbConfig")
            .field("url", &self.url.as_str())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("admin_username", &self.admin_username)
            .field("admin_password", &redact(&self.admin_password))
            .field("service_account", &self.service_account)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[bon::bon]
impl CouchDbConfig {
    /// Creates a new configuration, validating all required fields.
    ///
    /// # Optional Fields
    ///
    /// * `username` / `password` - Application credentials (default: anonymous).
    /// * `admin_username` / `admin_password` - Required only for provisioning.
    /// * `service_account` - Member written into the security document.
    /// * `timeout` - Request timeout (default: 30 seconds).
    /// * `connect_timeout` - Connection timeout (default: 5 seconds).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if:
    /// - `url` does not parse or is not `http`/`https`
    /// - `database` is empty or not a legal CouchDB database name
    /// - a timeout is zero
    #[builder]
    pub fn new(
        #[builder(into)] url: String,
        #[builder(into)] database: String,
        #[builder(into)] username: Option<String>,
        #[builder(with = |password: impl Into<String>| Zeroizing::new(password.into()))]
        password: Option<Zeroizing<String>>,
        #[builder(into)] admin_username: Option<String>,
        #[builder(with = |password: impl Into<String>| Zeroizing::new(password.into()))]
        admin_password: Option<Zeroizing<String>>,
        #[builder(into)] service_account: Option<String>,
        #[builder(default = DEFAULT_TIMEOUT)] timeout: Duration,
        #[builder(default = DEFAULT_CONNECT_TIMEOUT)] connect_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let url = Url::parse(&url)
            .map_err(|e| ConfigError::Invalid { field: "url", reason: e.to_string() })?;
        let config = Self {
            url,
            database,
            username,
            password,
            admin_username,
            admin_password,
            service_account,
            timeout,
            connect_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// Deserialized configurations bypass the builder and must call this.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.url.scheme(), "http" | "https") || self.url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                field: "url",
                reason: format!("expected an http(s) base URL, got '{}'", self.url),
            });
        }
        validate_database_name(&self.database)?;
        if self.service_account.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Missing { field: "service_account" });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::MustBePositive {
                field: "timeout",
                value: format!("{:?}", self.timeout),
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::MustBePositive {
                field: "connect_timeout",
                value: format!("{:?}", self.connect_timeout),
            });
        }
        Ok(())
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the service account written into the security document.
    #[must_use]
    pub fn service_account(&self) -> Option<&str> {
        self.service_account.as_deref()
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns `true` if both admin username and password are set.
    #[must_use]
    pub fn has_admin_credentials(&self) -> bool {
        self.admin_username.as_deref().is_some_and(|u| !u.is_empty())
            && self.admin_password.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub(crate) fn credentials(&self) -> Option<(&str, &str)> {
        pair(self.username.as_deref(), self.password.as_ref())
    }

    pub(crate) fn admin_credentials(&self) -> Option<(&str, &str)> {
        pair(self.admin_username.as_deref(), self.admin_password.as_ref())
    }
}

fn pair<'a>(
    user: Option<&'a str>,
    password: Option<&'a Zeroizing<String>>,
) -> Option<(&'a str, &'a str)> {
    Some((user?, password?.as_str()))
}

/// CouchDB database names start with a lower-case letter and may contain
/// lower-case letters, digits and `_$()+-/`.
fn validate_database_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(ConfigError::Missing { field: "database" });
    };
    let legal = first.is_ascii_lowercase()
        && chars.all(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || matches!(c, '_' | '$' | '(' | ')' | '+' | '-' | '/')
        });
    if legal {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field: "database",
            reason: format!("'{name}' is not a legal CouchDB database name"),
        })
    }
}
