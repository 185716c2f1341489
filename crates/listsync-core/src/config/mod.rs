//! Runtime configuration.
//!
//! [`GraphConfig`] carries the Microsoft Graph credentials and endpoints, read
//! from the environment. [`SyncOptions`] carries the per-run reconciliation
//! switches.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::DiffOptions;
use crate::util::is_http_url;

const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Credentials and endpoints for a SharePoint site reached through Microsoft Graph.
#[derive(Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub site_id: String,
    pub graph_base_url: String,
    pub login_base_url: String,
    /// Mutating calls issued between forced token refreshes.
    pub token_refresh_rows: u64,
    pub http_timeout: Duration,
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GraphConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("site_id", &self.site_id)
            .field("graph_base_url", &self.graph_base_url)
            .field("login_base_url", &self.login_base_url)
            .field("token_refresh_rows", &self.token_refresh_rows)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl GraphConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let client_id = required_trimmed(&lookup, "CLIENT_ID")?;
        let client_secret = required_trimmed(&lookup, "CLIENT_SECRET")?;
        let tenant_id = required_trimmed(&lookup, "TENANT_ID")?;
        let site_id = required_trimmed(&lookup, "SITE_ID")?;

        let graph_base_url = http_url_or_default(
            &lookup,
            "LISTSYNC_GRAPH_BASE_URL",
            DEFAULT_GRAPH_BASE_URL,
        )?;
        let login_base_url = http_url_or_default(
            &lookup,
            "LISTSYNC_LOGIN_BASE_URL",
            DEFAULT_LOGIN_BASE_URL,
        )?;

        let token_refresh_rows = value_or_default(&lookup, "LISTSYNC_TOKEN_REFRESH_ROWS", "2000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "LISTSYNC_TOKEN_REFRESH_ROWS must be an integer in [1, 100000]".to_string(),
                )
            })?;
        if !(1..=100_000).contains(&token_refresh_rows) {
            return Err(ConfigError::Invalid(
                "LISTSYNC_TOKEN_REFRESH_ROWS must be in [1, 100000]".to_string(),
            ));
        }

        let http_timeout_secs = value_or_default(&lookup, "LISTSYNC_HTTP_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "LISTSYNC_HTTP_TIMEOUT_SECS must be an integer in [1, 600]".to_string(),
                )
            })?;
        if !(1..=600).contains(&http_timeout_secs) {
            return Err(ConfigError::Invalid(
                "LISTSYNC_HTTP_TIMEOUT_SECS must be in [1, 600]".to_string(),
            ));
        }

        Ok(Self {
            client_id,
            client_secret,
            tenant_id,
            site_id,
            graph_base_url,
            login_base_url,
            token_refresh_rows,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }

    /// Graph URL of the configured site, e.g. `https://graph.microsoft.com/v1.0/sites/{id}`.
    #[must_use]
    pub fn site_url(&self) -> String {
        format!(
            "{}/sites/{}",
            self.graph_base_url,
            urlencoding::encode(&self.site_id)
        )
    }

    /// OAuth2 token endpoint of the configured tenant.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base_url,
            urlencoding::encode(&self.tenant_id)
        )
    }
}

/// Switches for one synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncOptions {
    /// Ordered key columns used to build the primary key.
    pub key_columns: Vec<String>,
    /// Delete remote rows whose key is absent from the desired table.
    #[serde(default = "default_true")]
    pub allow_delete: bool,
    /// Create remote rows for keys only present in the desired table.
    #[serde(default = "default_true")]
    pub allow_insert: bool,
    /// Delete every remote row that shares its key with another remote row.
    #[serde(default)]
    pub purge_duplicate_remote: bool,
    /// Reject desired columns that the remote list does not declare.
    #[serde(default)]
    pub strict_columns: bool,
    /// Remote calls kept in flight while applying changes.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

const fn default_true() -> bool {
    true
}

const fn default_concurrency() -> usize {
    1
}

impl SyncOptions {
    pub fn new<S: AsRef<str>>(key_columns: &[S]) -> Self {
        Self {
            key_columns: key_columns
                .iter()
                .map(|column| column.as_ref().to_string())
                .collect(),
            allow_delete: true,
            allow_insert: true,
            purge_duplicate_remote: false,
            strict_columns: false,
            concurrency: default_concurrency(),
        }
    }

    /// Read options from a JSON file such as
    /// `{ "key_columns": ["Nombre"], "allow_delete": false }`.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    #[must_use]
    pub const fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            allow_delete: self.allow_delete,
            allow_insert: self.allow_insert,
        }
    }
}

fn http_url_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    let value = value_or_default(lookup, name, default);
    if !is_http_url(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must start with http:// or https://"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    crate::util::normalize_text_option(lookup(name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        let mut map = HashMap::new();
        map.insert("CLIENT_ID", "client");
        map.insert("CLIENT_SECRET", "sensitive-client-secret");
        map.insert("TENANT_ID", "tenant");
        map.insert("SITE_ID", "contoso.sharepoint.com,abc,def");
        map
    }

    fn load(map: &HashMap<&str, &str>) -> Result<GraphConfig, ConfigError> {
        GraphConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_requires_credentials() {
        let map: HashMap<&str, &str> = HashMap::new();
        let err = load(&map).unwrap_err();
        assert!(err.to_string().contains("CLIENT_ID"));
    }

    #[test]
    fn config_applies_defaults() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.graph_base_url, DEFAULT_GRAPH_BASE_URL);
        assert_eq!(config.token_refresh_rows, 2_000);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
        assert_eq!(
            config.site_url(),
            "https://graph.microsoft.com/v1.0/sites/contoso.sharepoint.com%2Cabc%2Cdef"
        );
    }

    #[test]
    fn config_rejects_out_of_range_refresh_cadence() {
        let mut map = base_vars();
        map.insert("LISTSYNC_TOKEN_REFRESH_ROWS", "0");
        let err = load(&map).unwrap_err();
        assert!(err.to_string().contains("LISTSYNC_TOKEN_REFRESH_ROWS"));
    }

    #[test]
    fn config_rejects_non_http_base_url() {
        let mut map = base_vars();
        map.insert("LISTSYNC_GRAPH_BASE_URL", "graph.local");
        assert!(load(&map).is_err());
    }

    #[test]
    fn config_redacts_client_secret() {
        let config = load(&base_vars()).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-client-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn sync_options_defaults_from_json() {
        let options: SyncOptions =
            serde_json::from_str(r#"{ "key_columns": ["Nombre", "Apellido"] }"#).unwrap();
        assert_eq!(options, SyncOptions::new(&["Nombre", "Apellido"]));
        assert!(options.allow_delete && options.allow_insert);
        assert_eq!(options.concurrency, 1);
    }

    #[test]
    fn sync_options_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "key_columns": ["Nombre"], "allow_delete": false, "concurrency": 4 }}"#
        )
        .unwrap();

        let options = SyncOptions::from_file(file.path()).unwrap();
        assert_eq!(options.key_columns, ["Nombre"]);
        assert!(!options.allow_delete);
        assert_eq!(options.concurrency, 4);
    }

    #[test]
    fn sync_options_file_errors_are_typed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "key_columns": ["Nombre"], "unknown": 1 }}"#).unwrap();
        assert!(matches!(
            SyncOptions::from_file(file.path()),
            Err(crate::Error::Serialization(_))
        ));

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            SyncOptions::from_file(missing),
            Err(crate::Error::Io(_))
        ));
    }
}
