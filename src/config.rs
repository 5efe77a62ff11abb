// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading for the DDI agent.
//!
//! The DDI state machine itself only ever sees the fully-resolved, immutable
//! [`Config`]. Everything in this module — the TOML file shape, CLI overlay,
//! and validation — is ambient scaffolding around it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Authorization token configured for this controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `Authorization: TargetToken <t>` — takes precedence over a gateway token.
    Target(String),
    /// `Authorization: GatewayToken <t>`.
    Gateway(String),
}

/// Immutable, process-wide agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host, e.g. `"hawkbit.example.com:8080"`.
    pub host: String,
    /// Tenant id.
    pub tenant_id: String,
    /// This controller's id.
    pub controller_id: String,
    /// Use `https://` instead of `http://`.
    pub tls: bool,
    /// Verify the TLS peer certificate and hostname.
    pub verify_tls: bool,
    /// Authorization token, if any.
    pub token: Option<Token>,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Overall per-request timeout.
    pub request_timeout: Duration,
    /// Fallback poll interval used whenever the server doesn't suggest one.
    pub retry_wait: Duration,
    /// Local path the downloaded bundle is written to.
    pub bundle_download_location: PathBuf,
    /// Reboot after a successful install.
    pub post_update_reboot: bool,
    /// Free-form device attributes sent at identify time.
    pub device: BTreeMap<String, String>,
    /// Exit after a single poll cycle instead of looping forever.
    pub run_once: bool,
}

impl Config {
    /// `https` if [`Config::tls`], else `http`.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }

    /// Build `<scheme>://<host>/<tenant>/controller/v1/<controller_id>[/<sub_path>]`.
    ///
    /// With no `sub_path`, the result has no trailing slash.
    #[must_use]
    pub fn controller_url(&self, sub_path: Option<&str>) -> String {
        let base = format!(
            "{}://{}/{}/controller/v1/{}",
            self.scheme(),
            self.host,
            self.tenant_id,
            self.controller_id
        );
        match sub_path {
            Some(p) if !p.is_empty() => format!("{base}/{p}"),
            _ => base,
        }
    }

    /// `Authorization` header value, honoring target-over-gateway precedence.
    #[must_use]
    pub fn auth_header(&self) -> Option<String> {
        match &self.token {
            Some(Token::Target(t)) => Some(format!("TargetToken {t}")),
            Some(Token::Gateway(t)) => Some(format!("GatewayToken {t}")),
            None => None,
        }
    }

    /// Name of whichever token kind is configured, for diagnostics (§4.E step 2).
    #[must_use]
    pub fn token_kind(&self) -> &'static str {
        match &self.token {
            Some(Token::Target(_)) => "target token",
            Some(Token::Gateway(_)) => "gateway token",
            None => "no token",
        }
    }
}

/// Errors that can occur while loading configuration. Never routed through
/// [`crate::error::AgentError`] — a bad config aborts startup directly.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was requested.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was requested.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A required field was missing after merging file + CLI overrides.
    #[error("missing required config field: {0}")]
    MissingField(&'static str),

    /// Both a target and gateway token were rejected by stricter validation
    /// (currently unused — target wins silently — kept for future policy).
    #[error("conflicting token configuration: {0}")]
    ConflictingTokens(String),
}

/// On-disk TOML shape. Every field is optional so it can be entirely
/// overridden from the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConfigFile {
    pub host: Option<String>,
    pub tenant_id: Option<String>,
    pub controller_id: Option<String>,
    pub tls: Option<bool>,
    pub verify_tls: Option<bool>,
    pub target_token: Option<String>,
    pub gateway_token: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub retry_wait_secs: Option<u64>,
    pub bundle_download_location: Option<PathBuf>,
    pub post_update_reboot: Option<bool>,
    #[serde(default)]
    pub device: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Load and parse a TOML config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Merge CLI overrides on top of this file (CLI wins), then validate
    /// into an immutable [`Config`].
    pub fn resolve(mut self, overrides: CliOverrides) -> Result<Config, ConfigError> {
        if let Some(v) = overrides.tls {
            self.tls = Some(v);
        }
        if overrides.run_once {
            // run_once has no file-side counterpart; handled separately below.
        }

        let host = self.host.ok_or(ConfigError::MissingField("host"))?;
        let tenant_id = self
            .tenant_id
            .ok_or(ConfigError::MissingField("tenant_id"))?;
        let controller_id = self
            .controller_id
            .ok_or(ConfigError::MissingField("controller_id"))?;

        let token = match (self.target_token, self.gateway_token) {
            (Some(t), _) => Some(Token::Target(t)),
            (None, Some(g)) => Some(Token::Gateway(g)),
            (None, None) => None,
        };

        Ok(Config {
            host,
            tenant_id,
            controller_id,
            tls: self.tls.unwrap_or(true),
            verify_tls: self.verify_tls.unwrap_or(true),
            token,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.unwrap_or(10)),
            request_timeout: Duration::from_secs(self.request_timeout_secs.unwrap_or(30)),
            retry_wait: Duration::from_secs(self.retry_wait_secs.unwrap_or(30)),
            bundle_download_location: self
                .bundle_download_location
                .unwrap_or_else(|| PathBuf::from("/tmp/hawkbit-bundle")),
            post_update_reboot: self.post_update_reboot.unwrap_or(false),
            device: self.device,
            run_once: overrides.run_once,
        })
    }
}

/// CLI-sourced overrides merged on top of the TOML file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Force TLS on/off regardless of the file.
    pub tls: Option<bool>,
    /// Exit after one poll cycle.
    pub run_once: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_file() -> ConfigFile {
        ConfigFile {
            host: Some("hawkbit.example.com".into()),
            tenant_id: Some("DEFAULT".into()),
            controller_id: Some("dev-1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_host_is_rejected() {
        let file = ConfigFile::default();
        let err = file.resolve(CliOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("host")));
    }

    #[test]
    fn target_token_wins_over_gateway_token() {
        let mut file = minimal_file();
        file.target_token = Some("tgt".into());
        file.gateway_token = Some("gw".into());
        let config = file.resolve(CliOverrides::default()).unwrap();
        assert_eq!(config.auth_header().as_deref(), Some("TargetToken tgt"));
    }

    #[test]
    fn gateway_token_used_when_no_target_token() {
        let mut file = minimal_file();
        file.gateway_token = Some("gw".into());
        let config = file.resolve(CliOverrides::default()).unwrap();
        assert_eq!(config.auth_header().as_deref(), Some("GatewayToken gw"));
    }

    #[test]
    fn no_token_yields_no_auth_header() {
        let config = minimal_file().resolve(CliOverrides::default()).unwrap();
        assert_eq!(config.auth_header(), None);
    }

    #[test]
    fn scheme_follows_tls_flag() {
        let mut file = minimal_file();
        file.tls = Some(false);
        let config = file.resolve(CliOverrides::default()).unwrap();
        assert_eq!(config.scheme(), "http");
        assert!(config.controller_url(None).starts_with("http://"));
    }

    #[test]
    fn cli_tls_override_wins_over_file() {
        let mut file = minimal_file();
        file.tls = Some(false);
        let overrides = CliOverrides {
            tls: Some(true),
            run_once: false,
        };
        let config = file.resolve(overrides).unwrap();
        assert!(config.tls);
    }

    #[test]
    fn controller_url_has_no_trailing_slash_with_no_sub_path() {
        let config = minimal_file().resolve(CliOverrides::default()).unwrap();
        assert_eq!(
            config.controller_url(None),
            "https://hawkbit.example.com/DEFAULT/controller/v1/dev-1"
        );
    }

    #[test]
    fn controller_url_appends_fragment() {
        let config = minimal_file().resolve(CliOverrides::default()).unwrap();
        assert_eq!(
            config.controller_url(Some("deploymentBase/abc/feedback")),
            "https://hawkbit.example.com/DEFAULT/controller/v1/dev-1/deploymentBase/abc/feedback"
        );
    }
}
