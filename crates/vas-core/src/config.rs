//! Sample configuration: an optional TOML file, overridden by CLI flags.
//!
//! ```toml
//! server = "vcenter.lab.local"
//! username = "administrator@vsphere.local"
//! password = "..."
//! skip_server_verification = true
//!
//! [sso]
//! enabled = true
//! sts_path = "/sts/STSService/vsphere.local"
//!
//! [poll]
//! interval_secs = 2
//! timeout_secs = 600
//! ```

use crate::error::{VasError, VasResult};
use crate::exchange::{DirectCredentials, ExchangeRequest, FederatedCredentials};
use crate::sso::DEFAULT_STS_PATH;
use crate::task::PollSettings;
use crate::types::TransportConfig;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Identity-provider (STS) settings for the federated login path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SsoConfig {
    /// Log in through the STS instead of directly
    pub enabled: bool,
    /// Explicit STS endpoint; otherwise `https://{server}{sts_path}`
    pub url: Option<String>,
    pub sts_path: String,
    /// Skip TLS verification of the identity provider
    pub skip_tls_verification: bool,
    /// Requested assertion lifetime
    pub token_lifetime_secs: u64,
    /// Clock skew allowed when checking assertion bounds
    pub clock_tolerance_secs: u64,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            sts_path: DEFAULT_STS_PATH.to_string(),
            skip_tls_verification: false,
            token_lifetime_secs: 600,
            clock_tolerance_secs: 600,
        }
    }
}

/// Task / readiness polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            timeout_secs: 300,
        }
    }
}

impl PollConfig {
    pub fn settings(&self) -> VasResult<PollSettings> {
        PollSettings::new(
            Duration::from_secs(self.interval_secs),
            Duration::from_secs(self.timeout_secs),
        )
    }
}

/// Everything a sample run needs to log in.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleConfig {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub skip_server_verification: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub sso: SsoConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_timeout() -> u64 { 30 }

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            server: None,
            username: None,
            password: None,
            skip_server_verification: false,
            timeout_secs: default_timeout(),
            sso: SsoConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl SampleConfig {
    pub fn from_toml_str(text: &str) -> VasResult<Self> {
        toml::from_str(text).map_err(|e| VasError::config(format!("Invalid config: {e}")))
    }

    pub fn load(path: &Path) -> VasResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            VasError::config(format!("Cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            skip_tls_verification: self.skip_server_verification,
            timeout_secs: self.timeout_secs,
        }
    }

    /// Check required fields and poll bounds.
    pub fn validate(&self) -> VasResult<()> {
        let password = self.password.as_ref().map(|p| p.expose_secret().as_str());
        for (name, value) in [
            ("server", self.server.as_deref()),
            ("username", self.username.as_deref()),
            ("password", password),
        ] {
            if value.map_or(true, |v| v.trim().is_empty()) {
                return Err(VasError::config(format!("Missing required setting '{name}'")));
            }
        }
        self.poll.settings()?;
        Ok(())
    }

    /// Build the exchange request. The password moves into the request, so
    /// the exchange holds the only copy.
    pub fn into_exchange_request(self) -> VasResult<ExchangeRequest> {
        self.validate()?;
        let server = self.server.unwrap_or_default();
        let username = self.username.unwrap_or_default();
        let password = self
            .password
            .unwrap_or_else(|| SecretString::new(String::new()));

        Ok(if self.sso.enabled {
            ExchangeRequest::Federated(FederatedCredentials {
                server,
                sso_url: self.sso.url,
                username,
                password,
            })
        } else {
            ExchangeRequest::Direct(DirectCredentials {
                server,
                username,
                password,
            })
        })
    }
}
