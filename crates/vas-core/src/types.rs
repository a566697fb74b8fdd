//! Shared types for the session core.

use crate::error::{VasError, VasResult};

use serde::{Deserialize, Serialize};
use url::Url;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Authority
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The management endpoint a session is bound to.
///
/// Accepts a bare host (`vcenter.lab.local`), `host:port`, or a full URL
/// (`https://10.0.0.5:8443`). Bare hosts default to HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    server: String,
    base_url: Url,
}

impl Authority {
    pub fn parse(server: &str) -> VasResult<Self> {
        let server = server.trim().trim_end_matches('/');
        if server.is_empty() {
            return Err(VasError::config("Server address is empty"));
        }

        let raw = if server.contains("://") {
            server.to_string()
        } else {
            format!("https://{server}")
        };
        let base_url = Url::parse(&raw)
            .map_err(|e| VasError::config(format!("Invalid server address '{server}': {e}")))?;
        if base_url.host_str().is_none() {
            return Err(VasError::config(format!("Server address '{server}' has no host")));
        }

        Ok(Self {
            server: server.to_string(),
            base_url,
        })
    }

    /// The server exactly as supplied at exchange time.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Host name (no scheme / port).
    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    /// `scheme://host[:port]` without a trailing slash.
    pub fn origin(&self) -> String {
        self.base_url.origin().ascii_serialization()
    }

    /// Absolute URL for an API path (`path` starts with `/`).
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.origin(), path)
    }
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.server)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// HTTP transport policy shared by every stub of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub skip_tls_verification: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 { 30 }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            skip_tls_verification: false,
            timeout_secs: 30,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Service kinds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Remote service interfaces a session can mint stubs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Session,
    Vm,
    Host,
    Cluster,
    Datacenter,
    Datastore,
    Network,
    Folder,
    ResourcePool,
    Tasks,
    ApplianceHealth,
    Certificates,
    ContentLibrary,
    Tagging,
}

impl ServiceKind {
    /// REST base path of the service.
    pub fn base_path(self) -> &'static str {
        match self {
            Self::Session => "/api/session",
            Self::Vm => "/api/vcenter/vm",
            Self::Host => "/api/vcenter/host",
            Self::Cluster => "/api/vcenter/cluster",
            Self::Datacenter => "/api/vcenter/datacenter",
            Self::Datastore => "/api/vcenter/datastore",
            Self::Network => "/api/vcenter/network",
            Self::Folder => "/api/vcenter/folder",
            Self::ResourcePool => "/api/vcenter/resource-pool",
            Self::Tasks => "/api/cis/tasks",
            Self::ApplianceHealth => "/api/appliance/health",
            Self::Certificates => "/api/vcenter/certificate-management/vcenter",
            Self::ContentLibrary => "/api/content/library",
            Self::Tagging => "/api/cis/tagging",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Session summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Display-safe view of a session (never includes the token).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub server: String,
    pub identity_provider: Option<String>,
    pub federated: bool,
    pub created_at: String,
    pub active: bool,
    pub skip_tls_verification: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Guest
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Guest OS identity reported by guest tools
/// (GET /api/vcenter/vm/{vm}/guest/identity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestIdentity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub full_name: Option<serde_json::Value>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}
