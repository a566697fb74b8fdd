//! Error types for the vSphere Automation session core.

use crate::task::OperationHandle;

/// Categorised error kinds.
#[derive(Debug, Clone)]
pub enum VasErrorKind {
    /// Authority or identity provider unreachable
    Connectivity,
    /// Credentials or assertion rejected (401)
    Authentication,
    /// Malformed response, unparsable or expired assertion
    Protocol,
    /// Stub requested or used on a dead / never established session
    NotAuthenticated,
    /// Poll deadline exceeded; carries the last observed operation state, if any
    Timeout(Option<OperationHandle>),
    /// Resource not found (404)
    NotFound,
    /// Permission denied (403)
    AccessDenied,
    /// Service temporarily unavailable (503), e.g. guest tools not running
    ServiceUnavailable,
    /// HTTP / API error with status code
    Api(u16),
    /// Missing or invalid sample configuration
    Config,
    /// A monitored operation ended FAILED or CANCELED
    OperationFailed,
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{}] {message}", .kind.label())]
pub struct VasError {
    pub kind: VasErrorKind,
    pub message: String,
}

impl VasErrorKind {
    fn label(&self) -> String {
        match self {
            Self::Api(code) => format!("Api({code})"),
            Self::Timeout(_) => "Timeout".to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl VasError {
    pub fn new(kind: VasErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::Connectivity, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::Authentication, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::Protocol, msg)
    }

    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::NotAuthenticated, msg)
    }

    pub fn timeout(last: Option<OperationHandle>, msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::Timeout(last), msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::NotFound, msg)
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::Api(status), msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::Config, msg)
    }

    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::new(VasErrorKind::OperationFailed, msg)
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, VasErrorKind::Authentication)
    }

    pub fn is_not_authenticated(&self) -> bool {
        matches!(self.kind, VasErrorKind::NotAuthenticated)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, VasErrorKind::Timeout(_))
    }

    /// Last operation state observed before a poll deadline expired.
    pub fn last_observed(&self) -> Option<&OperationHandle> {
        match &self.kind {
            VasErrorKind::Timeout(last) => last.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for VasError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::connectivity(format!("Connection failed: {e}"))
        } else if e.is_decode() {
            Self::protocol(format!("Malformed response: {e}"))
        } else {
            Self::connectivity(format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for VasError {
    fn from(e: serde_json::Error) -> Self {
        Self::protocol(format!("JSON parse error: {e}"))
    }
}

impl From<quick_xml::Error> for VasError {
    fn from(e: quick_xml::Error) -> Self {
        Self::protocol(format!("XML parse error: {e}"))
    }
}

/// Convenience alias.
pub type VasResult<T> = Result<T, VasError>;
