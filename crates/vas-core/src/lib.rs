//! # vSphere Automation Samples – Session & Operation-Completion Core
//!
//! Everything a sample needs between "parse flags" and "print the result":
//! log in once, mint service stubs, wait for long-running work, log out.
//!
//! ## Modules
//!
//! - **types** — Authority, transport policy, service kinds, guest identity
//! - **error** — Crate-specific error types
//! - **config** — Sample configuration (TOML file + overrides)
//! - **transport** — Stub provider: HTTP client, `/api/session`, typed stubs
//! - **sso** — STS client for SAML bearer-token federation
//! - **exchange** — Credential exchanger (direct / federated / assertion)
//! - **session** — Session context lifecycle (stubs, logout)
//! - **task** — Operation poller (task status, readiness probes)
//! - **guest** — Guest-tools identity readiness wait
//! - **pipeline** — Sample driver (setup → run → cleanup with guaranteed logout)

pub mod types;
pub mod error;
pub mod config;
pub mod transport;
pub mod sso;
pub mod exchange;
pub mod session;
pub mod task;
pub mod guest;
pub mod pipeline;

pub use error::{VasError, VasErrorKind, VasResult};
pub use exchange::{CredentialExchanger, ExchangeRequest};
pub use session::SessionContext;
pub use task::{OperationHandle, OperationOutcome, OperationStatus, PollSettings};
pub use types::ServiceKind;
