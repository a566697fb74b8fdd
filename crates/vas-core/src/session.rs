//! Session context: the authenticated handle bound to one authority.
//!
//! Created only by [`CredentialExchanger::exchange`](crate::exchange::CredentialExchanger::exchange).
//! Mints stubs for the rest of a run and is released with `logout`.

use crate::error::{VasError, VasResult};
use crate::transport::{Stub, StubFactory, TokenCell};
use crate::types::{Authority, ServiceKind, SessionSummary, TransportConfig};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use secrecy::SecretString;
use std::sync::Arc;
use url::Url;

/// Authenticated session bound to one authority for its whole lifetime.
#[derive(Debug)]
pub struct SessionContext {
    factory: StubFactory,
    token: Arc<TokenCell>,
    identity_provider: Option<Url>,
    created_at: DateTime<Utc>,
}

impl SessionContext {
    pub(crate) fn new(factory: StubFactory, token: SecretString, identity_provider: Option<Url>) -> Self {
        Self {
            factory,
            token: Arc::new(TokenCell::new(token)),
            identity_provider,
            created_at: Utc::now(),
        }
    }

    /// The authority this session is bound to.
    pub fn authority(&self) -> &Authority {
        self.factory.authority()
    }

    /// STS endpoint used to federate this session, if any.
    pub fn identity_provider(&self) -> Option<&Url> {
        self.identity_provider.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn transport(&self) -> &TransportConfig {
        self.factory.transport()
    }

    /// False once `logout` has run.
    pub fn is_active(&self) -> bool {
        self.token.is_set()
    }

    /// Mint a stub for `kind`. No network I/O.
    pub fn create_stub(&self, kind: ServiceKind) -> VasResult<Stub> {
        if !self.token.is_set() {
            return Err(VasError::not_authenticated(format!(
                "Cannot create {kind:?} stub: session on {} is logged out",
                self.authority()
            )));
        }
        Ok(self.factory.stub(kind, Arc::clone(&self.token)))
    }

    /// Ask the server whether the session is still valid.
    pub async fn check_session(&self) -> VasResult<bool> {
        self.factory.check_session(&self.token).await
    }

    /// Invalidate the session server-side. Idempotent.
    ///
    /// The local token is dropped before the remote call, so even when the
    /// server cannot be reached the context (and every stub it minted) is
    /// dead afterwards; the connectivity error is still returned.
    pub async fn logout(&mut self) -> VasResult<()> {
        let Some(token) = self.token.take() else {
            debug!("Session on {} already logged out", self.authority());
            return Ok(());
        };
        info!("Logging out of {}", self.authority());
        self.factory.logout(&token).await
    }

    /// Display-safe summary.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            server: self.authority().server().to_string(),
            identity_provider: self.identity_provider.as_ref().map(|u| u.to_string()),
            federated: self.identity_provider.is_some(),
            created_at: self.created_at.to_rfc3339(),
            active: self.is_active(),
            skip_tls_verification: self.transport().skip_tls_verification,
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if self.token.is_set() {
            warn!(
                "Session on {} dropped without logout; it stays open server-side until it expires",
                self.authority()
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A session against a closed local port: anything that touches the
    /// network fails fast with a connectivity error.
    pub(crate) fn offline_session() -> SessionContext {
        let factory = StubFactory::for_server("http://127.0.0.1:1", false).unwrap();
        SessionContext::new(factory, SecretString::new("token-1".into()), None)
    }

    #[test]
    fn authority_survives_stub_creation() {
        let session = offline_session();
        for kind in [ServiceKind::Vm, ServiceKind::Tasks, ServiceKind::Host, ServiceKind::Vm] {
            let stub = session.create_stub(kind).unwrap();
            assert_eq!(stub.kind(), kind);
        }
        assert_eq!(session.authority().server(), "http://127.0.0.1:1");
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn logout_kills_session_and_stubs() {
        let mut session = offline_session();
        let stub = session.create_stub(ServiceKind::Vm).unwrap();

        // Server unreachable: error surfaces, but the session is dead locally.
        let first = session.logout().await;
        assert!(first.is_err());
        assert!(!session.is_active());

        // Second logout is a no-op.
        assert!(session.logout().await.is_ok());

        let err = session.create_stub(ServiceKind::Vm).unwrap_err();
        assert!(err.is_not_authenticated());

        let err = stub.get::<serde_json::Value>("").await.unwrap_err();
        assert!(err.is_not_authenticated());
    }

    #[test]
    fn summary_hides_token() {
        let session = offline_session();
        let summary = session.summary();
        assert_eq!(summary.server, "http://127.0.0.1:1");
        assert!(!summary.federated);
        assert!(summary.active);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("token-1"));
    }
}
