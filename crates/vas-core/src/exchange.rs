//! Credential exchanger: long-lived credentials in, short-lived session out.
//!
//! ## Direct flow
//! 1. `POST /api/session` with HTTP basic credentials
//!
//! ## Federated flow
//! 1. Resolve the STS endpoint (explicit URL, else authority + well-known path)
//! 2. Obtain a SAML bearer assertion from the STS with username / password
//! 3. Check the assertion's validity window
//! 4. `POST /api/session` with `Authorization: SIGN token="..."`
//!
//! The request is consumed by value; its password is a `SecretString` and is
//! zeroized when the request drops at the end of `exchange`.

use crate::config::SsoConfig;
use crate::error::VasResult;
use crate::session::SessionContext;
use crate::sso::{resolve_token_endpoint, BearerAssertion, StsClient, TokenIssuer};
use crate::transport::StubFactory;
use crate::types::{Authority, TransportConfig};

use chrono::{Duration as ChronoDuration, Utc};
use log::info;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Username / password straight to the authority.
#[derive(Debug)]
pub struct DirectCredentials {
    pub server: String,
    pub username: String,
    pub password: SecretString,
}

/// Username / password to the identity provider, assertion to the authority.
#[derive(Debug)]
pub struct FederatedCredentials {
    pub server: String,
    /// Explicit STS endpoint; resolved from `server` when absent.
    pub sso_url: Option<String>,
    pub username: String,
    pub password: SecretString,
}

/// Exactly one way of authenticating per exchange.
#[derive(Debug)]
pub enum ExchangeRequest {
    Direct(DirectCredentials),
    Federated(FederatedCredentials),
    /// An assertion obtained out of band.
    Assertion { server: String, assertion: BearerAssertion },
}

impl ExchangeRequest {
    pub fn server(&self) -> &str {
        match self {
            Self::Direct(c) => &c.server,
            Self::Federated(c) => &c.server,
            Self::Assertion { server, .. } => server,
        }
    }
}

/// Turns an [`ExchangeRequest`] into a [`SessionContext`].
pub struct CredentialExchanger {
    transport: TransportConfig,
    issuer: Arc<dyn TokenIssuer>,
    sts_path: String,
    clock_tolerance: ChronoDuration,
}

impl CredentialExchanger {
    pub fn new(transport: TransportConfig, sso: &SsoConfig) -> VasResult<Self> {
        let issuer = StsClient::new(
            sso.skip_tls_verification,
            transport.timeout_secs,
            Duration::from_secs(sso.token_lifetime_secs),
        )?;
        Ok(Self {
            transport,
            issuer: Arc::new(issuer),
            sts_path: sso.sts_path.clone(),
            clock_tolerance: ChronoDuration::seconds(sso.clock_tolerance_secs as i64),
        })
    }

    /// Replace the STS client (alternate identity providers, tests).
    pub fn with_token_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.issuer = issuer;
        self
    }

    pub async fn exchange(&self, request: ExchangeRequest) -> VasResult<SessionContext> {
        match request {
            ExchangeRequest::Direct(creds) => {
                let factory = StubFactory::new(Authority::parse(&creds.server)?, &self.transport)?;
                info!("Logging in to {} as {}", factory.authority(), creds.username);
                let token = factory.login_basic(&creds.username, &creds.password).await?;
                info!("Session established on {}", factory.authority());
                Ok(SessionContext::new(factory, token, None))
            }
            ExchangeRequest::Federated(creds) => {
                let authority = Authority::parse(&creds.server)?;
                let endpoint =
                    resolve_token_endpoint(&authority, creds.sso_url.as_deref(), &self.sts_path)?;
                info!("Federated login to {authority} as {} via {endpoint}", creds.username);
                let assertion = self
                    .issuer
                    .issue_bearer(&endpoint, &creds.username, &creds.password)
                    .await?;
                drop(creds);
                self.present(authority, assertion, Some(endpoint)).await
            }
            ExchangeRequest::Assertion { server, assertion } => {
                let authority = Authority::parse(&server)?;
                info!("Logging in to {authority} with assertion {}", assertion.id());
                self.present(authority, assertion, None).await
            }
        }
    }

    async fn present(
        &self,
        authority: Authority,
        assertion: BearerAssertion,
        identity_provider: Option<Url>,
    ) -> VasResult<SessionContext> {
        assertion.check_validity(Utc::now(), self.clock_tolerance)?;
        let factory = StubFactory::new(authority, &self.transport)?;
        let token = factory.login_assertion(&assertion).await?;
        info!(
            "Session established on {} (assertion valid until {})",
            factory.authority(),
            assertion.not_on_or_after()
        );
        Ok(SessionContext::new(factory, token, identity_provider))
    }
}
