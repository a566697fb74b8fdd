//! Stub provider: the HTTP transport bound to one authority.
//!
//! `StubFactory` owns the `reqwest` client and the authority's login /
//! logout endpoints (`/api/session`). A `Stub` is a cheap, typed proxy for one
//! `ServiceKind` that borrows the factory's connection pool and reads the
//! session token from a cell shared with its `SessionContext`, so stubs minted
//! before a logout stop working after it.

use crate::error::{VasError, VasErrorKind, VasResult};
use crate::sso::BearerAssertion;
use crate::types::{Authority, ServiceKind, TransportConfig};

use base64::Engine;
use log::{debug, warn};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;

const SESSION_HEADER: &str = "vmware-api-session-id";

// ── Token cell ──────────────────────────────────────────────────────

/// Session token shared between a `SessionContext` and its stubs.
#[derive(Debug, Default)]
pub(crate) struct TokenCell {
    token: RwLock<Option<SecretString>>,
}

impl TokenCell {
    pub(crate) fn new(token: SecretString) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    /// Remove the token, returning it if the session was still live.
    pub(crate) fn take(&self) -> Option<SecretString> {
        match self.token.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Build the session header value, marked sensitive so it never shows
    /// up in `Debug` output.
    pub(crate) fn header(&self) -> VasResult<HeaderValue> {
        let guard = self
            .token
            .read()
            .map_err(|_| VasError::not_authenticated("Session token lock poisoned"))?;
        let token = guard
            .as_ref()
            .ok_or_else(|| VasError::not_authenticated("Not logged in: no active session"))?;
        session_header(token)
    }
}

fn session_header(token: &SecretString) -> VasResult<HeaderValue> {
    let mut value = HeaderValue::from_str(token.expose_secret())
        .map_err(|_| VasError::protocol("Session token is not a valid header value"))?;
    value.set_sensitive(true);
    Ok(value)
}

// ── Stub factory ────────────────────────────────────────────────────

/// HTTP transport for one authority. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StubFactory {
    client: Client,
    authority: Authority,
    transport: TransportConfig,
}

impl StubFactory {
    /// Build the transport (no network I/O).
    pub fn new(authority: Authority, transport: &TransportConfig) -> VasResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(transport.skip_tls_verification)
            .timeout(Duration::from_secs(transport.timeout_secs))
            .build()
            .map_err(|e| VasError::connectivity(format!("Failed to build HTTP client: {e}")))?;

        if transport.skip_tls_verification {
            warn!("TLS certificate verification disabled for {authority}");
        }

        Ok(Self {
            client,
            authority,
            transport: transport.clone(),
        })
    }

    /// Convenience: parse `server` and build the transport.
    pub fn for_server(server: &str, skip_tls_verification: bool) -> VasResult<Self> {
        let transport = TransportConfig {
            skip_tls_verification,
            ..TransportConfig::default()
        };
        Self::new(Authority::parse(server)?, &transport)
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    // ── Session endpoint ────────────────────────────────────────────

    /// Create a session with username / password (POST /api/session, basic auth).
    pub(crate) async fn login_basic(
        &self,
        username: &str,
        password: &SecretString,
    ) -> VasResult<SecretString> {
        let url = self.authority.endpoint(ServiceKind::Session.base_path());
        debug!("POST {url} (basic, user {username})");

        let resp = self
            .client
            .post(&url)
            .basic_auth(username, Some(password.expose_secret()))
            .send()
            .await?;

        Self::read_session_id(resp).await
    }

    /// Create a session from a SAML bearer assertion (POST /api/session, SIGN header).
    pub(crate) async fn login_assertion(
        &self,
        assertion: &BearerAssertion,
    ) -> VasResult<SecretString> {
        let url = self.authority.endpoint(ServiceKind::Session.base_path());
        debug!("POST {url} (SAML bearer, assertion {})", assertion.id());

        let encoded = base64::engine::general_purpose::STANDARD.encode(assertion.xml());
        let mut auth = HeaderValue::from_str(&format!("SIGN token=\"{encoded}\""))
            .map_err(|_| VasError::protocol("Assertion cannot be carried in a header"))?;
        auth.set_sensitive(true);

        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;

        Self::read_session_id(resp).await
    }

    /// Invalidate a session server-side (DELETE /api/session).
    ///
    /// A 401 means the server already forgot the session; that counts as done.
    pub(crate) async fn logout(&self, token: &SecretString) -> VasResult<()> {
        let url = self.authority.endpoint(ServiceKind::Session.base_path());
        let resp = self
            .client
            .delete(&url)
            .header(SESSION_HEADER, session_header(token)?)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => {
                debug!("Session already invalid on {}", self.authority);
                Ok(())
            }
            _ => check_status(resp).await.map(|_| ()),
        }
    }

    /// Whether the server still accepts the session (GET /api/session).
    pub(crate) async fn check_session(&self, token: &TokenCell) -> VasResult<bool> {
        let url = self.authority.endpoint(ServiceKind::Session.base_path());
        let resp = self
            .client
            .get(&url)
            .header(SESSION_HEADER, token.header()?)
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Mint a stub for `kind`. Pure: no I/O.
    pub(crate) fn stub(&self, kind: ServiceKind, token: Arc<TokenCell>) -> Stub {
        Stub {
            kind,
            client: self.client.clone(),
            authority: self.authority.clone(),
            token,
        }
    }

    async fn read_session_id(resp: Response) -> VasResult<SecretString> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(VasError::auth("Invalid credentials"));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VasError::api(
                status.as_u16(),
                format!("Login failed: {}", truncate(&body)),
            ));
        }

        // Session ID comes back as a quoted JSON string
        let text = resp
            .text()
            .await
            .map_err(|e| VasError::protocol(format!("Failed to read session response: {e}")))?;
        let session_id: String = serde_json::from_str(&text).map_err(|e| {
            VasError::protocol(format!("Failed to parse session response: {e}"))
        })?;
        if session_id.is_empty() {
            return Err(VasError::protocol("Server returned an empty session id"));
        }
        Ok(SecretString::new(session_id))
    }
}

// ── Stub ────────────────────────────────────────────────────────────

/// Typed proxy for one remote service, bound to a session.
#[derive(Debug, Clone)]
pub struct Stub {
    kind: ServiceKind,
    client: Client,
    authority: Authority,
    token: Arc<TokenCell>,
}

impl Stub {
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Full API path for `suffix` relative to the service base path.
    pub fn path(&self, suffix: &str) -> String {
        format!("{}{}", self.kind.base_path(), suffix)
    }

    fn request(&self, method: Method, suffix: &str) -> VasResult<RequestBuilder> {
        let header = self.token.header()?;
        let url = self.authority.endpoint(&self.path(suffix));
        debug!("{method} {url}");
        Ok(self.client.request(method, &url).header(SESSION_HEADER, header))
    }

    /// GET a JSON response.
    pub async fn get<T: DeserializeOwned>(&self, suffix: &str) -> VasResult<T> {
        let resp = self.request(Method::GET, suffix)?.send().await?;
        parse_response(check_status(resp).await?).await
    }

    /// GET a JSON response with query params.
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        suffix: &str,
        params: &[(&str, &str)],
    ) -> VasResult<T> {
        let resp = self.request(Method::GET, suffix)?.query(params).send().await?;
        parse_response(check_status(resp).await?).await
    }

    /// POST with no body, discarding the response (power actions and the like).
    pub async fn post_empty(&self, suffix: &str) -> VasResult<()> {
        let resp = self.request(Method::POST, suffix)?.send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

// ── Internal helpers ────────────────────────────────────────────────

async fn check_status(resp: Response) -> VasResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let code = status.as_u16();
    let body = resp.text().await.unwrap_or_default();
    let body = truncate(&body);

    match status {
        StatusCode::UNAUTHORIZED => Err(VasError::auth(format!("Session expired or invalid: {body}"))),
        StatusCode::FORBIDDEN => Err(VasError::new(
            VasErrorKind::AccessDenied,
            format!("Access denied: {body}"),
        )),
        StatusCode::NOT_FOUND => Err(VasError::not_found(format!("Resource not found: {body}"))),
        StatusCode::SERVICE_UNAVAILABLE => Err(VasError::new(
            VasErrorKind::ServiceUnavailable,
            format!("Service unavailable: {body}"),
        )),
        _ => Err(VasError::api(code, format!("API error {code}: {body}"))),
    }
}

async fn parse_response<T: DeserializeOwned>(resp: Response) -> VasResult<T> {
    let text = resp
        .text()
        .await
        .map_err(|e| VasError::protocol(format!("Failed to read response body: {e}")))?;

    // Some endpoints return an empty body for success
    let text = if text.trim().is_empty() { "null" } else { text.as_str() };

    serde_json::from_str(text).map_err(|e| {
        VasError::protocol(format!("JSON parse error: {e}; body: {}", truncate(text)))
    })
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
