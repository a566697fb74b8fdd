//! Identity-provider (STS) client for the SAML bearer-token federation path.
//!
//! The vCenter Single Sign-On service issues signed SAML 2.0 bearer
//! assertions via WS-Trust 1.3 `RequestSecurityToken` over SOAP. Only the
//! client side is implemented here: build the request, POST it, pull the
//! `Assertion` element out of the response and read its validity bounds.

use crate::error::{VasError, VasResult};
use crate::types::Authority;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use log::{debug, info};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

/// Well-known STS path relative to the authority.
pub const DEFAULT_STS_PATH: &str = "/sts/STSService/vsphere.local";

const SOAP_ACTION: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue";

/// Resolve the token-issuance endpoint: an explicit URL wins, otherwise
/// `sts_path` is appended to the authority's origin.
pub fn resolve_token_endpoint(
    authority: &Authority,
    explicit: Option<&str>,
    sts_path: &str,
) -> VasResult<Url> {
    let raw = match explicit {
        Some(url) => url.trim().to_string(),
        None => {
            let path = if sts_path.starts_with('/') {
                sts_path.to_string()
            } else {
                format!("/{sts_path}")
            };
            authority.endpoint(&path)
        }
    };
    Url::parse(&raw).map_err(|e| VasError::config(format!("Invalid STS endpoint '{raw}': {e}")))
}

// ── Bearer assertion ────────────────────────────────────────────────

/// A signed, time-bounded SAML assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerAssertion {
    xml: String,
    id: String,
    not_before: DateTime<Utc>,
    not_on_or_after: DateTime<Utc>,
}

impl BearerAssertion {
    /// Parse a standalone `<saml2:Assertion>` document.
    pub fn parse(xml: impl Into<String>) -> VasResult<Self> {
        let xml = xml.into();
        let mut reader = Reader::from_str(&xml);

        let mut id = None;
        let mut not_before = None;
        let mut not_on_or_after = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"Assertion" if id.is_none() => id = attr(&e, b"ID")?,
                    b"Conditions" => {
                        not_before = attr(&e, b"NotBefore")?;
                        not_on_or_after = attr(&e, b"NotOnOrAfter")?;
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        let id = id.ok_or_else(|| VasError::protocol("Not a SAML assertion (no Assertion ID)"))?;
        let not_before = parse_instant(not_before, "NotBefore")?;
        let not_on_or_after = parse_instant(not_on_or_after, "NotOnOrAfter")?;
        if not_on_or_after <= not_before {
            return Err(VasError::protocol(format!(
                "Assertion {id} has an empty validity window"
            )));
        }

        Ok(Self {
            xml,
            id,
            not_before,
            not_on_or_after,
        })
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_on_or_after(&self) -> DateTime<Utc> {
        self.not_on_or_after
    }

    /// Reject the assertion if `now` falls outside its bounds, allowing
    /// `tolerance` of clock skew on either side.
    pub fn check_validity(&self, now: DateTime<Utc>, tolerance: ChronoDuration) -> VasResult<()> {
        if now + tolerance < self.not_before {
            return Err(VasError::protocol(format!(
                "Assertion {} not valid before {}",
                self.id, self.not_before
            )));
        }
        if now - tolerance >= self.not_on_or_after {
            return Err(VasError::protocol(format!(
                "Assertion {} expired at {}",
                self.id, self.not_on_or_after
            )));
        }
        Ok(())
    }
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> VasResult<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| VasError::protocol(format!("Bad XML attribute: {err}")))?;
        if a.key.local_name().as_ref() == name {
            let value = a.unescape_value()?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_instant(value: Option<String>, what: &str) -> VasResult<DateTime<Utc>> {
    let value = value.ok_or_else(|| VasError::protocol(format!("Assertion has no {what}")))?;
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| VasError::protocol(format!("Bad {what} '{value}': {e}")))
}

// ── Token issuer seam ───────────────────────────────────────────────

/// Given credentials and an STS endpoint, returns a time-bounded signed
/// assertion or fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_bearer(
        &self,
        endpoint: &Url,
        username: &str,
        password: &SecretString,
    ) -> VasResult<BearerAssertion>;
}

/// WS-Trust client for the vCenter STS.
#[derive(Debug, Clone)]
pub struct StsClient {
    client: Client,
    token_lifetime: Duration,
}

impl StsClient {
    /// TLS verification of the identity provider stays on unless
    /// `skip_tls_verification` is set explicitly.
    pub fn new(skip_tls_verification: bool, timeout_secs: u64, token_lifetime: Duration) -> VasResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(skip_tls_verification)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VasError::connectivity(format!("Failed to build STS client: {e}")))?;
        Ok(Self {
            client,
            token_lifetime,
        })
    }

    fn request_body(&self, username: &str, password: &SecretString, now: DateTime<Utc>) -> String {
        let lifetime = ChronoDuration::from_std(self.token_lifetime)
            .unwrap_or_else(|_| ChronoDuration::minutes(10));
        let created = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let expires = (now + lifetime).to_rfc3339_opts(SecondsFormat::Millis, true);
        let stamp_id = uuid::Uuid::new_v4();

        format!(
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
<SOAP-ENV:Header>
<wsse:Security xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
<wsu:Timestamp wsu:Id="_{stamp_id}"><wsu:Created>{created}</wsu:Created><wsu:Expires>{expires}</wsu:Expires></wsu:Timestamp>
<wsse:UsernameToken><wsse:Username>{user}</wsse:Username><wsse:Password>{pass}</wsse:Password></wsse:UsernameToken>
</wsse:Security>
</SOAP-ENV:Header>
<SOAP-ENV:Body>
<wst:RequestSecurityToken xmlns:wst="http://docs.oasis-open.org/ws-sx/ws-trust/200512" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
<wst:TokenType>urn:oasis:names:tc:SAML:2.0:assertion</wst:TokenType>
<wst:RequestType>http://docs.oasis-open.org/ws-sx/ws-trust/200512/Issue</wst:RequestType>
<wst:Lifetime><wsu:Created>{created}</wsu:Created><wsu:Expires>{expires}</wsu:Expires></wst:Lifetime>
<wst:Renewing Allow="false" OK="false"/>
<wst:Delegatable>true</wst:Delegatable>
<wst:KeyType>http://docs.oasis-open.org/ws-sx/ws-trust/200512/Bearer</wst:KeyType>
<wst:SignatureAlgorithm>http://www.w3.org/2001/04/xmldsig-more#rsa-sha256</wst:SignatureAlgorithm>
</wst:RequestSecurityToken>
</SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#,
            user = escape(username),
            pass = escape(password.expose_secret().as_str()),
        )
    }
}

#[async_trait]
impl TokenIssuer for StsClient {
    async fn issue_bearer(
        &self,
        endpoint: &Url,
        username: &str,
        password: &SecretString,
    ) -> VasResult<BearerAssertion> {
        info!("Requesting SAML bearer token from {endpoint}");
        let body = self.request_body(username, password, Utc::now());

        let resp = self
            .client
            .post(endpoint.clone())
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", SOAP_ACTION)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| VasError::protocol(format!("Failed to read STS response: {e}")))?;
        debug!("STS responded {status} ({} bytes)", text.len());

        read_reply(status, &text)
    }
}

/// Turn an STS reply into an assertion or the error it stands for.
///
/// SOAP faults arrive with HTTP 500 and win over the status. A body that is
/// not XML at all (a proxy error page) is not a fault; the status decides.
fn read_reply(status: StatusCode, body: &str) -> VasResult<BearerAssertion> {
    let fault = find_fault(body).unwrap_or_else(|e| {
        debug!("STS reply is not a SOAP document: {e}");
        None
    });
    if let Some(fault) = fault {
        return Err(fault);
    }
    if !status.is_success() {
        return Err(match status {
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                VasError::connectivity(format!("STS unreachable behind proxy ({status})"))
            }
            _ => VasError::api(status.as_u16(), format!("STS request failed with {status}")),
        });
    }

    let xml = extract_assertion(body)?
        .ok_or_else(|| VasError::protocol("STS response carries no SAML assertion"))?;
    BearerAssertion::parse(xml)
}

/// Slice the first `Assertion` element (any namespace prefix) out of a
/// WS-Trust response.
pub(crate) fn extract_assertion(xml: &str) -> VasResult<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut start: Option<usize> = None;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"Assertion" => {
                if start.is_none() {
                    start = Some(before);
                }
                depth += 1;
            }
            Event::Empty(e) if start.is_none() && e.local_name().as_ref() == b"Assertion" => {
                return Ok(Some(xml[before..reader.buffer_position()].to_string()));
            }
            Event::End(e) if start.is_some() && e.local_name().as_ref() == b"Assertion" => {
                depth -= 1;
                if depth == 0 {
                    let begin = start.unwrap_or(before);
                    return Ok(Some(xml[begin..reader.buffer_position()].to_string()));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Map a SOAP fault to an error; authentication faults become
/// `Authentication`, anything else `Protocol`.
fn find_fault(xml: &str) -> VasResult<Option<VasError>> {
    let mut reader = Reader::from_str(xml);
    let mut in_fault = false;
    let mut detail = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"Fault" => in_fault = true,
            Event::Text(t) if in_fault => {
                let text = t.unescape()?;
                let text = text.trim();
                if !text.is_empty() {
                    detail.push(text.to_string());
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"Fault" => break,
            Event::Eof => break,
            _ => {}
        }
    }

    if !in_fault {
        return Ok(None);
    }
    let detail = detail.join(": ");
    let auth_fault = ["FailedAuthentication", "InvalidSecurity", "InvalidCredentials"]
        .iter()
        .any(|code| detail.contains(code));
    if auth_fault {
        Ok(Some(VasError::auth(format!("STS rejected credentials: {detail}"))))
    } else {
        Ok(Some(VasError::protocol(format!("STS fault: {detail}"))))
    }
}
