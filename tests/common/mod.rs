//! In-process mock of the vCenter REST API and its STS, served by axum on an
//! ephemeral loopback port.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::json;

pub const USER: &str = "administrator@vsphere.local";
pub const PASSWORD: &str = "VMware1!";

#[derive(Default)]
pub struct Mock {
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub sts_requests: AtomicUsize,
    pub task_polls: AtomicUsize,
    pub guest_polls: AtomicUsize,
    /// Guest identity answers 503 this many times before succeeding.
    pub guest_not_ready: AtomicUsize,
    pub tasks: Mutex<VecDeque<&'static str>>,
    pub power: Mutex<String>,
    pub power_calls: Mutex<Vec<String>>,
    sessions: Mutex<HashSet<String>>,
    next_session: AtomicUsize,
}

impl Mock {
    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn script_tasks(&self, statuses: &[&'static str]) {
        *self.tasks.lock().unwrap() = statuses.iter().copied().collect();
    }

    fn open_session(&self, prefix: &str) -> String {
        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        let id = format!("{prefix}-{n}");
        self.sessions.lock().unwrap().insert(id.clone());
        self.logins.fetch_add(1, Ordering::SeqCst);
        id
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get("vmware-api-session-id")
            .and_then(|v| v.to_str().ok())
            .map_or(false, |id| self.sessions.lock().unwrap().contains(id))
    }
}

pub struct MockServer {
    pub url: String,
    pub state: Arc<Mock>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mock {
            power: Mutex::new("POWERED_OFF".into()),
            ..Mock::default()
        });

        let app = Router::new()
            .route("/api/session", post(login).get(current_session).delete(logout))
            .route("/api/vcenter/vm", get(list_vms))
            .route("/api/vcenter/vm/:vm/power", get(power_state).post(power_action))
            .route("/api/vcenter/vm/:vm/guest/identity", get(guest_identity))
            .route("/api/cis/tasks/:task", get(task))
            .route("/api/appliance/health/:item", get(health))
            .route("/sts/STSService/vsphere.local", post(sts))
            .route("/gateway/sts", post(bad_gateway))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }
}

pub fn saml_assertion(id: &str, valid_for: Duration) -> String {
    let now = Utc::now();
    let nb = (now - Duration::minutes(1)).to_rfc3339_opts(SecondsFormat::Millis, true);
    let noa = (now + valid_for).to_rfc3339_opts(SecondsFormat::Millis, true);
    format!(
        r#"<saml2:Assertion xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion" ID="{id}" IssueInstant="{nb}" Version="2.0"><saml2:Issuer>https://vc/websso/SAML2/Metadata/vsphere.local</saml2:Issuer><saml2:Subject><saml2:NameID>{USER}</saml2:NameID></saml2:Subject><saml2:Conditions NotBefore="{nb}" NotOnOrAfter="{noa}"/></saml2:Assertion>"#
    )
}

type Shared = State<Arc<Mock>>;

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error_type": "UNAUTHENTICATED", "messages": []})),
    )
        .into_response()
}

async fn login(State(mock): Shared, headers: HeaderMap) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let engine = base64::engine::general_purpose::STANDARD;

    if let Some(basic) = auth.strip_prefix("Basic ") {
        let expected = engine.encode(format!("{USER}:{PASSWORD}"));
        if basic == expected {
            return (StatusCode::CREATED, Json(json!(mock.open_session("basic")))).into_response();
        }
    } else if let Some(sign) = auth.strip_prefix("SIGN token=\"") {
        let decoded = engine
            .decode(sign.trim_end_matches('"'))
            .ok()
            .and_then(|b| String::from_utf8(b).ok())
            .unwrap_or_default();
        if decoded.contains("saml2:Assertion") && decoded.contains("_issued") {
            return (StatusCode::CREATED, Json(json!(mock.open_session("saml")))).into_response();
        }
    }
    unauthorized()
}

async fn current_session(State(mock): Shared, headers: HeaderMap) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"user": USER, "created_time": Utc::now().to_rfc3339()})).into_response()
}

async fn logout(State(mock): Shared, headers: HeaderMap) -> Response {
    let id = headers
        .get("vmware-api-session-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    mock.logouts.fetch_add(1, Ordering::SeqCst);
    if mock.sessions.lock().unwrap().remove(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        unauthorized()
    }
}

#[derive(serde::Deserialize)]
struct VmFilter {
    names: Option<String>,
}

async fn list_vms(State(mock): Shared, headers: HeaderMap, Query(filter): Query<VmFilter>) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    let power = mock.power.lock().unwrap().clone();
    let all = vec![
        json!({"vm": "vm-42", "name": "web-01", "power_state": power, "cpu_count": 2, "memory_size_MiB": 4096}),
        json!({"vm": "vm-43", "name": "db-01", "power_state": "POWERED_ON", "cpu_count": 8, "memory_size_MiB": 32768}),
    ];
    let rows: Vec<_> = match filter.names {
        Some(name) => all.into_iter().filter(|v| v["name"] == name.as_str()).collect(),
        None => all,
    };
    Json(rows).into_response()
}

async fn power_state(State(mock): Shared, headers: HeaderMap, Path(_vm): Path<String>) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    let state = mock.power.lock().unwrap().clone();
    Json(json!({"state": state})).into_response()
}

#[derive(serde::Deserialize)]
struct PowerQuery {
    action: String,
}

async fn power_action(
    State(mock): Shared,
    headers: HeaderMap,
    Path(_vm): Path<String>,
    Query(q): Query<PowerQuery>,
) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    let next = match q.action.as_str() {
        "start" | "reset" => "POWERED_ON",
        "stop" => "POWERED_OFF",
        "suspend" => "SUSPENDED",
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };
    mock.power_calls.lock().unwrap().push(q.action);
    *mock.power.lock().unwrap() = next.to_string();
    StatusCode::NO_CONTENT.into_response()
}

async fn guest_identity(State(mock): Shared, headers: HeaderMap, Path(_vm): Path<String>) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.guest_polls.fetch_add(1, Ordering::SeqCst);
    let remaining = mock.guest_not_ready.load(Ordering::SeqCst);
    if remaining > 0 {
        mock.guest_not_ready.store(remaining - 1, Ordering::SeqCst);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error_type": "SERVICE_UNAVAILABLE"})),
        )
            .into_response();
    }
    Json(json!({
        "name": "UBUNTU_64",
        "family": "LINUX",
        "full_name": {"default_message": "Ubuntu Linux (64-bit)", "id": "vmsg.guestos.ubuntu64Guest.label", "args": []},
        "host_name": "web-01",
        "ip_address": "10.0.0.42"
    }))
    .into_response()
}

async fn task(State(mock): Shared, headers: HeaderMap, Path(task): Path<String>) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.task_polls.fetch_add(1, Ordering::SeqCst);
    let status = mock.tasks.lock().unwrap().pop_front().unwrap_or("RUNNING");
    let mut body = json!({
        "status": status,
        "description": {"default_message": format!("Task {task}"), "id": "task"},
        "progress": {"completed": 50, "total": 100, "message": {"default_message": "", "id": "p"}}
    });
    if status == "FAILED" {
        body["error"] = json!({"messages": [{"default_message": "Insufficient disk space", "id": "e"}]});
    }
    Json(body).into_response()
}

async fn health(State(mock): Shared, headers: HeaderMap, Path(item): Path<String>) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    match item.as_str() {
        "system" | "mem" | "load" => Json(json!("green")).into_response(),
        "storage" => Json(json!("yellow")).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn sts(State(mock): Shared, body: String) -> Response {
    mock.sts_requests.fetch_add(1, Ordering::SeqCst);
    let good = body.contains(&format!("<wsse:Username>{USER}</wsse:Username>"))
        && body.contains("<wsse:Password>VMware1!</wsse:Password>");
    if !good {
        let fault = r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><S:Fault><faultcode xmlns:ns0="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">ns0:FailedAuthentication</faultcode><faultstring>Authentication failed: invalid credentials</faultstring></S:Fault></S:Body></S:Envelope>"#;
        return (StatusCode::INTERNAL_SERVER_ERROR, fault).into_response();
    }
    let assertion = saml_assertion("_issued", Duration::minutes(10));
    let rstr = format!(
        r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><wst:RequestSecurityTokenResponseCollection xmlns:wst="http://docs.oasis-open.org/ws-sx/ws-trust/200512"><wst:RequestSecurityTokenResponse><wst:TokenType>urn:oasis:names:tc:SAML:2.0:assertion</wst:TokenType><wst:RequestedSecurityToken>{assertion}</wst:RequestedSecurityToken></wst:RequestSecurityTokenResponse></wst:RequestSecurityTokenResponseCollection></S:Body></S:Envelope>"#
    );
    (StatusCode::OK, [("content-type", "text/xml")], rstr).into_response()
}

async fn bad_gateway() -> Response {
    let page = "<html>\r\n<head><title>502 Bad Gateway</title></head>\r\n<body>\r\n<center><h1>502 Bad Gateway</h1></center>\r\n<hr><center>nginx</center>\r\n</body>\r\n</html>\r\n";
    (StatusCode::BAD_GATEWAY, [("content-type", "text/html")], page).into_response()
}
