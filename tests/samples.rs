mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{MockServer, PASSWORD, USER};
use samples_lib::cli::{HealthItem, PowerAction};
use samples_lib::samples::vm::PowerState;
use samples_lib::samples::{appliance_health, guest_identity, list_vms, session_info, vm_power, wait_task};
use secrecy::SecretString;
use vas_core::config::SsoConfig;
use vas_core::exchange::DirectCredentials;
use vas_core::types::TransportConfig;
use vas_core::{CredentialExchanger, ExchangeRequest, OperationOutcome, OperationStatus, PollSettings, VasErrorKind};

fn exchanger() -> CredentialExchanger {
    let transport = TransportConfig {
        skip_tls_verification: false,
        timeout_secs: 5,
    };
    CredentialExchanger::new(transport, &SsoConfig::default()).unwrap()
}

fn login(server: &MockServer) -> ExchangeRequest {
    ExchangeRequest::Direct(DirectCredentials {
        server: server.url.clone(),
        username: USER.to_string(),
        password: SecretString::new(PASSWORD.to_string()),
    })
}

fn fast_poll(deadline_ms: u64) -> PollSettings {
    PollSettings::new(Duration::from_millis(10), Duration::from_millis(deadline_ms)).unwrap()
}

fn assert_logged_out(server: &MockServer) {
    assert_eq!(server.state.logouts.load(Ordering::SeqCst), 1);
    assert_eq!(server.state.active_sessions(), 0);
}

#[tokio::test]
async fn session_info_reports_valid_session() {
    let server = MockServer::start().await;
    let info = session_info::pipeline().execute(&exchanger(), login(&server)).await.unwrap();

    assert!(info.valid);
    assert!(info.report().contains(&server.url));
    assert_logged_out(&server);
}

#[tokio::test]
async fn list_vms_returns_every_vm() {
    let server = MockServer::start().await;
    let vms = list_vms::pipeline().execute(&exchanger(), login(&server)).await.unwrap();

    assert_eq!(vms.len(), 2);
    assert_eq!(vms[1].cpu_count, Some(8));
    assert!(list_vms::report(&vms).contains("db-01"));
    assert_logged_out(&server);
}

#[tokio::test]
async fn vm_power_changes_state() {
    let server = MockServer::start().await;
    let state = vm_power::pipeline("web-01", PowerAction::Start, false)
        .execute(&exchanger(), login(&server))
        .await
        .unwrap();

    assert_eq!(state.vm_id.as_deref(), Some("vm-42"));
    assert_eq!(state.before, Some(PowerState::PoweredOff));
    assert_eq!(state.after, Some(PowerState::PoweredOn));
    assert_eq!(state.restored, None);
    assert_eq!(*server.state.power_calls.lock().unwrap(), ["start"]);
    assert_logged_out(&server);
}

#[tokio::test]
async fn vm_power_cleardata_restores_original_state() {
    let server = MockServer::start().await;
    let state = vm_power::pipeline("web-01", PowerAction::Start, true)
        .execute(&exchanger(), login(&server))
        .await
        .unwrap();

    assert_eq!(state.restored, Some(PowerState::PoweredOff));
    assert_eq!(*server.state.power_calls.lock().unwrap(), ["start", "stop"]);
    assert_logged_out(&server);
}

#[tokio::test]
async fn failed_step_still_logs_out() {
    let server = MockServer::start().await;
    let err = vm_power::pipeline("no-such-vm", PowerAction::Stop, true)
        .execute(&exchanger(), login(&server))
        .await
        .unwrap_err();

    assert!(matches!(err.kind, VasErrorKind::NotFound), "got {err}");
    assert!(server.state.power_calls.lock().unwrap().is_empty());
    assert_logged_out(&server);
}

#[tokio::test]
async fn wait_task_until_finished() {
    let server = MockServer::start().await;
    server.state.script_tasks(&["RUNNING", "RUNNING", "SUCCEEDED"]);

    let state = wait_task::pipeline("task-7", fast_poll(5_000))
        .execute(&exchanger(), login(&server))
        .await
        .unwrap();

    let outcome = state.outcome.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.handle().status, OperationStatus::Finished);
    assert_eq!(server.state.task_polls.load(Ordering::SeqCst), 3);
    assert_logged_out(&server);
}

#[tokio::test]
async fn wait_task_failed_is_an_outcome() {
    let server = MockServer::start().await;
    server.state.script_tasks(&["FAILED"]);

    let state = wait_task::pipeline("task-8", fast_poll(5_000))
        .execute(&exchanger(), login(&server))
        .await
        .unwrap();

    assert!(state.report().contains("Insufficient disk space"));
    let outcome = state.outcome.unwrap();
    assert!(matches!(outcome, OperationOutcome::Failed(_)));
    assert_eq!(server.state.task_polls.load(Ordering::SeqCst), 1);

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err.kind, VasErrorKind::OperationFailed));
}

#[tokio::test]
async fn wait_task_times_out_with_last_state() {
    let server = MockServer::start().await;
    server.state.script_tasks(&["PENDING", "BLOCKED", "SOMETHING_NEW"]);

    let err = wait_task::pipeline("task-9", fast_poll(150))
        .execute(&exchanger(), login(&server))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "got {err}");
    let last = err.last_observed().unwrap();
    assert_eq!(last.id, "task-9");
    assert!(!last.status.is_terminal());
    assert_logged_out(&server);
}

#[tokio::test]
async fn guest_identity_waits_for_tools() {
    let server = MockServer::start().await;
    server.state.guest_not_ready.store(2, Ordering::SeqCst);

    let state = guest_identity::pipeline("web-01", fast_poll(5_000))
        .execute(&exchanger(), login(&server))
        .await
        .unwrap();

    let identity = state.identity.as_ref().unwrap();
    assert_eq!(identity.ip_address.as_deref(), Some("10.0.0.42"));
    assert_eq!(server.state.guest_polls.load(Ordering::SeqCst), 3);
    assert!(state.report().contains("Ubuntu Linux (64-bit)"));
    assert_logged_out(&server);
}

#[tokio::test]
async fn guest_identity_gives_up_at_deadline() {
    let server = MockServer::start().await;
    server.state.guest_not_ready.store(usize::MAX, Ordering::SeqCst);

    let err = guest_identity::pipeline("web-01", fast_poll(100))
        .execute(&exchanger(), login(&server))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.last_observed().is_none());
    assert_logged_out(&server);
}

#[tokio::test]
async fn appliance_health_levels() {
    let server = MockServer::start().await;
    let state = appliance_health::pipeline(HealthItem::Storage)
        .execute(&exchanger(), login(&server))
        .await
        .unwrap();
    assert_eq!(state.report(), "storage: yellow");

    let err = appliance_health::pipeline(HealthItem::Swap)
        .execute(&exchanger(), login(&server))
        .await
        .unwrap_err();
    assert!(matches!(err.kind, VasErrorKind::NotFound));
}
