//! Operation poller: wait for a remote task, or an in-guest readiness probe,
//! to settle.
//!
//! Both waits use fixed-interval polling under a mandatory overall deadline.
//! Each iteration sleeps `interval` first, then fetches once. A terminal task
//! status or a present probe payload ends the wait; fetch errors abort it;
//! anything else polls again until the deadline passes.

use crate::error::{VasError, VasResult};
use crate::session::SessionContext;
use crate::transport::Stub;
use crate::types::ServiceKind;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Operation status / handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Status of a long-running remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationStatus {
    Pending,
    Started,
    Finished,
    Failed,
    Canceled,
    /// A status this client does not know. Never terminal.
    Unknown(String),
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Finished | Self::Failed | Self::Canceled => true,
            Self::Pending | Self::Started | Self::Unknown(_) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for OperationStatus {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "BLOCKED" | "QUEUED" => Self::Pending,
            "STARTED" | "RUNNING" => Self::Started,
            "FINISHED" | "SUCCEEDED" | "SUCCESS" => Self::Finished,
            "FAILED" | "ERROR" => Self::Failed,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            _ => Self::Unknown(raw.to_string()),
        }
    }
}

impl From<String> for OperationStatus {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<OperationStatus> for String {
    fn from(s: OperationStatus) -> String {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote representation of a long-running action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHandle {
    pub id: String,
    pub status: OperationStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OperationHandle {
    pub fn new(id: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            id: id.into(),
            status,
            progress: None,
            message: None,
        }
    }
}

/// How a monitored operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Finished(OperationHandle),
    Failed(OperationHandle),
    Canceled(OperationHandle),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    pub fn handle(&self) -> &OperationHandle {
        match self {
            Self::Finished(h) | Self::Failed(h) | Self::Canceled(h) => h,
        }
    }

    /// Treat FAILED / CANCELED as an `OperationFailed` error.
    pub fn into_result(self) -> VasResult<OperationHandle> {
        match self {
            Self::Finished(h) => Ok(h),
            Self::Failed(h) | Self::Canceled(h) => Err(VasError::operation_failed(format!(
                "Operation {} ended {}{}",
                h.id,
                h.status,
                h.message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
            ))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Poll settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fixed poll interval plus the overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub deadline: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, deadline: Duration) -> VasResult<Self> {
        if interval.is_zero() {
            return Err(VasError::config("Poll interval must be greater than zero"));
        }
        if deadline < interval {
            return Err(VasError::config(format!(
                "Poll deadline ({deadline:?}) is shorter than the interval ({interval:?})"
            )));
        }
        Ok(Self { interval, deadline })
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: Duration::from_secs(300),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Pollers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Poll `fetch_status` until the operation is terminal or the deadline passes.
///
/// FAILED / CANCELED are returned as outcomes, not errors. Errors mean the
/// wait itself failed: a fetch error, or `Timeout` carrying the last handle.
/// A fetch still in flight when the deadline passes is abandoned.
pub async fn wait_until_terminal<F, Fut>(
    mut fetch_status: F,
    settings: PollSettings,
) -> VasResult<OperationOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VasResult<OperationHandle>>,
{
    let started = Instant::now();
    let mut polls = 0u32;
    let mut last: Option<OperationHandle> = None;

    loop {
        tokio::time::sleep(settings.interval).await;
        let remaining = settings.deadline.saturating_sub(started.elapsed());
        let handle = match tokio::time::timeout(remaining, fetch_status()).await {
            Ok(fetched) => fetched?,
            Err(_) => {
                return Err(VasError::timeout(
                    last,
                    format!("Status fetch still pending at the {:?} deadline ({polls} polls)", settings.deadline),
                ));
            }
        };
        polls += 1;

        match handle.status {
            OperationStatus::Finished => {
                info!("Operation {} finished after {polls} poll(s)", handle.id);
                return Ok(OperationOutcome::Finished(handle));
            }
            OperationStatus::Failed => {
                warn!("Operation {} failed", handle.id);
                return Ok(OperationOutcome::Failed(handle));
            }
            OperationStatus::Canceled => {
                warn!("Operation {} canceled", handle.id);
                return Ok(OperationOutcome::Canceled(handle));
            }
            OperationStatus::Unknown(ref raw) => {
                warn!("Operation {} reports unrecognised status '{raw}', still waiting", handle.id);
            }
            OperationStatus::Pending | OperationStatus::Started => {
                debug!(
                    "Operation {} {} ({}%)",
                    handle.id,
                    handle.status,
                    handle.progress.map(|p| p.to_string()).unwrap_or_else(|| "?".into())
                );
            }
        }

        if started.elapsed() >= settings.deadline {
            return Err(VasError::timeout(
                Some(handle.clone()),
                format!(
                    "Operation {} still {} after {:?} ({polls} polls)",
                    handle.id, handle.status, settings.deadline
                ),
            ));
        }
        last = Some(handle);
    }
}

/// Poll `fetch_probe` until it yields a payload or the deadline passes.
///
/// `Ok(None)` means "not ready yet". Any `Err` from the probe aborts the
/// wait immediately.
pub async fn wait_until_ready<F, Fut, T>(mut fetch_probe: F, settings: PollSettings) -> VasResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VasResult<Option<T>>>,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        tokio::time::sleep(settings.interval).await;
        polls += 1;

        let remaining = settings.deadline.saturating_sub(started.elapsed());
        let probed = tokio::time::timeout(remaining, fetch_probe())
            .await
            .map_err(|_| {
                VasError::timeout(
                    None,
                    format!("Probe still pending at the {:?} deadline ({polls} polls)", settings.deadline),
                )
            })??;

        if let Some(payload) = probed {
            debug!("Probe ready after {polls} poll(s)");
            return Ok(payload);
        }

        if started.elapsed() >= settings.deadline {
            return Err(VasError::timeout(
                None,
                format!("Not ready after {:?} ({polls} polls)", settings.deadline),
            ));
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Task service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct TaskInfo {
    status: String,
    #[serde(default)]
    progress: Option<TaskProgress>,
    #[serde(default)]
    error: Option<TaskError>,
    #[serde(default)]
    description: Option<LocalizableMessage>,
}

#[derive(Debug, Deserialize)]
struct TaskProgress {
    completed: u64,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    #[serde(default)]
    messages: Vec<LocalizableMessage>,
}

#[derive(Debug, Deserialize)]
struct LocalizableMessage {
    #[serde(default)]
    default_message: String,
}

impl TaskInfo {
    fn into_handle(self, id: &str) -> OperationHandle {
        let progress = self
            .progress
            .filter(|p| p.total > 0)
            .map(|p| (u128::from(p.completed.min(p.total)) * 100 / u128::from(p.total)) as u8);

        let message = self
            .error
            .and_then(|e| e.messages.into_iter().next())
            .or(self.description)
            .map(|m| m.default_message)
            .filter(|m| !m.is_empty());

        OperationHandle {
            id: id.to_string(),
            status: OperationStatus::from(self.status),
            progress,
            message,
        }
    }
}

/// Task lookups (GET /api/cis/tasks/{task}).
pub struct TaskStub {
    stub: Stub,
}

impl TaskStub {
    pub fn new(session: &SessionContext) -> VasResult<Self> {
        Ok(Self {
            stub: session.create_stub(ServiceKind::Tasks)?,
        })
    }

    pub async fn get(&self, task_id: &str) -> VasResult<OperationHandle> {
        let info: TaskInfo = self.stub.get(&format!("/{task_id}")).await?;
        Ok(info.into_handle(task_id))
    }
}

/// Wait for a vCenter task to finish.
pub async fn wait_for_task(
    session: &SessionContext,
    task_id: &str,
    settings: PollSettings,
) -> VasResult<OperationOutcome> {
    let tasks = TaskStub::new(session)?;
    info!("Waiting for task {task_id} (every {:?}, up to {:?})", settings.interval, settings.deadline);
    wait_until_terminal(|| tasks.get(task_id), settings).await
}
