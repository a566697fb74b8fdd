//! Sample driver: login → setup → run → cleanup → logout as an explicit
//! pipeline of async steps.
//!
//! Every step receives the live [`SessionContext`] and the sample's own
//! mutable state. The driver logs in first and always logs out, whether the
//! steps succeed or fail. Cleanup steps only run when `clear_data` is set,
//! and then they run even after a failed setup / run phase.

use crate::error::VasResult;
use crate::exchange::{CredentialExchanger, ExchangeRequest};
use crate::session::SessionContext;

use futures::future::BoxFuture;
use log::{debug, info, warn};

/// Future returned by a pipeline step.
pub type StepFuture<'a> = BoxFuture<'a, VasResult<()>>;

type Step<S> = Box<dyn for<'a> FnOnce(&'a SessionContext, &'a mut S) -> StepFuture<'a> + Send>;

/// Ordered setup / run / cleanup steps over sample state `S`.
pub struct SamplePipeline<S> {
    name: String,
    state: S,
    setup: Vec<Step<S>>,
    run: Vec<Step<S>>,
    cleanup: Vec<Step<S>>,
    clear_data: bool,
}

impl<S: Send + 'static> SamplePipeline<S> {
    pub fn new(name: impl Into<String>, state: S) -> Self {
        Self {
            name: name.into(),
            state,
            setup: Vec::new(),
            run: Vec::new(),
            cleanup: Vec::new(),
            clear_data: false,
        }
    }

    pub fn setup<F>(mut self, step: F) -> Self
    where
        F: for<'a> FnOnce(&'a SessionContext, &'a mut S) -> StepFuture<'a> + Send + 'static,
    {
        self.setup.push(Box::new(step));
        self
    }

    pub fn run<F>(mut self, step: F) -> Self
    where
        F: for<'a> FnOnce(&'a SessionContext, &'a mut S) -> StepFuture<'a> + Send + 'static,
    {
        self.run.push(Box::new(step));
        self
    }

    pub fn cleanup<F>(mut self, step: F) -> Self
    where
        F: for<'a> FnOnce(&'a SessionContext, &'a mut S) -> StepFuture<'a> + Send + 'static,
    {
        self.cleanup.push(Box::new(step));
        self
    }

    /// Undo what the sample created (`--cleardata`).
    pub fn clear_data(mut self, clear: bool) -> Self {
        self.clear_data = clear;
        self
    }

    /// Log in, run every phase, log out. Returns the final sample state.
    pub async fn execute(
        self,
        exchanger: &CredentialExchanger,
        request: ExchangeRequest,
    ) -> VasResult<S> {
        let Self {
            name,
            mut state,
            setup,
            run,
            cleanup,
            clear_data,
        } = self;

        // Nothing to release if login itself fails.
        let mut session = exchanger.exchange(request).await?;
        info!("[{name}] session open on {}", session.authority());

        let mut result = run_phase(&name, "setup", setup, &session, &mut state).await;
        if result.is_ok() {
            result = run_phase(&name, "run", run, &session, &mut state).await;
        }

        if clear_data {
            if let Err(e) = run_phase(&name, "cleanup", cleanup, &session, &mut state).await {
                warn!("[{name}] cleanup failed: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        let logout = session.logout().await;
        match (result, logout) {
            (Ok(()), Ok(())) => Ok(state),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(logout_err)) => {
                warn!("[{name}] logout after failure also failed: {logout_err}");
                Err(e)
            }
        }
    }
}

async fn run_phase<S>(
    name: &str,
    phase: &str,
    steps: Vec<Step<S>>,
    session: &SessionContext,
    state: &mut S,
) -> VasResult<()> {
    for (i, step) in steps.into_iter().enumerate() {
        debug!("[{name}] {phase} step {}", i + 1);
        step(session, &mut *state).await?;
    }
    Ok(())
}
