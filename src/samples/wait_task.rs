use vas_core::pipeline::{SamplePipeline, StepFuture};
use vas_core::task::wait_for_task;
use vas_core::{OperationOutcome, PollSettings, SessionContext};

#[derive(Debug)]
pub struct WaitTask {
    pub task: String,
    pub poll: PollSettings,
    pub outcome: Option<OperationOutcome>,
}

pub fn pipeline(task: &str, poll: PollSettings) -> SamplePipeline<WaitTask> {
    let state = WaitTask {
        task: task.to_string(),
        poll,
        outcome: None,
    };
    SamplePipeline::new("wait-task", state).run(wait)
}

fn wait<'a>(session: &'a SessionContext, state: &'a mut WaitTask) -> StepFuture<'a> {
    Box::pin(async move {
        state.outcome = Some(wait_for_task(session, &state.task, state.poll).await?);
        Ok(())
    })
}

impl WaitTask {
    pub fn report(&self) -> String {
        match &self.outcome {
            None => format!("Task {}: no result", self.task),
            Some(outcome) => {
                let h = outcome.handle();
                let mut out = format!("Task {}: {}", h.id, h.status);
                if let Some(msg) = &h.message {
                    out += &format!(" ({msg})");
                }
                out
            }
        }
    }
}
