use vas_core::pipeline::{SamplePipeline, StepFuture};
use vas_core::{ServiceKind, SessionContext};

use crate::cli::HealthItem;

#[derive(Debug)]
pub struct ApplianceHealth {
    pub item: HealthItem,
    /// green / yellow / orange / red / gray
    pub level: Option<String>,
}

pub fn pipeline(item: HealthItem) -> SamplePipeline<ApplianceHealth> {
    SamplePipeline::new("appliance-health", ApplianceHealth { item, level: None }).run(check)
}

fn check<'a>(session: &'a SessionContext, state: &'a mut ApplianceHealth) -> StepFuture<'a> {
    Box::pin(async move {
        let health = session.create_stub(ServiceKind::ApplianceHealth)?;
        let level: String = health.get(state.item.path()).await?;
        state.level = Some(level);
        Ok(())
    })
}

impl ApplianceHealth {
    pub fn report(&self) -> String {
        format!(
            "{}: {}",
            self.item.path().trim_start_matches('/'),
            self.level.as_deref().unwrap_or("unknown")
        )
    }
}
