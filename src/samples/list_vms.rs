use vas_core::pipeline::{SamplePipeline, StepFuture};
use vas_core::{ServiceKind, SessionContext};

use super::vm::{self, VmSummary};

pub fn pipeline() -> SamplePipeline<Vec<VmSummary>> {
    SamplePipeline::new("list-vms", Vec::new()).run(list)
}

fn list<'a>(session: &'a SessionContext, out: &'a mut Vec<VmSummary>) -> StepFuture<'a> {
    Box::pin(async move {
        let vms = session.create_stub(ServiceKind::Vm)?;
        *out = vm::list_vms(&vms).await?;
        log::info!("{} VM(s) on {}", out.len(), session.authority());
        Ok(())
    })
}

pub fn report(vms: &[VmSummary]) -> String {
    let mut out = format!("{:<12} {:<32} {:<12} {:>4} {:>9}", "ID", "NAME", "POWER", "CPU", "MEM(MiB)");
    for v in vms {
        out += &format!(
            "\n{:<12} {:<32} {:<12} {:>4} {:>9}",
            v.vm,
            v.name,
            v.power_state,
            v.cpu_count.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            v.memory_size_mib.map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    out
}
