//! Change a VM's power state. With `--cleardata` the original state is
//! restored before logging out.

use log::info;
use vas_core::pipeline::{SamplePipeline, StepFuture};
use vas_core::{ServiceKind, SessionContext, VasError, VasResult};

use super::vm::{self, PowerState};
use crate::cli::PowerAction;

#[derive(Debug)]
pub struct VmPower {
    pub vmname: String,
    pub action: PowerAction,
    pub vm_id: Option<String>,
    pub before: Option<PowerState>,
    pub after: Option<PowerState>,
    pub restored: Option<PowerState>,
}

impl VmPower {
    pub fn new(vmname: impl Into<String>, action: PowerAction) -> Self {
        Self {
            vmname: vmname.into(),
            action,
            vm_id: None,
            before: None,
            after: None,
            restored: None,
        }
    }

    fn vm_id(&self) -> VasResult<&str> {
        self.vm_id
            .as_deref()
            .ok_or_else(|| VasError::not_found(format!("VM '{}' was not resolved", self.vmname)))
    }

    pub fn report(&self) -> String {
        let show = |s: Option<PowerState>| s.map(|s| s.to_string()).unwrap_or_else(|| "?".into());
        let mut out = format!(
            "{} ({}): {} -> {} [{}]",
            self.vmname,
            self.vm_id.as_deref().unwrap_or("?"),
            show(self.before),
            show(self.after),
            self.action.as_str()
        );
        if self.restored.is_some() {
            out += &format!("\nrestored to {}", show(self.restored));
        }
        out
    }
}

pub fn pipeline(vmname: &str, action: PowerAction, clear_data: bool) -> SamplePipeline<VmPower> {
    SamplePipeline::new("vm-power", VmPower::new(vmname, action))
        .setup(locate)
        .run(apply)
        .cleanup(restore)
        .clear_data(clear_data)
}

fn locate<'a>(session: &'a SessionContext, state: &'a mut VmPower) -> StepFuture<'a> {
    Box::pin(async move {
        let vms = session.create_stub(ServiceKind::Vm)?;
        let found = vm::find_vm(&vms, &state.vmname).await?;
        info!("VM '{}' is {}", found.name, found.vm);
        state.vm_id = Some(found.vm);
        Ok(())
    })
}

fn apply<'a>(session: &'a SessionContext, state: &'a mut VmPower) -> StepFuture<'a> {
    Box::pin(async move {
        let vms = session.create_stub(ServiceKind::Vm)?;
        let vm_id = state.vm_id()?.to_string();
        state.before = Some(vm::power_state(&vms, &vm_id).await?);
        vm::power_action(&vms, &vm_id, state.action.as_str()).await?;
        state.after = Some(vm::power_state(&vms, &vm_id).await?);
        Ok(())
    })
}

fn restore<'a>(session: &'a SessionContext, state: &'a mut VmPower) -> StepFuture<'a> {
    Box::pin(async move {
        let (Some(before), Some(vm_id)) = (state.before, state.vm_id.clone()) else {
            return Ok(());
        };
        let vms = session.create_stub(ServiceKind::Vm)?;
        let current = vm::power_state(&vms, &vm_id).await?;
        if current != before {
            for action in restore_actions(current, before) {
                info!("Restoring {vm_id}: {action}");
                vm::power_action(&vms, &vm_id, action).await?;
            }
        }
        state.restored = Some(vm::power_state(&vms, &vm_id).await?);
        Ok(())
    })
}

/// Power actions that take a VM from `current` back to `target`.
fn restore_actions(current: PowerState, target: PowerState) -> Vec<&'static str> {
    use PowerState::*;
    match (current, target) {
        (a, b) if a == b => vec![],
        (_, PoweredOff) => vec!["stop"],
        (_, PoweredOn) => vec!["start"],
        (PoweredOn, Suspended) => vec!["suspend"],
        (_, Suspended) => vec!["start", "suspend"],
        (_, Unknown) => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PowerState::*;

    #[test]
    fn restore_paths() {
        assert!(restore_actions(PoweredOn, PoweredOn).is_empty());
        assert_eq!(restore_actions(PoweredOn, PoweredOff), ["stop"]);
        assert_eq!(restore_actions(Suspended, PoweredOff), ["stop"]);
        assert_eq!(restore_actions(PoweredOff, PoweredOn), ["start"]);
        assert_eq!(restore_actions(PoweredOn, Suspended), ["suspend"]);
        assert_eq!(restore_actions(PoweredOff, Suspended), ["start", "suspend"]);
    }

    #[test]
    fn report_before_lookup() {
        let state = VmPower::new("web-01", PowerAction::Start);
        assert_eq!(state.report(), "web-01 (?): ? -> ? [start]");
    }
}
