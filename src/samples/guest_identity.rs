//! Wait for guest tools inside a VM to come up and report who the guest is.

use vas_core::guest::wait_for_guest_identity;
use vas_core::pipeline::{SamplePipeline, StepFuture};
use vas_core::types::GuestIdentity;
use vas_core::{PollSettings, ServiceKind, SessionContext, VasError};

use super::vm;

#[derive(Debug)]
pub struct GuestIdentitySample {
    pub vmname: String,
    pub poll: PollSettings,
    pub vm_id: Option<String>,
    pub identity: Option<GuestIdentity>,
}

pub fn pipeline(vmname: &str, poll: PollSettings) -> SamplePipeline<GuestIdentitySample> {
    let state = GuestIdentitySample {
        vmname: vmname.to_string(),
        poll,
        vm_id: None,
        identity: None,
    };
    SamplePipeline::new("guest-identity", state).setup(locate).run(wait)
}

fn locate<'a>(session: &'a SessionContext, state: &'a mut GuestIdentitySample) -> StepFuture<'a> {
    Box::pin(async move {
        let vms = session.create_stub(ServiceKind::Vm)?;
        state.vm_id = Some(vm::find_vm(&vms, &state.vmname).await?.vm);
        Ok(())
    })
}

fn wait<'a>(session: &'a SessionContext, state: &'a mut GuestIdentitySample) -> StepFuture<'a> {
    Box::pin(async move {
        let vm_id = state
            .vm_id
            .clone()
            .ok_or_else(|| VasError::not_found(format!("VM '{}' was not resolved", state.vmname)))?;
        state.identity = Some(wait_for_guest_identity(session, &vm_id, state.poll).await?);
        Ok(())
    })
}

impl GuestIdentitySample {
    pub fn report(&self) -> String {
        let Some(id) = &self.identity else {
            return format!("{}: no guest identity", self.vmname);
        };
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
        let full_name = id
            .full_name
            .as_ref()
            .and_then(|v| v.get("default_message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| "-".into());
        format!(
            "{} ({})\n  OS:        {} ({})\n  Full name: {}\n  Host name: {}\n  IP:        {}",
            self.vmname,
            self.vm_id.as_deref().unwrap_or("?"),
            field(&id.name),
            field(&id.family),
            full_name,
            field(&id.host_name),
            field(&id.ip_address),
        )
    }
}
