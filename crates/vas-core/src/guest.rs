//! In-guest readiness: wait for VMware Tools to report the guest identity.
//!
//! `GET /api/vcenter/vm/{vm}/guest/identity` answers 503 while tools are not
//! running yet. That is the "not ready" signal; every other failure is real
//! and aborts the wait.

use crate::error::{VasErrorKind, VasResult};
use crate::session::SessionContext;
use crate::task::{wait_until_ready, PollSettings};
use crate::transport::Stub;
use crate::types::{GuestIdentity, ServiceKind};

use log::{debug, info};

/// One readiness probe of the guest identity.
pub async fn guest_identity_probe(vm_stub: &Stub, vm_id: &str) -> VasResult<Option<GuestIdentity>> {
    match vm_stub.get::<GuestIdentity>(&format!("/{vm_id}/guest/identity")).await {
        Ok(identity) => Ok(Some(identity)),
        Err(e) if matches!(e.kind, VasErrorKind::ServiceUnavailable) => {
            debug!("Guest tools on {vm_id} not ready yet");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Wait until guest tools on `vm_id` report an identity.
pub async fn wait_for_guest_identity(
    session: &SessionContext,
    vm_id: &str,
    settings: PollSettings,
) -> VasResult<GuestIdentity> {
    let vms = session.create_stub(ServiceKind::Vm)?;
    info!("Waiting for guest identity of {vm_id} (up to {:?})", settings.deadline);
    wait_until_ready(|| guest_identity_probe(&vms, vm_id), settings).await
}
