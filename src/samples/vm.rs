//! VM lookups and power calls shared by the VM samples.

use serde::{Deserialize, Serialize};
use vas_core::transport::Stub;
use vas_core::{VasError, VasResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PoweredOn => "POWERED_ON",
            Self::PoweredOff => "POWERED_OFF",
            Self::Suspended => "SUSPENDED",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// One row of GET /api/vcenter/vm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSummary {
    /// Managed-object id (e.g. "vm-42")
    pub vm: String,
    pub name: String,
    pub power_state: PowerState,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default, rename = "memory_size_MiB")]
    pub memory_size_mib: Option<u64>,
}

pub async fn list_vms(vms: &Stub) -> VasResult<Vec<VmSummary>> {
    vms.get("").await
}

/// Resolve a VM by its exact name.
pub async fn find_vm(vms: &Stub, name: &str) -> VasResult<VmSummary> {
    let found: Vec<VmSummary> = vms.get_with_params("", &[("names", name)]).await?;
    found
        .into_iter()
        .find(|v| v.name == name)
        .ok_or_else(|| VasError::not_found(format!("No VM named '{name}'")))
}

pub async fn power_state(vms: &Stub, vm_id: &str) -> VasResult<PowerState> {
    #[derive(Deserialize)]
    struct PowerInfo {
        state: PowerState,
    }
    let info: PowerInfo = vms.get(&format!("/{vm_id}/power")).await?;
    Ok(info.state)
}

/// POST /api/vcenter/vm/{vm}/power?action={action}
pub async fn power_action(vms: &Stub, vm_id: &str, action: &str) -> VasResult<()> {
    vms.post_empty(&format!("/{vm_id}/power?action={action}")).await
}
