//! One module per sample program. Each builds a `SamplePipeline` over its
//! own state and renders that state once the pipeline has logged out.

pub mod appliance_health;
pub mod guest_identity;
pub mod list_vms;
pub mod session_info;
pub mod vm;
pub mod vm_power;
pub mod wait_task;

use std::time::Duration;

use vas_core::{CredentialExchanger, PollSettings, VasResult};

use crate::cli::{Cli, Command};

/// Resolve config, log in and run the selected sample, printing its report.
pub async fn run(cli: Cli) -> VasResult<()> {
    let cfg = cli.connection.resolve()?;
    let exchanger = CredentialExchanger::new(cfg.transport(), &cfg.sso)?;
    let poll = cfg.poll.settings()?;
    let request = cfg.into_exchange_request()?;
    let clear = cli.cleardata;

    match cli.command {
        Command::SessionInfo => {
            let info = session_info::pipeline()
                .clear_data(clear)
                .execute(&exchanger, request)
                .await?;
            println!("{}", info.report());
        }
        Command::ListVms => {
            let vms = list_vms::pipeline()
                .clear_data(clear)
                .execute(&exchanger, request)
                .await?;
            println!("{}", list_vms::report(&vms));
        }
        Command::VmPower { vmname, action } => {
            let state = vm_power::pipeline(&vmname, action, clear)
                .execute(&exchanger, request)
                .await?;
            println!("{}", state.report());
        }
        Command::GuestIdentity { vmname, timeout } => {
            let state = guest_identity::pipeline(&vmname, with_timeout(poll, timeout)?)
                .clear_data(clear)
                .execute(&exchanger, request)
                .await?;
            println!("{}", state.report());
        }
        Command::WaitTask { task, timeout } => {
            let state = wait_task::pipeline(&task, with_timeout(poll, timeout)?)
                .clear_data(clear)
                .execute(&exchanger, request)
                .await?;
            println!("{}", state.report());
            // FAILED / CANCELED still exit non-zero.
            if let Some(outcome) = state.outcome {
                outcome.into_result()?;
            }
        }
        Command::ApplianceHealth { item } => {
            let state = appliance_health::pipeline(item)
                .clear_data(clear)
                .execute(&exchanger, request)
                .await?;
            println!("{}", state.report());
        }
    }
    Ok(())
}

/// Replace the configured deadline with `--timeout`, if given.
pub fn with_timeout(poll: PollSettings, timeout_secs: Option<u64>) -> VasResult<PollSettings> {
    match timeout_secs {
        Some(secs) => PollSettings::new(poll.interval, Duration::from_secs(secs)),
        None => Ok(poll),
    }
}
