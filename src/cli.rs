use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::PathBuf;

use vas_core::config::SampleConfig;

#[derive(Parser, Debug)]
#[command(
    name = "vas-samples",
    version,
    about = "vSphere Automation sample programs"
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Undo whatever the sample created before exiting
    #[arg(long, global = true)]
    pub cleardata: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Where and how to log in. Flags override the config file.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// vCenter / ESXi host name or URL
    #[arg(short, long, env = "VAS_SERVER", global = true)]
    pub server: Option<String>,

    #[arg(short, long, env = "VAS_USERNAME", global = true)]
    pub username: Option<String>,

    #[arg(short, long, env = "VAS_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<SecretString>,

    /// TOML file with connection, SSO and poll settings
    #[arg(short = 'c', long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Do not verify the server certificate
    #[arg(long, global = true)]
    pub skip_server_verification: bool,

    /// Log in through the SSO token service (SAML bearer token)
    #[arg(long, global = true)]
    pub federated: bool,

    /// Token service URL; implies --federated
    #[arg(long, global = true)]
    pub sso_url: Option<String>,
}

impl ConnectionArgs {
    /// Load the config file (if any) and move the flags on top of it.
    pub fn resolve(self) -> vas_core::VasResult<SampleConfig> {
        let mut cfg = match &self.config_file {
            Some(path) => SampleConfig::load(path)?,
            None => SampleConfig::default(),
        };
        self.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply(self, cfg: &mut SampleConfig) {
        if self.server.is_some() {
            cfg.server = self.server;
        }
        if self.username.is_some() {
            cfg.username = self.username;
        }
        if self.password.is_some() {
            cfg.password = self.password;
        }
        if self.skip_server_verification {
            cfg.skip_server_verification = true;
            cfg.sso.skip_tls_verification = true;
        }
        if self.federated {
            cfg.sso.enabled = true;
        }
        if let Some(url) = self.sso_url {
            cfg.sso.enabled = true;
            cfg.sso.url = Some(url);
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in, print the session and check it is still valid, log out
    SessionInfo,

    /// List virtual machines
    ListVms,

    /// Change the power state of a VM
    VmPower {
        #[arg(long)]
        vmname: String,

        #[arg(long, value_enum)]
        action: PowerAction,
    },

    /// Wait for guest tools to report the guest identity of a VM
    GuestIdentity {
        #[arg(long)]
        vmname: String,

        /// Seconds to wait (defaults to the poll timeout)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Wait for a vCenter task to finish
    WaitTask {
        /// Task identifier
        #[arg(long)]
        task: String,

        /// Seconds to wait (defaults to the poll timeout)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show one appliance health item
    ApplianceHealth {
        #[arg(long, value_enum)]
        item: HealthItem,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
    Suspend,
    Reset,
}

impl PowerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Suspend => "suspend",
            Self::Reset => "reset",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthItem {
    System,
    Mem,
    Storage,
    Swap,
    Load,
    DatabaseStorage,
    Applmgmt,
}

impl HealthItem {
    /// Path segment under `/api/appliance/health`.
    pub fn path(self) -> &'static str {
        match self {
            Self::System => "/system",
            Self::Mem => "/mem",
            Self::Storage => "/storage",
            Self::Swap => "/swap",
            Self::Load => "/load",
            Self::DatabaseStorage => "/database-storage",
            Self::Applmgmt => "/applmgmt",
        }
    }
}
