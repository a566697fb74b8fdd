use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `log` records from the core crate are
/// bridged in through `tracing-log`.
///
/// `RUST_LOG` wins over `-v` when set.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    // A second init (tests) is not an error worth reporting.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .try_init();
}

fn default_filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    EnvFilter::new(format!("{level},hyper=warn,hyper_util=warn,rustls=warn,reqwest=warn"))
}
