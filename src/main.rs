use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use mimalloc::MiMalloc;
use tracing::{debug, error, info};

mod check;
mod client;
mod config;
mod error;
mod metrics;
mod telemetry;

use crate::check::{Status, Thresholds, Verdict};
use crate::client::StatusClient;
use crate::config::Config;
use crate::error::Result;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const SERVICE_NAME: &str = "check_ttn_gateway";

fn main() -> ExitCode {
    // Argument errors are UNKNOWN to the supervisor, not clap's usual exit code 2.
    let cfg = match Config::try_parse() {
        Ok(cfg) => cfg,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            println!("UNKNOWN: invalid command line arguments");
            return Status::Unknown.into();
        }
    };

    let telemetry = telemetry::init(SERVICE_NAME, cfg.log_directive());
    debug!(
        gateway = %cfg.gateway,
        server = %cfg.server,
        warning = cfg.warning,
        critical = cfg.critical,
        timeout_ms = cfg.timeout_ms,
        "Parsed configuration"
    );

    let verdict = run(&cfg).unwrap_or_else(|err| {
        error!(error = %err, "Check could not run");
        Verdict::from_error(&err)
    });
    info!(status = verdict.status.label(), gateway = %cfg.gateway, "Check complete");

    println!("{verdict}");
    telemetry.shutdown();
    verdict.exit_code()
}

fn run(cfg: &Config) -> Result<Verdict> {
    let thresholds = Thresholds::new(cfg.warning, cfg.critical);
    let client = StatusClient::new(&cfg.server, &cfg.key, cfg.timeout())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(check::evaluate(&client, &cfg.gateway, thresholds)))
}
