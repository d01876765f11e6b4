//! Contract upgrade simulator.
//!
//! Spins up N participants co-owning one `token-v1` state, connected by an in-memory network,
//! and runs the upgrade handshake moving it to `token-v2`.

mod args;
mod config;
mod demo;
mod sim;

use anyhow::Context;
use args::{Args, EnvArgs};
use config::Config;
use strata_upgrade_common::logging::{self, LoggingInitConfig};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if let Err(e) = main_inner(args) {
        eprintln!("FATAL ERROR: {e:#}");

        return Err(e);
    }

    Ok(())
}

fn main_inner(args: Args) -> anyhow::Result<()> {
    let config = Config::from_args(&args)?;

    // Init the logging before we do anything else.
    init_logging(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("upgrade-sim-rt")
        .build()
        .context("init: build rt")?;

    let report = runtime.block_on(sim::run(&config))?;

    info!(
        txid = %report.upgraded.id(),
        signers = report.upgraded.sigs().len(),
        consistent = report.is_consistent(),
        "simulation finished"
    );
    for (participant, outcome) in &report.acceptor_outcomes {
        info!(%participant, ?outcome, "acceptor outcome");
    }

    Ok(())
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let env_args = EnvArgs::from_env();
    let lc = &config.logging;

    // Env label wins over the config file.
    let service_label = env_args
        .service_label
        .as_deref()
        .or(lc.service_label.as_deref());

    logging::init_logging_from_config(LoggingInitConfig {
        service_base_name: "strata-upgrade-sim",
        service_label,
        log_dir: lc.log_dir.as_ref(),
        log_file_prefix: lc.log_file_prefix.as_deref(),
        json_format: lc.json_format,
        directives: &lc.directives,
        default_log_prefix: "upgrade-sim",
    })?;

    Ok(())
}
