//! toadbox-init: container entrypoint.
//!
//! Boots the container's services and then blocks on the anchor. The exit
//! code is the anchor process's, 0 on an external stop, or 1 when a required
//! service failed to start.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use toadbox::logging::init_logging;
use toadbox::{Layout, Orchestrator, ServiceConfig, shutdown_signal};

#[derive(Parser, Debug)]
#[command(name = "toadbox-init", version, about = "Container startup orchestrator")]
struct Args {
    /// Print the resolved configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,

    /// Also write logs to a daily-rotated file in this directory.
    #[arg(long, env = "TOADBOX_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let guard = init_logging(args.log_dir.as_deref());

    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Boot failed");
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}

fn run(args: Args) -> anyhow::Result<i32> {
    let config = ServiceConfig::from_process_env();

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(0);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let outcome = Orchestrator::new(config, Layout::default())
            .boot()
            .await
            .context("required service failed to start")?;
        Ok(outcome.run_until_exit(shutdown_signal()).await)
    })
}
