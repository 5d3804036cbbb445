use anyhow::{Context, Result};
use clap::Parser;

use objcentric_server::{app, args::Args, logging};

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.settings();
    logging::init(
        settings
            .as_ref()
            .map(|settings| settings.log_level)
            .unwrap_or_else(|_| args.log_level.unwrap_or_default()),
    );
    let settings = settings.inspect_err(|err| log::error!("Invalid settings: {err}"))?;

    // Built by hand so that `--workers` sizes the async runtime.
    let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.workers)
        .thread_name("objcentric-worker")
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime
        .block_on(app::run(settings))
        .inspect_err(|err| log::error!("Server failed: {err:#}"))
}
