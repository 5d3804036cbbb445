use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;

use objcentric_launcher::args::{PredictArgs, ProbeArgs, ProbeCommand};
use objcentric_launcher::probe::{self, ProbeClient};
use objcentric_launcher::{print_err, print_info, print_success};

fn main() -> ExitCode {
    let args = match ProbeArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_err!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: ProbeCommand) -> objcentric_launcher::Result<()> {
    match command {
        ProbeCommand::Health(args) => health(&args.server.url, args.timeout),
        ProbeCommand::Predict(args) => predict(&args),
        ProbeCommand::Smoke(args) => {
            health(&args.server.url, args.timeout)?;
            predict(&args)?;
            print_success!("Smoke test passed");
            Ok(())
        }
    }
}

fn health(url: &str, timeout: u64) -> objcentric_launcher::Result<()> {
    let client = ProbeClient::new(url, Duration::from_secs(timeout))?;
    let status = client.health().context("Health check failed")?;
    print_success!("{} is healthy ({status})", client.base_url());
    Ok(())
}

fn predict(args: &PredictArgs) -> objcentric_launcher::Result<()> {
    let client = ProbeClient::new(&args.server.url, Duration::from_secs(args.timeout))?;
    let image_base64 = match &args.image {
        Some(path) => {
            print_info!("Sending {}", path.display());
            probe::file_base64(path)?
        }
        None => {
            print_info!("Sending a synthetic test image");
            probe::png_base64(&probe::synthetic_image())?
        }
    };

    let response = client
        .predict(image_base64)
        .context("Prediction request failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    print_success!(
        "Pool holds {} kernel(s), {} match(es) returned",
        response.num_kernels,
        response.matched_kernel_ids.len()
    );
    Ok(())
}
