use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;

use objcentric_launcher::args::LaunchArgs;
use objcentric_launcher::execution::{self, cancellable::CancellationToken};
use objcentric_launcher::layout::ProjectLayout;
use objcentric_launcher::plan::{LaunchConfig, LaunchMode, LaunchPlan};
use objcentric_launcher::{print_err, print_info, toolchain};

fn main() -> ExitCode {
    let args = match LaunchArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match launch(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_err!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn launch(args: &LaunchArgs) -> objcentric_launcher::Result<()> {
    let layout = ProjectLayout::new(&args.project_dir);
    let config = LaunchConfig::from(args);

    layout
        .validate()
        .with_context(|| format!("Project at {} is not runnable", layout.root().display()))?;
    config.validate()?;

    let plan = LaunchPlan::new(&config, &layout);
    if args.dry_run {
        print_info!("Dry run, the following commands would be executed:");
        for command in plan.commands() {
            println!("{command}");
        }
        return Ok(());
    }

    match config.mode {
        LaunchMode::Local => {
            let version = toolchain::check_cargo()?;
            print_info!("Using cargo {version}");
        }
        LaunchMode::Docker => {
            let version = toolchain::check_docker()?;
            print_info!("Using {version}");
        }
    }

    print_info!(
        "Starting objcentric on {}:{} ({} worker(s), log level {}{})",
        config.host,
        config.port,
        config.workers,
        config.log_level,
        if config.reload { ", reload enabled" } else { "" }
    );
    execution::execute(&plan, &CancellationToken::new())?;
    Ok(())
}
