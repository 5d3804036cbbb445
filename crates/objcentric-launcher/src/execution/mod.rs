pub mod cancellable;
pub mod supervisor;

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use crate::plan::{LaunchPlan, PlannedCommand};
use crate::toolchain::Version;
use crate::{print_info, print_success};

use cancellable::{CancellableProcess, CancellableResult, CancellationToken};

#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    #[error("Dependency manifest not found at {}", .0.display())]
    MissingManifest(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    ReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Dependency manifest {} is not valid TOML: {source}", .path.display())]
    InvalidManifest {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Server entry point not found at {}", .0.display())]
    MissingEntryPoint(PathBuf),
    #[error("--{flag} must be at least 1, got {value}")]
    InvalidArgument { flag: &'static str, value: String },
    #[error("cargo {found} is too old, {required} or newer is required")]
    ToolchainTooOld { found: Version, required: Version },
    #[error("{tool} is not available: {reason}")]
    ToolUnavailable { tool: &'static str, reason: String },
    #[error("Failed to create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },
    #[error("Lost track of `{command}`: {source}")]
    Wait {
        command: String,
        source: std::io::Error,
    },
    #[error("Execution cancelled")]
    Cancelled,
}

/// Run every step of `plan`, stopping at the first failure.
pub fn execute(plan: &LaunchPlan, cancel_token: &CancellationToken) -> Result<(), LaunchError> {
    match plan {
        LaunchPlan::Local(local) => {
            std::fs::create_dir_all(&local.target_dir).map_err(|source| {
                LaunchError::CreateDir {
                    path: local.target_dir.clone(),
                    source,
                }
            })?;
            run_to_completion(&local.fetch, cancel_token)?;
            if local.watch.is_empty() {
                run_to_completion(&local.build, cancel_token)?;
                print_success!("Server built");
                run_to_completion(&local.serve, cancel_token)
            } else {
                supervisor::Supervisor::new(local).run(cancel_token)
            }
        }
        LaunchPlan::Compose { up } => run_to_completion(up, cancel_token),
        LaunchPlan::Docker { build, run } => {
            run_to_completion(build, cancel_token)?;
            print_success!("Image built");
            run_to_completion(run, cancel_token)
        }
    }
}

/// Spawn `command` with inherited output streams.
pub fn spawn(command: &PlannedCommand) -> Result<RunningCommand, LaunchError> {
    print_info!("Running {command}");
    command
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map(|child| RunningCommand {
            child,
            label: command.to_string(),
        })
        .map_err(|source| LaunchError::Spawn {
            command: command.to_string(),
            source,
        })
}

/// A spawned child remembering how it was started, for error messages.
pub struct RunningCommand {
    child: std::process::Child,
    label: String,
}

impl RunningCommand {
    /// Wait for the child; a cancelled token kills it.
    pub fn wait(self, cancel_token: &CancellationToken) -> Result<(), LaunchError> {
        let command = self.label;
        match CancellableProcess::new(self.child, cancel_token.clone()).wait() {
            CancellableResult::Completed(Ok(status)) if status.success() => Ok(()),
            CancellableResult::Completed(Ok(status)) => {
                Err(LaunchError::CommandFailed { command, status })
            }
            CancellableResult::Completed(Err(source)) => Err(LaunchError::Wait { command, source }),
            CancellableResult::Cancelled => Err(LaunchError::Cancelled),
        }
    }
}

pub fn run_to_completion(
    command: &PlannedCommand,
    cancel_token: &CancellationToken,
) -> Result<(), LaunchError> {
    spawn(command)?.wait(cancel_token)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn successful_command_completes() {
        run_to_completion(&PlannedCommand::new("true"), &CancellationToken::new()).unwrap();
    }

    #[test]
    fn failing_command_reports_its_status() {
        let err = run_to_completion(&PlannedCommand::new("false"), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, LaunchError::CommandFailed { .. }));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run_to_completion(
            &PlannedCommand::new("/nonexistent/objcentric-server"),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }

    #[test]
    fn cancelled_token_stops_the_command() {
        let token = CancellationToken::new();
        token.cancel();
        let err = run_to_completion(&PlannedCommand::new("sleep").arg("10"), &token).unwrap_err();
        assert!(matches!(err, LaunchError::Cancelled));
    }
}
