use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use objcentric_core::LogLevel;
use objcentric_core::settings::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WORKERS};

/// Validate the project and start the objcentric inference server.
#[derive(Parser, Debug, Clone)]
#[command(name = "objcentric-launch", author, version, long_about = None)]
pub struct LaunchArgs {
    /// Address the server binds to
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST, help_heading = "Server")]
    pub host: String,
    /// Port the server listens on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT, help_heading = "Server")]
    pub port: u16,
    /// Number of server worker threads
    #[arg(long, default_value_t = DEFAULT_WORKERS, help_heading = "Server")]
    pub workers: usize,
    /// Development mode: debug build, rebuild and restart on source changes
    #[arg(long, help_heading = "Server")]
    pub reload: bool,
    /// trace, debug, info, warning, error or critical
    #[arg(long, default_value_t = LogLevel::Info, help_heading = "Server")]
    pub log_level: LogLevel,
    /// Run inside a container instead of the local toolchain
    #[arg(long)]
    pub docker: bool,
    /// Root of the project checkout
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,
    /// Print the commands that would run, then exit
    #[arg(long)]
    pub dry_run: bool,
}

/// Probe a running objcentric server.
#[derive(Parser, Debug)]
#[command(name = "objcentric-probe", author, version, long_about = None)]
pub struct ProbeArgs {
    #[command(subcommand)]
    pub command: ProbeCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProbeCommand {
    /// Check that the documentation endpoint answers with a success status.
    Health(HealthArgs),
    /// Send one image to `/predict` and print the response.
    Predict(PredictArgs),
    /// Health check followed by a prediction.
    Smoke(PredictArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerUrlArgs {
    /// Base URL of the server
    #[arg(long, default_value = "http://localhost:8000")]
    pub url: String,
}

#[derive(Args, Debug, Clone)]
pub struct HealthArgs {
    #[command(flatten)]
    pub server: ServerUrlArgs,
    /// Seconds to wait for an answer
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub server: ServerUrlArgs,
    /// Image to send; a synthetic test image is used when omitted
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// Seconds to wait for each answer
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}
