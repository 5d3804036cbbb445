use std::path::PathBuf;

use clap::Parser;
use objcentric_core::{LogLevel, Settings, SettingsError};

/// Command line overrides. Anything left unset falls back to the environment.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "objcentric inference server", long_about = None)]
pub struct Args {
    /// Address to bind (env: HOST)
    #[arg(long, help_heading = "Bind")]
    pub host: Option<String>,
    /// Port to listen on (env: PORT)
    #[arg(long, help_heading = "Bind")]
    pub port: Option<u16>,
    /// Async worker threads (env: WORKERS)
    #[arg(long, help_heading = "Bind")]
    pub workers: Option<usize>,
    /// trace, debug, info, warning, error or critical (env: LOG_LEVEL)
    #[arg(long)]
    pub log_level: Option<LogLevel>,
    /// Kernel pool checkpoint file (env: CHECKPOINT_PATH)
    #[arg(long, help_heading = "Kernel pool")]
    pub checkpoint: Option<PathBuf>,
    /// Maximum number of kernels kept in memory (env: MAX_KERNELS)
    #[arg(long, help_heading = "Kernel pool")]
    pub max_kernels: Option<usize>,
}

impl Args {
    /// Environment settings with these flags layered on top.
    pub fn settings(&self) -> Result<Settings, SettingsError> {
        self.apply(Settings::from_env()?)
    }

    pub fn apply(&self, mut settings: Settings) -> Result<Settings, SettingsError> {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(log_level) = self.log_level {
            settings.log_level = log_level;
        }
        if let Some(checkpoint) = &self.checkpoint {
            settings.checkpoint_path = checkpoint.clone();
        }
        if let Some(max_kernels) = self.max_kernels {
            settings.max_kernels = max_kernels;
        }
        settings.validate()?;
        Ok(settings)
    }
}
