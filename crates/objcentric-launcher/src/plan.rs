//! Turning launch flags into the exact commands to run.
//!
//! Nothing here touches the filesystem or spawns processes, so the plan can be printed
//! by `--dry-run` and inspected in tests.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use objcentric_core::LogLevel;

use crate::args::LaunchArgs;
use crate::execution::LaunchError;
use crate::layout::{ProjectLayout, SERVER_PACKAGE};
use crate::toolchain::{cargo_binary, docker_binary};

pub const IMAGE_TAG: &str = "objcentric-server";
pub const CONTAINER_PORT: u16 = 8000;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildProfile {
    Debug,
    #[default]
    Release,
}

impl BuildProfile {
    pub fn as_cargo_arg(&self) -> &'static str {
        match self {
            BuildProfile::Debug => "--profile=dev",
            BuildProfile::Release => "--profile=release",
        }
    }

    /// Subdirectory of the target dir holding the artifacts.
    pub fn target_subdir(&self) -> &'static str {
        match self {
            BuildProfile::Debug => "debug",
            BuildProfile::Release => "release",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Local,
    Docker,
}

/// Validated launch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub reload: bool,
    pub log_level: LogLevel,
    pub mode: LaunchMode,
}

impl LaunchConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            workers: 1,
            reload: false,
            log_level: LogLevel::default(),
            mode: LaunchMode::Local,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn with_mode(mut self, mode: LaunchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build_profile(&self) -> BuildProfile {
        if self.reload {
            BuildProfile::Debug
        } else {
            BuildProfile::Release
        }
    }

    /// Reject values the server cannot start with.
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.workers < 1 {
            return Err(LaunchError::InvalidArgument {
                flag: "workers",
                value: self.workers.to_string(),
            });
        }
        if self.port < 1 {
            return Err(LaunchError::InvalidArgument {
                flag: "port",
                value: self.port.to_string(),
            });
        }
        Ok(())
    }

    /// Flags handed to the server binary. `--workers` only appears above one.
    pub fn server_args(&self) -> Vec<String> {
        let mut args = vec![
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--log-level".to_string(),
            self.log_level.to_string(),
        ];
        if self.workers > 1 {
            args.extend(["--workers".to_string(), self.workers.to_string()]);
        }
        args
    }

    fn container_env(&self) -> Vec<(String, String)> {
        vec![
            ("WORKERS".to_string(), self.workers.to_string()),
            ("LOG_LEVEL".to_string(), self.log_level.to_string()),
        ]
    }
}

impl From<&LaunchArgs> for LaunchConfig {
    fn from(args: &LaunchArgs) -> Self {
        LaunchConfig::new(args.host.clone(), args.port)
            .with_workers(args.workers)
            .with_reload(args.reload)
            .with_log_level(args.log_level)
            .with_mode(if args.docker {
                LaunchMode::Docker
            } else {
                LaunchMode::Local
            })
    }
}

/// One external command, kept as data until it is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub program: OsString,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl PlannedCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn has_flag_pair(&self, flag: &str, value: &str) -> bool {
        self.args
            .windows(2)
            .any(|pair| pair[0] == flag && pair[1] == value)
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(self.envs.iter().cloned());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl std::fmt::Display for PlannedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, value) in &self.envs {
            write!(f, "{key}={value} ")?;
        }
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPlan {
    pub target_dir: PathBuf,
    pub fetch: PlannedCommand,
    pub build: PlannedCommand,
    pub serve: PlannedCommand,
    /// Watched for changes when reloading; empty otherwise.
    pub watch: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchPlan {
    Local(LocalPlan),
    Compose {
        up: PlannedCommand,
    },
    Docker {
        build: PlannedCommand,
        run: PlannedCommand,
    },
}

impl LaunchPlan {
    pub fn new(config: &LaunchConfig, layout: &ProjectLayout) -> Self {
        match config.mode {
            LaunchMode::Local => LaunchPlan::Local(local_plan(config, layout)),
            LaunchMode::Docker => match layout.compose_file() {
                Some(compose_file) => LaunchPlan::Compose {
                    up: compose_up(config, layout, compose_file),
                },
                None => {
                    let (build, run) = docker_build_and_run(config, layout);
                    LaunchPlan::Docker { build, run }
                }
            },
        }
    }

    /// Commands in the order they run.
    pub fn commands(&self) -> Vec<&PlannedCommand> {
        match self {
            LaunchPlan::Local(local) => vec![&local.fetch, &local.build, &local.serve],
            LaunchPlan::Compose { up } => vec![up],
            LaunchPlan::Docker { build, run } => vec![build, run],
        }
    }
}

fn local_plan(config: &LaunchConfig, layout: &ProjectLayout) -> LocalPlan {
    let manifest = layout.manifest().to_string_lossy().to_string();
    let target_dir = layout.target_dir();
    let profile = config.build_profile();

    let fetch = PlannedCommand::new(cargo_binary())
        .args(["fetch", "--manifest-path", manifest.as_str()])
        .current_dir(layout.root());

    let build = PlannedCommand::new(cargo_binary())
        .args(["build", "-p", SERVER_PACKAGE, "--manifest-path", manifest.as_str()])
        .arg("--target-dir")
        .arg(target_dir.to_string_lossy())
        .arg(profile.as_cargo_arg())
        .current_dir(layout.root());

    let executable = target_dir
        .join(profile.target_subdir())
        .join(format!("{SERVER_PACKAGE}{}", std::env::consts::EXE_SUFFIX));
    let serve = PlannedCommand::new(executable)
        .args(config.server_args())
        .current_dir(layout.root());

    LocalPlan {
        target_dir,
        fetch,
        build,
        serve,
        watch: if config.reload {
            layout.watch_paths()
        } else {
            Vec::new()
        },
    }
}

fn compose_up(
    config: &LaunchConfig,
    layout: &ProjectLayout,
    compose_file: PathBuf,
) -> PlannedCommand {
    let mut up = PlannedCommand::new(docker_binary())
        .args(["compose", "-f"])
        .arg(compose_file.to_string_lossy())
        .args(["up", "--build"])
        .env("HOST", config.host.clone())
        .env("PORT", config.port.to_string())
        .current_dir(layout.root());
    for (key, value) in config.container_env() {
        up = up.env(key, value);
    }
    up
}

fn docker_build_and_run(
    config: &LaunchConfig,
    layout: &ProjectLayout,
) -> (PlannedCommand, PlannedCommand) {
    let build = PlannedCommand::new(docker_binary())
        .args(["build", "-t", IMAGE_TAG])
        .arg(layout.root().to_string_lossy());

    let mut run = PlannedCommand::new(docker_binary())
        .args(["run", "--rm", "-p"])
        .arg(format!("{}:{}:{CONTAINER_PORT}", config.host, config.port));
    for (key, value) in config.container_env() {
        run = run.arg("-e").arg(format!("{key}={value}"));
    }
    (build, run.arg(IMAGE_TAG))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn layout() -> ProjectLayout {
        ProjectLayout::new("/srv/objcentric")
    }

    fn serve_command(config: &LaunchConfig) -> PlannedCommand {
        match LaunchPlan::new(config, &layout()) {
            LaunchPlan::Local(local) => local.serve,
            other => panic!("expected a local plan, got {other:?}"),
        }
    }

    #[test]
    fn default_server_command() {
        let serve = serve_command(&LaunchConfig::new("0.0.0.0", 8000));
        assert_eq!(
            serve.args,
            ["--host", "0.0.0.0", "--port", "8000", "--log-level", "info"]
        );
        assert!(
            PathBuf::from(&serve.program).starts_with("/srv/objcentric/.objcentric/target/release")
        );
    }

    #[rstest]
    #[case(1, false)]
    #[case(2, true)]
    #[case(4, true)]
    fn workers_flag_only_above_one(#[case] workers: usize, #[case] present: bool) {
        let serve = serve_command(&LaunchConfig::new("0.0.0.0", 8000).with_workers(workers));
        assert_eq!(serve.args.iter().any(|arg| arg == "--workers"), present);
        if present {
            assert!(serve.has_flag_pair("--workers", &workers.to_string()));
        }
    }

    #[test]
    fn reload_builds_the_dev_profile_and_watches_sources() {
        let config = LaunchConfig::new("127.0.0.1", 9000).with_reload(true);
        let LaunchPlan::Local(local) = LaunchPlan::new(&config, &layout()) else {
            panic!("expected a local plan");
        };
        assert!(local.build.args.contains(&"--profile=dev".to_string()));
        assert!(
            PathBuf::from(&local.serve.program).starts_with(layout().target_dir().join("debug"))
        );
        assert!(local.watch.contains(&layout().manifest()));
    }

    #[test]
    fn release_build_targets_the_isolated_directory() {
        let LaunchPlan::Local(local) =
            LaunchPlan::new(&LaunchConfig::new("0.0.0.0", 8000), &layout())
        else {
            panic!("expected a local plan");
        };
        assert!(local.build.has_flag_pair("-p", SERVER_PACKAGE));
        assert!(local.build.args.contains(&"--profile=release".to_string()));
        assert!(local.build.has_flag_pair(
            "--target-dir",
            &layout().target_dir().to_string_lossy()
        ));
        assert_eq!(local.fetch.args[0], "fetch");
        assert!(local.watch.is_empty());
    }

    #[test]
    fn docker_without_compose_builds_and_runs_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let config = LaunchConfig::new("0.0.0.0", 8080)
            .with_workers(3)
            .with_mode(LaunchMode::Docker);

        let LaunchPlan::Docker { build, run } = LaunchPlan::new(&config, &layout) else {
            panic!("expected a docker plan");
        };
        assert!(build.has_flag_pair("-t", IMAGE_TAG));
        assert!(run.has_flag_pair("-p", "0.0.0.0:8080:8000"));
        assert!(run.has_flag_pair("-e", "WORKERS=3"));
        assert_eq!(run.args.last().map(String::as_str), Some(IMAGE_TAG));
    }

    #[test]
    fn docker_with_compose_passes_settings_through_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        let layout = ProjectLayout::new(dir.path());
        let config = LaunchConfig::new("0.0.0.0", 8001)
            .with_log_level(LogLevel::Debug)
            .with_mode(LaunchMode::Docker);

        let LaunchPlan::Compose { up } = LaunchPlan::new(&config, &layout) else {
            panic!("expected a compose plan");
        };
        assert_eq!(up.args[0], "compose");
        assert!(up.args.ends_with(&["up".to_string(), "--build".to_string()]));
        assert!(up.envs.contains(&("PORT".to_string(), "8001".to_string())));
        assert!(up.envs.contains(&("LOG_LEVEL".to_string(), "debug".to_string())));
    }

    #[rstest]
    #[case(0, 8000, "workers")]
    #[case(1, 0, "port")]
    fn invalid_values_name_the_flag(
        #[case] workers: usize,
        #[case] port: u16,
        #[case] flag: &str,
    ) {
        match LaunchConfig::new("0.0.0.0", port).with_workers(workers).validate() {
            Err(LaunchError::InvalidArgument { flag: found, .. }) => assert_eq!(found, flag),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let command = PlannedCommand::new("server")
            .arg("--name")
            .arg("two words")
            .env("PORT", "1");
        assert_eq!(command.to_string(), "PORT=1 server --name \"two words\"");
    }
}
