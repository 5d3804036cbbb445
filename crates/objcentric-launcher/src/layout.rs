use std::path::{Path, PathBuf};

use crate::execution::LaunchError;

pub const MANIFEST_FILE: &str = "Cargo.toml";
pub const LOCK_FILE: &str = "Cargo.lock";
pub const SERVER_PACKAGE: &str = "objcentric-server";
pub const SERVER_ENTRY_POINT: &str = "crates/objcentric-server/src/main.rs";
pub const ENV_DIR: &str = ".objcentric";
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Well known paths inside a project checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn server_entry_point(&self) -> PathBuf {
        self.root.join(SERVER_ENTRY_POINT)
    }

    /// Directory holding everything the launcher creates.
    pub fn env_dir(&self) -> PathBuf {
        self.root.join(ENV_DIR)
    }

    /// Cargo target directory isolated from the developer's own builds.
    pub fn target_dir(&self) -> PathBuf {
        self.env_dir().join("target")
    }

    /// First compose definition found at the root, in [`COMPOSE_FILES`] order.
    pub fn compose_file(&self) -> Option<PathBuf> {
        COMPOSE_FILES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    /// Paths whose changes trigger a rebuild in reload mode.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        vec![
            self.root.join("crates"),
            self.manifest(),
            self.root.join(LOCK_FILE),
        ]
    }

    /// Check the files a launch depends on, without touching the filesystem.
    pub fn validate(&self) -> Result<(), LaunchError> {
        let manifest = self.manifest();
        if !manifest.is_file() {
            return Err(LaunchError::MissingManifest(manifest));
        }
        let contents =
            std::fs::read_to_string(&manifest).map_err(|source| LaunchError::ReadManifest {
                path: manifest.clone(),
                source,
            })?;
        toml::from_str::<toml::Table>(&contents).map_err(|source| {
            LaunchError::InvalidManifest {
                path: manifest.clone(),
                source,
            }
        })?;

        let entry_point = self.server_entry_point();
        if !entry_point.is_file() {
            return Err(LaunchError::MissingEntryPoint(entry_point));
        }
        Ok(())
    }
}
