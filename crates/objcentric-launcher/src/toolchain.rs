//! External tools the launcher drives: cargo and docker.

use std::ffi::OsString;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use crate::execution::LaunchError;

/// Oldest cargo able to build the workspace (its `rust-version`).
pub const MIN_CARGO_VERSION: Version = Version::new(1, 87, 0);

static CARGO_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^cargo (\d+)\.(\d+)\.(\d+)").expect("cargo version pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the first line of `cargo --version`, e.g. `cargo 1.87.0 (99624be96 2025-05-06)`.
    pub fn from_cargo_output(output: &str) -> Option<Self> {
        let captures = CARGO_VERSION_RE.captures(output.trim())?;
        let part = |i: usize| captures.get(i)?.as_str().parse::<u64>().ok();
        Some(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Cargo binary to invoke, honouring `$CARGO` when run from within cargo.
pub fn cargo_binary() -> OsString {
    std::env::var_os("CARGO").unwrap_or_else(|| OsString::from("cargo"))
}

pub fn docker_binary() -> OsString {
    std::env::var_os("DOCKER").unwrap_or_else(|| OsString::from("docker"))
}

fn version_output(tool: &'static str, mut command: Command) -> Result<String, LaunchError> {
    let output = command
        .arg("--version")
        .output()
        .map_err(|err| LaunchError::ToolUnavailable {
            tool,
            reason: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(LaunchError::ToolUnavailable {
            tool,
            reason: format!("`{tool} --version` exited with {}", output.status),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Check that cargo is installed and recent enough.
pub fn check_cargo() -> Result<Version, LaunchError> {
    let output = version_output("cargo", Command::new(cargo_binary()))?;
    let found = Version::from_cargo_output(&output).ok_or_else(|| LaunchError::ToolUnavailable {
        tool: "cargo",
        reason: format!("unrecognised version string `{output}`"),
    })?;
    if found < MIN_CARGO_VERSION {
        return Err(LaunchError::ToolchainTooOld {
            found,
            required: MIN_CARGO_VERSION,
        });
    }
    Ok(found)
}

/// Check that the docker CLI answers; returns its version line.
pub fn check_docker() -> Result<String, LaunchError> {
    version_output("docker", Command::new(docker_binary()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cargo 1.87.0 (99624be96 2025-05-06)", Some(Version::new(1, 87, 0)))]
    #[case("cargo 1.90.1-nightly (abc 2025-09-01)", Some(Version::new(1, 90, 1)))]
    #[case("  cargo 2.0.0\n", Some(Version::new(2, 0, 0)))]
    #[case("rustc 1.87.0", None)]
    #[case("", None)]
    fn parses_cargo_version(#[case] output: &str, #[case] expected: Option<Version>) {
        assert_eq!(Version::from_cargo_output(output), expected);
    }

    #[test]
    fn versions_order_numerically() {
        assert!(Version::new(1, 86, 9) < MIN_CARGO_VERSION);
        assert!(Version::new(1, 100, 0) > MIN_CARGO_VERSION);
        assert_eq!(MIN_CARGO_VERSION.to_string(), "1.87.0");
    }
}
