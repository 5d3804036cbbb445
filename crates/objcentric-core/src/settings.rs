//! Environment driven service settings.
//!
//! Every knob has a default and may be overridden through an environment variable.
//! Command line flags of the server binary are layered on top afterwards.

use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_KERNELS: usize = 500;
pub const DEFAULT_CHECKPOINT_PATH: &str = "checkpoints/kernel_pool.json";
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.85;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_WORKERS: usize = 1;

/// Verbosity names shared by the launcher and the server.
///
/// `warn` is accepted as an alias of `warning`; `critical` maps to the error filter.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[strum(to_string = "warning", serialize = "warn")]
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => log::LevelFilter::Error,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("Invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub log_level: LogLevel,
    pub max_kernels: usize,
    pub checkpoint_path: PathBuf,
    pub match_threshold: f32,
    pub top_k: usize,
    pub persist_kernels: bool,
    /// Raw `CUDA_VISIBLE_DEVICES`, reported but not interpreted.
    pub devices: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            log_level: LogLevel::default(),
            max_kernels: DEFAULT_MAX_KERNELS,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            persist_kernels: false,
            devices: None,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Settings::default();

        let settings = Settings {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            workers: parse_or("WORKERS", get("WORKERS"), defaults.workers)?,
            log_level: parse_or("LOG_LEVEL", get("LOG_LEVEL"), defaults.log_level)?,
            max_kernels: parse_or("MAX_KERNELS", get("MAX_KERNELS"), defaults.max_kernels)?,
            checkpoint_path: get("CHECKPOINT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkpoint_path),
            match_threshold: parse_or(
                "MATCH_THRESHOLD",
                get("MATCH_THRESHOLD"),
                defaults.match_threshold,
            )?,
            top_k: parse_or("TOP_K", get("TOP_K"), defaults.top_k)?,
            persist_kernels: parse_flag("PERSIST_KERNELS", get("PERSIST_KERNELS"))?,
            devices: get("CUDA_VISIBLE_DEVICES"),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check the invariants the rest of the service relies on.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_kernels == 0 {
            return Err(invalid("MAX_KERNELS", "0", "must be at least 1"));
        }
        if self.port == 0 {
            return Err(invalid("PORT", "0", "must be between 1 and 65535"));
        }
        if self.workers == 0 {
            return Err(invalid("WORKERS", "0", "must be at least 1"));
        }
        if self.top_k == 0 {
            return Err(invalid("TOP_K", "0", "must be at least 1"));
        }
        if !(-1.0..=1.0).contains(&self.match_threshold) {
            return Err(invalid(
                "MATCH_THRESHOLD",
                &self.match_threshold.to_string(),
                "must lie within [-1, 1]",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| invalid(key, &raw, &err.to_string())),
    }
}

fn parse_flag(key: &'static str, raw: Option<String>) -> Result<bool, SettingsError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(value) => match value.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, &value, "expected a boolean")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.max_kernels, 500);
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("MAX_KERNELS", "32"),
            ("CHECKPOINT_PATH", "/models/pool.json"),
            ("CUDA_VISIBLE_DEVICES", "0,1"),
            ("PERSIST_KERNELS", "true"),
        ]))
        .unwrap();

        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.max_kernels, 32);
        assert_eq!(settings.checkpoint_path, PathBuf::from("/models/pool.json"));
        assert_eq!(settings.devices.as_deref(), Some("0,1"));
        assert!(settings.persist_kernels);
    }

    #[test]
    fn blank_values_are_ignored() {
        let settings = Settings::from_lookup(lookup(&[("PORT", "  "), ("HOST", "")])).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.host, DEFAULT_HOST);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Settings::from_lookup(lookup(&[("MAX_KERNELS", "0")])).unwrap_err();
        assert!(err.to_string().contains("MAX_KERNELS"));
    }

    #[test]
    fn unparsable_port_names_the_key() {
        let err = Settings::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        match err {
            SettingsError::Invalid { key, value, .. } => {
                assert_eq!(key, "PORT");
                assert_eq!(value, "eighty");
            }
        }
    }

    #[test]
    fn log_level_accepts_aliases() {
        let settings = Settings::from_lookup(lookup(&[("LOG_LEVEL", "WARN")])).unwrap();
        assert_eq!(settings.log_level, LogLevel::Warning);
        assert_eq!(settings.log_level.to_string(), "warning");
        assert_eq!("critical".parse::<LogLevel>().unwrap().as_filter(), log::LevelFilter::Error);
        assert!(Settings::from_lookup(lookup(&[("LOG_LEVEL", "loud")])).is_err());
    }

    #[test]
    fn threshold_outside_cosine_range_is_rejected() {
        assert!(Settings::from_lookup(lookup(&[("MATCH_THRESHOLD", "1.5")])).is_err());
    }
}
