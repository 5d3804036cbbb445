//! Launch and probe the objcentric inference server.
//!
//! `objcentric-launch` checks that a project checkout is runnable, then builds and
//! starts the server either with the local cargo toolchain or inside a container.
//! `objcentric-probe` is the HTTP client used as the container health check.

pub mod args;
pub mod execution;
pub mod layout;
pub mod logging;
pub mod plan;
pub mod probe;
pub mod toolchain;

pub type Result<T> = anyhow::Result<T>;
