use std::net::IpAddr;

use anyhow::{Context, Result};
use objcentric_core::Settings;
use rocket::{Build, Config, Rocket, data::ToByteUnit, fairing::AdHoc, figment::Figment};

use crate::{routes, state::AppState};

pub const JSON_LIMIT_MIB: usize = 32;

/// Parse the bind host. `localhost` is accepted as an alias of the IPv4 loopback.
pub fn bind_address(host: &str) -> Result<IpAddr> {
    let host = if host.eq_ignore_ascii_case("localhost") {
        "127.0.0.1"
    } else {
        host
    };
    host.parse()
        .with_context(|| format!("Invalid bind address `{host}`"))
}

fn figment(settings: &Settings) -> Result<Figment> {
    Ok(Config::figment()
        .merge(("address", bind_address(&settings.host)?))
        .merge(("port", settings.port))
        .merge(("workers", settings.workers))
        .merge(("log_level", "off"))
        .merge((
            "limits",
            rocket::data::Limits::default().limit("json", JSON_LIMIT_MIB.mebibytes()),
        )))
}

/// Assemble the Rocket instance without launching it.
pub fn build(state: AppState) -> Result<Rocket<Build>> {
    let figment = figment(state.settings())?;
    Ok(rocket::custom(figment)
        .attach(AdHoc::on_shutdown("Persist kernel pool", |rocket| {
            Box::pin(async move {
                let Some(state) = rocket.state::<AppState>().cloned() else {
                    return;
                };
                match rocket::tokio::task::spawn_blocking(move || state.persist_if_enabled())
                    .await
                {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => log::error!("Failed to persist kernel pool: {err}"),
                    Err(err) => log::error!("Kernel pool persistence task failed: {err}"),
                }
            })
        }))
        .manage(state)
        .mount("/", routes::routes())
        .register("/", routes::catchers()))
}

pub async fn run(settings: Settings) -> Result<()> {
    let state = AppState::bootstrap(settings)?;
    let settings = state.settings();
    log::info!(
        "Serving {} on {}:{} with {} worker(s), pool capacity {}",
        state.predictor().describe_encoder(),
        settings.host,
        settings.port,
        settings.workers,
        settings.max_kernels,
    );
    if let Some(devices) = &settings.devices {
        log::info!("CUDA_VISIBLE_DEVICES={devices}; encoding runs on CPU");
    }

    build(state)?
        .launch()
        .await
        .map_err(|err| anyhow::anyhow!("rocket failed: {err}"))?;

    log::info!("Server stopped");
    Ok(())
}
