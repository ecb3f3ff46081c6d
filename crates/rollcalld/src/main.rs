use std::sync::Arc;

use anyhow::{Context, Result};
use rollcall_core::Roster;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;

use config::{BusKind, Config};
use dbus_interface::{AttendanceService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(
        source = ?config.source,
        similarity_threshold = config.policy.similarity_threshold,
        present_confidence = config.policy.present_confidence,
        confidence_cap = config.policy.confidence_cap,
        day_offset_minutes = config.days.offset_minutes(),
        bus = ?config.bus,
        "configuration loaded"
    );

    let roster = Arc::new(Roster::new(config.policy, config.days)?);

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let _connection = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, AttendanceService::new(roster))?
        .build()
        .await
        .with_context(|| format!("failed to register {BUS_NAME} on the {:?} bus", config.bus))?;

    tracing::info!(bus_name = BUS_NAME, path = OBJECT_PATH, "rollcalld ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
