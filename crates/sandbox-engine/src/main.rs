//! # Sandbox
//!
//! Windowed host for the sandbox kernel: hold the left mouse button to
//! emit particles, move the highlighted quad with the arrow keys, pan with
//! WASD, rotate with Q/E, zoom with the wheel. F1 toggles the settings panel.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod input;
mod renderer;
mod scene;
mod timing;
mod ui;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("sandbox=info".parse()?))
        .init();

    info!("Sandbox starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    app::run()?;

    info!("Sandbox shutdown complete");
    Ok(())
}
