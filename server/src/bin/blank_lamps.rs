//! Turn every lamp in the layout off.
//!
//! Usage: blank-lamps [config.json]

use blinker_server::config::ServerConfig;
use blinker_server::layout::Layout;
use blinker_server::stats::Stats;
use blinker_server::transport::{LampFrame, LampTransport};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_json_file(&path)?,
        None => ServerConfig::default(),
    };

    let data = std::fs::read(&config.layout_path)
        .map_err(|e| format!("cannot read layout {}: {}", config.layout_path, e))?;
    let layout = Layout::from_json(
        &data,
        &config.animation.epicenters(),
        config.animation.point_count,
    )
    .map_err(|e| format!("invalid layout {}: {}", config.layout_path, e))?;

    let stats = Arc::new(Stats::new());
    let transport = LampTransport::bind(&config.lamp_bind_addr, config.lamp_port, stats)
        .await
        .map_err(|e| format!("cannot bind lamp socket: {}", e))?;

    let frames: Vec<LampFrame> = layout.lamps().map(LampFrame::blank).collect();
    let failed = transport.broadcast(&frames).await;
    tracing::info!(
        "Blanked {} of {} lamps on port {}",
        frames.len() - failed,
        frames.len(),
        transport.port()
    );
    Ok(())
}
