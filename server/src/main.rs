use axum::routing::get;
use axum::Router;
use blinker_server::animation::{run_animation_loop, vote_channel, Animation};
use blinker_server::config::ServerConfig;
use blinker_server::engine::WaveEngine;
use blinker_server::hub::{run_hub, Hub, HubCommand};
use blinker_server::layout::Layout;
use blinker_server::stats::Stats;
use blinker_server::touch::run_touch_socket;
use blinker_server::transport::LampTransport;
use blinker_server::words::{now_ms, WordRotation};
use blinker_server::ws::{ws_handler, AppState};
use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, watch};
use tower_http::cors::CorsLayer;

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{}", msg);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_json_file(&path).unwrap_or_else(|e| fail(e)),
        None => ServerConfig::default(),
    };

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        fail(format!("Invalid server configuration: {}", e));
    }

    let layout_data = std::fs::read(&config.layout_path)
        .unwrap_or_else(|e| fail(format!("Cannot read layout {}: {}", config.layout_path, e)));
    let layout = Layout::from_json(
        &layout_data,
        &config.animation.epicenters(),
        config.animation.point_count,
    )
    .unwrap_or_else(|e| fail(format!("Invalid layout {}: {}", config.layout_path, e)));
    tracing::info!(
        "Loaded {} lamps from {}",
        layout.lamp_count(),
        config.layout_path
    );

    let word_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.hub.word_log_path)
        .unwrap_or_else(|e| fail(format!("Cannot open {}: {}", config.hub.word_log_path, e)));

    let stats = Arc::new(Stats::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Animation loop
    let transport = LampTransport::bind(&config.lamp_bind_addr, config.lamp_port, stats.clone())
        .await
        .unwrap_or_else(|e| fail(format!("Cannot bind lamp socket: {}", e)));
    let (votes, vote_rx) = vote_channel(config.animation.vote_queue_capacity, stats.clone());
    let engine = WaveEngine::new(layout, &config.animation);
    let animation = Animation::new(engine, &config.animation, stats.clone());
    let animation_handle = tokio::spawn(run_animation_loop(
        animation,
        vote_rx,
        transport,
        shutdown_rx.clone(),
    ));

    // Hub
    let (hub_tx, hub_rx) = mpsc::channel::<HubCommand>(config.hub.touch_queue_capacity);
    let (dashboard_tx, _) = broadcast::channel(config.hub.dashboard_buffer);
    let words = WordRotation::new(&config.hub, Box::new(word_log), now_ms());
    let hub = Hub::new(words, votes, dashboard_tx.clone());
    let hub_handle = tokio::spawn(run_hub(
        hub,
        hub_rx,
        config.hub.word_cycle_period(),
        shutdown_rx.clone(),
    ));

    // Touch stations
    let touch_socket = UdpSocket::bind(&config.touch_addr)
        .await
        .unwrap_or_else(|e| fail(format!("Cannot bind touch socket {}: {}", config.touch_addr, e)));
    tokio::spawn(run_touch_socket(
        touch_socket,
        hub_tx.clone(),
        stats.clone(),
        shutdown_rx.clone(),
    ));

    // Periodic counters
    if config.stats_log_period_secs > 0 {
        let stats = stats.clone();
        let period = Duration::from_secs(config.stats_log_period_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                stats.log_summary();
            }
        });
    }

    // Dashboards
    let app_state = AppState {
        hub_tx,
        dashboard_tx,
        stats: stats.clone(),
    };
    let app = Router::new()
        .route("/", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Dashboard websocket listening on {}", config.dashboard_addr);

    let listener = tokio::net::TcpListener::bind(&config.dashboard_addr)
        .await
        .unwrap_or_else(|e| fail(format!("Cannot bind {}: {}", config.dashboard_addr, e)));
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await;
    if let Err(e) = serve_result {
        tracing::error!("Dashboard server failed: {}", e);
    }

    let _ = shutdown_tx.send(true);
    let _ = animation_handle.await;
    let _ = hub_handle.await;
    stats.log_summary();
}
