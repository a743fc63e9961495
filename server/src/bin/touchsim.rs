//! Touch station simulator.
//!
//! Spawns fake touch stations that:
//! - Send a heartbeat every second
//! - Periodically press a random side (start_touch followed by end_touch)
//!
//! and optionally a dashboard client that counts relayed messages.
//!
//! Usage: cargo run --bin touchsim -- [OPTIONS]
//!
//! Options:
//!   --stations LIST  Comma separated station ids (default: 101,102,103)
//!   --duration S     Run time in seconds (default: 30)
//!   --touch-rate R   Touches per second per station (default: 0.5)
//!   --target ADDR    Server touch socket (default: 127.0.0.1:3333)
//!   --dashboard URL  Dashboard websocket to watch (default: none)

use blinker_shared::protocol::{Choice, DataFlavor, DataMsg, TouchFlavor, TouchMsg};
use futures_util::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const BEAT_PERIOD: Duration = Duration::from_secs(1);
const PRESS_LENGTH: Duration = Duration::from_millis(150);

// === Metrics ===

#[derive(Default)]
struct Metrics {
    beats_sent: AtomicU64,
    touches_sent: AtomicU64,
    send_errors: AtomicU64,
    relayed_touches: AtomicU64,
    new_words: AtomicU64,
    dashboard_errors: AtomicU64,
}

// === Station task ===

async fn send(socket: &UdpSocket, target: &str, msg: &TouchMsg, metrics: &Metrics) -> bool {
    let json = match serde_json::to_vec(msg) {
        Ok(json) => json,
        Err(_) => return false,
    };
    match socket.send_to(&json, target).await {
        Ok(_) => true,
        Err(e) => {
            eprintln!("Station {} send failed: {}", msg.source, e);
            metrics.send_errors.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

async fn run_station(
    station: u32,
    target: String,
    touch_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Station {} cannot bind: {}", station, e);
            metrics.send_errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let touch_interval = if touch_rate > 0.0 {
        Duration::from_secs_f64(1.0 / touch_rate)
    } else {
        Duration::from_secs(3600)
    };
    let mut beat_timer = tokio::time::interval(BEAT_PERIOD);
    let mut touch_timer = tokio::time::interval(touch_interval);
    touch_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut rng = StdRng::seed_from_u64(u64::from(station));
    let test_end = Instant::now() + duration;

    while Instant::now() < test_end {
        tokio::select! {
            _ = beat_timer.tick() => {
                let beat = TouchMsg { source: station, flavor: TouchFlavor::TouchBeat, choice: None };
                if send(&socket, &target, &beat, &metrics).await {
                    metrics.beats_sent.fetch_add(1, Ordering::Relaxed);
                }
            }

            _ = touch_timer.tick() => {
                let choice = if rng.gen_bool(0.5) { Choice::Left } else { Choice::Right };
                let start = TouchMsg { source: station, flavor: TouchFlavor::StartTouch, choice: Some(choice) };
                if !send(&socket, &target, &start, &metrics).await {
                    continue;
                }
                tokio::time::sleep(PRESS_LENGTH).await;
                let end = TouchMsg { source: station, flavor: TouchFlavor::EndTouch, choice: Some(choice) };
                if send(&socket, &target, &end, &metrics).await {
                    metrics.touches_sent.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

// === Dashboard watcher ===

async fn run_dashboard(url: String, duration: Duration, metrics: Arc<Metrics>) {
    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Dashboard failed to connect: {}", e);
            metrics.dashboard_errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let test_end = tokio::time::Instant::now() + duration;
    loop {
        let msg = tokio::select! {
            _ = tokio::time::sleep_until(test_end) => break,
            msg = ws.next() => msg,
        };
        match msg {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<DataMsg>(&text) {
                Ok(data) => match data.flavor {
                    DataFlavor::NewWord => {
                        metrics.new_words.fetch_add(1, Ordering::Relaxed);
                    }
                    DataFlavor::StartTouch | DataFlavor::EndTouch => {
                        metrics.relayed_touches.fetch_add(1, Ordering::Relaxed);
                    }
                },
                Err(e) => {
                    eprintln!("Dashboard got unexpected message {}: {}", text, e);
                    metrics.dashboard_errors.fetch_add(1, Ordering::Relaxed);
                }
            },
            Some(Ok(Message::Close(frame))) => {
                eprintln!("Dashboard got Close: {:?}", frame);
                break;
            }
            Some(Err(e)) => {
                eprintln!("Dashboard error: {}", e);
                metrics.dashboard_errors.fetch_add(1, Ordering::Relaxed);
                break;
            }
            Some(Ok(_)) => {}
            None => break,
        }
    }

    let _ = ws.close(None).await;
}

// === Main ===

fn parse_stations(list: &str) -> Vec<u32> {
    list.split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut stations = vec![101, 102, 103];
    let mut duration_secs: u64 = 30;
    let mut touch_rate: f64 = 0.5;
    let mut target = "127.0.0.1:3333".to_string();
    let mut dashboard: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stations" => {
                i += 1;
                if let Some(list) = args.get(i) {
                    stations = parse_stations(list);
                }
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--touch-rate" => {
                i += 1;
                touch_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(0.5);
            }
            "--target" => {
                i += 1;
                target = args.get(i).cloned().unwrap_or(target);
            }
            "--dashboard" => {
                i += 1;
                dashboard = args.get(i).cloned();
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Touch Station Simulator ===");
    println!("Stations: {:?}", stations);
    println!("Duration: {}s", duration_secs);
    println!("Touch rate: {}/s per station", touch_rate);
    println!("Target: {}", target);
    if let Some(url) = &dashboard {
        println!("Dashboard: {}", url);
    }
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(stations.len() + 1);
    if let Some(url) = dashboard {
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(run_dashboard(url, duration, metrics)));
    }
    for &station in &stations {
        let target = target.clone();
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(run_station(
            station, target, touch_rate, duration, metrics,
        )));
    }

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();
        loop {
            interval.tick().await;
            println!(
                "[{:3}s] beats={}, touches={}, send_errors={}, relayed={}, new_words={}",
                start.elapsed().as_secs(),
                metrics_clone.beats_sent.load(Ordering::Relaxed),
                metrics_clone.touches_sent.load(Ordering::Relaxed),
                metrics_clone.send_errors.load(Ordering::Relaxed),
                metrics_clone.relayed_touches.load(Ordering::Relaxed),
                metrics_clone.new_words.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    stats_handle.abort();

    println!();
    println!("=== Final Results ===");
    let touches = metrics.touches_sent.load(Ordering::Relaxed);
    let relayed = metrics.relayed_touches.load(Ordering::Relaxed);
    println!("Heartbeats sent: {}", metrics.beats_sent.load(Ordering::Relaxed));
    println!("Touches sent: {}", touches);
    println!("Send errors: {}", metrics.send_errors.load(Ordering::Relaxed));
    println!("Relayed touch messages: {}", relayed);
    println!("New words seen: {}", metrics.new_words.load(Ordering::Relaxed));
    println!(
        "Dashboard errors: {}",
        metrics.dashboard_errors.load(Ordering::Relaxed)
    );
}
