use crate::hub::HubCommand;
use crate::stats::Stats;
use blinker_shared::protocol::TouchMsg;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// Largest touch datagram we read; longer ones are truncated and fail to parse.
pub const MAX_TOUCH_DATAGRAM: usize = 1024;

pub fn parse_touch(datagram: &[u8]) -> Result<TouchMsg, serde_json::Error> {
    serde_json::from_slice(datagram)
}

/// Forward a touch into the hub without waiting. Returns false if it was dropped.
pub fn forward_touch(hub_tx: &mpsc::Sender<HubCommand>, msg: TouchMsg, stats: &Stats) -> bool {
    match hub_tx.try_send(HubCommand::Touch(msg)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            Stats::incr(&stats.touches_dropped);
            tracing::warn!("Touch queue full, dropping message");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Listen for touch station datagrams and pass them to the hub.
pub async fn run_touch_socket(
    socket: UdpSocket,
    hub_tx: mpsc::Sender<HubCommand>,
    stats: Arc<Stats>,
    mut shutdown: watch::Receiver<bool>,
) {
    match socket.local_addr() {
        Ok(addr) => tracing::info!("Listening for touch messages on udp {}", addr),
        Err(e) => tracing::warn!("Touch socket has no local address: {}", e),
    }

    let mut buf = vec![0u8; MAX_TOUCH_DATAGRAM];
    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,

            result = socket.recv_from(&mut buf) => {
                let (len, from) = match result {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Touch socket receive failed: {}", e);
                        continue;
                    }
                };
                match parse_touch(&buf[..len]) {
                    Ok(msg) => {
                        Stats::incr(&stats.touches_received);
                        if !forward_touch(&hub_tx, msg, &stats) && hub_tx.is_closed() {
                            break;
                        }
                    }
                    Err(e) => {
                        Stats::incr(&stats.touches_malformed);
                        tracing::warn!(
                            "Bad touch message from {}: {:?}: {}",
                            from,
                            String::from_utf8_lossy(&buf[..len]),
                            e
                        );
                    }
                }
            }
        }
    }

    tracing::info!("Touch socket closed");
}
