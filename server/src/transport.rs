//! Lamp frame encoding and UDP delivery.
//!
//! Wire format: `point_count` color triples, each channel an i16 in
//! big-endian order. No header, length or checksum; lamps know their
//! point count.

use crate::error::SendError;
use crate::layout::Lamp;
use crate::stats::Stats;
use blinker_shared::color::Rgb;
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Bytes per point on the wire
pub const BYTES_PER_POINT: usize = 6;

/// An encoded frame addressed to one lamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LampFrame {
    pub address: String,
    pub payload: Vec<u8>,
}

impl LampFrame {
    pub fn from_lamp(lamp: &Lamp) -> Self {
        Self {
            address: lamp.address.clone(),
            payload: encode_frame(lamp.colors()),
        }
    }

    /// An all-black frame for `lamp`
    pub fn blank(lamp: &Lamp) -> Self {
        Self {
            address: lamp.address.clone(),
            payload: encode_frame(lamp.points.iter().map(|_| Rgb::BLACK)),
        }
    }
}

pub fn encode_frame(colors: impl IntoIterator<Item = Rgb>) -> Vec<u8> {
    let colors = colors.into_iter();
    let mut buf = Vec::with_capacity(colors.size_hint().0 * BYTES_PER_POINT);
    for color in colors {
        buf.extend_from_slice(&color.to_be_bytes());
    }
    buf
}

/// Fire-and-forget UDP sender for lamp frames.
pub struct LampTransport {
    socket: UdpSocket,
    port: u16,
    stats: Arc<Stats>,
}

impl LampTransport {
    pub async fn bind(bind_addr: &str, port: u16, stats: Arc<Stats>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        Ok(Self {
            socket,
            port,
            stats,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send one datagram to `address` on the lamp port.
    pub async fn send(&self, address: &str, payload: &[u8]) -> Result<(), SendError> {
        self.socket
            .send_to(payload, (address, self.port))
            .await
            .map(|_| ())
            .map_err(|source| SendError {
                address: address.to_string(),
                source,
            })
    }

    /// Send every frame concurrently. Failures are logged and counted; the
    /// return value is the number of failed sends.
    pub async fn broadcast(&self, frames: &[LampFrame]) -> usize {
        let results = join_all(
            frames
                .iter()
                .map(|frame| self.send(&frame.address, &frame.payload)),
        )
        .await;

        let mut failed = 0;
        for result in results {
            if let Err(e) = result {
                failed += 1;
                Stats::incr(&self.stats.sends_failed);
                tracing::warn!("{}", e);
            }
        }
        failed
    }
}
