//! Error taxonomy for the lamp server.
//!
//! Only [`LayoutError`] is fatal (at startup). Everything else is logged,
//! counted in [`crate::stats::Stats`] and dropped.

use thiserror::Error;

/// Failure to build the spatial layout from point records.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("malformed layout input: {0}")]
    MalformedInput(String),
    #[error("lamp {address}: slot index {index} outside 0..{point_count}")]
    SlotIndexOutOfRange {
        address: String,
        index: i64,
        point_count: usize,
    },
    #[error("lamp {address}: slot {index} defined more than once")]
    DuplicateSlot { address: String, index: usize },
    #[error("lamp {address}: slot {index} has no point record")]
    MissingSlot { address: String, index: usize },
    #[error("layout needs at least one epicenter group, each with at least one coordinate")]
    NoEpicenters,
}

impl From<serde_json::Error> for LayoutError {
    fn from(e: serde_json::Error) -> Self {
        LayoutError::MalformedInput(e.to_string())
    }
}

/// A vote event that did not reach the animation loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    #[error("vote queue saturated, event dropped")]
    QueueSaturated,
    #[error("animation loop has stopped")]
    LoopClosed,
}

/// A lamp frame that could not be sent.
#[derive(Debug, Error)]
#[error("send to lamp {address} failed: {source}")]
pub struct SendError {
    pub address: String,
    #[source]
    pub source: std::io::Error,
}

/// Failure to resolve a touch against the displayed words.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WordError {
    #[error("touch from unexpected station {station} ({choice})")]
    UnknownStation { station: u32, choice: String },
    #[error("touch from station {0} carries no choice")]
    MissingChoice(u32),
}
