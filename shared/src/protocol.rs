use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::color::Rgb;

// === Touch sensors / dashboards -> Server ===

/// What happened at a vote station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../dashboard/src/generated/")]
#[serde(rename_all = "snake_case")]
pub enum TouchFlavor {
    StartTouch,
    EndTouch,
    /// Periodic liveness ping from a station.
    TouchBeat,
}

/// Which of the two vote pads on a station was touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../dashboard/src/generated/")]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Left,
    Right,
}

impl Choice {
    pub fn as_str(self) -> &'static str {
        match self {
            Choice::Left => "left",
            Choice::Right => "right",
        }
    }
}

/// A message from a touch station, e.g.
/// `{"source": 101, "flavor": "end_touch", "choice": "right"}`.
/// Heartbeats carry no choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../dashboard/src/generated/")]
pub struct TouchMsg {
    pub source: u32,
    pub flavor: TouchFlavor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<Choice>,
}

// === Server -> Dashboards ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../dashboard/src/generated/")]
#[serde(rename_all = "snake_case")]
pub enum DataFlavor {
    StartTouch,
    EndTouch,
    NewWord,
}

/// Event relayed to every dashboard client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../dashboard/src/generated/")]
pub struct DataMsg {
    pub source: u32,
    pub flavor: DataFlavor,
    pub choice: Choice,
    /// Only set for `new_word`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl DataMsg {
    pub fn touch(source: u32, flavor: DataFlavor, choice: Choice) -> Self {
        Self {
            source,
            flavor,
            choice,
            word: String::new(),
            color: None,
        }
    }

    pub fn new_word(source: u32, choice: Choice, word: &str, color: Rgb) -> Self {
        Self {
            source,
            flavor: DataFlavor::NewWord,
            choice,
            word: word.to_string(),
            color: Some(color),
        }
    }
}
