use crate::animation::{VoteEvent, VoteSender};
use crate::words::{now_ms, WordRotation};
use blinker_shared::protocol::{DataFlavor, DataMsg, TouchFlavor, TouchMsg};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Commands from the touch socket and dashboard connections to the hub
pub enum HubCommand {
    Touch(TouchMsg),
    /// Ask for the words currently on display
    Snapshot {
        response: oneshot::Sender<Vec<DataMsg>>,
    },
}

/// Touch event routing: word log, vote events for the animation loop and
/// relays to the dashboards. Owned by the hub task.
pub struct Hub {
    words: WordRotation,
    heartbeats: HashMap<u32, u64>,
    votes: VoteSender,
    dashboard_tx: broadcast::Sender<DataMsg>,
}

impl Hub {
    pub fn new(
        words: WordRotation,
        votes: VoteSender,
        dashboard_tx: broadcast::Sender<DataMsg>,
    ) -> Self {
        Self {
            words,
            heartbeats: HashMap::new(),
            votes,
            dashboard_tx,
        }
    }

    /// Handle a touch message. Returns the dashboard relay, if any.
    pub fn handle_touch(&mut self, msg: TouchMsg, now: u64) -> Option<DataMsg> {
        let flavor = match msg.flavor {
            TouchFlavor::TouchBeat => {
                if self.words.stations().contains(&msg.source) {
                    self.heartbeats.insert(msg.source, now);
                } else {
                    tracing::warn!("Heartbeat from unrecognized station {}", msg.source);
                }
                return None;
            }
            TouchFlavor::StartTouch => DataFlavor::StartTouch,
            TouchFlavor::EndTouch => DataFlavor::EndTouch,
        };

        match self.words.log_touch(msg.source, msg.flavor, msg.choice, now) {
            Ok(word) if msg.flavor == TouchFlavor::EndTouch => {
                let vote = VoteEvent {
                    station: msg.source,
                    color: word.color,
                };
                if let Err(e) = self.votes.submit(vote) {
                    tracing::warn!("Vote for '{}' not delivered: {}", word.word, e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Can't log touch: {}", e),
        }

        let choice = msg.choice?;
        let relay = DataMsg::touch(msg.source, flavor, choice);
        self.relay(relay.clone());
        Some(relay)
    }

    pub fn cycle_word(&mut self, now: u64) -> DataMsg {
        let msg = self.words.cycle_word(now);
        tracing::info!("New word '{}' at station {} {}", msg.word, msg.source, msg.choice.as_str());
        self.relay(msg.clone());
        msg
    }

    pub fn snapshot(&self) -> Vec<DataMsg> {
        self.words.snapshot()
    }

    pub fn last_heartbeat(&self, station: u32) -> Option<u64> {
        self.heartbeats.get(&station).copied()
    }

    fn relay(&self, msg: DataMsg) {
        // Err only means no dashboard is connected
        let _ = self.dashboard_tx.send(msg);
    }
}

/// Run the hub until `shutdown` flips or every command sender is gone.
pub async fn run_hub(
    mut hub: Hub,
    mut cmd_rx: mpsc::Receiver<HubCommand>,
    cycle_period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut cycle_interval = tokio::time::interval_at(Instant::now() + cycle_period, cycle_period);
    cycle_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,

            _ = cycle_interval.tick() => {
                hub.cycle_word(now_ms());
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(HubCommand::Touch(msg)) => {
                        tracing::info!("received: {:?}", msg);
                        hub.handle_touch(msg, now_ms());
                    }
                    Some(HubCommand::Snapshot { response }) => {
                        let _ = response.send(hub.snapshot());
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("Hub ended");
}
