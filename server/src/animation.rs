use crate::config::AnimationConfig;
use crate::engine::WaveEngine;
use crate::error::VoteError;
use crate::stats::Stats;
use crate::streak::VoteStreak;
use crate::transport::{LampFrame, LampTransport};
use blinker_shared::color::Rgb;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// A finished vote: which station, and the color of the word voted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteEvent {
    pub station: u32,
    pub color: Rgb,
}

/// Producer side of the bounded vote queue. Never blocks: when the queue is
/// full the vote is dropped and counted.
#[derive(Clone)]
pub struct VoteSender {
    tx: mpsc::Sender<VoteEvent>,
    stats: Arc<Stats>,
}

impl VoteSender {
    pub fn submit(&self, vote: VoteEvent) -> Result<(), VoteError> {
        match self.tx.try_send(vote) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(vote)) => {
                Stats::incr(&self.stats.votes_dropped);
                tracing::warn!("Vote queue full, dropping vote from station {}", vote.station);
                Err(VoteError::QueueSaturated)
            }
            Err(TrySendError::Closed(_)) => Err(VoteError::LoopClosed),
        }
    }
}

pub fn vote_channel(
    capacity: usize,
    stats: Arc<Stats>,
) -> (VoteSender, mpsc::Receiver<VoteEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (VoteSender { tx, stats }, rx)
}

/// Animation state owned by the loop task: the wave engine plus vote
/// bookkeeping.
pub struct Animation {
    engine: WaveEngine,
    streak: VoteStreak,
    station_groups: BTreeMap<u32, usize>,
    streak_threshold: u32,
    default_color: Rgb,
    frame_period: Duration,
    spawn_period: Duration,
    blank_on_shutdown: bool,
    stats: Arc<Stats>,
}

impl Animation {
    pub fn new(engine: WaveEngine, config: &AnimationConfig, stats: Arc<Stats>) -> Self {
        Self {
            engine,
            streak: VoteStreak::new(),
            station_groups: config.station_groups.clone(),
            streak_threshold: config.streak_threshold,
            default_color: config.default_inbound_color,
            frame_period: config.frame_period(),
            spawn_period: config.wave_spawn_period(),
            blank_on_shutdown: config.blank_on_shutdown,
            stats,
        }
    }

    /// Launch an outbound wave from the voting station's group and extend
    /// or reset the streak.
    pub fn apply_vote(&mut self, vote: VoteEvent) {
        let streak = self.streak.record(vote.color);
        match self.station_groups.get(&vote.station) {
            Some(&group) if self.engine.spawn_outbound(group, vote.color) => {
                Stats::incr(&self.stats.outbound_waves);
                tracing::debug!(
                    "Vote from station {} -> group {}, streak {}",
                    vote.station,
                    group,
                    streak
                );
            }
            _ => {
                Stats::incr(&self.stats.votes_unmapped);
                tracing::warn!("Vote from unmapped station {}", vote.station);
            }
        }
    }

    /// Periodic inbound wave. Returns the color used.
    pub fn spawn_tick(&mut self) -> Rgb {
        let color = self
            .streak
            .inbound_color(self.streak_threshold, self.default_color);
        self.engine.spawn_inbound(color);
        Stats::incr(&self.stats.inbound_waves);
        color
    }

    /// Advance the engine one frame and encode every lamp.
    pub fn frame(&mut self) -> Vec<LampFrame> {
        self.engine.tick();
        Stats::incr(&self.stats.frames);
        self.engine.lamps().map(LampFrame::from_lamp).collect()
    }

    /// Apply every vote already waiting in the queue, then render a frame.
    pub fn drain_and_frame(&mut self, vote_rx: &mut mpsc::Receiver<VoteEvent>) -> Vec<LampFrame> {
        while let Ok(vote) = vote_rx.try_recv() {
            self.apply_vote(vote);
        }
        self.frame()
    }

    pub fn blank_frames(&self) -> Vec<LampFrame> {
        self.engine.lamps().map(LampFrame::blank).collect()
    }

    pub fn engine(&self) -> &WaveEngine {
        &self.engine
    }

    pub fn streak(&self) -> &VoteStreak {
        &self.streak
    }
}

/// Run the animation loop until `shutdown` flips. Owns all animation state.
pub async fn run_animation_loop(
    mut animation: Animation,
    mut vote_rx: mpsc::Receiver<VoteEvent>,
    transport: LampTransport,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut frame_interval = tokio::time::interval(animation.frame_period);
    frame_interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let spawn_period = animation.spawn_period;
    let mut spawn_interval = tokio::time::interval_at(Instant::now() + spawn_period, spawn_period);
    spawn_interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    tracing::info!(
        "Animation loop started: {} lamps, frame every {:?}, inbound wave every {:?}",
        animation.engine.layout().lamp_count(),
        animation.frame_period,
        spawn_period
    );

    while !*shutdown.borrow() {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            _ = frame_interval.tick() => {
                let frames = animation.drain_and_frame(&mut vote_rx);
                transport.broadcast(&frames).await;
            }

            _ = spawn_interval.tick() => {
                let color = animation.spawn_tick();
                tracing::debug!("Inbound wave {:?}, {} waves active", color, animation.engine.wave_count());
            }

            Some(vote) = vote_rx.recv() => {
                animation.apply_vote(vote);
            }

            else => break,
        }
    }

    if animation.blank_on_shutdown {
        transport.broadcast(&animation.blank_frames()).await;
    }
    tracing::info!("Animation loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Layout, PointRecord};
    use tokio::net::UdpSocket;

    const RED: Rgb = Rgb::new(0xf00, 0, 0);
    const GREEN: Rgb = Rgb::new(0, 0xf00, 0);

    fn test_layout(config: &AnimationConfig, address: &str) -> Layout {
        let records: Vec<PointRecord> = (0..config.point_count)
            .map(|i| PointRecord {
                address: address.to_string(),
                index: i as i64,
                x: i as f64 * 10.0,
                y: 5.0,
                z: 0.0,
            })
            .collect();
        Layout::load(&records, &config.epicenters(), config.point_count).unwrap()
    }

    fn test_animation(config: &AnimationConfig) -> (Animation, Arc<Stats>) {
        let stats = Arc::new(Stats::new());
        let engine = WaveEngine::new(test_layout(config, "127.0.0.1"), config);
        (Animation::new(engine, config, stats.clone()), stats)
    }

    fn vote(station: u32, color: Rgb) -> VoteEvent {
        VoteEvent { station, color }
    }

    #[test]
    fn vote_spawns_outbound_in_station_group() {
        let config = AnimationConfig::default();
        let (mut anim, stats) = test_animation(&config);
        anim.apply_vote(vote(102, RED));

        let group = config.station_groups[&102];
        assert_eq!(anim.engine().waves(group).len(), 1);
        assert_eq!(anim.engine().waves(group)[0].color, RED);
        assert!(anim.engine().waves(group)[0].shape.velocity > 0.0);
        assert_eq!(stats.snapshot().outbound_waves, 1);
    }

    #[test]
    fn streak_of_three_colors_inbound_wave() {
        let config = AnimationConfig::default();
        let (mut anim, _stats) = test_animation(&config);
        for _ in 0..3 {
            anim.apply_vote(vote(101, RED));
        }
        assert_eq!(anim.streak().count(), 3);
        assert_eq!(anim.spawn_tick(), RED);
        let inbound = anim.engine().waves(config.outer_group);
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].color, RED);
        assert!(inbound[0].shape.velocity < 0.0);
    }

    #[test]
    fn broken_streak_uses_default_color() {
        let config = AnimationConfig::default();
        let (mut anim, _stats) = test_animation(&config);
        anim.apply_vote(vote(101, RED));
        anim.apply_vote(vote(103, GREEN));
        assert_eq!(anim.streak().count(), 1);
        assert_eq!(anim.spawn_tick(), config.default_inbound_color);
    }

    #[test]
    fn unmapped_station_is_counted() {
        let config = AnimationConfig::default();
        let (mut anim, stats) = test_animation(&config);
        anim.apply_vote(vote(999, RED));
        assert_eq!(anim.engine().wave_count(), 0);
        assert_eq!(stats.snapshot().votes_unmapped, 1);
        assert_eq!(anim.streak().count(), 1);
    }

    #[test]
    fn queued_votes_apply_before_next_frame() {
        let config = AnimationConfig::default();
        let (mut anim, stats) = test_animation(&config);
        let (tx, mut rx) = vote_channel(8, stats.clone());
        tx.submit(vote(101, RED)).unwrap();
        tx.submit(vote(102, GREEN)).unwrap();
        tx.submit(vote(103, RED)).unwrap();

        let frames = anim.drain_and_frame(&mut rx);
        assert_eq!(anim.engine().wave_count(), 3);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.len(), config.point_count * 6);
        assert!(frames[0].payload.iter().any(|&b| b != 0));
        assert_eq!(stats.snapshot().frames, 1);
    }

    #[test]
    fn full_queue_drops_newest_and_counts() {
        let stats = Arc::new(Stats::new());
        let (tx, mut rx) = vote_channel(2, stats.clone());
        assert!(tx.submit(vote(101, RED)).is_ok());
        assert!(tx.submit(vote(102, RED)).is_ok());
        assert_eq!(tx.submit(vote(103, GREEN)), Err(VoteError::QueueSaturated));
        assert_eq!(stats.snapshot().votes_dropped, 1);

        assert_eq!(rx.try_recv().unwrap().station, 101);
        assert_eq!(rx.try_recv().unwrap().station, 102);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_reports_loop_closed() {
        let stats = Arc::new(Stats::new());
        let (tx, rx) = vote_channel(2, stats.clone());
        drop(rx);
        assert_eq!(tx.submit(vote(101, RED)), Err(VoteError::LoopClosed));
        assert_eq!(stats.snapshot().votes_dropped, 0);
    }

    #[tokio::test]
    async fn saturated_queue_does_not_stall_frames() {
        let mut config = AnimationConfig::default();
        config.frame_rate_hz = 100;
        config.wave_spawn_period_ms = 3_600_000;
        config.vote_queue_capacity = 4;

        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let (anim, stats) = test_animation(&config);
        let transport = LampTransport::bind("127.0.0.1:0", port, stats.clone())
            .await
            .unwrap();
        let (votes, vote_rx) = vote_channel(config.vote_queue_capacity, stats.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // The loop task cannot run until we yield, so only 4 votes fit.
        let handle = tokio::spawn(run_animation_loop(anim, vote_rx, transport, shutdown_rx));
        let mut rejected = 0;
        for i in 0..100 {
            if votes.submit(vote(101 + i % 3, RED)).is_err() {
                rejected += 1;
            }
        }
        assert_eq!(rejected, 96);
        assert_eq!(stats.snapshot().votes_dropped, 96);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let s = stats.snapshot();
        assert!(s.frames >= 10, "only {} frames", s.frames);
        assert_eq!(s.outbound_waves, 4);

        let mut buf = [0u8; 1024];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, config.point_count * 6);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();

        // Drain: the last datagram is the blanking frame.
        let mut last = Vec::new();
        while let Ok(Ok((n, _))) =
            tokio::time::timeout(Duration::from_millis(100), receiver.recv_from(&mut buf)).await
        {
            last = buf[..n].to_vec();
        }
        assert_eq!(last, vec![0u8; config.point_count * 6]);
    }

    #[tokio::test]
    async fn stops_when_shutdown_sender_dropped() {
        let mut config = AnimationConfig::default();
        config.blank_on_shutdown = false;
        let (anim, stats) = test_animation(&config);
        let transport = LampTransport::bind("127.0.0.1:0", 9, stats.clone())
            .await
            .unwrap();
        let (_votes, vote_rx) = vote_channel(4, stats);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_animation_loop(anim, vote_rx, transport, shutdown_rx));
        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
