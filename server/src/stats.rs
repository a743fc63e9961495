use std::sync::atomic::{AtomicU64, Ordering};

/// Runtime counters shared by every task. Recoverable failures bump one of
/// these instead of stopping anything.
#[derive(Debug, Default)]
pub struct Stats {
    pub frames: AtomicU64,
    pub inbound_waves: AtomicU64,
    pub outbound_waves: AtomicU64,
    pub votes_dropped: AtomicU64,
    pub votes_unmapped: AtomicU64,
    pub sends_failed: AtomicU64,
    pub touches_received: AtomicU64,
    pub touches_malformed: AtomicU64,
    pub touches_dropped: AtomicU64,
}

/// Point-in-time copy of [`Stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub inbound_waves: u64,
    pub outbound_waves: u64,
    pub votes_dropped: u64,
    pub votes_unmapped: u64,
    pub sends_failed: u64,
    pub touches_received: u64,
    pub touches_malformed: u64,
    pub touches_dropped: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            inbound_waves: self.inbound_waves.load(Ordering::Relaxed),
            outbound_waves: self.outbound_waves.load(Ordering::Relaxed),
            votes_dropped: self.votes_dropped.load(Ordering::Relaxed),
            votes_unmapped: self.votes_unmapped.load(Ordering::Relaxed),
            sends_failed: self.sends_failed.load(Ordering::Relaxed),
            touches_received: self.touches_received.load(Ordering::Relaxed),
            touches_malformed: self.touches_malformed.load(Ordering::Relaxed),
            touches_dropped: self.touches_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            "frames={}, inbound={}, outbound={}, votes_dropped={}, votes_unmapped={}, sends_failed={}, touches={}, malformed={}, touches_dropped={}",
            s.frames,
            s.inbound_waves,
            s.outbound_waves,
            s.votes_dropped,
            s.votes_unmapped,
            s.sends_failed,
            s.touches_received,
            s.touches_malformed,
            s.touches_dropped
        );
    }
}
