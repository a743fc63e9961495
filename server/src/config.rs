use crate::wave::WaveShape;
use crate::words::{default_word_pool, Word};
use blinker_shared::color::Rgb;
use blinker_shared::vec3::{vec3, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// LED slots in every lamp
pub const POINTS_PER_LAMP: usize = 16;

/// UDP port the lamps listen on for color frames
pub const LAMP_PORT: u16 = 3333;

/// A named origin for waves: one or more coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicenterGroup {
    pub name: String,
    pub points: Vec<Vec3>,
}

impl EpicenterGroup {
    pub fn new(name: &str, points: Vec<Vec3>) -> Self {
        Self {
            name: name.to_string(),
            points,
        }
    }
}

/// Wave engine and animation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub point_count: usize,
    pub epicenter_groups: Vec<EpicenterGroup>,
    /// Group that periodic inbound waves converge on
    pub outer_group: usize,
    /// Vote station -> epicenter group for outbound waves
    pub station_groups: BTreeMap<u32, usize>,
    pub frame_rate_hz: u32,
    pub wave_spawn_period_ms: u64,
    pub inbound: WaveShape,
    pub outbound: WaveShape,
    /// Retention window half-width in standard deviations
    pub retention_margin: f64,
    pub streak_threshold: u32,
    pub default_inbound_color: Rgb,
    pub vote_queue_capacity: usize,
    /// Send an all-black frame to every lamp when the loop stops
    pub blank_on_shutdown: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        let west = vec3(0.0, 0.0, 0.0);
        let center = vec3(100.0, 0.0, 0.0);
        let east = vec3(200.0, 0.0, 0.0);
        Self {
            point_count: POINTS_PER_LAMP,
            epicenter_groups: vec![
                EpicenterGroup::new("all", vec![west, center, east]),
                EpicenterGroup::new("west", vec![west]),
                EpicenterGroup::new("center", vec![center]),
                EpicenterGroup::new("east", vec![east]),
            ],
            outer_group: 0,
            station_groups: BTreeMap::from([(101, 1), (102, 2), (103, 3)]),
            frame_rate_hz: 30,
            wave_spawn_period_ms: 5000,
            inbound: WaveShape {
                spread: 1.3,
                scale_x: 20.0,
                scale_y: 2.0,
                velocity: -0.5,
            },
            outbound: WaveShape {
                spread: 1.0,
                scale_x: 10.0,
                scale_y: 2.0,
                velocity: 1.0,
            },
            retention_margin: 3.0,
            streak_threshold: 3,
            default_inbound_color: Rgb::new(0x300, 0x300, 0x300),
            vote_queue_capacity: 64,
            blank_on_shutdown: true,
        }
    }
}

impl AnimationConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz as f64)
    }

    pub fn wave_spawn_period(&self) -> Duration {
        Duration::from_millis(self.wave_spawn_period_ms)
    }

    pub fn epicenters(&self) -> Vec<Vec<Vec3>> {
        self.epicenter_groups
            .iter()
            .map(|g| g.points.clone())
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.point_count == 0 {
            return Err("point_count must be > 0".to_string());
        }
        if self.epicenter_groups.is_empty() {
            return Err("at least one epicenter group is required".to_string());
        }
        for group in &self.epicenter_groups {
            if group.points.is_empty() {
                return Err(format!("epicenter group '{}' has no points", group.name));
            }
            if group.points.iter().any(|p| !p.is_finite()) {
                return Err(format!(
                    "epicenter group '{}' has a non-finite coordinate",
                    group.name
                ));
            }
        }
        let group_count = self.epicenter_groups.len();
        if self.outer_group >= group_count {
            return Err(format!(
                "outer_group {} out of range (have {} groups)",
                self.outer_group, group_count
            ));
        }
        for (station, &group) in &self.station_groups {
            if group >= group_count {
                return Err(format!(
                    "station {} maps to group {} (have {} groups)",
                    station, group, group_count
                ));
            }
        }
        if self.frame_rate_hz == 0 || self.frame_rate_hz > 1000 {
            return Err("frame_rate_hz must be in 1..=1000".to_string());
        }
        if self.wave_spawn_period_ms == 0 {
            return Err("wave_spawn_period_ms must be > 0".to_string());
        }
        self.inbound.validate().map_err(|e| format!("inbound: {}", e))?;
        self.outbound.validate().map_err(|e| format!("outbound: {}", e))?;
        if self.inbound.velocity >= 0.0 {
            return Err("inbound velocity must be negative".to_string());
        }
        if self.outbound.velocity <= 0.0 {
            return Err("outbound velocity must be positive".to_string());
        }
        if !self.retention_margin.is_finite() || self.retention_margin <= 0.0 {
            return Err("retention_margin must be finite and > 0".to_string());
        }
        if self.streak_threshold == 0 {
            return Err("streak_threshold must be >= 1".to_string());
        }
        if self.vote_queue_capacity == 0 {
            return Err("vote_queue_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

/// Touch hub and word rotation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Vote station ids, in display order
    pub stations: Vec<u32>,
    pub word_cycle_period_ms: u64,
    /// How long a freshly posted word takes to appear on the dashboards
    pub post_delay_ms: u64,
    pub word_pool: Vec<Word>,
    pub word_log_path: String,
    pub touch_queue_capacity: usize,
    pub dashboard_buffer: usize,
    pub rng_seed: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            stations: vec![101, 102, 103],
            word_cycle_period_ms: 20_000,
            post_delay_ms: 10_000,
            word_pool: default_word_pool(),
            word_log_path: "wordlog.json".to_string(),
            touch_queue_capacity: 64,
            dashboard_buffer: 64,
            rng_seed: 42,
        }
    }
}

impl HubConfig {
    pub fn word_cycle_period(&self) -> Duration {
        Duration::from_millis(self.word_cycle_period_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.stations.is_empty() {
            return Err("at least one vote station is required".to_string());
        }
        let unique: HashSet<_> = self.stations.iter().collect();
        if unique.len() != self.stations.len() {
            return Err("vote station ids must be unique".to_string());
        }
        let slots = self.stations.len() * 2;
        if self.word_pool.len() <= slots {
            return Err(format!(
                "word_pool needs more than {} words for {} stations",
                slots,
                self.stations.len()
            ));
        }
        if self.word_cycle_period_ms == 0 {
            return Err("word_cycle_period_ms must be > 0".to_string());
        }
        if self.touch_queue_capacity == 0 || self.dashboard_buffer == 0 {
            return Err("queue capacities must be > 0".to_string());
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Websocket listen address for dashboard clients
    pub dashboard_addr: String,
    /// UDP listen address for touch station messages
    pub touch_addr: String,
    /// Local address the lamp frame socket binds to
    pub lamp_bind_addr: String,
    pub lamp_port: u16,
    pub layout_path: String,
    pub stats_log_period_secs: u64,
    pub animation: AnimationConfig,
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dashboard_addr: "0.0.0.0:8888".to_string(),
            touch_addr: "0.0.0.0:3333".to_string(),
            lamp_bind_addr: "0.0.0.0:0".to_string(),
            lamp_port: LAMP_PORT,
            layout_path: "led_locations.json".to_string(),
            stats_log_period_secs: 30,
            animation: AnimationConfig::default(),
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a JSON config file. Keys missing from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
        serde_json::from_slice(&data)
            .map_err(|e| format!("cannot parse config {}: {}", path.display(), e))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.animation.validate()?;
        self.hub.validate()?;
        for station in &self.hub.stations {
            if !self.animation.station_groups.contains_key(station) {
                return Err(format!("station {} has no epicenter group", station));
            }
        }
        Ok(())
    }
}
