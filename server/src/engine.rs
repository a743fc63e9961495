use crate::config::AnimationConfig;
use crate::layout::{Lamp, Layout};
use crate::wave::{Wave, WaveShape};
use blinker_shared::color::Rgb;

/// Active waves per epicenter group, rendered into the layout's point colors.
///
/// Owned by the animation loop task; nothing else touches it.
pub struct WaveEngine {
    layout: Layout,
    waves: Vec<Vec<Wave>>,
    inbound: WaveShape,
    outbound: WaveShape,
    outer_group: usize,
    margin: f64,
}

impl WaveEngine {
    pub fn new(layout: Layout, config: &AnimationConfig) -> Self {
        let waves = vec![Vec::new(); layout.group_count()];
        Self {
            layout,
            waves,
            inbound: config.inbound,
            outbound: config.outbound,
            outer_group: config.outer_group,
            margin: config.retention_margin,
        }
    }

    /// Start a wave just outside the outer group's populated range,
    /// converging on its epicenters.
    pub fn spawn_inbound(&mut self, color: Rgb) {
        let group = self.outer_group;
        let mean = self.layout.max_radius(group) + self.inbound.window(self.margin);
        self.waves[group].push(Wave::new(group, mean, self.inbound, color));
    }

    /// Start a wave just inside zero radius of `group`, moving outward.
    /// Returns false if `group` does not exist.
    pub fn spawn_outbound(&mut self, group: usize, color: Rgb) -> bool {
        let Some(waves) = self.waves.get_mut(group) else {
            return false;
        };
        let mean = -self.outbound.window(self.margin);
        waves.push(Wave::new(group, mean, self.outbound, color));
        true
    }

    /// Insert an arbitrary wave. Returns false if its group does not exist.
    pub fn push_wave(&mut self, wave: Wave) -> bool {
        match self.waves.get_mut(wave.group) {
            Some(waves) => {
                waves.push(wave);
                true
            }
            None => false,
        }
    }

    /// Advance and prune every wave, then re-render all point colors.
    pub fn tick(&mut self) {
        self.advance();
        self.render();
    }

    fn advance(&mut self) {
        let margin = self.margin;
        for (group, waves) in self.waves.iter_mut().enumerate() {
            let max_radius = self.layout.max_radius(group);
            for wave in waves.iter_mut() {
                wave.advance();
            }
            waves.retain(|w| w.is_retained(max_radius, margin));
        }
    }

    /// Recompute every point color from the current wave set.
    pub fn render(&mut self) {
        let waves = &self.waves;
        for lamp in self.layout.lamps_mut() {
            for point in lamp.points.iter_mut() {
                let mut color = Rgb::BLACK;
                for (group, group_waves) in waves.iter().enumerate() {
                    let radius = point.radii[group];
                    for wave in group_waves {
                        color += wave.contribution(radius);
                    }
                }
                point.color = color;
            }
        }
    }

    pub fn waves(&self, group: usize) -> &[Wave] {
        &self.waves[group]
    }

    pub fn wave_count(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn lamps(&self) -> impl Iterator<Item = &Lamp> {
        self.layout.lamps()
    }
}
