use blinker_shared::color::Rgb;
use serde::{Deserialize, Serialize};

/// 1 / sqrt(2π)
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Shape constants shared by every wave of one kind (inbound or outbound).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveShape {
    /// Standard deviation of the Gaussian, in scaled units
    pub spread: f64,
    /// Layout units per scaled unit
    pub scale_x: f64,
    /// Amplitude multiplier
    pub scale_y: f64,
    /// Change of the mean radius per frame, in layout units
    pub velocity: f64,
}

impl WaveShape {
    /// Distance (layout units) from the mean at which a wave is considered gone.
    pub fn window(&self, margin: f64) -> f64 {
        margin * self.spread * self.scale_x
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.spread.is_finite() || self.spread <= 0.0 {
            return Err("spread must be finite and > 0".to_string());
        }
        if !self.scale_x.is_finite() || self.scale_x <= 0.0 {
            return Err("scale_x must be finite and > 0".to_string());
        }
        if !self.scale_y.is_finite() {
            return Err("scale_y must be finite".to_string());
        }
        if !self.velocity.is_finite() || self.velocity == 0.0 {
            return Err("velocity must be finite and non-zero".to_string());
        }
        Ok(())
    }
}

/// A Gaussian pulse of color travelling radially through one epicenter group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wave {
    pub group: usize,
    /// Current mean radius, in layout units
    pub mean: f64,
    pub shape: WaveShape,
    pub color: Rgb,
}

impl Wave {
    pub fn new(group: usize, mean: f64, shape: WaveShape, color: Rgb) -> Self {
        Self {
            group,
            mean,
            shape,
            color,
        }
    }

    pub fn advance(&mut self) {
        self.mean += self.shape.velocity;
    }

    /// Whether the mean still lies within `[-window, max_radius + window]`.
    pub fn is_retained(&self, max_radius: f64, margin: f64) -> bool {
        let window = self.shape.window(margin);
        self.mean >= -window && self.mean <= max_radius + window
    }

    /// Gaussian intensity at `radius`, including the amplitude scale.
    pub fn intensity(&self, radius: f64) -> f64 {
        let distance = (self.mean - radius).abs() / self.shape.scale_x;
        gaussian(distance, self.shape.spread) * self.shape.scale_y
    }

    /// This wave's color contribution for a point at `radius`.
    pub fn contribution(&self, radius: f64) -> Rgb {
        self.color.dim(self.intensity(radius))
    }
}

/// Mean-zero normal probability density.
pub fn gaussian(x: f64, sigma: f64) -> f64 {
    INV_SQRT_2PI / sigma * (-(x * x) / (2.0 * sigma * sigma)).exp()
}
