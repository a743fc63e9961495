use blinker_shared::color::Rgb;

/// Run of consecutive identical vote colors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteStreak {
    last: Option<Rgb>,
    count: u32,
}

impl VoteStreak {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vote; returns the updated streak length.
    pub fn record(&mut self, color: Rgb) -> u32 {
        if self.last == Some(color) {
            self.count = self.count.saturating_add(1);
        } else {
            self.last = Some(color);
            self.count = 1;
        }
        self.count
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last(&self) -> Option<Rgb> {
        self.last
    }

    /// Color for the next inbound wave: the streak color once the streak
    /// reaches `threshold`, `default` otherwise.
    pub fn inbound_color(&self, threshold: u32, default: Rgb) -> Rgb {
        match self.last {
            Some(color) if self.count >= threshold => color,
            _ => default,
        }
    }
}
