use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use ts_rs::TS;

/// A lamp color: three signed 16-bit channels (r, g, b).
///
/// Channels are deliberately wider than any LED driver needs so that several
/// overlapping wave contributions can be summed without clamping. All
/// arithmetic wraps modulo 2^16: `i16::MAX + 1` becomes `i16::MIN`. Nothing
/// clamps the result before it goes on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../dashboard/src/generated/")]
pub struct Rgb(pub [i16; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    pub const fn new(r: i16, g: i16, b: i16) -> Self {
        Rgb([r, g, b])
    }

    pub fn r(self) -> i16 {
        self.0[0]
    }

    pub fn g(self) -> i16 {
        self.0[1]
    }

    pub fn b(self) -> i16 {
        self.0[2]
    }

    /// Scale every channel by `k`, truncating toward zero.
    /// Products outside the i16 range wrap like addition does.
    pub fn dim(self, k: f64) -> Rgb {
        let scale = |c: i16| (f64::from(c) * k) as i64 as i16;
        Rgb([scale(self.0[0]), scale(self.0[1]), scale(self.0[2])])
    }

    /// Big-endian wire encoding: r, g, b as two bytes each.
    pub fn to_be_bytes(self) -> [u8; 6] {
        let [r, g, b] = self.0;
        let (r, g, b) = (r.to_be_bytes(), g.to_be_bytes(), b.to_be_bytes());
        [r[0], r[1], g[0], g[1], b[0], b[1]]
    }
}

impl Add for Rgb {
    type Output = Rgb;

    fn add(self, rhs: Rgb) -> Rgb {
        Rgb([
            self.0[0].wrapping_add(rhs.0[0]),
            self.0[1].wrapping_add(rhs.0[1]),
            self.0[2].wrapping_add(rhs.0[2]),
        ])
    }
}

impl AddAssign for Rgb {
    fn add_assign(&mut self, rhs: Rgb) {
        *self = *self + rhs;
    }
}

impl From<[i16; 3]> for Rgb {
    fn from(c: [i16; 3]) -> Self {
        Rgb(c)
    }
}
