//! Seeded Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. Used for arrow inaccuracy and
//! spawn-point scatter. A fixed seed in the config makes a run reproducible.

use super::vec2::Vec2;

/// PRNG using the Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use hold_the_bow::core::rng::SimRng;
///
/// let mut a = SimRng::new(12345);
/// let mut b = SimRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug)]
pub struct SimRng {
    state: [u64; 2],
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimRng {
    /// Seeded generator. Nearby seeds still give unrelated streams.
    pub fn new(seed: u64) -> Self {
        let mut mixer = seed;
        match [splitmix64(&mut mixer), splitmix64(&mut mixer)] {
            // All-zero state would only ever yield zeros
            [0, 0] => Self { state: [1, 1] },
            state => Self { state },
        }
    }

    /// Seed from the wall clock.
    pub fn from_clock() -> Self {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        Self::new(nanos as u64)
    }

    /// Next raw 64-bit output.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let [a, b] = self.state;
        let mixed = a ^ b;
        self.state = [a.rotate_left(24) ^ mixed ^ (mixed << 16), mixed.rotate_left(37)];
        a.wrapping_add(b)
    }

    /// Uniform float in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        // 24 high bits fill the f32 mantissa exactly
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform float in [min, max). Collapses to `min` for an empty range.
    #[inline]
    pub fn next_f32_range(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        min + (max - min) * self.next_f32()
    }

    /// Uniform point inside the disc of `radius` around `center`.
    ///
    /// Samples the bounding square and rejects corners.
    pub fn random_point_in_circle(&mut self, center: Vec2, radius: f32) -> Vec2 {
        if radius <= 0.0 || !radius.is_finite() {
            return center;
        }
        let r2 = radius * radius;
        loop {
            let offset = Vec2::new(
                self.next_f32_range(-radius, radius),
                self.next_f32_range(-radius, radius),
            );
            if offset.length_squared() <= r2 {
                return center + offset;
            }
        }
    }
}

/// SplitMix64 step, used only for seeding.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// =============================================================================
// TESTS
// =============================================================================
