//! Seeded random number generation for host-authoritative rolls.
//!
//! Every random decision in a battle (random target selection, resistance
//! rolls, shuffles) goes through [`BattleRng`], which is owned by the
//! [`crate::BattleState`]. Only the host ever advances it; the guest replays
//! host-supplied outcomes and never rolls.
//!
//! # Determinism
//!
//! Given the same seed, [`BattleRng`] produces the same sequence on every
//! platform, so a host battle can be reproduced from its seed when debugging.

const PCG_MULTIPLIER: u64 = 6364136223846793005;
const PCG_INCREMENT: u64 = 1442695040888963407;

/// PCG-XSH-RR state transition: `state * multiplier + increment (mod 2^64)`.
#[inline]
fn pcg_step(state: u64) -> u64 {
    state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(PCG_INCREMENT)
}

/// XSH-RR output permutation, 64-bit state to 32-bit value.
#[inline]
fn pcg_output(state: u64) -> u32 {
    let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
    let rot = (state >> 59) as u32;
    xorshifted.rotate_right(rot)
}

/// Battle RNG stream. See <https://www.pcg-random.org/>.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleRng {
    seed: u64,
    state: u64,
    draws: u64,
}

impl BattleRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            state: seed,
            draws: 0,
        }
    }

    /// The seed this generator was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = pcg_step(self.state);
        self.draws += 1;
        pcg_output(self.state)
    }

    /// Random integer in `[min, max]` inclusive. Returns `min` when the range
    /// is empty or inverted.
    pub fn random_int(&mut self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        let wide = u64::from(self.next_u32()) << 32 | u64::from(self.next_u32());
        // `None` only for the full i64 range, where any draw is in bounds.
        let offset = match max.abs_diff(min).checked_add(1) {
            Some(span) => wide % span,
            None => wide,
        };
        min.wrapping_add_unsigned(offset)
    }

    /// Uniform float in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Returns true with `percent`% probability (values above 100 always hit).
    pub fn roll_percent(&mut self, percent: u32) -> bool {
        if percent == 0 {
            return false;
        }
        self.random_int(1, 100) <= i64::from(percent)
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.random_int(0, i as i64) as usize;
            items.swap(i, j);
        }
    }
}

impl Default for BattleRng {
    fn default() -> Self {
        Self::new(0)
    }
}
