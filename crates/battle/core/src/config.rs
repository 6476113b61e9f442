/// Battle configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BattleConfig {
    /// Seed for the host's battle RNG. The guest never rolls, but carries the
    /// same seed so a recorded battle can be re-simulated for debugging.
    pub rng_seed: u64,

    /// Fixed delay (ms) the host waits after emitting an update and before
    /// playing its own animation, so both peers animate roughly in sync.
    pub guest_head_start_ms: u64,

    /// User "battle speed" setting in percent. 100 is normal speed, 200 plays
    /// animations twice as fast.
    pub battle_speed_percent: u32,

    /// Capacity of each local event bus topic and of the guest's update queue.
    pub update_buffer_size: usize,
}

impl BattleConfig {
    // ===== compile-time constants =====
    /// Hero slots per side (left, center, right).
    pub const HERO_SLOTS: usize = 3;
    /// Upper bound on creatures a single hero can field.
    pub const MAX_CREATURES_PER_HERO: usize = 16;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_RNG_SEED: u64 = 0x5EED_BA77_1E00_0001;
    pub const DEFAULT_GUEST_HEAD_START_MS: u64 = 50;
    pub const DEFAULT_BATTLE_SPEED_PERCENT: u32 = 100;
    pub const DEFAULT_UPDATE_BUFFER_SIZE: usize = 64;

    pub fn new() -> Self {
        Self {
            rng_seed: Self::DEFAULT_RNG_SEED,
            guest_head_start_ms: Self::DEFAULT_GUEST_HEAD_START_MS,
            battle_speed_percent: Self::DEFAULT_BATTLE_SPEED_PERCENT,
            update_buffer_size: Self::DEFAULT_UPDATE_BUFFER_SIZE,
        }
    }

    pub fn with_seed(mut self, rng_seed: u64) -> Self {
        self.rng_seed = rng_seed;
        self
    }

    pub fn with_battle_speed(mut self, percent: u32) -> Self {
        self.battle_speed_percent = percent;
        self
    }

    /// Scales an animation duration by the battle speed setting.
    ///
    /// A zero or missing speed is treated as normal speed. Non-zero durations
    /// never collapse to 0 so ordering between timed steps is preserved.
    pub fn speed_adjusted_delay(&self, ms: u64) -> u64 {
        if ms == 0 {
            return 0;
        }
        let speed = if self.battle_speed_percent == 0 {
            Self::DEFAULT_BATTLE_SPEED_PERCENT
        } else {
            self.battle_speed_percent
        };
        (ms.saturating_mul(100) / u64::from(speed)).max(1)
    }
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self::new()
    }
}
