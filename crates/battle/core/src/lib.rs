//! Deterministic battle rules shared by the host and guest peers.
//!
//! `battle-core` defines the canonical battle data model (heroes, creatures,
//! side mapping), the status-effect and targeting subsystems, the seeded RNG,
//! and the sanctioned mutators for HP, shield and attack bonuses. Everything
//! here is synchronous and side-effect free apart from the `&mut BattleState`
//! it is handed; orchestration and networking live in the `runtime` crate.
//!
//! Only the host peer is authoritative. Mutators that roll randomness or
//! derive new values refuse to run on a non-authoritative state, while the
//! `set_*` reconciliation primitives let a guest force host-computed values.
pub mod combat;
pub mod config;
pub mod delayed;
pub mod error;
pub mod resistance;
pub mod rng;
pub mod state;
pub mod status;
pub mod targeting;

pub use combat::{
    DamageApplied, DamageDescriptor, DamageSource, MutationError, add_attack_bonus,
    add_hp_bonus, add_shield, apply_damage, apply_damage_to_creature, heal, set_attack_bonus,
    set_hp, set_shield,
};
pub use config::BattleConfig;
pub use delayed::{DelayedEffect, DelayedEffectError, DelayedEffectRegistry, DelayedEffectRequest};
pub use error::{BattleError, ErrorSeverity};
pub use resistance::{
    ChanceResistance, NoResistance, ResistanceError, ResistanceManager, ResistanceOracle,
    ResistanceQuery, ScriptedResistance,
};
pub use rng::BattleRng;
pub use state::{
    AbsoluteSide, BattleOutcome, BattleState, CombatLog, Combatant, Creature, EntityRef, Hero,
    HeroSlots, LogEntry, LogSeverity, Position, RelativeSide, SideState, StatusEffects,
    StatusKind, TargetError,
};
pub use status::{StatusError, StatusEffectsManager};
pub use targeting::{TargetCollector, TargetPolicy, TargetTier};
