//! Host-side resistance checks.
//!
//! Whether a target negates an effect is an injected decision
//! ([`ResistanceOracle`]). The manager only enforces the protocol around it:
//! rolls happen on the authoritative peer, before any mutation, one roll per
//! target. Callers record the outcome in the sync payload so the guest never
//! rolls resistance itself.

use std::collections::HashSet;

use crate::error::{BattleError, ErrorSeverity};
use crate::rng::BattleRng;
use crate::state::{BattleState, EntityRef};

/// Everything an oracle may look at for one roll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResistanceQuery<'a> {
    pub target: EntityRef,
    pub effect: &'a str,
    pub attacker: Option<EntityRef>,
    /// Area spells use the area variant of the check.
    pub area: bool,
}

/// Decides whether a target resists. Implementations may consume randomness
/// from the battle RNG but must not use any other entropy source.
pub trait ResistanceOracle: Send + Sync {
    fn resists(&self, query: &ResistanceQuery<'_>, rng: &mut BattleRng) -> bool;
}

/// Nothing ever resists.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResistance;

impl ResistanceOracle for NoResistance {
    fn resists(&self, _query: &ResistanceQuery<'_>, _rng: &mut BattleRng) -> bool {
        false
    }
}

/// Flat percentage chance, with a separate chance for area spells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChanceResistance {
    pub spell_percent: u32,
    pub area_percent: u32,
}

impl ResistanceOracle for ChanceResistance {
    fn resists(&self, query: &ResistanceQuery<'_>, rng: &mut BattleRng) -> bool {
        let percent = if query.area {
            self.area_percent
        } else {
            self.spell_percent
        };
        rng.roll_percent(percent)
    }
}

/// Fixed set of entities that always resist. Used by tests and scripted
/// encounters.
#[derive(Clone, Debug, Default)]
pub struct ScriptedResistance {
    resisting: HashSet<EntityRef>,
}

impl ScriptedResistance {
    pub fn new(resisting: impl IntoIterator<Item = EntityRef>) -> Self {
        Self {
            resisting: resisting.into_iter().collect(),
        }
    }
}

impl ResistanceOracle for ScriptedResistance {
    fn resists(&self, query: &ResistanceQuery<'_>, _rng: &mut BattleRng) -> bool {
        self.resisting.contains(&query.target)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResistanceError {
    #[error("resistance for '{effect}' rolled on a non-authoritative peer")]
    NotAuthoritative { effect: String },
}

impl BattleError for ResistanceError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }

    fn error_code(&self) -> &'static str {
        "RESISTANCE_NOT_AUTHORITATIVE"
    }
}

/// Owns the resistance oracle for one battle.
pub struct ResistanceManager {
    oracle: Box<dyn ResistanceOracle>,
}

impl ResistanceManager {
    pub fn new(oracle: impl ResistanceOracle + 'static) -> Self {
        Self {
            oracle: Box::new(oracle),
        }
    }

    /// Single-target check. Dead or missing targets never resist.
    pub fn should_resist_spell(
        &self,
        state: &mut BattleState,
        target: EntityRef,
        effect: &str,
        attacker: Option<EntityRef>,
    ) -> Result<bool, ResistanceError> {
        self.roll(
            state,
            ResistanceQuery {
                target,
                effect,
                attacker,
                area: false,
            },
        )
    }

    /// Area-spell variant, rolled independently per target.
    pub fn should_resist_area_spell(
        &self,
        state: &mut BattleState,
        target: EntityRef,
        effect: &str,
    ) -> Result<bool, ResistanceError> {
        self.roll(
            state,
            ResistanceQuery {
                target,
                effect,
                attacker: None,
                area: true,
            },
        )
    }

    fn roll(&self, state: &mut BattleState, query: ResistanceQuery<'_>) -> Result<bool, ResistanceError> {
        if !state.is_authoritative() {
            return Err(ResistanceError::NotAuthoritative {
                effect: query.effect.to_owned(),
            });
        }
        let alive = state.combatant(query.target).is_some_and(|c| c.is_alive());
        if !alive {
            return Ok(false);
        }
        Ok(self.oracle.resists(&query, state.rng_mut()))
    }
}

impl Default for ResistanceManager {
    fn default() -> Self {
        Self::new(NoResistance)
    }
}

impl core::fmt::Debug for ResistanceManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResistanceManager").finish_non_exhaustive()
    }
}
