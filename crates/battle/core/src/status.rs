//! The only sanctioned read and write path for status effect stacks.
//!
//! Stacks are stored per entity in [`crate::state::StatusEffects`]; effect
//! modules never touch that map directly. Accumulating writes (`apply`,
//! `remove`, `consume`) are host-only. The guest mirrors host results with
//! [`StatusEffectsManager::set_status_effect_stacks`], which overwrites and is
//! therefore safe to replay.

use crate::error::{BattleError, ErrorSeverity};
use crate::state::{BattleState, EntityRef, TargetError};

/// Errors from status effect operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("status '{name}' must be applied with at least one stack")]
    ZeroStacks { name: String },

    #[error("status '{name}' can only be accumulated on the authoritative peer")]
    NotAuthoritative { name: String },

    #[error(transparent)]
    Target(#[from] TargetError),
}

impl BattleError for StatusError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ZeroStacks { .. } => ErrorSeverity::Validation,
            Self::NotAuthoritative { .. } => ErrorSeverity::Internal,
            Self::Target(err) => err.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroStacks { .. } => "STATUS_ZERO_STACKS",
            Self::NotAuthoritative { .. } => "STATUS_NOT_AUTHORITATIVE",
            Self::Target(err) => err.error_code(),
        }
    }
}

/// Stateless facade over every entity's status map.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusEffectsManager;

impl StatusEffectsManager {
    /// Adds `stacks` to the entity's count for `name`, creating the entry if
    /// absent. Returns the new count. No upper bound is enforced here.
    pub fn apply_status_effect(
        state: &mut BattleState,
        entity: EntityRef,
        name: impl AsRef<str>,
        stacks: u32,
    ) -> Result<u32, StatusError> {
        let name = name.as_ref();
        if stacks == 0 {
            return Err(StatusError::ZeroStacks {
                name: name.to_owned(),
            });
        }
        Self::ensure_authoritative(state, name)?;
        let combatant = state.resolve_mut(entity)?;
        Ok(combatant.statuses_mut().add(name, stacks))
    }

    /// Current stack count, 0 if the status or the entity is absent.
    pub fn get_status_effect_stacks(
        state: &BattleState,
        entity: EntityRef,
        name: impl AsRef<str>,
    ) -> u32 {
        state
            .combatant(entity)
            .map_or(0, |combatant| combatant.statuses().get(name.as_ref()))
    }

    pub fn has_status_effect(state: &BattleState, entity: EntityRef, name: impl AsRef<str>) -> bool {
        Self::get_status_effect_stacks(state, entity, name) > 0
    }

    /// Subtracts up to `stacks`, removing the entry at 0. Returns what is left.
    pub fn remove_status_effect(
        state: &mut BattleState,
        entity: EntityRef,
        name: impl AsRef<str>,
        stacks: u32,
    ) -> Result<u32, StatusError> {
        let name = name.as_ref();
        Self::ensure_authoritative(state, name)?;
        let combatant = state.resolve_mut(entity)?;
        Ok(combatant.statuses_mut().subtract(name, stacks))
    }

    /// Consumes a single stack. Returns `false` (and changes nothing) when no
    /// stack was present.
    pub fn consume_stack(
        state: &mut BattleState,
        entity: EntityRef,
        name: impl AsRef<str>,
    ) -> Result<bool, StatusError> {
        let name = name.as_ref();
        Self::ensure_authoritative(state, name)?;
        let statuses = state.resolve_mut(entity)?.statuses_mut();
        if statuses.get(name) == 0 {
            return Ok(false);
        }
        statuses.subtract(name, 1);
        Ok(true)
    }

    /// Overwrites the count with a host-computed value. Allowed on any peer.
    pub fn set_status_effect_stacks(
        state: &mut BattleState,
        entity: EntityRef,
        name: impl AsRef<str>,
        value: u32,
    ) -> Result<(), StatusError> {
        state
            .resolve_mut(entity)?
            .statuses_mut()
            .set(name.as_ref(), value);
        Ok(())
    }

    /// Drops every status of one entity (death or removal from play).
    pub fn clear_all_status_effects(
        state: &mut BattleState,
        entity: EntityRef,
    ) -> Result<(), StatusError> {
        state.resolve_mut(entity)?.statuses_mut().clear();
        Ok(())
    }

    /// End-of-battle wipe across both sides.
    pub fn clear_battle(state: &mut BattleState) {
        for combatant in state.combatants_mut() {
            combatant.statuses_mut().clear();
        }
    }

    fn ensure_authoritative(state: &BattleState, name: &str) -> Result<(), StatusError> {
        if state.is_authoritative() {
            Ok(())
        } else {
            Err(StatusError::NotAuthoritative {
                name: name.to_owned(),
            })
        }
    }
}
