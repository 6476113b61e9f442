//! Sanctioned mutators for HP, death, shield and battle bonuses.
//!
//! Nothing else in the workspace can write these fields. The `apply_*`,
//! `heal` and `add_*` mutators derive new values and are host-only; the
//! `set_*` primitives force a host-computed value and are what the guest
//! replays with.

mod damage;
mod vitals;

pub use damage::{DamageApplied, DamageDescriptor, DamageSource, apply_damage, apply_damage_to_creature};
pub use vitals::{
    add_attack_bonus, add_hp_bonus, add_shield, heal, set_attack_bonus, set_hp, set_shield,
};

use crate::error::{BattleError, ErrorSeverity};
use crate::state::{BattleState, EntityRef, TargetError};

/// Errors from combat mutators.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("{operation} is host-only")]
    NotAuthoritative { operation: &'static str },

    #[error("{target} is already dead")]
    TargetDead { target: EntityRef },

    #[error("{target} is not a {expected}")]
    WrongEntityKind {
        target: EntityRef,
        expected: &'static str,
    },

    #[error("descriptor for {target} is inconsistent: new_hp={new_hp}, died={died}")]
    InconsistentDescriptor {
        target: EntityRef,
        new_hp: u32,
        died: bool,
    },

    #[error(transparent)]
    Target(#[from] TargetError),
}

impl BattleError for MutationError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TargetDead { .. } => ErrorSeverity::Recoverable,
            Self::WrongEntityKind { .. } | Self::InconsistentDescriptor { .. } => {
                ErrorSeverity::Validation
            }
            Self::NotAuthoritative { .. } => ErrorSeverity::Internal,
            Self::Target(err) => err.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAuthoritative { .. } => "MUTATION_NOT_AUTHORITATIVE",
            Self::TargetDead { .. } => "MUTATION_TARGET_DEAD",
            Self::WrongEntityKind { .. } => "MUTATION_WRONG_ENTITY_KIND",
            Self::InconsistentDescriptor { .. } => "MUTATION_INCONSISTENT_DESCRIPTOR",
            Self::Target(err) => err.error_code(),
        }
    }
}

fn ensure_authoritative(state: &BattleState, operation: &'static str) -> Result<(), MutationError> {
    if state.is_authoritative() {
        Ok(())
    } else {
        Err(MutationError::NotAuthoritative { operation })
    }
}
