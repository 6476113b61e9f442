//! Effects registered outside battle and applied at the next battle start.
//!
//! A registry lives for exactly one selection-phase-to-battle-start span.
//! Entries accumulate by `(side, source, type)`: registering the same pair
//! repeatedly bumps `stacks` instead of adding entries, so effects can scale
//! with repeated triggers regardless of registration order.

use std::collections::BTreeMap;

use crate::error::{BattleError, ErrorSeverity};
use crate::state::AbsoluteSide;

/// One pending delayed effect.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelayedEffect {
    pub effect_type: String,
    pub stacks: u32,
    /// Card that registered the effect.
    pub source: String,
    pub side: AbsoluteSide,
    /// Timestamp (ms) of the latest registration.
    pub applied_at: u64,
    /// Effect-specific numbers, e.g. `shield_per_stack`.
    pub params: BTreeMap<String, i64>,
}

impl DelayedEffect {
    pub fn param(&self, key: &str) -> Option<i64> {
        self.params.get(key).copied()
    }
}

/// Arguments to [`DelayedEffectRegistry::register`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelayedEffectRequest {
    pub effect_type: String,
    pub source: String,
    pub stacks_increment: u32,
    pub params: BTreeMap<String, i64>,
}

impl DelayedEffectRequest {
    pub fn new(effect_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            effect_type: effect_type.into(),
            source: source.into(),
            stacks_increment: 1,
            params: BTreeMap::new(),
        }
    }

    pub fn with_stacks_increment(mut self, stacks: u32) -> Self {
        self.stacks_increment = stacks;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: i64) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DelayedEffectError {
    #[error("delayed effect '{effect_type}' from '{card}' registered with zero stacks")]
    ZeroIncrement { effect_type: String, card: String },

    #[error("delayed effect type must not be empty")]
    EmptyType,
}

impl BattleError for DelayedEffectError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroIncrement { .. } => "DELAYED_ZERO_INCREMENT",
            Self::EmptyType => "DELAYED_EMPTY_TYPE",
        }
    }
}

/// Pending delayed effects for both sides, in first-registration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelayedEffectRegistry {
    entries: Vec<DelayedEffect>,
}

impl DelayedEffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or accumulates an effect for `side`.
    ///
    /// A new entry starts at `stacks_increment`; a repeat registration adds
    /// `stacks_increment`, refreshes `applied_at` and overwrites any params
    /// the request carries. Returns the entry's stack count.
    pub fn register(
        &mut self,
        side: AbsoluteSide,
        request: DelayedEffectRequest,
        now: u64,
    ) -> Result<u32, DelayedEffectError> {
        if request.effect_type.is_empty() {
            return Err(DelayedEffectError::EmptyType);
        }
        if request.stacks_increment == 0 {
            return Err(DelayedEffectError::ZeroIncrement {
                effect_type: request.effect_type,
                card: request.source,
            });
        }

        let existing = self.entries.iter_mut().find(|entry| {
            entry.side == side
                && entry.source == request.source
                && entry.effect_type == request.effect_type
        });
        match existing {
            Some(entry) => {
                entry.stacks = entry.stacks.saturating_add(request.stacks_increment);
                entry.applied_at = now;
                entry.params.extend(request.params);
                Ok(entry.stacks)
            }
            None => {
                let stacks = request.stacks_increment;
                self.entries.push(DelayedEffect {
                    effect_type: request.effect_type,
                    stacks,
                    source: request.source,
                    side,
                    applied_at: now,
                    params: request.params,
                });
                Ok(stacks)
            }
        }
    }

    /// Effects pending for `side`. Does not clear; the caller resets the
    /// registry once the battle has started.
    pub fn consume_all_for_battle_start(&self, side: AbsoluteSide) -> Vec<DelayedEffect> {
        self.entries
            .iter()
            .filter(|entry| entry.side == side)
            .cloned()
            .collect()
    }

    pub fn get(&self, side: AbsoluteSide, source: &str, effect_type: &str) -> Option<&DelayedEffect> {
        self.entries.iter().find(|entry| {
            entry.side == side && entry.source == source && entry.effect_type == effect_type
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
