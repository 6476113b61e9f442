use super::{MutationError, ensure_authoritative};
use crate::state::{BattleState, EntityRef};

/// Who or what dealt a hit. Carried for logging only.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageSource {
    pub effect: String,
    pub attacker: Option<EntityRef>,
}

impl DamageSource {
    pub fn effect(effect: impl Into<String>) -> Self {
        Self {
            effect: effect.into(),
            attacker: None,
        }
    }

    pub fn with_attacker(mut self, attacker: EntityRef) -> Self {
        self.attacker = Some(attacker);
        self
    }
}

/// Precomputed outcome of one hit.
///
/// The caller computes `new_hp` and `died`; the mutators only check that the
/// two agree. Shield absorbs damage before HP.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageDescriptor {
    pub target: EntityRef,
    pub damage: u32,
    pub shield_absorbed: u32,
    pub new_hp: u32,
    pub died: bool,
}

impl DamageDescriptor {
    /// Computes the standard descriptor for `damage` against the target's
    /// current shield and HP.
    pub fn compute(state: &BattleState, target: EntityRef, damage: u32) -> Result<Self, MutationError> {
        let combatant = state.resolve(target)?;
        let shield_absorbed = damage.min(combatant.shield());
        let new_hp = combatant.current_hp().saturating_sub(damage - shield_absorbed);
        Ok(Self {
            target,
            damage,
            shield_absorbed,
            new_hp,
            died: new_hp == 0,
        })
    }
}

/// What a damage mutator actually changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DamageApplied {
    pub target: EntityRef,
    pub source: DamageSource,
    pub previous_hp: u32,
    pub new_hp: u32,
    pub shield_remaining: u32,
    pub died: bool,
}

/// Applies a precomputed hit to a hero.
pub fn apply_damage(
    state: &mut BattleState,
    descriptor: &DamageDescriptor,
    source: &DamageSource,
) -> Result<DamageApplied, MutationError> {
    if !descriptor.target.is_hero() {
        return Err(MutationError::WrongEntityKind {
            target: descriptor.target,
            expected: "hero",
        });
    }
    apply(state, descriptor, source, "apply_damage")
}

/// Applies a precomputed hit to a creature.
pub fn apply_damage_to_creature(
    state: &mut BattleState,
    descriptor: &DamageDescriptor,
    source: &DamageSource,
) -> Result<DamageApplied, MutationError> {
    if !descriptor.target.is_creature() {
        return Err(MutationError::WrongEntityKind {
            target: descriptor.target,
            expected: "creature",
        });
    }
    apply(state, descriptor, source, "apply_damage_to_creature")
}

fn apply(
    state: &mut BattleState,
    descriptor: &DamageDescriptor,
    source: &DamageSource,
    operation: &'static str,
) -> Result<DamageApplied, MutationError> {
    ensure_authoritative(state, operation)?;
    let target = descriptor.target;
    if descriptor.died != (descriptor.new_hp == 0) {
        return Err(MutationError::InconsistentDescriptor {
            target,
            new_hp: descriptor.new_hp,
            died: descriptor.died,
        });
    }

    let combatant = state.resolve_mut(target)?;
    if !combatant.is_alive() {
        return Err(MutationError::TargetDead { target });
    }

    let previous_hp = combatant.current_hp();
    let shield_remaining = combatant.shield().saturating_sub(descriptor.shield_absorbed);
    combatant.write_shield(shield_remaining);
    combatant.write_hp(descriptor.new_hp);
    let died = !combatant.is_alive();
    if died {
        combatant.statuses_mut().clear();
    }

    Ok(DamageApplied {
        target,
        source: source.clone(),
        previous_hp,
        new_hp: combatant.current_hp(),
        shield_remaining,
        died,
    })
}
