//! Effect modules and the machinery that runs them.
//!
//! Every artifact, creature attack, potion and spell implements
//! [`EffectModule`]. The host drives a module through [`EffectExecutor`];
//! the guest reaches the same module through the replay registry in
//! [`crate::sync`].

mod artifacts;
mod creatures;
mod executor;
mod potions;
mod registry;
mod spells;

pub use artifacts::{GuardianShield, HealingReserve};
pub use creatures::{CannonBurst, SkeletonRally};
pub use executor::{EffectExecutor, EffectOutcome, Resolution};
pub(crate) use executor::{log_fizzle, log_frozen, log_misfire};
pub use potions::{ElixirOfCold, HealingPotion, PoisonVial};
pub use registry::EffectRegistry;
pub use spells::{BurningRain, CloudOfConfusion, HealBlockCurse};

use async_trait::async_trait;
use battle_core::{AbsoluteSide, DelayedEffect, EntityRef, LogSeverity, StatusKind};
use tracing::warn;

use crate::api::Result;
use crate::context::BattleContext;
use crate::events::{HitRecord, StatusRecord, UpdatePayload};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectCategory {
    Artifact,
    Creature,
    Potion,
    Spell,
}

/// What set an effect off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// A hero or creature activates the effect.
    Cast { caster: EntityRef },
    /// A delayed effect registered before battle resolves at battle start.
    BattleStart { effect: DelayedEffect },
}

impl Trigger {
    pub fn cast(caster: EntityRef) -> Self {
        Self::Cast { caster }
    }

    pub fn side(&self) -> AbsoluteSide {
        match self {
            Self::Cast { caster } => caster.side(),
            Self::BattleStart { effect } => effect.side,
        }
    }

    pub fn caster(&self) -> Option<EntityRef> {
        match self {
            Self::Cast { caster } => Some(*caster),
            Self::BattleStart { .. } => None,
        }
    }

    /// Accumulated stacks for delayed effects, 1 for casts.
    pub fn stacks(&self) -> u32 {
        match self {
            Self::Cast { .. } => 1,
            Self::BattleStart { effect } => effect.stacks,
        }
    }
}

/// Outcome of a precondition check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Fizzle { reason: String },
}

impl Readiness {
    pub fn fizzle(reason: impl Into<String>) -> Self {
        Self::Fizzle {
            reason: reason.into(),
        }
    }
}

/// One concrete effect.
///
/// Host lifecycle: `precondition` → `collect_targets` → `apply` (one
/// payload per trigger) → emit → `play`. Guest lifecycle: `replay`.
#[async_trait]
pub trait EffectModule: Send + Sync {
    /// Registry key and the `effect` field of every payload it emits.
    fn name(&self) -> &'static str;

    /// Name shown in the combat log.
    fn display_name(&self) -> &'static str;

    fn category(&self) -> EffectCategory;

    /// Delayed effect type this module resolves at battle start.
    fn delayed_type(&self) -> Option<&'static str> {
        None
    }

    /// Pure read of the state; never mutates.
    fn precondition(&self, _ctx: &BattleContext, _trigger: &Trigger) -> Readiness {
        Readiness::Ready
    }

    /// Empty when nothing is eligible; the executor turns that into a fizzle.
    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef>;

    /// Host-only mutation. Returns the single update describing the outcome.
    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload>;

    /// Core mutation without flourish, run on a restored state after `apply`
    /// failed. `None` means the module has no reduced path.
    fn fallback(
        &self,
        _ctx: &mut BattleContext,
        _trigger: &Trigger,
        _targets: &[EntityRef],
    ) -> Result<Option<UpdatePayload>> {
        Ok(None)
    }

    /// Combat log lines and animations for an applied payload. Runs on both
    /// peers, after the state already reflects the payload.
    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload);

    /// Guest side: reconcile the mirror with the host's values, then play.
    async fn replay(&self, ctx: &mut BattleContext, payload: &UpdatePayload) -> Result<()> {
        crate::sync::reconcile(ctx, payload)?;
        self.play(ctx, payload).await;
        Ok(())
    }

    /// Removes lingering visuals. Idempotent.
    fn cleanup(&self, ctx: &BattleContext) {
        ctx.cleanup_presentation(self.name());
    }
}

/// Whether a per-target failure aborts the batch or skips the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Strictness {
    Strict,
    Lenient,
}

impl Strictness {
    fn keep<T>(self, effect: &str, target: EntityRef, result: Result<T>) -> Result<Option<T>> {
        match (self, result) {
            (_, Ok(value)) => Ok(Some(value)),
            (Self::Strict, Err(error)) => Err(error),
            (Self::Lenient, Err(error)) => {
                warn!(target: "runtime::effects", effect, entity = %target, %error, "skipping target");
                Ok(None)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Resist {
    Never,
    Spell,
    Area,
}

/// Stacks of one status applied to a list of targets.
pub(crate) struct StatusBatch<'a> {
    pub effect: &'a str,
    pub caster: Option<EntityRef>,
    pub status: StatusKind,
    pub stacks: u32,
    pub resist: Resist,
}

impl StatusBatch<'_> {
    /// Applies the batch to each target in order, rolling resistance per
    /// target before mutating it.
    pub fn apply(
        &self,
        ctx: &mut BattleContext,
        targets: &[EntityRef],
        strictness: Strictness,
    ) -> Result<Vec<StatusRecord>> {
        let mut records = Vec::with_capacity(targets.len());
        for &target in targets {
            let result = self.apply_one(ctx, target);
            if let Some(record) = strictness.keep(self.effect, target, result)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn apply_one(&self, ctx: &mut BattleContext, target: EntityRef) -> Result<StatusRecord> {
        let status = self.status.as_str();
        let resisted = match self.resist {
            Resist::Never => false,
            Resist::Spell => ctx.should_resist_spell(target, self.effect, self.caster)?,
            Resist::Area => ctx.should_resist_area_spell(target, self.effect)?,
        };
        let (stacks, final_stacks) = if resisted {
            (0, ctx.status_stacks(target, status))
        } else {
            (self.stacks, ctx.apply_status(target, status, self.stacks)?)
        };
        Ok(StatusRecord {
            target,
            status: status.to_owned(),
            stacks,
            resisted,
            final_stacks,
        })
    }
}

/// Ready only for a living hero caster. `need` completes the fizzle reason
/// when the caster is not a hero, e.g. `"spells need a casting hero"`.
pub(crate) fn living_hero(ctx: &BattleContext, trigger: &Trigger, need: &str) -> Readiness {
    let Some(caster) = trigger.caster().filter(EntityRef::is_hero) else {
        return Readiness::fizzle(need);
    };
    if ctx.combatant(caster).is_ok_and(|hero| hero.is_alive()) {
        Readiness::Ready
    } else {
        Readiness::fizzle("caster is no longer alive")
    }
}

/// A hit that was negated before any mutation.
pub(crate) fn resisted_hit(ctx: &BattleContext, target: EntityRef) -> Result<HitRecord> {
    let combatant = ctx.combatant(target)?;
    Ok(HitRecord {
        target,
        damage: 0,
        shield_absorbed: 0,
        new_hp: combatant.current_hp(),
        new_shield: combatant.shield(),
        died: false,
        resisted: true,
    })
}

/// `"1 enemy"` / `"3 enemies"`.
pub(crate) fn count_noun(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Combat log lines for a status batch: one per resisting target, then a
/// summary such as `"2 enemies poisoned."`.
pub(crate) fn log_status_batch(
    ctx: &mut BattleContext,
    display_name: &str,
    records: &[StatusRecord],
    noun: (&str, &str),
    verb: &str,
) {
    for record in records.iter().filter(|record| record.resisted) {
        let name = ctx.name_of(record.target);
        ctx.add_combat_log(format!("{name} resists the {display_name}!"), LogSeverity::Warning);
    }
    let applied = records.iter().filter(|record| !record.resisted).count();
    if applied > 0 {
        let who = count_noun(applied, noun.0, noun.1);
        ctx.add_combat_log(format!("{who} {verb}."), LogSeverity::Success);
    }
}

/// Combat log lines for a damage batch, in hit order.
pub(crate) fn log_hits(ctx: &mut BattleContext, display_name: &str, hits: &[HitRecord], statuses: &[StatusRecord]) {
    let potion = StatusKind::HealthPotionReady.as_str();
    for hit in hits {
        let name = ctx.name_of(hit.target);
        if hit.resisted {
            ctx.add_combat_log(format!("{name} resists the {display_name}!"), LogSeverity::Warning);
            continue;
        }
        ctx.add_combat_log(
            format!("{display_name} hits {name} for {} damage.", hit.damage),
            LogSeverity::Info,
        );
        let saved = statuses
            .iter()
            .any(|record| record.target == hit.target && record.status == potion);
        if saved {
            ctx.add_combat_log(
                format!("{name} drinks a healing potion and survives!"),
                LogSeverity::Success,
            );
        }
        if hit.died {
            ctx.add_combat_log(format!("{name} is defeated!"), LogSeverity::Error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_noun_pluralizes() {
        assert_eq!(count_noun(1, "enemy", "enemies"), "1 enemy");
        assert_eq!(count_noun(2, "enemy", "enemies"), "2 enemies");
        assert_eq!(count_noun(0, "ally", "allies"), "0 allies");
    }

    #[test]
    fn trigger_reports_side_and_stacks() {
        use battle_core::Position;
        use std::collections::BTreeMap;

        let caster = EntityRef::hero(AbsoluteSide::Guest, Position::Left);
        let cast = Trigger::cast(caster);
        assert_eq!(cast.side(), AbsoluteSide::Guest);
        assert_eq!(cast.stacks(), 1);

        let start = Trigger::BattleStart {
            effect: DelayedEffect {
                effect_type: "shield_all_allies".into(),
                stacks: 2,
                source: "Guardian Shield".into(),
                side: AbsoluteSide::Host,
                applied_at: 0,
                params: BTreeMap::new(),
            },
        };
        assert_eq!(start.side(), AbsoluteSide::Host);
        assert_eq!(start.caster(), None);
        assert_eq!(start.stacks(), 2);
    }
}
