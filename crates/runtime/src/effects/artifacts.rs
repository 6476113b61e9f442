//! Artifacts: equipment effects, some registered before battle and resolved
//! at battle start.

use async_trait::async_trait;
use battle_core::{
    AbsoluteSide, DelayedEffectRequest, EntityRef, Hero, LogSeverity, StatusKind, TargetCollector,
};
use tracing::debug;

use super::{EffectCategory, EffectModule, Readiness, Strictness, Trigger, count_noun};
use crate::api::{Result, RuntimeError};
use crate::context::BattleContext;
use crate::events::{ShieldRecord, UpdatePayload};

const SHIELD_MS: u64 = 700;
const RESERVE_MS: u64 = 900;

// ============================================================================
// Guardian Shield
// ============================================================================

/// Shields every living ally, hero and creature, at battle start.
///
/// Each disenchant before battle adds one stack. Every stack grants
/// `shield_per_stack`, plus `guardian_shield_per_wisp` for each distinct
/// living Wisp on the side.
#[derive(Clone, Copy, Debug, Default)]
pub struct GuardianShield;

impl GuardianShield {
    pub const DELAYED_TYPE: &'static str = "shield_all_allies";
    pub const SOURCE: &'static str = "Guardian Shield";
    pub const PER_STACK_PARAM: &'static str = "shield_per_stack";
    pub const WISP_PREFIX: &'static str = "Wisp";

    /// Registers one stack for `side`'s next battle. Returns the
    /// accumulated stack count.
    pub fn register_disenchant(ctx: &mut BattleContext, side: AbsoluteSide, now: u64) -> Result<u32> {
        let per_stack = i64::from(ctx.tables().artifacts.guardian_shield_per_stack);
        let request = DelayedEffectRequest::new(Self::DELAYED_TYPE, Self::SOURCE)
            .with_param(Self::PER_STACK_PARAM, per_stack);
        let stacks = ctx.delayed_effects_mut().register(side, request, now)?;
        debug!(target: "runtime::effects", ?side, stacks, "guardian shield registered");
        Ok(stacks)
    }

    fn per_target(ctx: &BattleContext, trigger: &Trigger) -> u32 {
        let default = ctx.tables().artifacts.guardian_shield_per_stack;
        let per_stack = match trigger {
            Trigger::BattleStart { effect } => effect
                .param(Self::PER_STACK_PARAM)
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(default),
            Trigger::Cast { .. } => default,
        };
        let per_wisp = ctx.tables().artifacts.guardian_shield_per_wisp;
        let side = trigger.side();

        // The Wisp count is taken again for every stack.
        (0..trigger.stacks()).fold(0u32, |total, _| {
            let wisps = ctx.state().unique_creature_count(side, Self::WISP_PREFIX);
            let wisps = u32::try_from(wisps).unwrap_or(u32::MAX);
            total
                .saturating_add(per_stack)
                .saturating_add(per_wisp.saturating_mul(wisps))
        })
    }

    fn source(trigger: &Trigger) -> String {
        match trigger {
            Trigger::BattleStart { effect } => effect.source.clone(),
            Trigger::Cast { .. } => Self::SOURCE.to_owned(),
        }
    }

    fn shield(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
        strictness: Strictness,
    ) -> Result<UpdatePayload> {
        let amount = Self::per_target(ctx, trigger);
        let mut grants = Vec::with_capacity(targets.len());
        for &target in targets {
            let result = ctx.add_shield(target, amount);
            if let Some(new_shield) = strictness.keep(self.name(), target, result)? {
                grants.push(ShieldRecord {
                    target,
                    amount,
                    new_shield,
                });
            }
        }
        Ok(UpdatePayload::ShieldGranted {
            effect: self.name().to_owned(),
            source: Self::source(trigger),
            side: trigger.side(),
            total_shield: amount,
            grants,
        })
    }
}

#[async_trait]
impl EffectModule for GuardianShield {
    fn name(&self) -> &'static str {
        "guardian_shield"
    }

    fn display_name(&self) -> &'static str {
        "Guardian Shield"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Artifact
    }

    fn delayed_type(&self) -> Option<&'static str> {
        Some(Self::DELAYED_TYPE)
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        if Self::per_target(ctx, trigger) == 0 {
            Readiness::fizzle("no shield to grant")
        } else {
            Readiness::Ready
        }
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        TargetCollector::all_ally_targets(ctx.state(), trigger.side())
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        self.shield(ctx, trigger, targets, Strictness::Strict)
    }

    fn fallback(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
    ) -> Result<Option<UpdatePayload>> {
        self.shield(ctx, trigger, targets, Strictness::Lenient).map(Some)
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        let UpdatePayload::ShieldGranted {
            source,
            total_shield,
            grants,
            ..
        } = payload
        else {
            return;
        };
        let allies = count_noun(grants.len(), "ally", "allies");
        ctx.add_combat_log(
            format!("{source} grants {total_shield} shield to {allies}."),
            LogSeverity::Success,
        );
        let animations = grants
            .iter()
            .map(|grant| ctx.animation(self.name(), grant.target, 0, SHIELD_MS))
            .collect();
        ctx.play_animations(animations).await;
    }
}

// ============================================================================
// Healing Reserve
// ============================================================================

/// Spends one `healing_reserve` stack on the caster to heal the most
/// wounded allied hero.
#[derive(Clone, Copy, Debug, Default)]
pub struct HealingReserve;

impl HealingReserve {
    /// Living ally hero with the lowest HP; ties go to the earlier slot.
    fn most_wounded(ctx: &BattleContext, side: AbsoluteSide) -> Option<EntityRef> {
        ctx.state()
            .side(side)
            .heroes()
            .living()
            .filter(|hero| hero.combatant().current_hp() < hero.combatant().max_hp())
            .min_by_key(|hero| hero.combatant().current_hp())
            .map(Hero::entity_ref)
    }
}

#[async_trait]
impl EffectModule for HealingReserve {
    fn name(&self) -> &'static str {
        "healing_reserve"
    }

    fn display_name(&self) -> &'static str {
        "Healing Reserve"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Artifact
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        let Some(holder) = trigger.caster().filter(EntityRef::is_hero) else {
            return Readiness::fizzle("no hero holds the reserve");
        };
        if ctx.status_stacks(holder, StatusKind::HealingReserve.as_str()) == 0 {
            return Readiness::fizzle("the reserve is empty");
        }
        if Self::most_wounded(ctx, trigger.side()).is_none() {
            return Readiness::fizzle("no wounded ally");
        }
        Readiness::Ready
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        Self::most_wounded(ctx, trigger.side()).into_iter().collect()
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        let holder = trigger
            .caster()
            .ok_or(RuntimeError::MissingCaster { effect: self.name() })?;
        let target = targets
            .first()
            .copied()
            .ok_or(RuntimeError::NoTargets { effect: self.name() })?;
        let status = StatusKind::HealingReserve.as_str();

        let stacks_remaining = ctx
            .consume_status_stack(holder, status)?
            .ok_or(RuntimeError::StatusMissing { entity: holder, status })?;
        let heal = ctx.tables().artifacts.healing_reserve_heal;
        let amount = ctx.heal(target, heal)?;
        let new_hp = ctx.combatant(target)?.current_hp();

        Ok(UpdatePayload::Healed {
            effect: self.name().to_owned(),
            holder,
            target,
            amount,
            new_hp,
            status: status.to_owned(),
            stacks_remaining,
        })
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        let UpdatePayload::Healed {
            holder,
            target,
            amount,
            ..
        } = payload
        else {
            return;
        };
        let holder_name = ctx.name_of(*holder);
        let target_name = ctx.name_of(*target);
        if *amount == 0 {
            ctx.add_combat_log(
                format!("{holder_name}'s Healing Reserve is blocked; {target_name} cannot be healed."),
                LogSeverity::Warning,
            );
            return;
        }
        ctx.add_combat_log(
            format!("{holder_name}'s Healing Reserve restores {amount} HP to {target_name}."),
            LogSeverity::Success,
        );
        let animation = ctx.animation(self.name(), *target, 0, RESERVE_MS);
        ctx.play_animations(vec![animation]).await;
    }
}
