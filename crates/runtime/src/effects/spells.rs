//! Spells: cast by a hero, resolved against the enemy side.

use async_trait::async_trait;
use battle_core::{DamageSource, EntityRef, LogSeverity, StatusKind, TargetCollector, TargetPolicy, TargetTier};

use super::{
    EffectCategory, EffectModule, Readiness, Resist, StatusBatch, Strictness, Trigger, count_noun, living_hero,
    log_hits, log_status_batch, resisted_hit,
};
use crate::api::{Result, RuntimeError};
use crate::context::{BattleContext, DamageOutcome};
use crate::events::{HitRecord, StatusRecord, UpdatePayload};

const FLAME_MS: u64 = 900;
const FLAME_STAGGER_MS: u64 = 150;
const CLOUD_MS: u64 = 1200;
const CURSE_MS: u64 = 700;

fn spell_caster(ctx: &BattleContext, trigger: &Trigger) -> Readiness {
    living_hero(ctx, trigger, "spells need a casting hero")
}

fn status_records(payload: &UpdatePayload) -> &[StatusRecord] {
    match payload {
        UpdatePayload::StatusApplied { targets, .. } => targets,
        _ => &[],
    }
}

// ============================================================================
// Burning Rain
// ============================================================================

/// Rains fire on random enemies, creatures first. Every survivor burns.
/// Each Fireball in the caster's graveyard adds to the damage.
#[derive(Clone, Copy, Debug, Default)]
pub struct BurningRain;

impl BurningRain {
    pub const SCALING_CARD: &'static str = "Fireball";

    fn damage(ctx: &BattleContext, caster: EntityRef) -> u32 {
        let spells = &ctx.tables().spells;
        let fireballs = ctx.state().graveyard_count(caster.side(), Self::SCALING_CARD);
        let fireballs = u32::try_from(fireballs).unwrap_or(u32::MAX);
        spells
            .burning_rain_damage
            .saturating_add(spells.burning_rain_damage_per_fireball.saturating_mul(fireballs))
    }

    fn rain(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
        strictness: Strictness,
    ) -> Result<UpdatePayload> {
        let caster = trigger
            .caster()
            .ok_or(RuntimeError::MissingCaster { effect: self.name() })?;
        let damage = Self::damage(ctx, caster);
        let mut hits = Vec::with_capacity(targets.len());
        let mut statuses = Vec::new();
        for &target in targets {
            let result = self.strike(ctx, caster, target, damage);
            if let Some((hit, mut written)) = strictness.keep(self.name(), target, result)? {
                hits.push(hit);
                statuses.append(&mut written);
            }
        }
        Ok(UpdatePayload::DamageDealt {
            effect: self.name().to_owned(),
            caster,
            hits,
            statuses,
        })
    }

    /// Resistance is rolled before the hit; a resisted target keeps its
    /// HP and gains no burn.
    fn strike(
        &self,
        ctx: &mut BattleContext,
        caster: EntityRef,
        target: EntityRef,
        damage: u32,
    ) -> Result<(HitRecord, Vec<StatusRecord>)> {
        if ctx.should_resist_area_spell(target, self.name())? {
            return Ok((resisted_hit(ctx, target)?, Vec::new()));
        }

        let burn = ctx.tables().spells.burning_rain_burn_stacks;
        let source = DamageSource::effect(self.name()).with_attacker(caster);
        let DamageOutcome { hit, potion } = ctx.deal_damage(target, damage, &source)?;

        let mut statuses: Vec<StatusRecord> = potion.into_iter().collect();
        if !hit.died && burn > 0 {
            let status = StatusKind::Burned.as_str();
            let final_stacks = ctx.apply_status(target, status, burn)?;
            statuses.push(StatusRecord {
                target,
                status: status.to_owned(),
                stacks: burn,
                resisted: false,
                final_stacks,
            });
        }
        Ok((hit, statuses))
    }
}

#[async_trait]
impl EffectModule for BurningRain {
    fn name(&self) -> &'static str {
        "burning_rain"
    }

    fn display_name(&self) -> &'static str {
        "Burning Rain"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Spell
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        spell_caster(ctx, trigger)
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        let Some(caster) = trigger.caster() else {
            return Vec::new();
        };
        let policy = TargetPolicy::RandomEnemies {
            count: ctx.tables().spells.burning_rain_targets,
            tiers: vec![TargetTier::Creatures, TargetTier::Heroes],
        };
        ctx.collect_targets(caster, &policy)
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        self.rain(ctx, trigger, targets, Strictness::Strict)
    }

    fn fallback(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
    ) -> Result<Option<UpdatePayload>> {
        self.rain(ctx, trigger, targets, Strictness::Lenient).map(Some)
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        let UpdatePayload::DamageDealt { hits, statuses, .. } = payload else {
            return;
        };
        log_hits(ctx, self.display_name(), hits, statuses);

        let burned = statuses
            .iter()
            .filter(|record| record.status == StatusKind::Burned.as_str())
            .count();
        if burned > 0 {
            let who = count_noun(burned, "target", "targets");
            ctx.add_combat_log(format!("{who} set ablaze."), LogSeverity::Info);
        }

        // Flames land in list order, one stagger step apart.
        let animations = hits
            .iter()
            .enumerate()
            .filter(|(_, hit)| !hit.resisted)
            .map(|(index, hit)| {
                ctx.animation(self.name(), hit.target, index as u64 * FLAME_STAGGER_MS, FLAME_MS)
            })
            .collect();
        ctx.play_animations(animations).await;
    }
}

// ============================================================================
// Cloud of Confusion
// ============================================================================

/// Clouds every living enemy hero. Creatures are never affected.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloudOfConfusion;

impl CloudOfConfusion {
    fn batch(ctx: &BattleContext, trigger: &Trigger) -> StatusBatch<'static> {
        StatusBatch {
            effect: "cloud_of_confusion",
            caster: trigger.caster(),
            status: StatusKind::Clouded,
            stacks: ctx.tables().spells.cloud_of_confusion_stacks,
            resist: Resist::Spell,
        }
    }
}

#[async_trait]
impl EffectModule for CloudOfConfusion {
    fn name(&self) -> &'static str {
        "cloud_of_confusion"
    }

    fn display_name(&self) -> &'static str {
        "Cloud of Confusion"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Spell
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        spell_caster(ctx, trigger)
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        TargetCollector::enemy_heroes_only(ctx.state(), trigger.side())
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        let records = Self::batch(ctx, trigger).apply(ctx, targets, Strictness::Strict)?;
        Ok(UpdatePayload::StatusApplied {
            effect: self.name().to_owned(),
            caster: trigger.caster(),
            targets: records,
        })
    }

    fn fallback(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
    ) -> Result<Option<UpdatePayload>> {
        let records = Self::batch(ctx, trigger).apply(ctx, targets, Strictness::Lenient)?;
        Ok(Some(UpdatePayload::StatusApplied {
            effect: self.name().to_owned(),
            caster: trigger.caster(),
            targets: records,
        }))
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        let records = status_records(payload);
        log_status_batch(ctx, "cloud", records, ("hero", "heroes"), "clouded");
        let animations = records
            .iter()
            .filter(|record| !record.resisted)
            .map(|record| ctx.animation(self.name(), record.target, 0, CLOUD_MS))
            .collect();
        ctx.play_animations(animations).await;
    }
}

// ============================================================================
// Heal Block Curse
// ============================================================================

/// Blocks healing on every living enemy, heroes and creatures alike.
#[derive(Clone, Copy, Debug, Default)]
pub struct HealBlockCurse;

impl HealBlockCurse {
    fn batch(ctx: &BattleContext, trigger: &Trigger) -> StatusBatch<'static> {
        StatusBatch {
            effect: "heal_block_curse",
            caster: trigger.caster(),
            status: StatusKind::HealBlock,
            stacks: ctx.tables().spells.heal_block_stacks,
            resist: Resist::Spell,
        }
    }
}

#[async_trait]
impl EffectModule for HealBlockCurse {
    fn name(&self) -> &'static str {
        "heal_block_curse"
    }

    fn display_name(&self) -> &'static str {
        "Heal Block Curse"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Spell
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        spell_caster(ctx, trigger)
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        TargetCollector::all_enemy_targets(ctx.state(), trigger.side())
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        let records = Self::batch(ctx, trigger).apply(ctx, targets, Strictness::Strict)?;
        Ok(UpdatePayload::StatusApplied {
            effect: self.name().to_owned(),
            caster: trigger.caster(),
            targets: records,
        })
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        let records = status_records(payload);
        log_status_batch(ctx, "curse", records, ("enemy", "enemies"), "can no longer be healed");
        let animations = records
            .iter()
            .filter(|record| !record.resisted)
            .map(|record| ctx.animation(self.name(), record.target, 0, CURSE_MS))
            .collect();
        ctx.play_animations(animations).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use battle_content::EffectTables;
    use battle_core::{
        AbsoluteSide, BattleConfig, BattleState, Hero, Position, ResistanceManager, ScriptedResistance,
    };

    use super::*;
    use crate::effects::{EffectExecutor, Resolution};

    fn alice() -> EntityRef {
        EntityRef::hero(AbsoluteSide::Host, Position::Center)
    }

    fn bob() -> EntityRef {
        EntityRef::hero(AbsoluteSide::Guest, Position::Left)
    }

    fn imp(index: usize) -> EntityRef {
        EntityRef::creature(AbsoluteSide::Guest, Position::Left, index)
    }

    fn context() -> BattleContext {
        context_with(EffectTables::default())
    }

    fn state() -> BattleState {
        let mut state = BattleState::new(AbsoluteSide::Host, 5);
        state.place_hero(Hero::new("Alice", AbsoluteSide::Host, Position::Center, 400, 30));
        state.place_hero(
            Hero::new("Bob", AbsoluteSide::Guest, Position::Left, 500, 20)
                .with_creature("Imp", 80, 10)
                .with_creature("Imp", 50, 10),
        );
        state
    }

    fn context_with(tables: EffectTables) -> BattleContext {
        BattleContext::new(state(), BattleConfig::new(), Arc::new(tables))
    }

    #[tokio::test(start_paused = true)]
    async fn burning_rain_prefers_creatures_and_burns_survivors() {
        let mut tables = EffectTables::default();
        tables.spells.burning_rain_targets = 2;
        tables.spells.burning_rain_damage = 60;
        let mut ctx = context_with(tables);

        let outcome = EffectExecutor::execute(&BurningRain, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        assert_eq!(outcome.resolution, Resolution::Applied);
        assert_eq!(outcome.targets_affected, 2);

        // Both creatures are picked before Bob; the 50 HP imp dies.
        assert_eq!(ctx.combatant(bob()).unwrap().current_hp(), 500);
        assert_eq!(ctx.combatant(imp(0)).unwrap().current_hp(), 20);
        assert_eq!(ctx.status_stacks(imp(0), "burned"), 1);
        assert!(!ctx.combatant(imp(1)).unwrap().is_alive());
        assert_eq!(ctx.status_stacks(imp(1), "burned"), 0);
        assert!(ctx.state().log().contains("Imp is defeated!"));
        assert!(ctx.state().log().contains("1 target set ablaze."));
    }

    #[tokio::test(start_paused = true)]
    async fn fireballs_in_the_graveyard_feed_the_rain() {
        let mut tables = EffectTables::default();
        tables.spells.burning_rain_targets = 1;
        tables.spells.burning_rain_damage = 20;
        tables.spells.burning_rain_damage_per_fireball = 15;
        let mut state = state();
        state
            .side_mut(AbsoluteSide::Host)
            .graveyard
            .extend(["Fireball".to_owned(), "Fireball".to_owned(), "Heal".to_owned()]);
        let mut ctx = BattleContext::new(state, BattleConfig::new(), Arc::new(tables));

        let outcome = EffectExecutor::execute(&BurningRain, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        let Some(UpdatePayload::DamageDealt { hits, .. }) = outcome.payload else {
            panic!("expected damage payload");
        };
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].damage, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn resisted_rain_leaves_target_untouched() {
        let mut ctx = context().with_resistance(ResistanceManager::new(ScriptedResistance::new([imp(0)])));
        let outcome = EffectExecutor::execute(&BurningRain, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();

        let Some(UpdatePayload::DamageDealt { hits, .. }) = outcome.payload else {
            panic!("expected damage payload");
        };
        let resisted: Vec<_> = hits.iter().filter(|hit| hit.resisted).collect();
        assert_eq!(resisted.len(), 1);
        assert_eq!(resisted[0].target, imp(0));
        assert_eq!(ctx.combatant(imp(0)).unwrap().current_hp(), 80);
        assert_eq!(ctx.status_stacks(imp(0), "burned"), 0);
        assert!(ctx.state().log().contains("Imp resists the Burning Rain!"));
    }

    #[tokio::test(start_paused = true)]
    async fn cloud_skips_creatures() {
        let mut ctx = context();
        let outcome = EffectExecutor::execute(&CloudOfConfusion, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        assert_eq!(outcome.targets_affected, 1);
        assert_eq!(ctx.status_stacks(bob(), "clouded"), 1);
        assert_eq!(ctx.status_stacks(imp(0), "clouded"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn heal_block_stops_healing() {
        let mut ctx = context();
        EffectExecutor::execute(&HealBlockCurse, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        ctx.set_hp(bob(), 300).unwrap();
        assert_eq!(ctx.heal(bob(), 50).unwrap(), 0);
        assert_eq!(ctx.combatant(bob()).unwrap().current_hp(), 300);
        assert!(ctx.state().log().contains("3 enemies can no longer be healed."));
    }

    #[tokio::test(start_paused = true)]
    async fn fallen_hero_cannot_cast() {
        let mut ctx = context();
        ctx.set_hp(alice(), 0).unwrap();
        let before = ctx.fingerprint().unwrap();

        let outcome = EffectExecutor::execute(&BurningRain, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        assert!(outcome.fizzled());
        assert_eq!(ctx.fingerprint().unwrap(), before);
        assert!(ctx.state().log().contains("Burning Rain fizzles: caster is no longer alive."));
    }

    #[tokio::test(start_paused = true)]
    async fn creature_cannot_cast_spells() {
        let mut ctx = context();
        let outcome = EffectExecutor::execute(&CloudOfConfusion, &mut ctx, &Trigger::cast(imp(0)))
            .await
            .unwrap();
        assert!(outcome.fizzled());
        assert_eq!(ctx.status_stacks(alice(), "clouded"), 0);
    }
}
