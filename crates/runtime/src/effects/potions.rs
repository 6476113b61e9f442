//! Potions: drunk by a hero, resolved immediately.

use async_trait::async_trait;
use battle_core::{EntityRef, StatusKind, TargetCollector};

use super::{
    EffectCategory, EffectModule, Readiness, Resist, StatusBatch, Strictness, Trigger, living_hero, log_status_batch,
};
use crate::api::Result;
use crate::context::BattleContext;
use crate::events::{StatusRecord, UpdatePayload};

const SPLASH_MS: u64 = 600;

fn drinker(ctx: &BattleContext, trigger: &Trigger) -> Readiness {
    living_hero(ctx, trigger, "potions need a drinking hero")
}

fn enemies(ctx: &BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
    TargetCollector::all_enemy_targets(ctx.state(), trigger.side())
}

fn status_payload(effect: &str, trigger: &Trigger, targets: Vec<StatusRecord>) -> UpdatePayload {
    UpdatePayload::StatusApplied {
        effect: effect.to_owned(),
        caster: trigger.caster(),
        targets,
    }
}

/// Animates every target that took the status at once.
async fn splash(ctx: &BattleContext, effect: &str, payload: &UpdatePayload) {
    let UpdatePayload::StatusApplied { targets, .. } = payload else {
        return;
    };
    let animations = targets
        .iter()
        .filter(|record| !record.resisted)
        .map(|record| ctx.animation(effect, record.target, 0, SPLASH_MS))
        .collect();
    ctx.play_animations(animations).await;
}

fn status_records(payload: &UpdatePayload) -> &[StatusRecord] {
    match payload {
        UpdatePayload::StatusApplied { targets, .. } => targets,
        _ => &[],
    }
}

/// Poisons every living enemy. Each target rolls resistance on its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoisonVial;

impl PoisonVial {
    fn batch(ctx: &BattleContext, trigger: &Trigger) -> StatusBatch<'static> {
        StatusBatch {
            effect: "poison_vial",
            caster: trigger.caster(),
            status: StatusKind::Poisoned,
            stacks: ctx.tables().potions.poison_vial_stacks,
            resist: Resist::Spell,
        }
    }
}

#[async_trait]
impl EffectModule for PoisonVial {
    fn name(&self) -> &'static str {
        "poison_vial"
    }

    fn display_name(&self) -> &'static str {
        "Poison Vial"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Potion
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        drinker(ctx, trigger)
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        enemies(ctx, trigger)
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        let records = Self::batch(ctx, trigger).apply(ctx, targets, Strictness::Strict)?;
        Ok(status_payload(self.name(), trigger, records))
    }

    fn fallback(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
    ) -> Result<Option<UpdatePayload>> {
        let records = Self::batch(ctx, trigger).apply(ctx, targets, Strictness::Lenient)?;
        Ok(Some(status_payload(self.name(), trigger, records)))
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        log_status_batch(ctx, "poison", status_records(payload), ("enemy", "enemies"), "poisoned");
        splash(ctx, self.name(), payload).await;
    }
}

/// Freezes every living enemy. Frozen casters skip their next activation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ElixirOfCold;

impl ElixirOfCold {
    fn batch(ctx: &BattleContext, trigger: &Trigger) -> StatusBatch<'static> {
        StatusBatch {
            effect: "elixir_of_cold",
            caster: trigger.caster(),
            status: StatusKind::Frozen,
            stacks: ctx.tables().potions.elixir_of_cold_stacks,
            resist: Resist::Never,
        }
    }
}

#[async_trait]
impl EffectModule for ElixirOfCold {
    fn name(&self) -> &'static str {
        "elixir_of_cold"
    }

    fn display_name(&self) -> &'static str {
        "Elixir of Cold"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Potion
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        drinker(ctx, trigger)
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        enemies(ctx, trigger)
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        let records = Self::batch(ctx, trigger).apply(ctx, targets, Strictness::Strict)?;
        Ok(status_payload(self.name(), trigger, records))
    }

    fn fallback(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
    ) -> Result<Option<UpdatePayload>> {
        let records = Self::batch(ctx, trigger).apply(ctx, targets, Strictness::Lenient)?;
        Ok(Some(status_payload(self.name(), trigger, records)))
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        log_status_batch(ctx, "cold", status_records(payload), ("enemy", "enemies"), "frozen");
        splash(ctx, self.name(), payload).await;
    }
}

/// Primes a potion on every living ally hero. A primed hero survives the
/// next lethal hit (see [`BattleContext::deal_damage`]).
#[derive(Clone, Copy, Debug, Default)]
pub struct HealingPotion;

impl HealingPotion {
    fn batch(ctx: &BattleContext, trigger: &Trigger) -> StatusBatch<'static> {
        StatusBatch {
            effect: "healing_potion",
            caster: trigger.caster(),
            status: StatusKind::HealthPotionReady,
            stacks: ctx.tables().potions.healing_potion_stacks,
            resist: Resist::Never,
        }
    }
}

#[async_trait]
impl EffectModule for HealingPotion {
    fn name(&self) -> &'static str {
        "healing_potion"
    }

    fn display_name(&self) -> &'static str {
        "Healing Potion"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Potion
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        drinker(ctx, trigger)
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        TargetCollector::ally_heroes_only(ctx.state(), trigger.side())
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        let records = Self::batch(ctx, trigger).apply(ctx, targets, Strictness::Strict)?;
        Ok(status_payload(self.name(), trigger, records))
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        log_status_batch(
            ctx,
            "potion",
            status_records(payload),
            ("hero", "heroes"),
            "ready a healing potion",
        );
        splash(ctx, self.name(), payload).await;
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

    fn imp() -> EntityRef {
        EntityRef::creature(AbsoluteSide::Guest, Position::Left, 0)
    }

    fn context() -> BattleContext {
        let mut state = BattleState::new(AbsoluteSide::Host, 11);
        state.place_hero(Hero::new("Alice", AbsoluteSide::Host, Position::Center, 400, 30));
        state.place_hero(
            Hero::new("Bob", AbsoluteSide::Guest, Position::Left, 500, 20).with_creature("Imp", 80, 10),
        );
        BattleContext::new(state, BattleConfig::new(), Arc::new(EffectTables::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn poison_vial_poisons_hero_and_creature() {
        let mut ctx = context();
        let outcome = EffectExecutor::execute(&PoisonVial, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();

        assert_eq!(outcome.targets_affected, 2);
        assert_eq!(ctx.status_stacks(bob(), "poisoned"), 1);
        assert_eq!(ctx.status_stacks(imp(), "poisoned"), 1);
        assert!(ctx.state().log().contains("2 enemies poisoned."));
    }

    #[tokio::test(start_paused = true)]
    async fn resistance_only_spares_the_resisting_target() {
        let mut ctx = context().with_resistance(ResistanceManager::new(ScriptedResistance::new([bob()])));
        let outcome = EffectExecutor::execute(&PoisonVial, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();

        assert_eq!(outcome.targets_affected, 1);
        assert_eq!(ctx.status_stacks(bob(), "poisoned"), 0);
        assert_eq!(ctx.status_stacks(imp(), "poisoned"), 1);
        assert!(ctx.state().log().contains("Bob resists the poison!"));
        assert!(ctx.state().log().contains("1 enemy poisoned."));
    }

    #[tokio::test(start_paused = true)]
    async fn poison_with_no_living_enemies_fizzles() {
        let mut ctx = context();
        ctx.set_hp(bob(), 0).unwrap();
        ctx.set_hp(imp(), 0).unwrap();

        let outcome = EffectExecutor::execute(&PoisonVial, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        assert!(matches!(outcome.resolution, Resolution::Fizzled { .. }));
        assert_eq!(outcome.targets_affected, 0);
        assert!(ctx.state().log().contains("Poison Vial fizzles: no targets."));
    }

    #[tokio::test(start_paused = true)]
    async fn fallen_hero_cannot_drink() {
        let mut ctx = context();
        ctx.set_hp(alice(), 0).unwrap();

        let outcome = EffectExecutor::execute(&PoisonVial, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        assert_eq!(
            outcome.resolution,
            Resolution::Fizzled {
                reason: "caster is no longer alive".into()
            }
        );
        assert_eq!(ctx.status_stacks(bob(), "poisoned"), 0);
        assert_eq!(ctx.status_stacks(imp(), "poisoned"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn creatures_cannot_drink_potions() {
        let mut ctx = context();
        let imp_caster = EntityRef::creature(AbsoluteSide::Guest, Position::Left, 0);
        let outcome = EffectExecutor::execute(&ElixirOfCold, &mut ctx, &Trigger::cast(imp_caster))
            .await
            .unwrap();
        assert!(outcome.fizzled());
        assert!(ctx.state().log().contains("Elixir of Cold fizzles: potions need a drinking hero."));
    }

    #[tokio::test(start_paused = true)]
    async fn healing_potion_primes_ally_heroes() {
        let mut ctx = context();
        let outcome = EffectExecutor::execute(&HealingPotion, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        assert_eq!(outcome.targets_affected, 1);
        assert_eq!(ctx.status_stacks(alice(), "health_potion_ready"), 1);
        assert!(ctx.state().log().contains("1 hero ready a healing potion."));
    }

    #[tokio::test(start_paused = true)]
    async fn elixir_freezes_enemies() {
        let mut ctx = context();
        EffectExecutor::execute(&ElixirOfCold, &mut ctx, &Trigger::cast(alice()))
            .await
            .unwrap();
        assert_eq!(ctx.status_stacks(bob(), "frozen"), 1);
        assert_eq!(ctx.status_stacks(imp(), "frozen"), 1);
    }
}
