//! Creature special attacks.

use async_trait::async_trait;
use battle_core::{DamageSource, EntityRef, Hero, LogSeverity, TargetCollector};

use super::{EffectCategory, EffectModule, Readiness, Strictness, Trigger, count_noun, log_hits};
use crate::api::{Result, RuntimeError};
use crate::context::{BattleContext, DamageOutcome};
use crate::events::{BoostRecord, UpdatePayload};

const RALLY_MS: u64 = 800;
const CANNON_MS: u64 = 1000;

/// Living creature casting the effect, or the reason it cannot.
fn living_creature(ctx: &BattleContext, trigger: &Trigger) -> std::result::Result<EntityRef, Readiness> {
    let caster = match trigger.caster() {
        Some(caster) if caster.is_creature() => caster,
        _ => return Err(Readiness::fizzle("only a creature can use this")),
    };
    if ctx.combatant(caster).is_ok_and(|creature| creature.is_alive()) {
        Ok(caster)
    } else {
        Err(Readiness::fizzle("caster is no longer alive"))
    }
}

fn creature_caster(effect: &'static str, trigger: &Trigger) -> Result<EntityRef> {
    trigger
        .caster()
        .filter(EntityRef::is_creature)
        .ok_or(RuntimeError::MissingCaster { effect })
}

// ============================================================================
// Skeleton Rally
// ============================================================================

/// Raises the attack of every allied hero. Needs a second living creature
/// on the caster's side.
#[derive(Clone, Copy, Debug, Default)]
pub struct SkeletonRally;

impl SkeletonRally {
    fn rally(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
        strictness: Strictness,
    ) -> Result<UpdatePayload> {
        let caster = creature_caster(self.name(), trigger)?;
        let bonus = ctx.tables().creatures.skeleton_rally_bonus;
        let mut boosts = Vec::with_capacity(targets.len());
        for &hero in targets {
            let result = ctx.add_attack_bonus(hero, bonus);
            if let Some(new_attack_bonus) = strictness.keep(self.name(), hero, result)? {
                boosts.push(BoostRecord {
                    hero,
                    bonus,
                    new_attack_bonus,
                });
            }
        }
        Ok(UpdatePayload::AttackRally {
            effect: self.name().to_owned(),
            caster,
            boosts,
        })
    }
}

#[async_trait]
impl EffectModule for SkeletonRally {
    fn name(&self) -> &'static str {
        "skeleton_rally"
    }

    fn display_name(&self) -> &'static str {
        "Skeleton Rally"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Creature
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        let caster = match living_creature(ctx, trigger) {
            Ok(caster) => caster,
            Err(readiness) => return readiness,
        };
        let has_company = ctx
            .state()
            .side(caster.side())
            .heroes()
            .iter()
            .flat_map(Hero::living_creatures)
            .any(|creature| creature.entity_ref() != caster);
        if has_company {
            Readiness::Ready
        } else {
            Readiness::fizzle("no other living ally creature")
        }
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        TargetCollector::ally_heroes_only(ctx.state(), trigger.side())
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        self.rally(ctx, trigger, targets, Strictness::Strict)
    }

    fn fallback(
        &self,
        ctx: &mut BattleContext,
        trigger: &Trigger,
        targets: &[EntityRef],
    ) -> Result<Option<UpdatePayload>> {
        self.rally(ctx, trigger, targets, Strictness::Lenient).map(Some)
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        let UpdatePayload::AttackRally { caster, boosts, .. } = payload else {
            return;
        };
        let Some(bonus) = boosts.first().map(|boost| boost.bonus) else {
            return;
        };
        let name = ctx.name_of(*caster);
        let heroes = count_noun(boosts.len(), "hero", "heroes");
        ctx.add_combat_log(
            format!("{name} rallies the bones: {heroes} gain +{bonus} attack!"),
            LogSeverity::Success,
        );

        let animations = boosts
            .iter()
            .map(|boost| ctx.animation(self.name(), boost.hero, 0, RALLY_MS))
            .collect();
        ctx.play_animations(animations).await;
    }
}

// ============================================================================
// Cannon Burst
// ============================================================================

/// Fires at the nearest enemy hero, ignoring creatures in between.
#[derive(Clone, Copy, Debug, Default)]
pub struct CannonBurst;

#[async_trait]
impl EffectModule for CannonBurst {
    fn name(&self) -> &'static str {
        "cannon_burst"
    }

    fn display_name(&self) -> &'static str {
        "Cannon Burst"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Creature
    }

    fn precondition(&self, ctx: &BattleContext, trigger: &Trigger) -> Readiness {
        match living_creature(ctx, trigger) {
            Ok(_) => Readiness::Ready,
            Err(readiness) => readiness,
        }
    }

    fn collect_targets(&self, ctx: &mut BattleContext, trigger: &Trigger) -> Vec<EntityRef> {
        let Some(caster) = trigger.caster() else {
            return Vec::new();
        };
        TargetCollector::nearest_enemy_hero_ignoring_creatures(ctx.state(), caster.position(), caster.side())
            .into_iter()
            .collect()
    }

    fn apply(&self, ctx: &mut BattleContext, trigger: &Trigger, targets: &[EntityRef]) -> Result<UpdatePayload> {
        let caster = creature_caster(self.name(), trigger)?;
        let damage = ctx.tables().creatures.cannon_burst_damage;
        let source = DamageSource::effect(self.name()).with_attacker(caster);

        let mut hits = Vec::with_capacity(targets.len());
        let mut statuses = Vec::new();
        for &target in targets {
            let DamageOutcome { hit, potion } = ctx.deal_damage(target, damage, &source)?;
            hits.push(hit);
            statuses.extend(potion);
        }
        Ok(UpdatePayload::DamageDealt {
            effect: self.name().to_owned(),
            caster,
            hits,
            statuses,
        })
    }

    async fn play(&self, ctx: &mut BattleContext, payload: &UpdatePayload) {
        let UpdatePayload::DamageDealt { hits, statuses, .. } = payload else {
            return;
        };
        log_hits(ctx, self.display_name(), hits, statuses);
        let animations = hits
            .iter()
            .map(|hit| ctx.animation(self.name(), hit.target, 0, CANNON_MS))
            .collect();
        ctx.play_animations(animations).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use battle_content::EffectTables;
    use battle_core::{AbsoluteSide, BattleConfig, BattleState, Position};

    use super::*;
    use crate::effects::{EffectExecutor, Resolution};

    fn skeleton(index: usize) -> EntityRef {
        EntityRef::creature(AbsoluteSide::Host, Position::Left, index)
    }

    fn context() -> BattleContext {
        let mut state = BattleState::new(AbsoluteSide::Host, 3);
        state.place_hero(
            Hero::new("Alice", AbsoluteSide::Host, Position::Left, 400, 30)
                .with_creature("Skeleton Archer", 40, 8)
                .with_creature("Skeleton Mage", 40, 8),
        );
        state.place_hero(Hero::new("Dora", AbsoluteSide::Host, Position::Right, 300, 25));
        state.place_hero(Hero::new("Bob", AbsoluteSide::Guest, Position::Right, 500, 20).with_creature("Imp", 80, 10));
        state.place_hero(Hero::new("Eve", AbsoluteSide::Guest, Position::Center, 450, 20));
        BattleContext::new(state, BattleConfig::new(), Arc::new(EffectTables::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn rally_boosts_every_allied_hero() {
        let mut ctx = context();
        let outcome = EffectExecutor::execute(&SkeletonRally, &mut ctx, &Trigger::cast(skeleton(0)))
            .await
            .unwrap();

        assert_eq!(outcome.targets_affected, 2);
        let alice = EntityRef::hero(AbsoluteSide::Host, Position::Left);
        let dora = EntityRef::hero(AbsoluteSide::Host, Position::Right);
        assert_eq!(ctx.combatant(alice).unwrap().battle_attack_bonus(), 10);
        assert_eq!(ctx.combatant(dora).unwrap().battle_attack_bonus(), 10);
        assert!(ctx
            .state()
            .log()
            .contains("Skeleton Archer rallies the bones: 2 heroes gain +10 attack!"));
    }

    #[tokio::test(start_paused = true)]
    async fn lone_skeleton_fizzles() {
        let mut ctx = context();
        ctx.set_hp(skeleton(1), 0).unwrap();

        let outcome = EffectExecutor::execute(&SkeletonRally, &mut ctx, &Trigger::cast(skeleton(0)))
            .await
            .unwrap();
        assert_eq!(
            outcome.resolution,
            Resolution::Fizzled {
                reason: "no other living ally creature".into()
            }
        );
        let alice = EntityRef::hero(AbsoluteSide::Host, Position::Left);
        assert_eq!(ctx.combatant(alice).unwrap().battle_attack_bonus(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cannon_skips_creatures_and_hits_nearest_hero() {
        let mut ctx = context();
        // Facing slot (left) is empty on the guest side, so Eve in the
        // center is nearest; Bob's imp never counts.
        let outcome = EffectExecutor::execute(&CannonBurst, &mut ctx, &Trigger::cast(skeleton(1)))
            .await
            .unwrap();
        assert_eq!(outcome.targets_affected, 1);

        let eve = EntityRef::hero(AbsoluteSide::Guest, Position::Center);
        assert_eq!(ctx.combatant(eve).unwrap().current_hp(), 330);
        assert!(ctx.state().log().contains("Cannon Burst hits Eve for 120 damage."));
    }

    #[tokio::test(start_paused = true)]
    async fn dead_creature_cannot_fire() {
        let mut ctx = context();
        ctx.set_hp(skeleton(1), 0).unwrap();
        let outcome = EffectExecutor::execute(&CannonBurst, &mut ctx, &Trigger::cast(skeleton(1)))
            .await
            .unwrap();
        assert!(outcome.fizzled());
    }
}
