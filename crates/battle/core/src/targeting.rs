//! Target collection over battle state.
//!
//! All collectors are read-only queries that return [`EntityRef`]s in a
//! canonical order: living heroes left, center, right, then living creatures
//! by hero slot and list index. An empty result is a legitimate outcome
//! ("the effect fizzles"), never an error.
//!
//! Random selection draws from the battle's seeded [`BattleRng`] and is only
//! meaningful on the host; the guest receives the chosen targets in the sync
//! payload and never re-rolls.

use crate::rng::BattleRng;
use crate::state::{AbsoluteSide, BattleState, EntityRef, Hero, Position};

// ============================================================================
// Target Policy
// ============================================================================

/// Priority class used by [`TargetCollector::select_random`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TargetTier {
    Heroes,
    Creatures,
}

impl TargetTier {
    pub fn matches(self, target: &EntityRef) -> bool {
        match self {
            Self::Heroes => target.is_hero(),
            Self::Creatures => target.is_creature(),
        }
    }
}

/// How an effect picks its targets, relative to the caster's side.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TargetPolicy {
    /// Every living hero and creature of the opposing side.
    AllEnemies,
    /// Every living hero and creature of the caster's side.
    AllAllies,
    EnemyHeroes,
    AllyHeroes,
    /// Single enemy hero closest to the caster's slot; creatures never count.
    NearestEnemyHero,
    /// `count` distinct enemies chosen at random, filled tier by tier.
    RandomEnemies { count: usize, tiers: Vec<TargetTier> },
}

// ============================================================================
// Target Collector
// ============================================================================

/// Stateless collection of targeting queries.
#[derive(Clone, Copy, Debug, Default)]
pub struct TargetCollector;

impl TargetCollector {
    /// Living heroes and creatures of the side opposing `side`.
    pub fn all_enemy_targets(state: &BattleState, side: AbsoluteSide) -> Vec<EntityRef> {
        Self::living_targets(state, side.opposite(), true)
    }

    /// Living heroes and creatures of `side` itself.
    pub fn all_ally_targets(state: &BattleState, side: AbsoluteSide) -> Vec<EntityRef> {
        Self::living_targets(state, side, true)
    }

    pub fn enemy_heroes_only(state: &BattleState, side: AbsoluteSide) -> Vec<EntityRef> {
        Self::living_targets(state, side.opposite(), false)
    }

    pub fn ally_heroes_only(state: &BattleState, side: AbsoluteSide) -> Vec<EntityRef> {
        Self::living_targets(state, side, false)
    }

    /// The living enemy hero nearest to `caster_position`, facing slot first.
    pub fn nearest_enemy_hero_ignoring_creatures(
        state: &BattleState,
        caster_position: Position,
        caster_side: AbsoluteSide,
    ) -> Option<EntityRef> {
        let enemy = caster_side.opposite();
        caster_position
            .nearest_order()
            .into_iter()
            .filter_map(|position| state.hero(enemy, position))
            .find(|hero| hero.is_alive())
            .map(Hero::entity_ref)
    }

    /// Picks `min(n, candidates.len())` distinct targets.
    ///
    /// With `tiers`, each tier is shuffled and sliced in order until `n`
    /// targets are chosen; candidates matching no listed tier are then taken
    /// verbatim. Without `tiers`, the whole candidate list is one tier.
    pub fn select_random(
        rng: &mut BattleRng,
        candidates: &[EntityRef],
        n: usize,
        tiers: Option<&[TargetTier]>,
    ) -> Vec<EntityRef> {
        let mut pool: Vec<EntityRef> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !pool.contains(candidate) {
                pool.push(*candidate);
            }
        }
        if n == 0 || pool.is_empty() {
            return Vec::new();
        }

        let mut selected = Vec::with_capacity(n.min(pool.len()));
        match tiers {
            None => {
                rng.shuffle(&mut pool);
                selected.extend(pool.into_iter().take(n));
            }
            Some(tiers) => {
                for tier in tiers {
                    if selected.len() >= n {
                        break;
                    }
                    let mut bucket: Vec<EntityRef> = pool
                        .iter()
                        .filter(|target| tier.matches(target) && !selected.contains(*target))
                        .copied()
                        .collect();
                    rng.shuffle(&mut bucket);
                    let wanted = n - selected.len();
                    selected.extend(bucket.into_iter().take(wanted));
                }
                for target in pool {
                    if selected.len() >= n {
                        break;
                    }
                    if !selected.contains(&target) {
                        selected.push(target);
                    }
                }
            }
        }
        selected
    }

    /// Resolves a policy for a caster.
    ///
    /// Random policies roll the state's RNG and therefore return nothing on a
    /// non-authoritative peer.
    pub fn collect(state: &mut BattleState, caster: EntityRef, policy: &TargetPolicy) -> Vec<EntityRef> {
        let side = caster.side();
        match policy {
            TargetPolicy::AllEnemies => Self::all_enemy_targets(state, side),
            TargetPolicy::AllAllies => Self::all_ally_targets(state, side),
            TargetPolicy::EnemyHeroes => Self::enemy_heroes_only(state, side),
            TargetPolicy::AllyHeroes => Self::ally_heroes_only(state, side),
            TargetPolicy::NearestEnemyHero => {
                Self::nearest_enemy_hero_ignoring_creatures(state, caster.position(), side)
                    .into_iter()
                    .collect()
            }
            TargetPolicy::RandomEnemies { count, tiers } => {
                if !state.is_authoritative() {
                    return Vec::new();
                }
                let candidates = Self::all_enemy_targets(state, side);
                let tiers = (!tiers.is_empty()).then_some(tiers.as_slice());
                Self::select_random(state.rng_mut(), &candidates, *count, tiers)
            }
        }
    }

    fn living_targets(state: &BattleState, side: AbsoluteSide, with_creatures: bool) -> Vec<EntityRef> {
        let heroes = state.side(side).heroes();
        let mut targets: Vec<EntityRef> = heroes.living().map(Hero::entity_ref).collect();
        if with_creatures {
            targets.extend(
                heroes
                    .iter()
                    .flat_map(Hero::living_creatures)
                    .map(|creature| creature.entity_ref()),
            );
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::{DamageDescriptor, DamageSource, apply_damage, apply_damage_to_creature};

    /// Host: Alice (center) with two creatures.
    /// Guest: Bob (left, one creature), Carol (right, dead).
    fn state() -> BattleState {
        let mut state = BattleState::new(AbsoluteSide::Host, 99);
        state.place_hero(
            Hero::new("Alice", AbsoluteSide::Host, Position::Center, 300, 20)
                .with_creature("Skeleton", 40, 10)
                .with_creature("Skeleton", 40, 10),
        );
        state.place_hero(
            Hero::new("Bob", AbsoluteSide::Guest, Position::Left, 500, 30)
                .with_creature("Imp", 80, 10)
                .with_creature("Imp", 20, 10),
        );
        state.place_hero(Hero::new("Carol", AbsoluteSide::Guest, Position::Right, 100, 5));

        let carol = EntityRef::hero(AbsoluteSide::Guest, Position::Right);
        let descriptor = DamageDescriptor::compute(&state, carol, 500).unwrap();
        apply_damage(&mut state, &descriptor, &DamageSource::effect("setup")).unwrap();
        let imp = EntityRef::creature(AbsoluteSide::Guest, Position::Left, 1);
        let descriptor = DamageDescriptor::compute(&state, imp, 500).unwrap();
        apply_damage_to_creature(&mut state, &descriptor, &DamageSource::effect("setup")).unwrap();
        state
    }

    #[test]
    fn all_enemy_targets_is_exhaustive_and_living_only() {
        let state = state();
        let targets = TargetCollector::all_enemy_targets(&state, AbsoluteSide::Host);
        assert_eq!(
            targets,
            vec![
                EntityRef::hero(AbsoluteSide::Guest, Position::Left),
                EntityRef::creature(AbsoluteSide::Guest, Position::Left, 0),
            ]
        );
        assert!(targets.iter().all(|t| t.side() == AbsoluteSide::Guest));
    }

    #[test]
    fn ally_targets_include_creatures() {
        let state = state();
        assert_eq!(TargetCollector::all_ally_targets(&state, AbsoluteSide::Host).len(), 3);
        assert_eq!(TargetCollector::ally_heroes_only(&state, AbsoluteSide::Host).len(), 1);
        assert_eq!(TargetCollector::enemy_heroes_only(&state, AbsoluteSide::Host).len(), 1);
    }

    #[test]
    fn nearest_hero_skips_dead_and_creatures() {
        let state = state();
        // Facing slot (right) holds dead Carol, center is empty, so Bob is next.
        assert_eq!(
            TargetCollector::nearest_enemy_hero_ignoring_creatures(
                &state,
                Position::Right,
                AbsoluteSide::Host
            ),
            Some(EntityRef::hero(AbsoluteSide::Guest, Position::Left))
        );
        assert_eq!(
            TargetCollector::nearest_enemy_hero_ignoring_creatures(
                &state,
                Position::Left,
                AbsoluteSide::Guest
            ),
            Some(EntityRef::hero(AbsoluteSide::Host, Position::Center))
        );
    }

    #[test]
    fn select_random_bounds_hold_for_all_n() {
        let candidates: Vec<EntityRef> = (0..5)
            .map(|i| EntityRef::creature(AbsoluteSide::Guest, Position::Left, i))
            .chain([EntityRef::hero(AbsoluteSide::Guest, Position::Left)])
            .collect();
        let mut rng = BattleRng::new(3);
        for n in 0..10 {
            for tiers in [None, Some(&[TargetTier::Creatures][..])] {
                let picked = TargetCollector::select_random(&mut rng, &candidates, n, tiers);
                assert_eq!(picked.len(), n.min(candidates.len()));
                let mut unique = picked.clone();
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), picked.len());
            }
        }
    }

    #[test]
    fn select_random_prefers_higher_tier() {
        let hero = EntityRef::hero(AbsoluteSide::Guest, Position::Center);
        let creatures: Vec<EntityRef> = (0..3)
            .map(|i| EntityRef::creature(AbsoluteSide::Guest, Position::Center, i))
            .collect();
        let mut candidates = vec![hero];
        candidates.extend(&creatures);

        let mut rng = BattleRng::new(17);
        let picked = TargetCollector::select_random(
            &mut rng,
            &candidates,
            3,
            Some(&[TargetTier::Creatures, TargetTier::Heroes]),
        );
        assert!(picked.iter().all(EntityRef::is_creature));

        let picked = TargetCollector::select_random(
            &mut rng,
            &candidates,
            4,
            Some(&[TargetTier::Creatures]),
        );
        // Heroes are not a listed tier, so the hero is appended verbatim last.
        assert_eq!(picked.last(), Some(&hero));
    }

    #[test]
    fn select_random_is_reproducible_from_seed() {
        let candidates: Vec<EntityRef> = (0..8)
            .map(|i| EntityRef::creature(AbsoluteSide::Host, Position::Right, i))
            .collect();
        let a = TargetCollector::select_random(&mut BattleRng::new(5), &candidates, 3, None);
        let b = TargetCollector::select_random(&mut BattleRng::new(5), &candidates, 3, None);
        assert_eq!(a, b);
    }

    #[test]
    fn random_policy_is_empty_on_guest() {
        let mut guest = BattleState::new(AbsoluteSide::Guest, 1);
        guest.place_hero(Hero::new("Alice", AbsoluteSide::Host, Position::Left, 100, 1));
        let caster = EntityRef::hero(AbsoluteSide::Guest, Position::Left);
        let policy = TargetPolicy::RandomEnemies {
            count: 2,
            tiers: Vec::new(),
        };
        assert!(TargetCollector::collect(&mut guest, caster, &policy).is_empty());
        assert_eq!(guest.rng().draws(), 0);
    }
}
