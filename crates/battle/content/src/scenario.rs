//! Battle setup: which heroes and creatures stand where, and what the
//! selection phase left behind (graveyards, artifacts, delayed effects).
//!
//! Both peers build their [`BattleState`] from the same scenario, so the
//! guest's mirror starts identical to the host's.

use std::collections::BTreeMap;

use battle_core::{
    AbsoluteSide, BattleState, DelayedEffectError, DelayedEffectRegistry, DelayedEffectRequest,
    EntityRef, Hero, Position, StatusEffectsManager,
};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreatureSpec {
    pub name: String,
    pub hp: u32,
    pub attack: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeroSpec {
    pub position: Position,
    pub name: String,
    pub hp: u32,
    pub attack: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub creatures: Vec<CreatureSpec>,
    /// Statuses carried into battle, e.g. `healing_reserve` from an artifact.
    #[cfg_attr(feature = "serde", serde(default))]
    pub statuses: BTreeMap<String, u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SideSpec {
    pub side: AbsoluteSide,
    pub heroes: Vec<HeroSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub graveyard: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub permanent_artifacts: Vec<String>,
}

/// A delayed effect registered during the selection phase, `registrations`
/// times in a row.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelayedSpec {
    pub side: AbsoluteSide,
    pub effect_type: String,
    pub source: String,
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub registrations: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: BTreeMap<String, i64>,
}

#[cfg(feature = "serde")]
fn one() -> u32 {
    1
}

/// One scripted effect activation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriggerSpec {
    pub effect: String,
    pub side: AbsoluteSide,
    pub position: Position,
    /// Creature index when the caster is a creature.
    #[cfg_attr(feature = "serde", serde(default))]
    pub creature: Option<usize>,
}

impl TriggerSpec {
    pub fn caster(&self) -> EntityRef {
        match self.creature {
            Some(index) => EntityRef::creature(self.side, self.position, index),
            None => EntityRef::hero(self.side, self.position),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scenario {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub seed: Option<u64>,
    pub sides: Vec<SideSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub delayed_effects: Vec<DelayedSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub triggers: Vec<TriggerSpec>,
}

impl Scenario {
    /// Builds the battle state as seen from `my_side`.
    ///
    /// Starting statuses are written with the overwrite primitive, so the
    /// host and the guest end up with identical mirrors.
    pub fn build_state(&self, my_side: AbsoluteSide, seed: u64) -> BattleState {
        let mut state = BattleState::new(my_side, seed);
        for side in &self.sides {
            for spec in &side.heroes {
                let mut hero = Hero::new(&spec.name, side.side, spec.position, spec.hp, spec.attack);
                for creature in &spec.creatures {
                    hero.push_creature(&creature.name, creature.hp, creature.attack);
                }
                let entity = hero.entity_ref();
                state.place_hero(hero);
                for (name, stacks) in &spec.statuses {
                    // The hero was placed on the line above, so the slot resolves.
                    let _ = StatusEffectsManager::set_status_effect_stacks(&mut state, entity, name, *stacks);
                }
            }
            let side_state = state.side_mut(side.side);
            side_state.graveyard.extend(side.graveyard.iter().cloned());
            side_state
                .permanent_artifacts
                .extend(side.permanent_artifacts.iter().cloned());
        }
        state
    }

    /// Replays the selection-phase registrations into a fresh registry.
    pub fn delayed_registry(&self, now: u64) -> Result<DelayedEffectRegistry, DelayedEffectError> {
        let mut registry = DelayedEffectRegistry::new();
        for spec in &self.delayed_effects {
            for _ in 0..spec.registrations {
                let mut request = DelayedEffectRequest::new(&spec.effect_type, &spec.source);
                request.params = spec.params.clone();
                registry.register(spec.side, request, now)?;
            }
        }
        Ok(registry)
    }

    /// Positions used more than once on the same side.
    pub fn duplicate_slots(&self) -> Vec<(AbsoluteSide, Position)> {
        let mut seen = Vec::new();
        let mut duplicates = Vec::new();
        for side in &self.sides {
            for hero in &side.heroes {
                let key = (side.side, hero.position);
                if seen.contains(&key) {
                    duplicates.push(key);
                } else {
                    seen.push(key);
                }
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Scenario {
        Scenario {
            name: "skirmish".into(),
            seed: Some(4),
            sides: vec![
                SideSpec {
                    side: AbsoluteSide::Host,
                    heroes: vec![HeroSpec {
                        position: Position::Center,
                        name: "Alice".into(),
                        hp: 400,
                        attack: 30,
                        creatures: vec![CreatureSpec {
                            name: "Skeleton".into(),
                            hp: 40,
                            attack: 10,
                        }],
                        statuses: BTreeMap::from([("healing_reserve".to_owned(), 2)]),
                    }],
                    graveyard: vec!["Fireball".into()],
                    permanent_artifacts: Vec::new(),
                },
                SideSpec {
                    side: AbsoluteSide::Guest,
                    heroes: vec![HeroSpec {
                        position: Position::Left,
                        name: "Bob".into(),
                        hp: 350,
                        attack: 25,
                        creatures: Vec::new(),
                        statuses: BTreeMap::new(),
                    }],
                    graveyard: Vec::new(),
                    permanent_artifacts: vec!["Guardian Shield".into()],
                },
            ],
            delayed_effects: vec![DelayedSpec {
                side: AbsoluteSide::Guest,
                effect_type: "shield_all_allies".into(),
                source: "Guardian Shield".into(),
                registrations: 2,
                params: BTreeMap::new(),
            }],
            triggers: Vec::new(),
        }
    }

    #[test]
    fn build_state_places_heroes_and_statuses() {
        let state = scenario().build_state(AbsoluteSide::Guest, 1);
        let alice = EntityRef::hero(AbsoluteSide::Host, Position::Center);

        assert_eq!(state.opponent_heroes().get(Position::Center).map(|h| h.name()), Some("Alice"));
        assert_eq!(
            StatusEffectsManager::get_status_effect_stacks(&state, alice, "healing_reserve"),
            2
        );
        assert_eq!(state.graveyard_count(AbsoluteSide::Host, "Fireball"), 1);
        assert_eq!(state.player_permanent_artifacts(), ["Guardian Shield".to_owned()]);
    }

    #[test]
    fn delayed_registry_accumulates_registrations() {
        let registry = scenario().delayed_registry(0).unwrap();
        let pending = registry.consume_all_for_battle_start(AbsoluteSide::Guest);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].stacks, 2);
    }

    #[test]
    fn duplicate_slots_detected() {
        let mut scenario = scenario();
        let copy = scenario.sides[0].heroes[0].clone();
        scenario.sides[0].heroes.push(copy);
        assert_eq!(
            scenario.duplicate_slots(),
            vec![(AbsoluteSide::Host, Position::Center)]
        );
    }

    #[test]
    fn trigger_caster_resolves_creatures() {
        let trigger = TriggerSpec {
            effect: "skeleton_rally".into(),
            side: AbsoluteSide::Host,
            position: Position::Center,
            creature: Some(0),
        };
        assert_eq!(
            trigger.caster(),
            EntityRef::creature(AbsoluteSide::Host, Position::Center, 0)
        );
    }
}
