use core::ops::Deref;

use super::side::{AbsoluteSide, EntityRef, Position};
use super::status::StatusEffects;

/// Shared vitals and combat numbers of a hero or creature.
///
/// # Invariants
///
/// - `0 <= current_hp <= max_hp`
/// - `alive == (current_hp > 0)`
///
/// Fields are private: HP, shield and bonuses change only through the
/// mutators in [`crate::combat`], and statuses only through
/// [`crate::StatusEffectsManager`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Combatant {
    name: String,
    current_hp: u32,
    max_hp: u32,
    alive: bool,
    shield: u32,
    base_attack: i32,
    battle_attack_bonus: i32,
    battle_hp_bonus: i32,
    statuses: StatusEffects,
}

impl Combatant {
    pub fn new(name: impl Into<String>, max_hp: u32, base_attack: i32) -> Self {
        Self {
            name: name.into(),
            current_hp: max_hp,
            max_hp,
            alive: max_hp > 0,
            shield: 0,
            base_attack,
            battle_attack_bonus: 0,
            battle_hp_bonus: 0,
            statuses: StatusEffects::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_hp(&self) -> u32 {
        self.current_hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn shield(&self) -> u32 {
        self.shield
    }

    pub fn base_attack(&self) -> i32 {
        self.base_attack
    }

    pub fn battle_attack_bonus(&self) -> i32 {
        self.battle_attack_bonus
    }

    pub fn battle_hp_bonus(&self) -> i32 {
        self.battle_hp_bonus
    }

    /// Effective attack including this battle's bonus, floored at 0.
    pub fn attack(&self) -> i32 {
        (self.base_attack + self.battle_attack_bonus).max(0)
    }

    pub fn statuses(&self) -> &StatusEffects {
        &self.statuses
    }

    pub(crate) fn statuses_mut(&mut self) -> &mut StatusEffects {
        &mut self.statuses
    }

    /// Sets HP clamped to `[0, max_hp]` and re-derives `alive`.
    pub(crate) fn write_hp(&mut self, hp: u32) {
        self.current_hp = hp.min(self.max_hp);
        self.alive = self.current_hp > 0;
    }

    pub(crate) fn write_shield(&mut self, shield: u32) {
        self.shield = shield;
    }

    pub(crate) fn write_attack_bonus(&mut self, bonus: i32) {
        self.battle_attack_bonus = bonus;
    }

    /// Raises both max and current HP by `amount` (negative lowers max HP).
    pub(crate) fn grow_hp(&mut self, amount: i32) {
        self.battle_hp_bonus += amount;
        let max_hp = i64::from(self.max_hp) + i64::from(amount);
        self.max_hp = max_hp.clamp(0, i64::from(u32::MAX)) as u32;
        let hp = if amount > 0 && self.alive {
            self.current_hp.saturating_add(amount.unsigned_abs())
        } else {
            self.current_hp
        };
        self.write_hp(hp);
    }
}

/// A creature fighting for a hero.
///
/// `owner` and `index` are the creature's network identity; the name is
/// display-only and may repeat within a hero's list.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Creature {
    combatant: Combatant,
    side: AbsoluteSide,
    position: Position,
    index: usize,
}

impl Creature {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::creature(self.side, self.position, self.index)
    }

    /// The owning hero's identity (back-reference only).
    pub fn owner(&self) -> EntityRef {
        EntityRef::hero(self.side, self.position)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn combatant(&self) -> &Combatant {
        &self.combatant
    }

    pub(crate) fn combatant_mut(&mut self) -> &mut Combatant {
        &mut self.combatant
    }
}

impl Deref for Creature {
    type Target = Combatant;

    fn deref(&self) -> &Combatant {
        &self.combatant
    }
}

/// A hero occupying one formation slot, with its creatures in summon order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hero {
    combatant: Combatant,
    side: AbsoluteSide,
    position: Position,
    creatures: Vec<Creature>,
}

impl Hero {
    pub fn new(
        name: impl Into<String>,
        side: AbsoluteSide,
        position: Position,
        max_hp: u32,
        base_attack: i32,
    ) -> Self {
        Self {
            combatant: Combatant::new(name, max_hp, base_attack),
            side,
            position,
            creatures: Vec::new(),
        }
    }

    /// Builder-style creature summon.
    pub fn with_creature(mut self, name: impl Into<String>, max_hp: u32, base_attack: i32) -> Self {
        self.push_creature(name, max_hp, base_attack);
        self
    }

    /// Appends a creature and returns its index in this hero's list.
    pub fn push_creature(&mut self, name: impl Into<String>, max_hp: u32, base_attack: i32) -> usize {
        let index = self.creatures.len();
        self.creatures.push(Creature {
            combatant: Combatant::new(name, max_hp, base_attack),
            side: self.side,
            position: self.position,
            index,
        });
        index
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::hero(self.side, self.position)
    }

    pub fn side(&self) -> AbsoluteSide {
        self.side
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn combatant(&self) -> &Combatant {
        &self.combatant
    }

    pub(crate) fn combatant_mut(&mut self) -> &mut Combatant {
        &mut self.combatant
    }

    pub fn creatures(&self) -> &[Creature] {
        &self.creatures
    }

    pub fn creature(&self, index: usize) -> Option<&Creature> {
        self.creatures.get(index)
    }

    pub(crate) fn creature_mut(&mut self, index: usize) -> Option<&mut Creature> {
        self.creatures.get_mut(index)
    }

    /// Disjoint mutable access to the hero's own vitals and its creatures.
    pub(crate) fn split_mut(&mut self) -> (&mut Combatant, &mut [Creature]) {
        (&mut self.combatant, &mut self.creatures)
    }

    pub fn living_creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.iter().filter(|creature| creature.is_alive())
    }
}

impl Deref for Hero {
    type Target = Combatant;

    fn deref(&self) -> &Combatant {
        &self.combatant
    }
}

/// The three formation slots of one side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeroSlots {
    left: Option<Hero>,
    center: Option<Hero>,
    right: Option<Hero>,
}

impl HeroSlots {
    pub fn get(&self, position: Position) -> Option<&Hero> {
        match position {
            Position::Left => self.left.as_ref(),
            Position::Center => self.center.as_ref(),
            Position::Right => self.right.as_ref(),
        }
    }

    pub(crate) fn get_mut(&mut self, position: Position) -> Option<&mut Hero> {
        match position {
            Position::Left => self.left.as_mut(),
            Position::Center => self.center.as_mut(),
            Position::Right => self.right.as_mut(),
        }
    }

    pub(crate) fn place(&mut self, hero: Hero) -> Option<Hero> {
        let slot = match hero.position() {
            Position::Left => &mut self.left,
            Position::Center => &mut self.center,
            Position::Right => &mut self.right,
        };
        slot.replace(hero)
    }

    /// Occupied slots in left, center, right order.
    pub fn iter(&self) -> impl Iterator<Item = &Hero> {
        [&self.left, &self.center, &self.right]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Hero> {
        [&mut self.left, &mut self.center, &mut self.right]
            .into_iter()
            .filter_map(Option::as_mut)
    }

    pub fn living(&self) -> impl Iterator<Item = &Hero> {
        self.iter().filter(|hero| hero.is_alive())
    }
}

/// Everything one side brings into a battle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SideState {
    heroes: HeroSlots,
    /// Card names in the order they were discarded.
    pub graveyard: Vec<String>,
    pub permanent_artifacts: Vec<String>,
}

impl SideState {
    pub fn heroes(&self) -> &HeroSlots {
        &self.heroes
    }

    pub(crate) fn heroes_mut(&mut self) -> &mut HeroSlots {
        &mut self.heroes
    }

    /// True while at least one hero of this side is alive.
    pub fn has_living_hero(&self) -> bool {
        self.heroes.living().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creature_indices_follow_summon_order() {
        let hero = Hero::new("Alice", AbsoluteSide::Host, Position::Left, 300, 20)
            .with_creature("Skeleton", 40, 10)
            .with_creature("Skeleton", 40, 10);

        assert_eq!(hero.creatures().len(), 2);
        assert_eq!(
            hero.creatures()[1].entity_ref(),
            EntityRef::creature(AbsoluteSide::Host, Position::Left, 1)
        );
        assert_eq!(hero.creatures()[1].owner(), hero.entity_ref());
    }

    #[test]
    fn write_hp_keeps_alive_consistent() {
        let mut combatant = Combatant::new("Cannon", 80, 0);
        combatant.write_hp(0);
        assert!(!combatant.is_alive());
        combatant.write_hp(500);
        assert_eq!(combatant.current_hp(), 80);
        assert!(combatant.is_alive());
    }

    #[test]
    fn grow_hp_raises_max_and_current() {
        let mut combatant = Combatant::new("Bob", 100, 5);
        combatant.write_hp(60);
        combatant.grow_hp(20);
        assert_eq!(combatant.max_hp(), 120);
        assert_eq!(combatant.current_hp(), 80);
        assert_eq!(combatant.battle_hp_bonus(), 20);

        combatant.grow_hp(-50);
        assert_eq!(combatant.max_hp(), 70);
        assert_eq!(combatant.current_hp(), 70);
    }

    #[test]
    fn slots_iterate_left_to_right() {
        let mut slots = HeroSlots::default();
        slots.place(Hero::new("R", AbsoluteSide::Guest, Position::Right, 10, 1));
        slots.place(Hero::new("L", AbsoluteSide::Guest, Position::Left, 10, 1));
        let names: Vec<&str> = slots.iter().map(|hero| hero.name()).collect();
        assert_eq!(names, ["L", "R"]);
    }
}
