//! Battle state owned by one peer.
//!
//! [`BattleState`] stores both sides by [`AbsoluteSide`]. The owning peer's
//! `my_side` turns that canonical storage into the relative `player` /
//! `opponent` views that effects reason about.
mod entities;
mod log;
mod side;
mod status;

pub use entities::{Combatant, Creature, Hero, HeroSlots, SideState};
pub use log::{CombatLog, LogEntry, LogSeverity};
pub use side::{AbsoluteSide, EntityRef, Position, RelativeSide};
pub use status::{StatusEffects, StatusKind};

use std::collections::BTreeSet;

use crate::error::{BattleError, ErrorSeverity};
use crate::rng::BattleRng;

/// Failure to resolve an [`EntityRef`] against local state.
///
/// On the host this means a caller bug; on the guest it means the payload
/// references something the local mirror does not have.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("no hero at {side}:{position}")]
    MissingHero {
        side: AbsoluteSide,
        position: Position,
    },

    #[error("creature index {index} out of range for {side}:{position} ({len} creatures)")]
    CreatureIndexOutOfRange {
        side: AbsoluteSide,
        position: Position,
        index: usize,
        len: usize,
    },
}

impl BattleError for TargetError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingHero { .. } => "TARGET_MISSING_HERO",
            Self::CreatureIndexOutOfRange { .. } => "TARGET_CREATURE_INDEX_OUT_OF_RANGE",
        }
    }
}

/// Result of checking whether the battle is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BattleOutcome {
    Ongoing,
    Victory(AbsoluteSide),
    Draw,
}

impl BattleOutcome {
    pub const fn is_finished(self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

/// Complete battle state as held by one peer.
///
/// On the host this is the authoritative simulation. On the guest it is a
/// mirror that only changes through replayed host updates.
#[derive(Clone, Debug)]
pub struct BattleState {
    my_side: AbsoluteSide,
    authoritative: bool,
    host: SideState,
    guest: SideState,
    log: CombatLog,
    rng: BattleRng,
}

impl BattleState {
    /// Creates an empty battle viewed from `my_side`. The host peer is
    /// authoritative; the guest is a replica.
    pub fn new(my_side: AbsoluteSide, seed: u64) -> Self {
        Self {
            my_side,
            authoritative: my_side == AbsoluteSide::Host,
            host: SideState::default(),
            guest: SideState::default(),
            log: CombatLog::default(),
            rng: BattleRng::new(seed),
        }
    }

    /// Places a hero in its slot, returning the previous occupant.
    pub fn place_hero(&mut self, hero: Hero) -> Option<Hero> {
        self.side_mut(hero.side()).heroes_mut().place(hero)
    }

    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    pub fn is_host(&self) -> bool {
        self.my_side == AbsoluteSide::Host
    }

    pub fn my_side(&self) -> AbsoluteSide {
        self.my_side
    }

    /// Relative label of `side` for this peer.
    pub fn relative(&self, side: AbsoluteSide) -> RelativeSide {
        side.relative_to(self.my_side)
    }

    /// Absolute side behind a relative label for this peer.
    pub fn absolute(&self, side: RelativeSide) -> AbsoluteSide {
        side.to_absolute(self.my_side)
    }

    pub fn side(&self, side: AbsoluteSide) -> &SideState {
        match side {
            AbsoluteSide::Host => &self.host,
            AbsoluteSide::Guest => &self.guest,
        }
    }

    pub fn side_mut(&mut self, side: AbsoluteSide) -> &mut SideState {
        match side {
            AbsoluteSide::Host => &mut self.host,
            AbsoluteSide::Guest => &mut self.guest,
        }
    }

    pub fn player_heroes(&self) -> &HeroSlots {
        self.side(self.my_side).heroes()
    }

    pub fn opponent_heroes(&self) -> &HeroSlots {
        self.side(self.my_side.opposite()).heroes()
    }

    pub fn player_graveyard(&self) -> &[String] {
        &self.side(self.my_side).graveyard
    }

    pub fn opponent_graveyard(&self) -> &[String] {
        &self.side(self.my_side.opposite()).graveyard
    }

    pub fn player_permanent_artifacts(&self) -> &[String] {
        &self.side(self.my_side).permanent_artifacts
    }

    pub fn opponent_permanent_artifacts(&self) -> &[String] {
        &self.side(self.my_side.opposite()).permanent_artifacts
    }

    pub fn hero(&self, side: AbsoluteSide, position: Position) -> Option<&Hero> {
        self.side(side).heroes().get(position)
    }

    pub(crate) fn hero_mut(&mut self, side: AbsoluteSide, position: Position) -> Option<&mut Hero> {
        self.side_mut(side).heroes_mut().get_mut(position)
    }

    /// Looks up the hero or creature behind an entity reference.
    pub fn combatant(&self, entity: EntityRef) -> Option<&Combatant> {
        self.resolve(entity).ok()
    }

    /// Like [`Self::combatant`], but reports why resolution failed.
    pub fn resolve(&self, entity: EntityRef) -> Result<&Combatant, TargetError> {
        let side = entity.side();
        let position = entity.position();
        let hero = self
            .hero(side, position)
            .ok_or(TargetError::MissingHero { side, position })?;
        match entity.creature_index() {
            None => Ok(hero.combatant()),
            Some(index) => hero
                .creature(index)
                .map(Creature::combatant)
                .ok_or(TargetError::CreatureIndexOutOfRange {
                    side,
                    position,
                    index,
                    len: hero.creatures().len(),
                }),
        }
    }

    pub(crate) fn resolve_mut(&mut self, entity: EntityRef) -> Result<&mut Combatant, TargetError> {
        let side = entity.side();
        let position = entity.position();
        let hero = self
            .hero_mut(side, position)
            .ok_or(TargetError::MissingHero { side, position })?;
        match entity.creature_index() {
            None => Ok(hero.combatant_mut()),
            Some(index) => {
                let len = hero.creatures().len();
                hero.creature_mut(index)
                    .map(Creature::combatant_mut)
                    .ok_or(TargetError::CreatureIndexOutOfRange {
                        side,
                        position,
                        index,
                        len,
                    })
            }
        }
    }

    /// Every hero and creature of both sides, dead or alive.
    pub(crate) fn combatants_mut(&mut self) -> impl Iterator<Item = &mut Combatant> {
        self.host
            .heroes_mut()
            .iter_mut()
            .chain(self.guest.heroes_mut().iter_mut())
            .flat_map(HeroCombatantsMut::new)
    }

    pub fn rng(&self) -> &BattleRng {
        &self.rng
    }

    /// Host RNG access. Guests never roll; callers gate on authority first.
    pub fn rng_mut(&mut self) -> &mut BattleRng {
        &mut self.rng
    }

    pub fn log(&self) -> &CombatLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut CombatLog {
        &mut self.log
    }

    /// Number of copies of `card` in `side`'s graveyard.
    pub fn graveyard_count(&self, side: AbsoluteSide, card: &str) -> usize {
        self.side(side)
            .graveyard
            .iter()
            .filter(|name| name.as_str() == card)
            .count()
    }

    /// Distinct names among `side`'s living creatures that start with `prefix`.
    pub fn unique_creature_count(&self, side: AbsoluteSide, prefix: &str) -> usize {
        self.side(side)
            .heroes()
            .iter()
            .flat_map(Hero::living_creatures)
            .map(|creature| creature.name())
            .filter(|name| name.starts_with(prefix))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn outcome(&self) -> BattleOutcome {
        match (self.host.has_living_hero(), self.guest.has_living_hero()) {
            (true, true) => BattleOutcome::Ongoing,
            (true, false) => BattleOutcome::Victory(AbsoluteSide::Host),
            (false, true) => BattleOutcome::Victory(AbsoluteSide::Guest),
            (false, false) => BattleOutcome::Draw,
        }
    }

    /// SHA-256 over the replicated part of the state (both sides).
    ///
    /// The combat log, RNG and viewer fields are excluded, so a host and a
    /// guest that converged produce the same fingerprint.
    #[cfg(feature = "serde")]
    pub fn fingerprint(&self) -> Result<[u8; 32], bincode::Error> {
        use sha2::{Digest, Sha256};

        let bytes = bincode::serialize(&(&self.host, &self.guest))?;
        Ok(Sha256::digest(&bytes).into())
    }
}

/// Mutable walk over a hero followed by its creatures.
struct HeroCombatantsMut<'a> {
    hero: Option<&'a mut Combatant>,
    creatures: core::slice::IterMut<'a, Creature>,
}

impl<'a> HeroCombatantsMut<'a> {
    fn new(hero: &'a mut Hero) -> Self {
        let (combatant, creatures) = hero.split_mut();
        Self {
            hero: Some(combatant),
            creatures: creatures.iter_mut(),
        }
    }
}

impl<'a> Iterator for HeroCombatantsMut<'a> {
    type Item = &'a mut Combatant;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(hero) = self.hero.take() {
            return Some(hero);
        }
        self.creatures.next().map(Creature::combatant_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_sided_state(my_side: AbsoluteSide) -> BattleState {
        let mut state = BattleState::new(my_side, 7);
        state.place_hero(
            Hero::new("Alice", AbsoluteSide::Host, Position::Center, 300, 20)
                .with_creature("SoulShard Ib", 30, 5)
                .with_creature("SoulShard Ka", 30, 5)
                .with_creature("SoulShard Ib", 30, 5),
        );
        state.place_hero(Hero::new("Bob", AbsoluteSide::Guest, Position::Left, 250, 15));
        state
    }

    #[test]
    fn relative_views_invert_between_peers() {
        let host = two_sided_state(AbsoluteSide::Host);
        let guest = two_sided_state(AbsoluteSide::Guest);

        assert!(host.is_authoritative());
        assert!(!guest.is_authoritative());
        assert_eq!(
            host.player_heroes().get(Position::Center).map(|h| h.name()),
            Some("Alice")
        );
        assert_eq!(
            guest.opponent_heroes().get(Position::Center).map(|h| h.name()),
            Some("Alice")
        );
        assert!(guest.player_heroes().get(Position::Center).is_none());
    }

    #[test]
    fn resolve_reports_missing_entities() {
        let state = two_sided_state(AbsoluteSide::Host);

        assert_eq!(
            state.resolve(EntityRef::hero(AbsoluteSide::Guest, Position::Right)),
            Err(TargetError::MissingHero {
                side: AbsoluteSide::Guest,
                position: Position::Right,
            })
        );
        let err = state
            .resolve(EntityRef::creature(AbsoluteSide::Host, Position::Center, 3))
            .unwrap_err();
        assert_eq!(err.error_code(), "TARGET_CREATURE_INDEX_OUT_OF_RANGE");
        assert!(err.severity().is_internal());
    }

    #[test]
    fn unique_creature_count_ignores_duplicate_names() {
        let state = two_sided_state(AbsoluteSide::Host);
        assert_eq!(state.unique_creature_count(AbsoluteSide::Host, "SoulShard"), 2);
        assert_eq!(state.unique_creature_count(AbsoluteSide::Guest, "SoulShard"), 0);
    }

    #[test]
    fn graveyard_count_matches_card_name() {
        let mut state = two_sided_state(AbsoluteSide::Host);
        state.side_mut(AbsoluteSide::Host).graveyard.extend([
            "Fireball".to_owned(),
            "Fireball".to_owned(),
            "Heal".to_owned(),
        ]);
        assert_eq!(state.graveyard_count(AbsoluteSide::Host, "Fireball"), 2);
        assert_eq!(state.graveyard_count(AbsoluteSide::Guest, "Fireball"), 0);
    }

    #[test]
    fn outcome_reflects_living_heroes() {
        let mut state = two_sided_state(AbsoluteSide::Host);
        assert_eq!(state.outcome(), BattleOutcome::Ongoing);

        if let Ok(bob) = state.resolve_mut(EntityRef::hero(AbsoluteSide::Guest, Position::Left)) {
            bob.write_hp(0);
        }
        assert_eq!(state.outcome(), BattleOutcome::Victory(AbsoluteSide::Host));
    }

    #[test]
    fn combatants_mut_visits_heroes_and_creatures() {
        let mut state = two_sided_state(AbsoluteSide::Host);
        assert_eq!(state.combatants_mut().count(), 5);
    }
}
