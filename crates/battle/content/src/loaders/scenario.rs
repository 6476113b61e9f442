//! Scenario loader (RON).

use std::path::Path;

use crate::loaders::{LoadResult, read_file};
use crate::scenario::Scenario;

pub struct ScenarioLoader;

impl ScenarioLoader {
    /// Load and validate a scenario from a RON file.
    pub fn load(path: &Path) -> LoadResult<Scenario> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<Scenario> {
        let scenario: Scenario = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse scenario RON: {}", e))?;

        if let Some((side, position)) = scenario.duplicate_slots().first() {
            anyhow::bail!(
                "Scenario '{}' places two heroes at {}:{}",
                scenario.name,
                side,
                position
            );
        }
        if scenario.delayed_effects.iter().any(|spec| spec.effect_type.is_empty()) {
            anyhow::bail!("Scenario '{}' has a delayed effect without a type", scenario.name);
        }

        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_core::{AbsoluteSide, Position};

    const SKIRMISH: &str = r#"
(
    name: "skirmish",
    seed: Some(9),
    sides: [
        (
            side: host,
            heroes: [
                (
                    position: center,
                    name: "Alice",
                    hp: 400,
                    attack: 30,
                    creatures: [(name: "Skeleton", hp: 40, attack: 10)],
                ),
            ],
            graveyard: ["Fireball", "Fireball"],
        ),
        (
            side: guest,
            heroes: [(position: left, name: "Bob", hp: 350, attack: 25)],
        ),
    ],
    delayed_effects: [
        (side: guest, effect_type: "shield_all_allies", source: "Guardian Shield", registrations: 2),
    ],
    triggers: [
        (effect: "skeleton_rally", side: host, position: center, creature: Some(0)),
    ],
)
"#;

    #[test]
    fn parses_ron_scenario() {
        let scenario = ScenarioLoader::parse(SKIRMISH).unwrap();
        assert_eq!(scenario.name, "skirmish");
        assert_eq!(scenario.seed, Some(9));
        assert_eq!(scenario.sides.len(), 2);
        assert_eq!(scenario.sides[0].heroes[0].creatures.len(), 1);
        assert_eq!(scenario.delayed_effects[0].registrations, 2);
        assert_eq!(scenario.triggers[0].side, AbsoluteSide::Host);

        let state = scenario.build_state(AbsoluteSide::Host, 9);
        assert_eq!(state.graveyard_count(AbsoluteSide::Host, "Fireball"), 2);
        assert!(state.hero(AbsoluteSide::Guest, Position::Left).is_some());
    }

    #[test]
    fn rejects_duplicate_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.ron");
        std::fs::write(
            &path,
            r#"(
                name: "dup",
                sides: [(
                    side: host,
                    heroes: [
                        (position: left, name: "A", hp: 10, attack: 1),
                        (position: left, name: "B", hp: 10, attack: 1),
                    ],
                )],
            )"#,
        )
        .unwrap();

        let err = ScenarioLoader::load(&path).unwrap_err();
        assert!(err.to_string().contains("two heroes at host:left"));
    }
}
