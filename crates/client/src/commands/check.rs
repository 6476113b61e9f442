//! Check command
//!
//! Loads every data file a run would load and reports problems without
//! starting a session.

use std::path::PathBuf;

use anyhow::{Context, Result};
use battle_content::ContentFactory;
use battle_core::AbsoluteSide;
use clap::Parser;
use runtime::EffectRegistry;

/// Load config, tables and a scenario and report problems
#[derive(Parser, Debug)]
pub struct Check {
    /// Scenario name under `<data-dir>/scenarios/`
    #[arg(default_value = "skirmish")]
    pub scenario: String,

    /// Directory holding config.toml, tables.toml and scenarios/
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
}

impl Check {
    pub fn execute(self) -> Result<()> {
        let factory = ContentFactory::new(&self.data_dir);
        let config = factory.load_config()?;
        factory.load_tables()?;
        let scenario = factory
            .load_scenario(&self.scenario)
            .with_context(|| format!("Failed to load scenario '{}'", self.scenario))?;

        let effects = EffectRegistry::standard();
        let mut problems = Vec::new();

        for (side, position) in scenario.duplicate_slots() {
            problems.push(format!("two heroes at {side}:{position}"));
        }
        for trigger in &scenario.triggers {
            if effects.get(&trigger.effect).is_err() {
                problems.push(format!("unknown effect '{}'", trigger.effect));
            }
        }
        for delayed in &scenario.delayed_effects {
            if effects.by_delayed_type(&delayed.effect_type).is_none() {
                problems.push(format!(
                    "no module resolves delayed effect '{}' from {}",
                    delayed.effect_type, delayed.source
                ));
            }
        }
        if let Err(error) = scenario.delayed_registry(0) {
            problems.push(error.to_string());
        }

        let heroes = |side: AbsoluteSide| {
            scenario
                .sides
                .iter()
                .filter(|spec| spec.side == side)
                .map(|spec| spec.heroes.len())
                .sum::<usize>()
        };
        println!("Scenario:  {}", scenario.name);
        println!(
            "Heroes:    host {} / guest {}",
            heroes(AbsoluteSide::Host),
            heroes(AbsoluteSide::Guest)
        );
        println!("Delayed:   {}", scenario.delayed_effects.len());
        println!("Triggers:  {}", scenario.triggers.len());
        println!("Seed:      {}", scenario.seed.unwrap_or(config.rng_seed));

        if problems.is_empty() {
            println!("No problems found.");
            return Ok(());
        }
        for problem in &problems {
            println!("  ✗ {problem}");
        }
        anyhow::bail!("{} problem(s) in scenario '{}'", problems.len(), scenario.name)
    }
}
