//! Run command
//!
//! Plays a scenario through a loopback session: delayed effects resolve at
//! battle start, then every scripted trigger fires in order. The host's
//! combat log streams to stdout; the two fingerprints are compared at the
//! end.

use std::path::PathBuf;

use anyhow::{Context, Result};
use battle_content::ContentFactory;
use battle_core::ResistanceManager;
use clap::Parser;
use runtime::{BattleSession, Event, Resolution, RuntimeConfig, Topic};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Play a scenario and compare host and guest state
#[derive(Parser, Debug)]
pub struct Run {
    /// Scenario name under `<data-dir>/scenarios/`
    #[arg(default_value = "skirmish")]
    pub scenario: String,

    /// Directory holding config.toml, tables.toml and scenarios/
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Override the RNG seed (scenario and config seeds are ignored)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Battle speed in percent; 200 animates twice as fast
    #[arg(long)]
    pub speed: Option<u32>,

    /// Roll resistance with the chances from tables.toml
    #[arg(long)]
    pub resistance: bool,

    /// Also print the guest's combat log
    #[arg(long)]
    pub show_guest: bool,
}

impl Run {
    pub async fn execute(self) -> Result<()> {
        let factory = ContentFactory::new(&self.data_dir);

        let mut config = RuntimeConfig {
            battle: factory.load_config()?,
            ..RuntimeConfig::default()
        }
        .with_overrides(|key| std::env::var(key).ok());
        if let Some(seed) = self.seed {
            config.battle.rng_seed = seed;
        }
        if let Some(speed) = self.speed {
            config.battle.battle_speed_percent = speed;
        }

        let tables = factory.load_tables()?;
        let mut scenario = factory
            .load_scenario(&self.scenario)
            .with_context(|| format!("Failed to load scenario '{}'", self.scenario))?;
        if self.seed.is_some() {
            scenario.seed = None;
        }
        let duplicates = scenario.duplicate_slots();
        anyhow::ensure!(
            duplicates.is_empty(),
            "Scenario '{}' places two heroes in the same slot: {duplicates:?}",
            scenario.name
        );

        let resistance = if self.resistance {
            ResistanceManager::new(tables.resistance.oracle())
        } else {
            ResistanceManager::default()
        };
        let triggers = scenario.triggers.clone();

        info!(
            scenario = %scenario.name,
            triggers = triggers.len(),
            resistance = self.resistance,
            "starting battle"
        );

        let session = BattleSession::builder()
            .config(config)
            .tables(tables)
            .scenario(scenario)
            .resistance(resistance)
            .build()
            .await?;
        let host = session.host();
        let printer = tokio::spawn(print_combat_log(host.subscribe(Topic::CombatLog)));

        for outcome in host.start_battle().await? {
            debug!(effect = outcome.effect, resolution = ?outcome.resolution, "delayed effect resolved");
        }

        for trigger in &triggers {
            match host.trigger(&trigger.effect, trigger.caster()).await {
                Ok(outcome) if outcome.resolution == Resolution::BattleOver => {
                    info!(effect = %trigger.effect, "battle already over, remaining triggers skipped");
                    break;
                }
                Ok(outcome) => debug!(
                    effect = outcome.effect,
                    resolution = ?outcome.resolution,
                    targets = outcome.targets_affected,
                    "trigger resolved"
                ),
                Err(error) => warn!(effect = %trigger.effect, %error, "trigger failed"),
            }
        }

        let replayed = session.settle().await?;
        let host_print = host.fingerprint().await?;
        let guest_print = session.guest().fingerprint().await?;
        let outcome = host.query_state().await?.outcome();
        let guest_state = session.guest().query_state().await?;

        drop(host);
        session.shutdown().await?;
        printer.await.context("Combat log printer panicked")?;

        if self.show_guest {
            println!();
            println!("Guest combat log:");
            for entry in guest_state.log().entries() {
                println!("  [{}] {}", entry.severity.as_str(), entry.message);
            }
        }

        println!();
        println!("Outcome:           {outcome:?}");
        println!("Updates replayed:  {replayed}");
        println!("Host fingerprint:  {}", hex::encode(host_print));
        println!("Guest fingerprint: {}", hex::encode(guest_print));

        anyhow::ensure!(host_print == guest_print, "Guest state diverged from host");
        println!("Host and guest converged.");
        Ok(())
    }
}

/// Prints host combat log lines until the session shuts down.
async fn print_combat_log(mut rx: broadcast::Receiver<Event>) {
    loop {
        match rx.recv().await {
            Ok(Event::CombatLog { entry, .. }) => {
                println!("[{}] {}", entry.severity.as_str(), entry.message);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "combat log printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
