//! High-level battle session orchestrator.
//!
//! The session owns both peer workers, wires the update channel between
//! them, and exposes a builder-based API for clients to drive a battle.

use std::str::FromStr;
use std::sync::Arc;

use battle_content::{EffectTables, Scenario};
use battle_core::{AbsoluteSide, BattleConfig, BattleState, DelayedEffectRegistry, ResistanceManager};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{GuestHandle, HostHandle, Result, RuntimeError};
use crate::context::BattleContext;
use crate::effects::EffectRegistry;
use crate::events::{EventBus, LoopbackTransport};
use crate::presentation::{NullPresentation, SharedPresentation};
use crate::sync::{GuestReplayer, ReplayRegistry};
use crate::workers::{GuestCommand, GuestWorker, HostCommand, HostWorker};

/// Runtime configuration shared across the session and workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub battle: BattleConfig,
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            battle: BattleConfig::default(),
            command_buffer_size: 32,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `BATTLE_SEED`, `BATTLE_SPEED`,
    /// `GUEST_HEAD_START_MS`, `UPDATE_BUFFER_SIZE` and
    /// `COMMAND_BUFFER_SIZE`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Values that fail to parse are logged
    /// and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(seed) = parse(&lookup, "BATTLE_SEED") {
            self.battle.rng_seed = seed;
        }
        if let Some(speed) = parse(&lookup, "BATTLE_SPEED") {
            self.battle.battle_speed_percent = speed;
        }
        if let Some(ms) = parse(&lookup, "GUEST_HEAD_START_MS") {
            self.battle.guest_head_start_ms = ms;
        }
        if let Some(size) = parse::<usize>(&lookup, "UPDATE_BUFFER_SIZE") {
            self.battle.update_buffer_size = size.max(1);
        }
        if let Some(size) = parse::<usize>(&lookup, "COMMAND_BUFFER_SIZE") {
            self.command_buffer_size = size.max(1);
        }
        self
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid configuration value");
            None
        }
    }
}

/// A host and a guest connected in-process.
///
/// Design: the session owns the workers; [`HostHandle`] and [`GuestHandle`]
/// are cloneable façades for clients.
pub struct BattleSession {
    host: HostHandle,
    guest: GuestHandle,
    host_worker: JoinHandle<()>,
    guest_worker: JoinHandle<()>,
}

impl BattleSession {
    pub fn builder() -> BattleSessionBuilder {
        BattleSessionBuilder::new()
    }

    pub fn host(&self) -> HostHandle {
        self.host.clone()
    }

    pub fn guest(&self) -> GuestHandle {
        self.guest.clone()
    }

    /// Waits until the guest has replayed everything the host sent so far.
    /// Returns the last replayed sequence number.
    pub async fn settle(&self) -> Result<u64> {
        let sent = self.host.last_sent().await?;
        self.guest.wait_for(sent).await
    }

    /// Shuts both workers down.
    ///
    /// The host goes first; dropping its context closes the update channel,
    /// so the guest drains what is left before it stops. Handle clones
    /// obtained from [`Self::host`] must be dropped beforehand, or the host
    /// worker keeps waiting for commands.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.host);
        self.host_worker.await.map_err(RuntimeError::WorkerJoin)?;

        drop(self.guest);
        self.guest_worker.await.map_err(RuntimeError::WorkerJoin)?;

        Ok(())
    }
}

/// Builder for [`BattleSession`] with flexible configuration.
pub struct BattleSessionBuilder {
    config: RuntimeConfig,
    tables: Arc<EffectTables>,
    effects: EffectRegistry,
    scenario: Option<Scenario>,
    host_state: Option<BattleState>,
    guest_state: Option<BattleState>,
    delayed: DelayedEffectRegistry,
    resistance: ResistanceManager,
    host_presentation: SharedPresentation,
    guest_presentation: SharedPresentation,
}

impl BattleSessionBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            tables: Arc::new(EffectTables::default()),
            effects: EffectRegistry::standard(),
            scenario: None,
            host_state: None,
            guest_state: None,
            delayed: DelayedEffectRegistry::new(),
            resistance: ResistanceManager::default(),
            host_presentation: Arc::new(NullPresentation),
            guest_presentation: Arc::new(NullPresentation),
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tables(mut self, tables: impl Into<Arc<EffectTables>>) -> Self {
        self.tables = tables.into();
        self
    }

    /// Replace the standard effect registry.
    pub fn effects(mut self, effects: EffectRegistry) -> Self {
        self.effects = effects;
        self
    }

    /// Build both peers' states and the delayed registry from a scenario.
    /// Explicit states passed to [`Self::states`] take precedence.
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Provide the host state and the guest mirror directly.
    pub fn states(mut self, host: BattleState, guest: BattleState) -> Self {
        self.host_state = Some(host);
        self.guest_state = Some(guest);
        self
    }

    pub fn delayed_effects(mut self, delayed: DelayedEffectRegistry) -> Self {
        self.delayed = delayed;
        self
    }

    /// Resistance oracle for the host's rolls.
    pub fn resistance(mut self, resistance: ResistanceManager) -> Self {
        self.resistance = resistance;
        self
    }

    pub fn host_presentation(mut self, presentation: SharedPresentation) -> Self {
        self.host_presentation = presentation;
        self
    }

    pub fn guest_presentation(mut self, presentation: SharedPresentation) -> Self {
        self.guest_presentation = presentation;
        self
    }

    /// Build the session and spawn both workers.
    pub async fn build(self) -> Result<BattleSession> {
        let battle = self.config.battle.clone();
        let mut delayed = self.delayed;
        let (host_state, guest_state) = match (self.host_state, self.guest_state, &self.scenario) {
            (Some(host), Some(guest), _) => (host, guest),
            (host, guest, Some(scenario)) => {
                let seed = scenario.seed.unwrap_or(battle.rng_seed);
                if delayed.is_empty() {
                    delayed = scenario.delayed_registry(0)?;
                }
                (
                    host.unwrap_or_else(|| scenario.build_state(AbsoluteSide::Host, seed)),
                    guest.unwrap_or_else(|| scenario.build_state(AbsoluteSide::Guest, seed)),
                )
            }
            (None, _, None) => {
                return Err(RuntimeError::MissingBattleState {
                    peer: AbsoluteSide::Host,
                });
            }
            (Some(_), None, None) => {
                return Err(RuntimeError::MissingBattleState {
                    peer: AbsoluteSide::Guest,
                });
            }
        };

        let (update_tx, update_rx) = LoopbackTransport::pair();
        let host_bus = EventBus::with_capacity(battle.update_buffer_size);
        let guest_bus = EventBus::with_capacity(battle.update_buffer_size);

        let host_ctx = BattleContext::new(host_state, battle.clone(), Arc::clone(&self.tables))
            .with_resistance(self.resistance)
            .with_presentation(self.host_presentation)
            .with_event_bus(host_bus.clone())
            .with_update_sender(update_tx)
            .with_delayed_effects(delayed);
        let guest_ctx = BattleContext::new(guest_state, battle, self.tables)
            .with_presentation(self.guest_presentation)
            .with_event_bus(guest_bus.clone());

        let (host_tx, host_rx) = mpsc::channel::<HostCommand>(self.config.command_buffer_size);
        let (guest_tx, guest_rx) = mpsc::channel::<GuestCommand>(self.config.command_buffer_size);

        let host_worker = HostWorker::new(host_ctx, self.effects.clone(), host_rx);
        let replayer = GuestReplayer::new(ReplayRegistry::new(self.effects));
        let guest_worker = GuestWorker::new(guest_ctx, replayer, update_rx, guest_rx);

        let host_worker = tokio::spawn(async move {
            host_worker.run().await;
        });
        let guest_worker = tokio::spawn(async move {
            guest_worker.run().await;
        });

        info!(
            seed = self.config.battle.rng_seed,
            speed = self.config.battle.battle_speed_percent,
            "battle session started"
        );

        Ok(BattleSession {
            host: HostHandle::new(host_tx, host_bus),
            guest: GuestHandle::new(guest_tx, guest_bus),
            host_worker,
            guest_worker,
        })
    }
}
