//! Cloneable façades for issuing commands to the battle workers.
//!
//! [`HostHandle`] and [`GuestHandle`] hide channel plumbing and offer async
//! helpers for driving the battle or streaming events from specific topics.
use battle_core::{AbsoluteSide, BattleState, DelayedEffectRequest, EntityRef};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::errors::{Result, RuntimeError};
use crate::effects::EffectOutcome;
use crate::events::{Event, EventBus, Topic};
use crate::workers::{GuestCommand, HostCommand};

/// Client-facing handle to the authoritative peer.
#[derive(Clone)]
pub struct HostHandle {
    command_tx: mpsc::Sender<HostCommand>,
    event_bus: EventBus,
}

impl HostHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<HostCommand>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> HostCommand) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Resolves the delayed effects registered before battle.
    pub async fn start_battle(&self) -> Result<Vec<EffectOutcome>> {
        self.request(|reply| HostCommand::StartBattle { reply }).await?
    }

    /// Activates `effect` for `caster` and waits for its animation to finish.
    pub async fn trigger(&self, effect: impl Into<String>, caster: EntityRef) -> Result<EffectOutcome> {
        let effect = effect.into();
        self.request(|reply| HostCommand::Trigger { effect, caster, reply })
            .await?
    }

    /// Registers a delayed effect for `side`. Returns the accumulated stacks.
    pub async fn register_delayed(&self, side: AbsoluteSide, request: DelayedEffectRequest) -> Result<u32> {
        self.request(|reply| HostCommand::RegisterDelayed { side, request, reply })
            .await?
    }

    /// Disenchants a Guardian Shield owned by `side`.
    pub async fn disenchant_guardian_shield(&self, side: AbsoluteSide) -> Result<u32> {
        self.request(|reply| HostCommand::Disenchant { side, reply }).await?
    }

    pub async fn query_state(&self) -> Result<BattleState> {
        self.request(|reply| HostCommand::QueryState { reply }).await
    }

    pub async fn fingerprint(&self) -> Result<[u8; 32]> {
        self.request(|reply| HostCommand::Fingerprint { reply }).await?
    }

    /// Sequence number of the last update sent to the guest.
    pub async fn last_sent(&self) -> Result<u64> {
        self.request(|reply| HostCommand::LastSent { reply }).await
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use runtime::Topic;
    ///
    /// let mut log_rx = host.subscribe(Topic::CombatLog);
    /// while let Ok(event) = log_rx.recv().await {
    ///     // Render the line
    /// }
    /// ```
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

/// Client-facing handle to the mirroring peer.
#[derive(Clone)]
pub struct GuestHandle {
    command_tx: mpsc::Sender<GuestCommand>,
    event_bus: EventBus,
}

impl GuestHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<GuestCommand>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> GuestCommand) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    pub async fn query_state(&self) -> Result<BattleState> {
        self.request(|reply| GuestCommand::QueryState { reply }).await
    }

    pub async fn fingerprint(&self) -> Result<[u8; 32]> {
        self.request(|reply| GuestCommand::Fingerprint { reply }).await?
    }

    /// Waits until update `seq` has been replayed, or the host is gone.
    /// Returns the last replayed sequence number.
    pub async fn wait_for(&self, seq: u64) -> Result<u64> {
        self.request(|reply| GuestCommand::WaitFor { seq, reply }).await
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
