//! Host worker that owns the authoritative [`BattleContext`].
//!
//! Receives commands from [`HostHandle`](crate::api::HostHandle), runs effect
//! activations one at a time through [`EffectExecutor`], and closes the
//! battle once a side has no living hero left.

use battle_core::{AbsoluteSide, BattleState, DelayedEffectRequest};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api::Result;
use crate::context::BattleContext;
use crate::effects::{EffectExecutor, EffectOutcome, EffectRegistry, GuardianShield, Trigger};
use crate::events::{Event, LifecycleEvent, UpdatePayload};
use crate::sync::log_battle_end;

/// Commands that can be sent to the host worker.
pub enum HostCommand {
    /// Resolve every delayed effect registered before battle, host side
    /// first, then reset the registry.
    StartBattle {
        reply: oneshot::Sender<Result<Vec<EffectOutcome>>>,
    },
    /// Activate one effect for `caster`.
    Trigger {
        effect: String,
        caster: battle_core::EntityRef,
        reply: oneshot::Sender<Result<EffectOutcome>>,
    },
    /// Register a delayed effect for the next battle start.
    RegisterDelayed {
        side: AbsoluteSide,
        request: DelayedEffectRequest,
        reply: oneshot::Sender<Result<u32>>,
    },
    /// Disenchant a Guardian Shield: one more stack at battle start.
    Disenchant {
        side: AbsoluteSide,
        reply: oneshot::Sender<Result<u32>>,
    },
    /// Query the current battle state (read-only).
    QueryState { reply: oneshot::Sender<BattleState> },
    Fingerprint {
        reply: oneshot::Sender<Result<[u8; 32]>>,
    },
    /// Sequence number of the last update sent to the guest.
    LastSent { reply: oneshot::Sender<u64> },
}

/// Background task that processes host commands.
pub struct HostWorker {
    ctx: BattleContext,
    effects: EffectRegistry,
    command_rx: mpsc::Receiver<HostCommand>,
    started: Instant,
    ended: bool,
}

impl HostWorker {
    pub fn new(ctx: BattleContext, effects: EffectRegistry, command_rx: mpsc::Receiver<HostCommand>) -> Self {
        info!(
            target: "runtime::sync",
            peer = %ctx.my_side(),
            effects = effects.len(),
            pending_delayed = ctx.delayed_effects().len(),
            "host worker initialized"
        );
        Self {
            ctx,
            effects,
            command_rx,
            started: Instant::now(),
            ended: false,
        }
    }

    /// Main worker loop. Ends once every handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    self.handle_command(cmd).await;
                }
                else => break,
            }
        }
        info!(target: "runtime::sync", last_sent = self.ctx.last_sent_seq(), outcome = ?self.ctx.outcome(), "host worker stopped");
    }

    async fn handle_command(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::StartBattle { reply } => {
                let result = self.start_battle().await;
                if reply.send(result).is_err() {
                    debug!("StartBattle reply channel closed (caller dropped)");
                }
            }
            HostCommand::Trigger { effect, caster, reply } => {
                let result = self.trigger(&effect, caster).await;
                if reply.send(result).is_err() {
                    debug!("Trigger reply channel closed (caller dropped)");
                }
            }
            HostCommand::RegisterDelayed { side, request, reply } => {
                let now = self.elapsed_ms();
                let result = self
                    .ctx
                    .delayed_effects_mut()
                    .register(side, request, now)
                    .map_err(Into::into);
                if reply.send(result).is_err() {
                    debug!("RegisterDelayed reply channel closed (caller dropped)");
                }
            }
            HostCommand::Disenchant { side, reply } => {
                let now = self.elapsed_ms();
                let result = GuardianShield::register_disenchant(&mut self.ctx, side, now);
                if reply.send(result).is_err() {
                    debug!("Disenchant reply channel closed (caller dropped)");
                }
            }
            HostCommand::QueryState { reply } => {
                if reply.send(self.ctx.state().clone()).is_err() {
                    debug!("QueryState reply channel closed (caller dropped)");
                }
            }
            HostCommand::Fingerprint { reply } => {
                if reply.send(self.ctx.fingerprint()).is_err() {
                    debug!("Fingerprint reply channel closed (caller dropped)");
                }
            }
            HostCommand::LastSent { reply } => {
                if reply.send(self.ctx.last_sent_seq()).is_err() {
                    debug!("LastSent reply channel closed (caller dropped)");
                }
            }
        }
    }

    async fn start_battle(&mut self) -> Result<Vec<EffectOutcome>> {
        self.ctx.bus().publish(Event::Lifecycle(LifecycleEvent::BattleStarted {
            peer: self.ctx.my_side(),
        }));

        let mut outcomes = Vec::new();
        for side in [AbsoluteSide::Host, AbsoluteSide::Guest] {
            for effect in self.ctx.delayed_effects().consume_all_for_battle_start(side) {
                let Some(module) = self.effects.by_delayed_type(&effect.effect_type) else {
                    warn!(
                        target: "runtime::effects",
                        effect_type = %effect.effect_type,
                        source = %effect.source,
                        "no module resolves delayed effect, skipped"
                    );
                    continue;
                };
                let trigger = Trigger::BattleStart { effect };
                outcomes.push(EffectExecutor::execute(module.as_ref(), &mut self.ctx, &trigger).await?);
            }
        }
        self.ctx.delayed_effects_mut().clear();
        self.finish_if_over();
        Ok(outcomes)
    }

    async fn trigger(&mut self, effect: &str, caster: battle_core::EntityRef) -> Result<EffectOutcome> {
        let module = self.effects.get(effect)?;
        if self.ended || self.ctx.outcome().is_finished() {
            debug!(target: "runtime::effects", effect, "battle already over, trigger ignored");
            return Ok(EffectOutcome::battle_over(module.name()));
        }
        let outcome = EffectExecutor::execute(module.as_ref(), &mut self.ctx, &Trigger::cast(caster)).await?;
        self.finish_if_over();
        Ok(outcome)
    }

    /// Sends the closing update once, then wipes battle-scoped statuses and
    /// lingering visuals.
    fn finish_if_over(&mut self) {
        let outcome = self.ctx.outcome();
        if self.ended || !outcome.is_finished() {
            return;
        }
        self.ended = true;
        info!(target: "runtime::sync", ?outcome, "battle over");

        log_battle_end(&mut self.ctx, outcome);
        if let Err(error) = self.ctx.send_battle_update(UpdatePayload::BattleEnded { outcome }) {
            error!(target: "runtime::sync", %error, "failed to send battle end");
        }
        self.ctx.clear_battle();
        self.effects.cleanup_all(&self.ctx);
        self.ctx.bus().publish(Event::Lifecycle(LifecycleEvent::BattleEnded {
            peer: self.ctx.my_side(),
            outcome,
        }));
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
