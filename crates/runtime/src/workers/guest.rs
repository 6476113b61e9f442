//! Guest worker that keeps the mirrored [`BattleContext`] in step with the
//! host.
//!
//! Updates are replayed strictly in arrival order; a replay finishes before
//! the next update is taken off the channel.

use battle_core::BattleState;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::api::Result;
use crate::context::BattleContext;
use crate::events::{Event, LifecycleEvent, NetworkUpdate, UpdatePayload, UpdateReceiver};
use crate::sync::{GuestReplayer, ReplayStatus};

/// Commands that can be sent to the guest worker.
pub enum GuestCommand {
    /// Query the mirrored battle state (read-only).
    QueryState { reply: oneshot::Sender<BattleState> },
    Fingerprint {
        reply: oneshot::Sender<Result<[u8; 32]>>,
    },
    /// Resolves once update `seq` has been handled, or once the host is
    /// gone. Replies with the last handled sequence number.
    WaitFor {
        seq: u64,
        reply: oneshot::Sender<u64>,
    },
}

/// Background task that replays host updates.
pub struct GuestWorker {
    ctx: BattleContext,
    replayer: GuestReplayer,
    updates: UpdateReceiver,
    command_rx: mpsc::Receiver<GuestCommand>,
    waiters: Vec<(u64, oneshot::Sender<u64>)>,
    host_connected: bool,
}

impl GuestWorker {
    pub fn new(
        ctx: BattleContext,
        replayer: GuestReplayer,
        updates: UpdateReceiver,
        command_rx: mpsc::Receiver<GuestCommand>,
    ) -> Self {
        info!(target: "runtime::replay", peer = %ctx.my_side(), "guest worker initialized");
        Self {
            ctx,
            replayer,
            updates,
            command_rx,
            waiters: Vec::new(),
            host_connected: true,
        }
    }

    /// Main worker loop. Ends once the host is gone and every handle is
    /// dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                frame = self.updates.recv(), if self.host_connected => match frame {
                    Some(Ok(update)) => self.handle_update(update).await,
                    Some(Err(error)) => self.replayer.reject(&self.ctx, 0, &error),
                    None => {
                        debug!(target: "runtime::replay", "host disconnected");
                        self.host_connected = false;
                        self.release_waiters();
                    }
                },
                Some(cmd) = self.command_rx.recv() => {
                    self.handle_command(cmd);
                }
                else => break,
            }
        }
        self.replayer.log_summary(&self.ctx);
    }

    async fn handle_update(&mut self, update: NetworkUpdate) {
        let ended = match update.payload {
            UpdatePayload::BattleEnded { outcome } => Some(outcome),
            _ => None,
        };
        let status = self.replayer.receive(&mut self.ctx, update).await;
        if status == ReplayStatus::Applied
            && let Some(outcome) = ended
        {
            self.ctx.bus().publish(Event::Lifecycle(LifecycleEvent::BattleEnded {
                peer: self.ctx.my_side(),
                outcome,
            }));
        }
        self.release_waiters();
    }

    fn handle_command(&mut self, cmd: GuestCommand) {
        match cmd {
            GuestCommand::QueryState { reply } => {
                if reply.send(self.ctx.state().clone()).is_err() {
                    debug!("QueryState reply channel closed (caller dropped)");
                }
            }
            GuestCommand::Fingerprint { reply } => {
                if reply.send(self.ctx.fingerprint()).is_err() {
                    debug!("Fingerprint reply channel closed (caller dropped)");
                }
            }
            GuestCommand::WaitFor { seq, reply } => {
                self.waiters.push((seq, reply));
                self.release_waiters();
            }
        }
    }

    fn release_waiters(&mut self) {
        let last = self.replayer.last_seq();
        let host_connected = self.host_connected;
        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|(seq, _)| *seq <= last || !host_connected);
        self.waiters = pending;
        for (_, reply) in ready {
            if reply.send(last).is_err() {
                debug!("WaitFor reply channel closed (caller dropped)");
            }
        }
    }
}
