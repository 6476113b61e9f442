//! Host-to-guest battle update channel.
//!
//! The host sends fire-and-forget: [`UpdateSender::send`] never waits on the
//! guest. Frames travel as JSON text so the loopback transport exercises the
//! same encoding a network transport would. Delivery is reliable and
//! in-order; retransmission belongs to the transport, not to this layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

use super::types::{NetworkUpdate, UpdatePayload};
use crate::api::{Result, RuntimeError};

/// Sending half held by the host.
#[derive(Clone, Debug)]
pub struct UpdateSender {
    tx: mpsc::UnboundedSender<String>,
    next_seq: Arc<AtomicU64>,
    started: Instant,
}

impl UpdateSender {
    /// Stamps, encodes and sends one update. Returns the stamped update.
    pub fn send(&self, payload: UpdatePayload) -> Result<NetworkUpdate> {
        let update = NetworkUpdate {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            timestamp: self.started.elapsed().as_millis() as u64,
            payload,
        };
        let frame = serde_json::to_string(&update).map_err(RuntimeError::MalformedUpdate)?;
        trace!(target: "runtime::sync", seq = update.seq, kind = update.payload.kind().as_str(), "sending update");
        self.tx
            .send(frame)
            .map_err(|_| RuntimeError::UpdateChannelClosed)?;
        Ok(update)
    }

    /// Sequence number of the last update sent, 0 before the first.
    pub fn last_seq(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed).saturating_sub(1)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half held by the guest.
#[derive(Debug)]
pub struct UpdateReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl UpdateReceiver {
    /// Next decoded update, `None` once the host side is gone.
    ///
    /// A frame that fails to decode yields `Some(Err(..))`; the receiver
    /// stays usable.
    pub async fn recv(&mut self) -> Option<Result<NetworkUpdate>> {
        let frame = self.rx.recv().await?;
        Some(serde_json::from_str(&frame).map_err(RuntimeError::MalformedUpdate))
    }
}

/// In-process transport connecting one host to one guest.
pub struct LoopbackTransport;

impl LoopbackTransport {
    pub fn pair() -> (UpdateSender, UpdateReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            UpdateSender {
                tx,
                next_seq: Arc::new(AtomicU64::new(1)),
                started: Instant::now(),
            },
            UpdateReceiver { rx },
        )
    }

    /// Pair whose receiving end also accepts raw frames, for feeding
    /// hand-written or corrupted messages to a guest.
    pub fn raw_pair() -> (mpsc::UnboundedSender<String>, UpdateReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, UpdateReceiver { rx })
    }
}
