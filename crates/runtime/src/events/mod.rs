//! Battle update channel and the local event bus.
//!
//! [`channel`] carries host-authoritative updates to the guest; [`bus`]
//! fans out what each peer did to local observers.

mod bus;
mod channel;
mod types;

pub use bus::{Event, EventBus, LifecycleEvent, SyncEvent, Topic};
pub use channel::{LoopbackTransport, UpdateReceiver, UpdateSender};
pub use types::{
    BoostRecord, HitRecord, NetworkUpdate, ShieldRecord, StatusRecord, UpdateKind, UpdatePayload,
};
