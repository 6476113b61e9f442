//! Host-authoritative battle runtime with guest replication.
//!
//! The host rolls every random decision, mutates its [`BattleState`]
//! through [`BattleContext`], and sends one update per effect activation.
//! The guest never rolls: it overwrites its mirror with the host's values
//! and replays the same combat log lines and animations. Consumers embed
//! [`BattleSession`] and drive it through [`HostHandle`] / [`GuestHandle`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the session orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`context`] is the battle facade effects talk to
//! - [`effects`] holds the effect modules and the host-side executor
//! - [`events`] carries the update channel and the local event bus
//! - [`sync`] reconciles the guest mirror with host updates
//! - [`presentation`] abstracts animations and view refreshes
//! - `workers` keeps background tasks internal to the crate
//!
//! [`BattleState`]: battle_core::BattleState
pub mod api;
pub mod context;
pub mod effects;
pub mod events;
pub mod presentation;
pub mod runtime;
pub mod sync;

mod workers;

pub use api::{GuestHandle, HostHandle, Result, RuntimeError};
pub use context::{BattleContext, DamageOutcome};
pub use effects::{
    EffectCategory, EffectExecutor, EffectModule, EffectOutcome, EffectRegistry, Readiness, Resolution, Trigger,
};
pub use events::{
    Event, EventBus, LifecycleEvent, LoopbackTransport, NetworkUpdate, SyncEvent, Topic, UpdateKind, UpdatePayload,
    UpdateReceiver, UpdateSender,
};
pub use presentation::{Presentation, RecordingPresentation, SharedPresentation};
pub use runtime::{BattleSession, BattleSessionBuilder, RuntimeConfig};
pub use sync::{GuestReplayer, ReplayHandler, ReplayRegistry, ReplayStatus, reconcile};
