//! Worker tasks that back a battle session.
//!
//! The host worker owns the authoritative state and runs effects; the guest
//! worker replays the host's updates onto its mirror.

mod guest;
mod host;

pub use guest::{GuestCommand, GuestWorker};
pub use host::{HostCommand, HostWorker};
