//! Device-switching engine.
//!
//! Notifications flow one way: subscriptions, then the switcher's decision,
//! then the gate, then the OS.

pub mod decision;
pub mod facade;
#[cfg(test)]
pub(crate) mod fakes;
pub mod gate;
pub mod subscriptions;
pub mod switcher;

pub use decision::{decide, initial_headset, Decision};
pub use facade::{Backends, EngineOptions, MicSwitcher};
pub use gate::{SwitchError, SwitchGate, SwitchLock, DEFAULT_SETTLE_DELAY};
pub use subscriptions::SubscriptionManager;
pub use switcher::{EngineConfig, SwitchEngine, SwitchOutcome, SwitchedHandler};
