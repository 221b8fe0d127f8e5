//! Default endpoint switch gate.
//!
//! Points both the console and communications roles at one capture device,
//! and provides the time-boxed [`SwitchLock`] that keeps the engine from
//! reacting to the echo of its own switch.

use crate::audio::{AudioError, DeviceDirectory, DeviceRole, EndpointPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// How long notifications are ignored after a switch completes.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// Switch failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    #[error("No target device id given")]
    EmptyTarget,

    #[error("A switch is already in progress")]
    Busy,

    /// Monitoring was stopped or restarted while the switch was pending.
    #[error("Switch superseded by a monitoring restart")]
    Superseded,

    #[error("Failed to switch console role to {device_id}: {source}")]
    ConsoleRole {
        device_id: String,
        #[source]
        source: AudioError,
    },

    /// The console role already points at the new device; it is left there.
    #[error("Partial switch to {device_id}: communications role failed: {source}")]
    CommunicationsRole {
        device_id: String,
        #[source]
        source: AudioError,
    },
}

/// Reentrancy lock with a monotonic expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SwitchLock {
    #[default]
    Released,

    /// An OS switch call is in flight.
    Switching,

    /// The switch finished; held until the OS change echo has passed.
    Settling { until: Instant },
}

impl SwitchLock {
    pub fn is_held(&self, now: Instant) -> bool {
        match self {
            SwitchLock::Released => false,
            SwitchLock::Switching => true,
            SwitchLock::Settling { until } => now < *until,
        }
    }

    /// Hold the lock until [`SwitchLock::settle`] is called.
    pub fn engage(&mut self) {
        *self = SwitchLock::Switching;
    }

    /// Release the lock `delay` after `now`.
    pub fn settle(&mut self, now: Instant, delay: Duration) {
        *self = SwitchLock::Settling { until: now + delay };
    }
}

/// Sets the OS default capture device for every switched role.
pub struct SwitchGate {
    directory: Arc<dyn DeviceDirectory>,
    policy: Arc<dyn EndpointPolicy>,
    settle_delay: Duration,
}

impl SwitchGate {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        policy: Arc<dyn EndpointPolicy>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            directory,
            policy,
            settle_delay,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Point the console and communications roles at `target_id`.
    ///
    /// Returns the device's display name. An empty id is rejected without
    /// touching the OS. A communications-role failure after the console role
    /// succeeded is reported but not rolled back.
    pub fn switch_to(&self, target_id: &str) -> Result<String, SwitchError> {
        if target_id.trim().is_empty() {
            error!("switch requested without a target device id");
            return Err(SwitchError::EmptyTarget);
        }

        // The id is still usable for the OS call when the name lookup fails.
        let name = match self.directory.resolve(target_id) {
            Ok(device) => device.name,
            Err(e) => {
                warn!(device_id = %target_id, error = %e, "could not resolve switch target name");
                UNKNOWN_DEVICE_NAME.to_string()
            }
        };
        info!(device_id = %target_id, name = %name, "switching default capture device");

        for role in DeviceRole::SWITCHED {
            self.policy.set_default(target_id, role).map_err(|source| {
                let device_id = target_id.to_string();
                if role == DeviceRole::Console {
                    error!(device_id = %target_id, error = %source, "console role switch failed");
                    SwitchError::ConsoleRole { device_id, source }
                } else {
                    error!(
                        device_id = %target_id,
                        error = %source,
                        "communications role switch failed, console role left switched"
                    );
                    SwitchError::CommunicationsRole { device_id, source }
                }
            })?;
        }

        info!(name = %name, "default capture device switched");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fakes::{FakeDirectory, FakePolicy};

    fn gate(directory: Arc<FakeDirectory>, policy: Arc<FakePolicy>) -> SwitchGate {
        SwitchGate::new(directory, policy, DEFAULT_SETTLE_DELAY)
    }

    #[test]
    fn test_switch_sets_both_roles() {
        let directory = FakeDirectory::with(&[("s", "Stand Mic", false)]);
        let policy = Arc::new(FakePolicy::default());
        let name = gate(directory, policy.clone()).switch_to("s").unwrap();

        assert_eq!(name, "Stand Mic");
        assert_eq!(
            *policy.calls.lock(),
            vec![
                ("s".to_string(), DeviceRole::Console),
                ("s".to_string(), DeviceRole::Communications)
            ]
        );
    }

    #[test]
    fn test_empty_target_never_reaches_policy() {
        let policy = Arc::new(FakePolicy::default());
        let result = gate(FakeDirectory::with(&[]), policy.clone()).switch_to("");

        assert_eq!(result, Err(SwitchError::EmptyTarget));
        assert!(policy.calls.lock().is_empty());
    }

    #[test]
    fn test_unresolvable_name_still_switches() {
        let policy = Arc::new(FakePolicy::default());
        let name = gate(FakeDirectory::with(&[]), policy.clone())
            .switch_to("ghost")
            .unwrap();

        assert_eq!(name, UNKNOWN_DEVICE_NAME);
        assert_eq!(policy.calls.lock().len(), 2);
    }

    #[test]
    fn test_console_failure_skips_communications() {
        let policy = Arc::new(FakePolicy::default());
        policy.fail_role(DeviceRole::Console);
        let result = gate(FakeDirectory::with(&[("s", "Stand", false)]), policy.clone())
            .switch_to("s");

        assert!(matches!(result, Err(SwitchError::ConsoleRole { .. })));
        assert!(policy.calls.lock().is_empty());
    }

    #[test]
    fn test_partial_switch_is_reported_not_undone() {
        let directory = FakeDirectory::with(&[("s", "Stand", false)]);
        let policy = Arc::new(FakePolicy::default());
        policy.fail_role(DeviceRole::Communications);

        let result = gate(directory, policy.clone()).switch_to("s");

        match result {
            Err(SwitchError::CommunicationsRole { device_id, .. }) => assert_eq!(device_id, "s"),
            other => panic!("expected partial switch error, got {other:?}"),
        }
        // Only the console call happened, and nothing tried to revert it.
        assert_eq!(
            *policy.calls.lock(),
            vec![("s".to_string(), DeviceRole::Console)]
        );
    }

    #[test]
    fn test_lock_lifecycle() {
        let start = Instant::now();
        let mut lock = SwitchLock::default();
        assert!(!lock.is_held(start));

        lock.engage();
        assert!(lock.is_held(start + Duration::from_secs(3600)));

        lock.settle(start, Duration::from_millis(100));
        assert!(lock.is_held(start + Duration::from_millis(99)));
        assert!(!lock.is_held(start + Duration::from_millis(100)));
    }

    #[test]
    fn test_zero_settle_delay_releases_immediately() {
        let now = Instant::now();
        let mut lock = SwitchLock::Switching;
        lock.settle(now, Duration::ZERO);
        assert!(!lock.is_held(now));
    }
}
