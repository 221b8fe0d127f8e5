//! Switch decision engine.
//!
//! Owns the "active headset" fact and the switch lock, and decides on every
//! mute/volume notification (and at start) which capture device should be
//! the OS default.

use super::decision::{decide, initial_headset, Decision};
use super::gate::{SwitchError, SwitchGate, SwitchLock};
use crate::audio::{DeviceDirectory, EndpointPolicy, MuteEventSink, VolumeNotification};
use crate::platform::Settings;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// The part of the settings the engine runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub stand_mic_id: Option<String>,

    /// Priority order: earlier headsets win ties.
    pub headset_mic_ids: Vec<String>,
}

impl From<&Settings> for EngineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            stand_mic_id: settings.stand_mic().map(str::to_string),
            headset_mic_ids: settings.headset_mic_ids.clone(),
        }
    }
}

/// Result of one engine decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// No switch needed, no target configured, or the engine is stopped.
    NoAction,

    /// Discarded because a recent switch still holds the lock.
    Suppressed,

    Switched { device_id: String, name: String },

    Failed(SwitchError),
}

/// Handler for the outbound "device switched" event.
pub type SwitchedHandler = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct EngineState {
    /// `None` while stopped.
    config: Option<Arc<EngineConfig>>,
    active_headset: Option<String>,
    switch_lock: SwitchLock,
    /// Bumped on every start/stop so a switch that straddles a restart
    /// does not write into the new run's state.
    epoch: u64,
}

struct PendingSwitch {
    target: String,
    previous_active: Option<String>,
    epoch: u64,
}

pub struct SwitchEngine {
    directory: Arc<dyn DeviceDirectory>,
    gate: SwitchGate,
    state: Mutex<EngineState>,
    /// Held across the OS call so switches reach the OS one at a time.
    in_flight: Mutex<()>,
    handlers: RwLock<Vec<SwitchedHandler>>,
}

impl SwitchEngine {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        policy: Arc<dyn EndpointPolicy>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            gate: SwitchGate::new(directory.clone(), policy, settle_delay),
            directory,
            state: Mutex::new(EngineState::default()),
            in_flight: Mutex::new(()),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler fired once per successful switch with the new
    /// device's display name.
    pub fn on_device_switched<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.handlers.write().push(Box::new(handler));
    }

    pub fn active_headset(&self) -> Option<String> {
        self.state.lock().active_headset.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().config.is_some()
    }

    pub fn is_switch_locked(&self) -> bool {
        self.state.lock().switch_lock.is_held(Instant::now())
    }

    /// Install `config`, forget the previous run, and select the starting
    /// device: the first unmuted headset in configured order, else the stand
    /// mic, else nothing.
    pub fn compute_initial_state(&self, config: EngineConfig) -> SwitchOutcome {
        let pending = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.active_headset = None;
            state.switch_lock = SwitchLock::Released;
            state.config = Some(Arc::new(config.clone()));

            let live = self.live_mute_states(&config.headset_mic_ids);
            let initial = initial_headset(live.iter().map(|(id, muted)| (id.as_str(), *muted)));

            match (initial, config.stand_mic_id) {
                (Some(headset), _) => {
                    info!(headset = %headset, "initial: headset is active");
                    let headset = headset.to_string();
                    Self::begin_switch(&mut state, Some(headset.clone()), Some(headset))
                }
                (None, Some(stand)) => {
                    info!("initial: all headsets muted, using stand microphone");
                    Self::begin_switch(&mut state, None, Some(stand))
                }
                (None, None) => {
                    info!("initial: no active headset and no stand microphone configured");
                    None
                }
            }
        };
        self.finish_switch(pending)
    }

    /// Forget the configuration and the active headset.
    ///
    /// Notifications still in flight afterwards are ignored.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.config = None;
        state.active_headset = None;
        state.switch_lock = SwitchLock::Released;
    }

    /// React to a mute/volume notification from `source_id`.
    ///
    /// The payload only triggers the decision; every configured headset's
    /// live mute state is re-read from the directory.
    pub fn on_mute_changed(&self, source_id: &str, is_muted: bool) -> SwitchOutcome {
        let pending = {
            let mut state = self.state.lock();
            if state.switch_lock.is_held(Instant::now()) {
                debug!(device_id = %source_id, is_muted, "notification ignored, switch lock held");
                return SwitchOutcome::Suppressed;
            }
            let Some(config) = state.config.clone() else {
                debug!(device_id = %source_id, "notification ignored, not monitoring");
                return SwitchOutcome::NoAction;
            };

            let live = self.live_mute_states(&config.headset_mic_ids);
            let decision = decide(
                live.iter().map(|(id, muted)| (id.as_str(), *muted)),
                state.active_headset.as_deref(),
            );

            match decision {
                Decision::NoChange => return SwitchOutcome::NoAction,
                Decision::Deactivate { headset } => {
                    info!(headset = %headset, "headset muted, switching to stand microphone");
                    Self::begin_switch(&mut state, None, config.stand_mic_id.clone())
                }
                Decision::Activate { headset } => {
                    info!(headset = %headset, "headset unmuted, switching to it");
                    Self::begin_switch(&mut state, Some(headset.clone()), Some(headset))
                }
            }
        };
        self.finish_switch(pending)
    }

    /// Switch to `target_id` through the lock, outside of any decision.
    ///
    /// The active headset is left alone. An empty id is rejected before the
    /// lock is touched, and a held lock yields [`SwitchOutcome::Suppressed`].
    pub fn request_switch(&self, target_id: &str) -> SwitchOutcome {
        if target_id.trim().is_empty() {
            warn!("manual switch requested without a target device id");
            return SwitchOutcome::Failed(SwitchError::EmptyTarget);
        }
        let pending = {
            let mut state = self.state.lock();
            if state.switch_lock.is_held(Instant::now()) {
                debug!(device_id = %target_id, "manual switch refused, switch lock held");
                return SwitchOutcome::Suppressed;
            }
            let active = state.active_headset.clone();
            Self::begin_switch(&mut state, active, Some(target_id.to_string()))
        };
        self.finish_switch(pending)
    }

    /// Apply a decision's new active headset and, when there is a target,
    /// take the switch lock.
    fn begin_switch(
        state: &mut EngineState,
        next_active: Option<String>,
        target: Option<String>,
    ) -> Option<PendingSwitch> {
        let previous_active = std::mem::replace(&mut state.active_headset, next_active);
        let Some(target) = target.filter(|id| !id.trim().is_empty()) else {
            debug!("no switch target configured, nothing to do");
            return None;
        };

        state.switch_lock.engage();
        Some(PendingSwitch {
            target,
            previous_active,
            epoch: state.epoch,
        })
    }

    /// Run the OS switch without holding the state lock, then settle the
    /// lock and roll the active headset back on failure.
    ///
    /// A switch decided before the last start/stop is dropped before it
    /// reaches the OS, or, if it already ran, reported as
    /// [`SwitchError::Superseded`] without firing handlers.
    fn finish_switch(&self, pending: Option<PendingSwitch>) -> SwitchOutcome {
        let Some(pending) = pending else {
            return SwitchOutcome::NoAction;
        };

        let result = {
            let _in_flight = self.in_flight.lock();
            if self.state.lock().epoch != pending.epoch {
                info!(device_id = %pending.target, "stale switch discarded before reaching the OS");
                return SwitchOutcome::Failed(SwitchError::Superseded);
            }

            let result = self.gate.switch_to(&pending.target);

            let mut state = self.state.lock();
            if state.epoch != pending.epoch {
                info!(device_id = %pending.target, "monitoring restarted during switch, result discarded");
                return SwitchOutcome::Failed(SwitchError::Superseded);
            }
            if result.is_err() {
                state.active_headset = pending.previous_active;
            }
            state
                .switch_lock
                .settle(Instant::now(), self.gate.settle_delay());
            result
        };

        match result {
            Ok(name) => {
                for handler in self.handlers.read().iter() {
                    handler(&name);
                }
                SwitchOutcome::Switched {
                    device_id: pending.target,
                    name,
                }
            }
            Err(e) => {
                error!(device_id = %pending.target, error = %e, "switch failed, waiting for next notification");
                SwitchOutcome::Failed(e)
            }
        }
    }

    /// `(id, is_muted)` for every configured headset that resolves, in order.
    fn live_mute_states(&self, headset_ids: &[String]) -> Vec<(String, bool)> {
        headset_ids
            .iter()
            .filter_map(|id| match self.directory.resolve(id) {
                Ok(device) => Some((id.clone(), device.is_muted)),
                Err(e) if e.is_not_found() => {
                    debug!(device_id = %id, "headset not present, skipped");
                    None
                }
                Err(e) => {
                    warn!(device_id = %id, error = %e, "headset state unavailable, skipped");
                    None
                }
            })
            .collect()
    }
}

impl MuteEventSink for SwitchEngine {
    fn on_volume_notification(&self, notification: VolumeNotification) {
        debug!(
            device_id = %notification.device_id,
            is_muted = notification.is_muted,
            volume = notification.volume_level,
            "mute/volume notification"
        );
        self.on_mute_changed(&notification.device_id, notification.is_muted);
    }
}
