//! Engine facade used by the tray shell and the FFI layer.

use super::gate::{SwitchError, DEFAULT_SETTLE_DELAY};
use super::subscriptions::SubscriptionManager;
use super::switcher::{EngineConfig, SwitchEngine, SwitchOutcome};
use crate::audio::{DeviceDirectory, EndpointPolicy, VolumeNotifier};
use crate::platform::{AutostartRegistrar, Settings, SettingsError, SettingsStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Notifications are dropped for this long after a switch completes.
    pub settle_delay: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// The OS-facing collaborators the facade is built from.
pub struct Backends {
    pub directory: Arc<dyn DeviceDirectory>,
    pub policy: Arc<dyn EndpointPolicy>,
    pub notifier: Arc<dyn VolumeNotifier>,
    pub store: Arc<dyn SettingsStore>,
    pub autostart: Arc<dyn AutostartRegistrar>,
}

#[cfg(windows)]
impl Backends {
    /// WASAPI devices, JSON settings under local app data, `Run` key
    /// autostart.
    pub fn windows() -> Result<Self, SettingsError> {
        use crate::audio::{DeviceEnumerator, PolicyConfig, WasapiNotifier};
        use crate::platform::{JsonSettingsStore, RegistryAutostart};

        Ok(Self {
            directory: Arc::new(DeviceEnumerator::new()),
            policy: Arc::new(PolicyConfig),
            notifier: Arc::new(WasapiNotifier::new()),
            store: Arc::new(JsonSettingsStore::new()?),
            autostart: Arc::new(RegistryAutostart::new()),
        })
    }
}

/// Keeps the default capture device on the unmuted headset, or the stand
/// microphone when every headset is muted.
pub struct MicSwitcher {
    directory: Arc<dyn DeviceDirectory>,
    engine: Arc<SwitchEngine>,
    subscriptions: SubscriptionManager,
    store: Arc<dyn SettingsStore>,
    autostart: Arc<dyn AutostartRegistrar>,
    settings: RwLock<Settings>,
}

impl MicSwitcher {
    pub fn new(backends: Backends, options: EngineOptions) -> Self {
        let engine = Arc::new(SwitchEngine::new(
            backends.directory.clone(),
            backends.policy,
            options.settle_delay,
        ));
        let subscriptions = SubscriptionManager::new(backends.notifier, engine.clone());

        Self {
            directory: backends.directory,
            engine,
            subscriptions,
            store: backends.store,
            autostart: backends.autostart,
            settings: RwLock::new(Settings::default()),
        }
    }

    /// Read the settings store into memory and return what was loaded.
    pub fn load_settings(&self) -> Settings {
        let loaded = self.store.load().unwrap_or_else(|e| {
            error!(error = %e, "failed to load settings, using defaults");
            Settings::default()
        });
        info!(
            stand_mic = ?loaded.stand_mic(),
            headsets = loaded.headset_mic_ids.len(),
            autostart = loaded.autostart,
            "settings loaded"
        );
        *self.settings.write() = loaded.clone();
        loaded
    }

    pub fn get_current_settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Persist `settings` and apply the autostart flag.
    ///
    /// Monitoring is not restarted; callers sequence stop, save, start.
    pub fn save_settings(&self, settings: Settings) -> Result<(), SettingsError> {
        *self.settings.write() = settings.clone();

        if let Err(e) = self.store.save(&settings) {
            error!(error = %e, "failed to save settings");
            return Err(e);
        }

        if let Err(e) = self.autostart.set_enabled(settings.autostart) {
            warn!(error = %e, enabled = settings.autostart, "failed to update autostart");
        }
        Ok(())
    }

    /// Active capture devices, id to display name.
    pub fn list_all_microphones(&self) -> HashMap<String, String> {
        self.directory
            .list_active_capture_devices()
            .unwrap_or_else(|e| {
                error!(error = %e, "failed to enumerate capture devices");
                HashMap::new()
            })
    }

    /// Subscribe to every configured headset and select the starting device.
    ///
    /// Restarts from scratch when already monitoring.
    pub fn start_monitoring(&self) {
        if self.is_monitoring() {
            self.stop_monitoring();
        }

        let settings = self.get_current_settings();
        info!(headsets = ?settings.headset_mic_ids, "starting monitoring");

        self.subscriptions.subscribe(&settings.headset_mic_ids);
        self.engine
            .compute_initial_state(EngineConfig::from(&settings));
    }

    /// Detach every listener and forget the active headset.
    pub fn stop_monitoring(&self) {
        self.subscriptions.unsubscribe_all();
        self.engine.stop();
        info!("monitoring stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        self.engine.is_running()
    }

    /// Switch to `device_id` now, through the same lock as automatic switches.
    ///
    /// Fails with [`SwitchError::Busy`] while a recent switch holds the lock.
    pub fn switch_to_device(&self, device_id: &str) -> Result<String, SwitchError> {
        match self.engine.request_switch(device_id) {
            SwitchOutcome::Switched { name, .. } => Ok(name),
            SwitchOutcome::Failed(e) => Err(e),
            SwitchOutcome::Suppressed => Err(SwitchError::Busy),
            // Only reachable without a target, which request_switch rejects first.
            SwitchOutcome::NoAction => Err(SwitchError::EmptyTarget),
        }
    }

    /// Register a handler for "device switched", called with the new
    /// device's display name.
    pub fn on_device_switched<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.engine.on_device_switched(handler);
    }

    pub fn active_headset(&self) -> Option<String> {
        self.engine.active_headset()
    }

    pub fn subscribed_count(&self) -> usize {
        self.subscriptions.live_count()
    }
}
