//! In-process fakes for the OS-facing traits.

use crate::audio::{
    AudioError, DeviceDirectory, DeviceRole, EndpointPolicy, ListenerRegistration,
    MicrophoneDevice, MuteEventSink, VolumeNotification, VolumeNotifier,
};
use crate::platform::{AutostartRegistrar, PreferencesError, Settings, SettingsError, SettingsStore};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory directory.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    pub devices: Mutex<HashMap<String, MicrophoneDevice>>,
}

impl FakeDirectory {
    pub fn with(devices: &[(&str, &str, bool)]) -> Arc<Self> {
        let dir = Self::default();
        for (id, name, muted) in devices {
            dir.insert(id, name, *muted);
        }
        Arc::new(dir)
    }

    pub fn insert(&self, id: &str, name: &str, muted: bool) {
        self.devices
            .lock()
            .insert(id.to_string(), MicrophoneDevice::new(id, name).muted(muted));
    }

    pub fn set_muted(&self, id: &str, muted: bool) {
        if let Some(device) = self.devices.lock().get_mut(id) {
            device.is_muted = muted;
        }
    }

    pub fn unplug(&self, id: &str) {
        self.devices.lock().remove(id);
    }
}

impl DeviceDirectory for FakeDirectory {
    fn list_active_capture_devices(&self) -> Result<HashMap<String, String>, AudioError> {
        Ok(self
            .devices
            .lock()
            .values()
            .map(|d| (d.id.clone(), d.name.clone()))
            .collect())
    }

    fn resolve(&self, device_id: &str) -> Result<MicrophoneDevice, AudioError> {
        self.devices
            .lock()
            .get(device_id)
            .cloned()
            .ok_or_else(|| AudioError::not_found(device_id))
    }
}

/// Records every set-default call; roles listed in `failing` fail.
#[derive(Default)]
pub(crate) struct FakePolicy {
    pub calls: Mutex<Vec<(String, DeviceRole)>>,
    pub failing: Mutex<Vec<DeviceRole>>,
    /// Runs once inside the next successful call, after it is recorded.
    pub on_next_call: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl FakePolicy {
    pub fn fail_role(&self, role: DeviceRole) {
        self.failing.lock().push(role);
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    pub fn targets(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(_, role)| *role == DeviceRole::Console)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl EndpointPolicy for FakePolicy {
    fn set_default(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError> {
        if self.failing.lock().contains(&role) {
            return Err(AudioError::SetDefaultFailed {
                role,
                reason: "E_FAIL".into(),
            });
        }
        self.calls.lock().push((device_id.to_string(), role));
        let hook = self.on_next_call.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }
}

#[derive(Default)]
struct NotifierInner {
    next_token: AtomicU64,
    live: Mutex<HashMap<u64, (String, Arc<dyn MuteEventSink>)>>,
    unplugged: Mutex<HashSet<String>>,
    attach_calls: Mutex<Vec<String>>,
}

/// Listener registry; `deliver` plays the OS calling every live listener.
#[derive(Default, Clone)]
pub(crate) struct FakeNotifier {
    inner: Arc<NotifierInner>,
}

impl FakeNotifier {
    /// Attach and detach both fail for this id until `replug`.
    pub fn unplug(&self, id: &str) {
        self.inner.unplugged.lock().insert(id.to_string());
    }

    pub fn replug(&self, id: &str) {
        self.inner.unplugged.lock().remove(id);
    }

    pub fn live_count(&self, id: &str) -> usize {
        self.inner
            .live
            .lock()
            .values()
            .filter(|(device_id, _)| device_id == id)
            .count()
    }

    pub fn total_live(&self) -> usize {
        self.inner.live.lock().len()
    }

    pub fn attach_calls(&self) -> Vec<String> {
        self.inner.attach_calls.lock().clone()
    }

    /// Returns how many listeners received the notification.
    pub fn deliver(&self, id: &str, is_muted: bool) -> usize {
        let sinks: Vec<_> = self
            .inner
            .live
            .lock()
            .values()
            .filter(|(device_id, _)| device_id == id)
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in &sinks {
            sink.on_volume_notification(VolumeNotification {
                device_id: id.to_string(),
                is_muted,
                volume_level: 0.5,
            });
        }
        sinks.len()
    }
}

impl VolumeNotifier for FakeNotifier {
    fn attach(
        &self,
        device_id: &str,
        sink: Arc<dyn MuteEventSink>,
    ) -> Result<Box<dyn ListenerRegistration>, AudioError> {
        self.inner.attach_calls.lock().push(device_id.to_string());
        if self.inner.unplugged.lock().contains(device_id) {
            return Err(AudioError::not_found(device_id));
        }
        let token = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        self.inner
            .live
            .lock()
            .insert(token, (device_id.to_string(), sink));
        Ok(Box::new(FakeRegistration {
            device_id: device_id.to_string(),
            token,
            inner: self.inner.clone(),
        }))
    }
}

struct FakeRegistration {
    device_id: String,
    token: u64,
    inner: Arc<NotifierInner>,
}

impl ListenerRegistration for FakeRegistration {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn detach(self: Box<Self>) -> Result<(), AudioError> {
        // A vanished device drops its listeners with it, and the call errors.
        self.inner.live.lock().remove(&self.token);
        if self.inner.unplugged.lock().contains(&self.device_id) {
            return Err(AudioError::UnsubscribeFailed {
                device_id: self.device_id.clone(),
                reason: "AUDCLNT_E_DEVICE_INVALIDATED".into(),
            });
        }
        Ok(())
    }
}

/// Settings kept in memory.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub saved: Mutex<Option<Settings>>,
    pub fail_save: Mutex<bool>,
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if *self.fail_save.lock() {
            return Err(SettingsError::NoSettingsDirectory);
        }
        *self.saved.lock() = Some(settings.clone());
        Ok(())
    }
}

/// Records autostart requests.
#[derive(Default)]
pub(crate) struct RecordingAutostart {
    pub requests: Mutex<Vec<bool>>,
}

impl AutostartRegistrar for RecordingAutostart {
    fn set_enabled(&self, enabled: bool) -> Result<(), PreferencesError> {
        self.requests.lock().push(enabled);
        Ok(())
    }
}
