//! Endpoint change notifications.
//!
//! Per-device mute/volume listeners (IAudioEndpointVolumeCallback) feed the
//! switching engine; an IMMNotificationClient logs topology changes.

use super::device::{AudioError, VolumeNotification};
use std::sync::Arc;

/// Receives mute/volume notifications, on whatever thread the OS delivers them.
pub trait MuteEventSink: Send + Sync {
    fn on_volume_notification(&self, notification: VolumeNotification);
}

/// A live listener attached to one device.
pub trait ListenerRegistration: Send {
    fn device_id(&self) -> &str;

    /// Detach the listener. Consumes the registration whether or not the OS
    /// call succeeds.
    fn detach(self: Box<Self>) -> Result<(), AudioError>;
}

/// Attaches mute/volume listeners to capture devices.
pub trait VolumeNotifier: Send + Sync {
    /// Resolve `device_id` and attach a listener forwarding to `sink`.
    fn attach(
        &self,
        device_id: &str,
        sink: Arc<dyn MuteEventSink>,
    ) -> Result<Box<dyn ListenerRegistration>, AudioError>;
}

#[cfg(windows)]
pub use self::wasapi::{TopologyWatch, WasapiNotifier};

#[cfg(windows)]
mod wasapi {
    use super::*;
    use crate::audio::enumerator::DeviceEnumerator;
    use crate::audio::volume::EndpointVolume;
    use std::panic::{self, AssertUnwindSafe};
    use tracing::{debug, info, warn};
    use windows::core::{implement, PCWSTR};
    use windows::Win32::Media::Audio::Endpoints::{
        IAudioEndpointVolumeCallback, IAudioEndpointVolumeCallback_Impl,
    };
    use windows::Win32::Media::Audio::{
        eCapture, EDataFlow, ERole, IMMDeviceEnumerator, IMMNotificationClient,
        IMMNotificationClient_Impl, AUDIO_VOLUME_NOTIFICATION_DATA, DEVICE_STATE,
    };
    // Re-export windows_core so the implement macro can find it
    #[allow(unused_imports)]
    use windows_core;

    /// COM callback that forwards volume/mute changes for one device.
    #[implement(IAudioEndpointVolumeCallback)]
    struct EndpointVolumeListener {
        device_id: String,
        sink: Arc<dyn MuteEventSink>,
    }

    impl IAudioEndpointVolumeCallback_Impl for EndpointVolumeListener_Impl {
        fn OnNotify(
            &self,
            pnotify: *mut AUDIO_VOLUME_NOTIFICATION_DATA,
        ) -> windows::core::Result<()> {
            if pnotify.is_null() {
                return Ok(());
            }

            let notification = unsafe {
                VolumeNotification {
                    device_id: self.device_id.clone(),
                    is_muted: (*pnotify).bMuted.as_bool(),
                    volume_level: (*pnotify).fMasterVolume,
                }
            };

            // Never unwind into the audio service.
            let sink = &self.sink;
            if panic::catch_unwind(AssertUnwindSafe(|| sink.on_volume_notification(notification)))
                .is_err()
            {
                warn!(device_id = %self.device_id, "volume notification handler panicked");
            }
            Ok(())
        }
    }

    /// WASAPI-backed [`VolumeNotifier`].
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WasapiNotifier;

    impl WasapiNotifier {
        pub fn new() -> Self {
            Self
        }
    }

    impl VolumeNotifier for WasapiNotifier {
        fn attach(
            &self,
            device_id: &str,
            sink: Arc<dyn MuteEventSink>,
        ) -> Result<Box<dyn ListenerRegistration>, AudioError> {
            let device = DeviceEnumerator::get_device(device_id)?;
            let volume = EndpointVolume::new(&device, device_id)?;

            let callback: IAudioEndpointVolumeCallback = EndpointVolumeListener {
                device_id: device_id.to_string(),
                sink,
            }
            .into();
            volume.register(&callback)?;

            Ok(Box::new(WasapiRegistration {
                device_id: device_id.to_string(),
                volume,
                callback,
            }))
        }
    }

    struct WasapiRegistration {
        device_id: String,
        volume: EndpointVolume,
        /// Must stay alive for the lifetime of the registration.
        callback: IAudioEndpointVolumeCallback,
    }

    // SAFETY: the registration is only touched to unregister, from threads
    // that have COM initialized; IAudioEndpointVolume is free-threaded.
    unsafe impl Send for WasapiRegistration {}

    impl ListenerRegistration for WasapiRegistration {
        fn device_id(&self) -> &str {
            &self.device_id
        }

        fn detach(self: Box<Self>) -> Result<(), AudioError> {
            self.volume.unregister(&self.callback)
        }
    }

    /// Notification client that logs capture topology changes.
    #[implement(IMMNotificationClient)]
    struct TopologyLogger {
        flow: EDataFlow,
    }

    impl TopologyLogger {
        fn describe_state(state: DEVICE_STATE) -> &'static str {
            match state.0 {
                1 => "active",
                2 => "disabled",
                4 => "not present",
                8 => "unplugged",
                _ => "unknown",
            }
        }

        fn id_of(id: &PCWSTR) -> String {
            if id.is_null() {
                return String::from("<none>");
            }
            unsafe { id.to_string().unwrap_or_else(|_| String::from("<invalid>")) }
        }
    }

    impl IMMNotificationClient_Impl for TopologyLogger_Impl {
        fn OnDeviceStateChanged(
            &self,
            pwstrdeviceid: &PCWSTR,
            dwnewstate: DEVICE_STATE,
        ) -> windows::core::Result<()> {
            info!(
                device_id = %TopologyLogger::id_of(pwstrdeviceid),
                state = TopologyLogger::describe_state(dwnewstate),
                "device state changed"
            );
            Ok(())
        }

        fn OnDeviceAdded(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
            info!(device_id = %TopologyLogger::id_of(pwstrdeviceid), "device added");
            Ok(())
        }

        fn OnDeviceRemoved(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
            info!(device_id = %TopologyLogger::id_of(pwstrdeviceid), "device removed");
            Ok(())
        }

        fn OnDefaultDeviceChanged(
            &self,
            flow: EDataFlow,
            role: ERole,
            pwstrdefaultdeviceid: &PCWSTR,
        ) -> windows::core::Result<()> {
            // Only care about capture devices
            if flow == self.flow {
                info!(
                    device_id = %TopologyLogger::id_of(pwstrdefaultdeviceid),
                    role = role.0,
                    "default capture device changed"
                );
            }
            Ok(())
        }

        fn OnPropertyValueChanged(
            &self,
            pwstrdeviceid: &PCWSTR,
            _key: &windows::Win32::UI::Shell::PropertiesSystem::PROPERTYKEY,
        ) -> windows::core::Result<()> {
            debug!(device_id = %TopologyLogger::id_of(pwstrdeviceid), "device property changed");
            Ok(())
        }
    }

    /// Keeps the topology logger registered until dropped.
    pub struct TopologyWatch {
        enumerator: IMMDeviceEnumerator,
        client: IMMNotificationClient,
    }

    impl TopologyWatch {
        pub fn register() -> Result<Self, AudioError> {
            let enumerator = DeviceEnumerator::raw_enumerator()?;
            let client: IMMNotificationClient = TopologyLogger { flow: eCapture }.into();
            unsafe {
                enumerator
                    .RegisterEndpointNotificationCallback(&client)
                    .map_err(|e| AudioError::EnumerationFailed(e.to_string()))?;
            }
            Ok(Self { enumerator, client })
        }
    }

    impl Drop for TopologyWatch {
        fn drop(&mut self) {
            unsafe {
                let _ = self
                    .enumerator
                    .UnregisterEndpointNotificationCallback(&self.client);
            }
        }
    }
}
