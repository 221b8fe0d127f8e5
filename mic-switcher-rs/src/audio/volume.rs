//! Endpoint volume access using IAudioEndpointVolume.
//!
//! Reads mute/volume state and (un)registers change callbacks for one
//! capture device.

use super::device::AudioError;
use windows::Win32::Media::Audio::Endpoints::{IAudioEndpointVolume, IAudioEndpointVolumeCallback};
use windows::Win32::Media::Audio::IMMDevice;
use windows::Win32::System::Com::CLSCTX_ALL;

/// Volume interface for a specific device.
pub struct EndpointVolume {
    device_id: String,
    endpoint_volume: IAudioEndpointVolume,
}

impl EndpointVolume {
    /// Activate the endpoint volume interface for the given device.
    pub fn new(device: &IMMDevice, device_id: &str) -> Result<Self, AudioError> {
        unsafe {
            let endpoint_volume: IAudioEndpointVolume =
                device
                    .Activate(CLSCTX_ALL, None)
                    .map_err(|_| AudioError::VolumeNotAvailable {
                        device_id: device_id.to_string(),
                    })?;

            Ok(Self {
                device_id: device_id.to_string(),
                endpoint_volume,
            })
        }
    }

    /// Get the current mute state.
    pub fn get_mute(&self) -> Result<bool, AudioError> {
        unsafe {
            let muted = self
                .endpoint_volume
                .GetMute()
                .map_err(|_| self.not_available())?;
            Ok(muted.as_bool())
        }
    }

    /// Get the current volume level (0.0 to 1.0).
    pub fn get_volume(&self) -> Result<f32, AudioError> {
        unsafe {
            self.endpoint_volume
                .GetMasterVolumeLevelScalar()
                .map_err(|_| self.not_available())
        }
    }

    /// Start delivering mute/volume changes to `callback`.
    pub fn register(&self, callback: &IAudioEndpointVolumeCallback) -> Result<(), AudioError> {
        unsafe {
            self.endpoint_volume
                .RegisterControlChangeNotify(callback)
                .map_err(|e| AudioError::SubscriptionFailed {
                    device_id: self.device_id.clone(),
                    reason: e.to_string(),
                })
        }
    }

    /// Stop delivering changes to `callback`.
    pub fn unregister(&self, callback: &IAudioEndpointVolumeCallback) -> Result<(), AudioError> {
        unsafe {
            self.endpoint_volume
                .UnregisterControlChangeNotify(callback)
                .map_err(|e| AudioError::UnsubscribeFailed {
                    device_id: self.device_id.clone(),
                    reason: e.to_string(),
                })
        }
    }

    fn not_available(&self) -> AudioError {
        AudioError::VolumeNotAvailable {
            device_id: self.device_id.clone(),
        }
    }
}
