//! Audio device data models.
//!
//! Defines the capture device record, endpoint roles, the mute/volume
//! notification payload and the audio error type.

use thiserror::Error;

/// A capture device as resolved from the OS at one point in time.
///
/// Never cached: presence and mute state change outside our control, so
/// callers re-resolve whenever they need the current truth.
#[derive(Debug, Clone, PartialEq)]
pub struct MicrophoneDevice {
    /// Unique Windows device ID (opaque string from IMMDevice::GetId)
    pub id: String,

    /// Human-readable device name (from device properties)
    pub name: String,

    /// Current mute state
    pub is_muted: bool,

    /// Volume level as scalar (0.0 to 1.0)
    pub volume_level: f32,

    /// Whether the endpoint is active (plugged in and enabled)
    pub is_present: bool,
}

impl MicrophoneDevice {
    /// Create a new present, unmuted MicrophoneDevice.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_muted: false,
            volume_level: 1.0,
            is_present: true,
        }
    }

    /// Builder-style mute flag.
    pub fn muted(mut self, is_muted: bool) -> Self {
        self.is_muted = is_muted;
        self
    }
}

/// Audio device role (maps to Windows ERole enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DeviceRole {
    /// Used by games, system sounds, most general applications
    Console = 0,

    /// Used by music players, video players
    Multimedia = 1,

    /// Used by Teams, Zoom, Discord, and other VoIP applications
    Communications = 2,
}

impl DeviceRole {
    /// Roles that must point at the same device for a switch to be complete.
    pub const SWITCHED: [DeviceRole; 2] = [DeviceRole::Console, DeviceRole::Communications];
}

/// A mute/volume change delivered by an endpoint volume callback.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeNotification {
    pub device_id: String,
    pub is_muted: bool,
    pub volume_level: f32,
}

/// Audio service error types.
///
/// Causes from the OS are carried as text so the type stays `Clone` and
/// platform-neutral.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("COM initialization failed: {0}")]
    ComInitFailed(String),

    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(String),

    #[error("Failed to set default device for {role:?} role: {reason}")]
    SetDefaultFailed { role: DeviceRole, reason: String },

    #[error("Volume control not available for device {device_id}")]
    VolumeNotAvailable { device_id: String },

    #[error("Failed to attach volume listener to {device_id}: {reason}")]
    SubscriptionFailed { device_id: String, reason: String },

    #[error("Failed to detach volume listener from {device_id}: {reason}")]
    UnsubscribeFailed { device_id: String, reason: String },

    #[error("String conversion error: {0}")]
    StringConversion(String),
}

impl AudioError {
    pub fn not_found(device_id: &str) -> Self {
        AudioError::DeviceNotFound {
            device_id: device_id.to_string(),
        }
    }

    /// True for the "device absent or inactive" case, which every caller
    /// treats as skip-and-continue.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AudioError::DeviceNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_device_is_present_and_unmuted() {
        let device = MicrophoneDevice::new("id", "Mic").muted(true);
        assert!(device.is_present);
        assert!(device.is_muted);
        assert_eq!(device.volume_level, 1.0);
    }

    #[test]
    fn test_not_found_error_message() {
        let err = AudioError::not_found("{0.0.1.00000000}.{abc}");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Device not found: {0.0.1.00000000}.{abc}");
    }

    #[test]
    fn test_switched_roles_are_console_and_communications() {
        assert_eq!(
            DeviceRole::SWITCHED,
            [DeviceRole::Console, DeviceRole::Communications]
        );
        assert_eq!(DeviceRole::Communications as u32, 2);
    }
}
