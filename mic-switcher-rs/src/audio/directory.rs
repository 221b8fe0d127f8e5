//! Capture device directory.
//!
//! The seam between the switching engine and the OS audio subsystem for
//! read-only device queries.

use super::device::{AudioError, MicrophoneDevice};
use std::collections::HashMap;

/// Enumerates active capture devices and resolves ids to live records.
///
/// Implementations must not cache: every call re-queries the OS.
pub trait DeviceDirectory: Send + Sync {
    /// All active capture devices, keyed by device id, valued by display name.
    fn list_active_capture_devices(&self) -> Result<HashMap<String, String>, AudioError>;

    /// Resolve one device id.
    ///
    /// Fails with [`AudioError::DeviceNotFound`] if the id is unknown or the
    /// endpoint is not active.
    fn resolve(&self, device_id: &str) -> Result<MicrophoneDevice, AudioError>;
}

impl<T: DeviceDirectory + ?Sized> DeviceDirectory for std::sync::Arc<T> {
    fn list_active_capture_devices(&self) -> Result<HashMap<String, String>, AudioError> {
        (**self).list_active_capture_devices()
    }

    fn resolve(&self, device_id: &str) -> Result<MicrophoneDevice, AudioError> {
        (**self).resolve(device_id)
    }
}
