//! Device enumeration using Windows MMDevice API.
//!
//! Provides the WASAPI-backed [`DeviceDirectory`].

use super::device::{AudioError, MicrophoneDevice};
use super::directory::DeviceDirectory;
use super::volume::EndpointVolume;
use std::collections::HashMap;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator, DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{CoCreateInstance, CoTaskMemFree, CLSCTX_ALL, STGM};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

const UNKNOWN_NAME: &str = "Unknown";

/// Device enumerator using Windows MMDevice API.
///
/// Holds no COM objects: an `IMMDeviceEnumerator` is created per call on the
/// calling thread, which makes the directory safe to share with the volume
/// notification threads. COM must be initialized on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceEnumerator;

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self
    }

    fn open() -> Result<IMMDeviceEnumerator, AudioError> {
        unsafe {
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| AudioError::EnumerationFailed(e.to_string()))
        }
    }

    /// Open the raw enumerator for notification registration.
    pub fn raw_enumerator() -> Result<IMMDeviceEnumerator, AudioError> {
        Self::open()
    }

    /// Get an active capture device by ID.
    pub fn get_device(device_id: &str) -> Result<IMMDevice, AudioError> {
        let enumerator = Self::open()?;
        unsafe {
            let device_id_wide: Vec<u16> =
                device_id.encode_utf16().chain(std::iter::once(0)).collect();

            let device = enumerator
                .GetDevice(PCWSTR::from_raw(device_id_wide.as_ptr()))
                .map_err(|_| AudioError::not_found(device_id))?;

            let state = device
                .GetState()
                .map_err(|_| AudioError::not_found(device_id))?;
            if state != DEVICE_STATE_ACTIVE {
                return Err(AudioError::not_found(device_id));
            }

            Ok(device)
        }
    }

    /// ID of the current default capture device (Console role).
    pub fn default_device_id() -> Option<String> {
        let enumerator = Self::open().ok()?;
        unsafe {
            let device = enumerator.GetDefaultAudioEndpoint(eCapture, eConsole).ok()?;
            device_id(&device).ok()
        }
    }

    /// Convert an IMMDevice to a MicrophoneDevice.
    fn device_to_microphone(device: &IMMDevice) -> Result<MicrophoneDevice, AudioError> {
        let id = device_id(device)?;
        let name = device_name(device).unwrap_or_else(|| UNKNOWN_NAME.to_string());

        let volume = EndpointVolume::new(device, &id)?;
        let is_muted = volume.get_mute()?;
        let volume_level = volume.get_volume().unwrap_or(1.0);

        Ok(MicrophoneDevice {
            id,
            name,
            is_muted,
            volume_level,
            is_present: true,
        })
    }
}

impl DeviceDirectory for DeviceEnumerator {
    fn list_active_capture_devices(&self) -> Result<HashMap<String, String>, AudioError> {
        let enumerator = Self::open()?;
        unsafe {
            let collection = enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .map_err(|e| AudioError::EnumerationFailed(e.to_string()))?;

            let count = collection
                .GetCount()
                .map_err(|e| AudioError::EnumerationFailed(e.to_string()))?;

            let mut devices = HashMap::with_capacity(count as usize);
            for i in 0..count {
                let device = collection
                    .Item(i)
                    .map_err(|e| AudioError::EnumerationFailed(e.to_string()))?;

                if let Ok(id) = device_id(&device) {
                    let name = device_name(&device).unwrap_or_else(|| UNKNOWN_NAME.to_string());
                    devices.insert(id, name);
                }
            }

            Ok(devices)
        }
    }

    fn resolve(&self, device_id: &str) -> Result<MicrophoneDevice, AudioError> {
        let device = Self::get_device(device_id)?;
        Self::device_to_microphone(&device)
    }
}

/// Read and free the endpoint id string.
fn device_id(device: &IMMDevice) -> Result<String, AudioError> {
    unsafe {
        let raw: PWSTR = device
            .GetId()
            .map_err(|e| AudioError::EnumerationFailed(e.to_string()))?;
        let id = raw
            .to_string()
            .map_err(|e| AudioError::StringConversion(e.to_string()));
        CoTaskMemFree(Some(raw.0 as *const _));
        id
    }
}

/// Get the friendly name of a device from its property store.
fn device_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let props: IPropertyStore = device.OpenPropertyStore(STGM(0)).ok()?; // STGM_READ = 0

        // Convert DEVPROPKEY to PROPERTYKEY
        let key = PROPERTYKEY {
            fmtid: DEVPKEY_Device_FriendlyName.fmtid,
            pid: DEVPKEY_Device_FriendlyName.pid,
        };

        let prop = props.GetValue(&key).ok()?;
        let name = prop.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}
