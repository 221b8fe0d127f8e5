//! Default endpoint policy.
//!
//! Setting the default capture device goes through the undocumented
//! `IPolicyConfig` interface on Windows. The engine only sees the narrow
//! [`EndpointPolicy`] trait.

use super::device::{AudioError, DeviceRole};

/// Sets the OS default capture endpoint for one role.
pub trait EndpointPolicy: Send + Sync {
    fn set_default(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError>;
}

impl<T: EndpointPolicy + ?Sized> EndpointPolicy for std::sync::Arc<T> {
    fn set_default(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError> {
        (**self).set_default(device_id, role)
    }
}

#[cfg(windows)]
pub use self::windows_policy::PolicyConfig;

#[cfg(windows)]
mod windows_policy {
    use super::{AudioError, DeviceRole, EndpointPolicy};
    use windows::core::*;
    use windows::Win32::System::Com::*;

    /// IPolicyConfig COM interface (undocumented but stable)
    #[windows::core::interface("F8679F50-850A-41CF-9C72-430F290290C8")]
    unsafe trait IPolicyConfig: IUnknown {
        // Reserved methods to maintain vtable order
        fn GetMixFormat(&self) -> HRESULT;
        fn GetDeviceFormat(&self) -> HRESULT;
        fn ResetDeviceFormat(&self) -> HRESULT;
        fn SetDeviceFormat(&self) -> HRESULT;
        fn GetProcessingPeriod(&self) -> HRESULT;
        fn SetProcessingPeriod(&self) -> HRESULT;
        fn GetShareMode(&self) -> HRESULT;
        fn SetShareMode(&self) -> HRESULT;
        fn GetPropertyValue(&self) -> HRESULT;
        fn SetPropertyValue(&self) -> HRESULT;

        fn SetDefaultEndpoint(&self, device_id: PCWSTR, role: u32) -> HRESULT;
    }

    // PolicyConfigClient CLSID
    const CLSID_POLICY_CONFIG_CLIENT: GUID =
        GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

    /// `IPolicyConfig`-backed policy.
    ///
    /// A fresh client is created on every call, on the calling thread, so
    /// the policy can be used from notification threads without marshaling.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct PolicyConfig;

    impl PolicyConfig {
        pub fn new() -> Self {
            Self
        }
    }

    impl EndpointPolicy for PolicyConfig {
        fn set_default(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError> {
            let failed = |e: Error| AudioError::SetDefaultFailed {
                role,
                reason: e.to_string(),
            };

            unsafe {
                let policy_config: IPolicyConfig =
                    CoCreateInstance(&CLSID_POLICY_CONFIG_CLIENT, None, CLSCTX_ALL)
                        .map_err(failed)?;

                let device_id_wide: Vec<u16> =
                    device_id.encode_utf16().chain(std::iter::once(0)).collect();
                policy_config
                    .SetDefaultEndpoint(PCWSTR(device_id_wide.as_ptr()), role as u32)
                    .ok()
                    .map_err(failed)?;
            }

            Ok(())
        }
    }
}
