//! "Start with Windows" registration.
//!
//! Autostart is a value under the per-user `Run` key pointing at the
//! current executable.

use thiserror::Error;

/// Autostart registration error types.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("Failed to access registry: {0}")]
    RegistryAccess(String),

    #[error("Failed to write preference: {key}")]
    WriteFailed { key: String },

    #[error("Failed to locate current executable: {0}")]
    ExecutablePath(#[from] std::io::Error),
}

/// Turns "Start with Windows" on or off.
pub trait AutostartRegistrar: Send + Sync {
    fn set_enabled(&self, enabled: bool) -> Result<(), PreferencesError>;
}

/// Registrar that does nothing, for platforms without a `Run` key.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAutostart;

impl AutostartRegistrar for NoAutostart {
    fn set_enabled(&self, enabled: bool) -> Result<(), PreferencesError> {
        tracing::debug!(enabled, "autostart not supported on this platform");
        Ok(())
    }
}

#[cfg(windows)]
pub use self::windows_run_key::RegistryAutostart;

#[cfg(windows)]
mod windows_run_key {
    use super::{AutostartRegistrar, PreferencesError};
    use tracing::info;
    use windows::core::PCWSTR;
    use windows::Win32::System::Registry::{
        RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
        HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_SAM_FLAGS, REG_SZ,
    };

    /// Autostart through `HKCU\...\CurrentVersion\Run\MicSwitcher`.
    pub struct RegistryAutostart {
        run_key_path: Vec<u16>,
        value_name: Vec<u16>,
    }

    /// Closes the key on drop.
    struct RunKey(HKEY);

    impl Drop for RunKey {
        fn drop(&mut self) {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }

    impl RegistryAutostart {
        const RUN_KEY: &'static str = r"Software\Microsoft\Windows\CurrentVersion\Run";
        const APP_NAME: &'static str = "MicSwitcher";

        pub fn new() -> Self {
            Self {
                run_key_path: to_wide(Self::RUN_KEY),
                value_name: to_wide(Self::APP_NAME),
            }
        }

        fn open(&self, access: REG_SAM_FLAGS) -> Option<RunKey> {
            let mut hkey = HKEY::default();
            let result = unsafe {
                RegOpenKeyExW(
                    HKEY_CURRENT_USER,
                    PCWSTR::from_raw(self.run_key_path.as_ptr()),
                    0,
                    access,
                    &mut hkey,
                )
            };
            result.is_ok().then_some(RunKey(hkey))
        }

        /// Whether the `Run` value currently exists.
        pub fn is_enabled(&self) -> bool {
            let Some(key) = self.open(KEY_READ) else {
                return false;
            };
            let mut data_size = 0u32;
            let result = unsafe {
                RegQueryValueExW(
                    key.0,
                    PCWSTR::from_raw(self.value_name.as_ptr()),
                    None,
                    None,
                    None,
                    Some(&mut data_size),
                )
            };
            result.is_ok() && data_size > 0
        }
    }

    impl Default for RegistryAutostart {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AutostartRegistrar for RegistryAutostart {
        fn set_enabled(&self, enabled: bool) -> Result<(), PreferencesError> {
            let key = self
                .open(KEY_WRITE)
                .ok_or_else(|| PreferencesError::RegistryAccess("Failed to open Run key".into()))?;

            if enabled {
                let exe = std::env::current_exe()?;
                let exe_wide = to_wide(&exe.to_string_lossy());
                let bytes = unsafe {
                    std::slice::from_raw_parts(exe_wide.as_ptr() as *const u8, exe_wide.len() * 2)
                };
                let result = unsafe {
                    RegSetValueExW(
                        key.0,
                        PCWSTR::from_raw(self.value_name.as_ptr()),
                        0,
                        REG_SZ,
                        Some(bytes),
                    )
                };
                if result.is_err() {
                    return Err(PreferencesError::WriteFailed {
                        key: Self::APP_NAME.to_string(),
                    });
                }
                info!(path = %exe.display(), "autostart enabled");
            } else {
                // Deleting a value that is not there is fine.
                let _ = unsafe {
                    RegDeleteValueW(key.0, PCWSTR::from_raw(self.value_name.as_ptr()))
                };
                info!("autostart disabled");
            }
            Ok(())
        }
    }

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_autostart_accepts_both_states() {
        assert!(NoAutostart.set_enabled(true).is_ok());
        assert!(NoAutostart.set_enabled(false).is_ok());
    }

    #[test]
    fn test_error_messages_name_the_key() {
        let err = PreferencesError::WriteFailed {
            key: "MicSwitcher".into(),
        };
        assert_eq!(err.to_string(), "Failed to write preference: MicSwitcher");
    }
}
