//! COM apartment guard.

use crate::audio::AudioError;
use tracing::debug;
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};

/// COM initialization guard that uninitializes COM on drop.
///
/// A thread already initialized in another apartment model keeps it; the
/// guard then owns nothing.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM for the current thread.
    pub fn new() -> Result<Self, AudioError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            debug!("COM already initialized in another apartment on this thread");
            return Ok(Self { initialized: false });
        }
        hr.ok()
            .map_err(|e| AudioError::ComInitFailed(e.to_string()))?;
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Run `f` with COM initialized on the current thread.
pub fn with_com<T, E, F>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<AudioError>,
{
    let _guard = ComGuard::new()?;
    f()
}
