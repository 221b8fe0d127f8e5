//! FFI bindings for MicSwitcher.
//!
//! This crate provides C ABI functions for a UI shell written in another
//! runtime (C# via P/Invoke). Settings and device lists cross the boundary
//! as JSON. All functions use panic::catch_unwind to prevent Rust panics
//! from unwinding across the FFI boundary.
//!
//! The calling thread should keep COM initialized for as long as monitoring
//! runs; each call also initializes it for its own duration.

use mic_switcher_rs::engine::{Backends, EngineOptions, MicSwitcher, SwitchError};
use mic_switcher_rs::{logging, AudioError, Settings, SettingsError};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Error Handling
// ============================================================================

/// Error codes returned by FFI functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    DeviceNotFound = -3,
    ComError = -4,
    JsonError = -5,
    SwitchFailed = -6,
    SettingsIo = -7,
    Unsupported = -8,
    Busy = -9,
    Panic = -99,
}

impl From<&AudioError> for ErrorCode {
    fn from(err: &AudioError) -> Self {
        match err {
            AudioError::DeviceNotFound { .. } => ErrorCode::DeviceNotFound,
            AudioError::StringConversion(_) => ErrorCode::InvalidArgument,
            _ => ErrorCode::ComError,
        }
    }
}

impl From<&SwitchError> for ErrorCode {
    fn from(err: &SwitchError) -> Self {
        match err {
            SwitchError::EmptyTarget => ErrorCode::InvalidArgument,
            SwitchError::Busy => ErrorCode::Busy,
            SwitchError::ConsoleRole { source, .. } if source.is_not_found() => {
                ErrorCode::DeviceNotFound
            }
            _ => ErrorCode::SwitchFailed,
        }
    }
}

/// Failure carried to [`set_last_error`].
#[derive(Debug)]
struct FfiError {
    code: ErrorCode,
    message: String,
}

impl FfiError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<AudioError> for FfiError {
    fn from(err: AudioError) -> Self {
        Self::new(ErrorCode::from(&err), err.to_string())
    }
}

impl From<SwitchError> for FfiError {
    fn from(err: SwitchError) -> Self {
        Self::new(ErrorCode::from(&err), err.to_string())
    }
}

impl From<SettingsError> for FfiError {
    fn from(err: SettingsError) -> Self {
        let code = match err {
            SettingsError::Json(_) => ErrorCode::JsonError,
            _ => ErrorCode::SettingsIo,
        };
        Self::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for FfiError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::JsonError, err.to_string())
    }
}

/// Thread-local storage for the last error.
thread_local! {
    static LAST_ERROR: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: ErrorCode, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

// ============================================================================
// Data Types for JSON Serialization
// ============================================================================

/// Options accepted by `mic_switcher_create`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateConfig {
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub settle_delay_ms: Option<u64>,
}

impl CreateConfig {
    fn engine_options(&self) -> EngineOptions {
        match self.settle_delay_ms {
            Some(ms) => EngineOptions {
                settle_delay: Duration::from_millis(ms),
            },
            None => EngineOptions::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MicrophoneDto {
    pub id: String,
    pub name: String,
}

/// Response containing a list of devices.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<MicrophoneDto>,
}

// ============================================================================
// Handle Type
// ============================================================================

/// Opaque handle. Actually points to a [`SwitcherHandle`].
pub type MicSwitcherHandle = *mut c_void;

/// Called with the new device's display name (UTF-8, valid only for the
/// duration of the call) and the registered context pointer.
pub type SwitchedCallback = extern "C" fn(name: *const c_char, context: *mut c_void);

#[derive(Clone, Copy)]
struct CallbackSlot {
    callback: SwitchedCallback,
    /// Stored as an address so the slot is Send; the host owns the pointee.
    context: usize,
}

struct SwitcherHandle {
    switcher: MicSwitcher,
    callback: Arc<Mutex<Option<CallbackSlot>>>,
}

impl SwitcherHandle {
    fn new(backends: Backends, options: EngineOptions) -> Self {
        let switcher = MicSwitcher::new(backends, options);
        let callback: Arc<Mutex<Option<CallbackSlot>>> = Arc::new(Mutex::new(None));

        let slot = callback.clone();
        switcher.on_device_switched(move |name| {
            let current = slot.lock().ok().and_then(|guard| *guard);
            if let (Some(current), Ok(name)) = (current, CString::new(name)) {
                (current.callback)(name.as_ptr(), current.context as *mut c_void);
            }
        });

        Self { switcher, callback }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a C string from a Rust string. Caller must free with
/// mic_switcher_free_string.
fn alloc_c_string(s: &str) -> *mut c_char {
    CString::new(s.replace('\0', ""))
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Parse a C string to a Rust string slice.
unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

#[cfg(windows)]
fn with_com<T>(f: impl FnOnce() -> Result<T, FfiError>) -> Result<T, FfiError> {
    mic_switcher_rs::platform::with_com(f)
}

#[cfg(not(windows))]
fn with_com<T>(f: impl FnOnce() -> Result<T, FfiError>) -> Result<T, FfiError> {
    f()
}

#[cfg(windows)]
fn platform_backends() -> Result<Backends, FfiError> {
    Ok(Backends::windows()?)
}

#[cfg(not(windows))]
fn platform_backends() -> Result<Backends, FfiError> {
    Err(FfiError::new(
        ErrorCode::Unsupported,
        "Audio backends are only available on Windows",
    ))
}

/// Run `f` against the handle, catching panics and recording errors.
fn with_handle<T>(
    handle: MicSwitcherHandle,
    failed: T,
    f: impl FnOnce(&SwitcherHandle) -> Result<T, FfiError>,
) -> T {
    clear_last_error();
    if handle.is_null() {
        set_last_error(ErrorCode::InvalidHandle, "Null handle");
        return failed;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let handle = unsafe { &*(handle as *const SwitcherHandle) };
        with_com(|| f(handle))
    }));

    match result {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            tracing::debug!(code = ?e.code, message = %e.message, "mic_switcher call failed");
            set_last_error(e.code, e.message);
            failed
        }
        Err(_) => {
            tracing::error!("panic caught at the FFI boundary");
            set_last_error(ErrorCode::Panic, "Panic inside mic_switcher call");
            failed
        }
    }
}

fn json_string<T: Serialize>(value: &T) -> Result<*mut c_char, FfiError> {
    Ok(alloc_c_string(&serde_json::to_string(value)?))
}

// ============================================================================
// FFI Functions - Lifecycle
// ============================================================================

/// Create a new switcher instance.
///
/// # Arguments
/// * `config_json` - `{"log_level": "...", "settle_delay_ms": N}`, or null
///   for defaults
///
/// # Returns
/// Handle to the switcher, or null on failure. Check
/// mic_switcher_last_error_code() on failure.
///
/// # Safety
/// The returned handle must be freed with mic_switcher_destroy().
#[no_mangle]
pub extern "C" fn mic_switcher_create(config_json: *const c_char) -> MicSwitcherHandle {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let config: CreateConfig = match unsafe { parse_c_str(config_json) } {
            Some(json) => serde_json::from_str(json)?,
            None => CreateConfig::default(),
        };
        if let Some(level) = config.log_level.as_deref() {
            logging::init(Some(level));
        }

        let backends = platform_backends()?;
        let handle = Box::new(SwitcherHandle::new(backends, config.engine_options()));
        Ok::<_, FfiError>(Box::into_raw(handle) as MicSwitcherHandle)
    });

    match result {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            set_last_error(e.code, e.message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during switcher creation");
            ptr::null_mut()
        }
    }
}

/// Destroy a switcher instance, stopping monitoring first.
///
/// # Safety
/// The handle must have been created by mic_switcher_create() and must not
/// be used after this call.
#[no_mangle]
pub extern "C" fn mic_switcher_destroy(handle: MicSwitcherHandle) {
    if handle.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| {
        let handle = unsafe { Box::from_raw(handle as *mut SwitcherHandle) };
        let _ = with_com(|| {
            handle.switcher.stop_monitoring();
            Ok(())
        });
    });
}

// ============================================================================
// FFI Functions - Settings
// ============================================================================

/// Reload settings from disk.
///
/// # Returns
/// The loaded settings as JSON. Caller must free with
/// mic_switcher_free_string(). Returns null on failure.
#[no_mangle]
pub extern "C" fn mic_switcher_load_settings(handle: MicSwitcherHandle) -> *mut c_char {
    with_handle(handle, ptr::null_mut(), |h| json_string(&h.switcher.load_settings()))
}

/// Settings currently held in memory, as JSON.
#[no_mangle]
pub extern "C" fn mic_switcher_get_settings(handle: MicSwitcherHandle) -> *mut c_char {
    with_handle(handle, ptr::null_mut(), |h| {
        json_string(&h.switcher.get_current_settings())
    })
}

/// Persist settings and apply the autostart flag.
///
/// Monitoring is not restarted; call stop, save, start for a live change.
#[no_mangle]
pub extern "C" fn mic_switcher_save_settings(
    handle: MicSwitcherHandle,
    settings_json: *const c_char,
) -> i32 {
    with_handle(handle, -1, |h| {
        let json = unsafe { parse_c_str(settings_json) }
            .ok_or_else(|| FfiError::new(ErrorCode::InvalidArgument, "Invalid settings JSON"))?;
        let settings: Settings = serde_json::from_str(json)?;
        h.switcher.save_settings(settings)?;
        Ok(0)
    })
}

// ============================================================================
// FFI Functions - Devices and Monitoring
// ============================================================================

/// Active capture devices, sorted by name.
///
/// # Returns
/// `{"devices": [{"id": ..., "name": ...}]}`. Caller must free with
/// mic_switcher_free_string().
#[no_mangle]
pub extern "C" fn mic_switcher_list_microphones(handle: MicSwitcherHandle) -> *mut c_char {
    with_handle(handle, ptr::null_mut(), |h| {
        let mut devices: Vec<MicrophoneDto> = h
            .switcher
            .list_all_microphones()
            .into_iter()
            .map(|(id, name)| MicrophoneDto { id, name })
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        json_string(&DeviceListResponse { devices })
    })
}

#[no_mangle]
pub extern "C" fn mic_switcher_start(handle: MicSwitcherHandle) -> i32 {
    with_handle(handle, -1, |h| {
        h.switcher.start_monitoring();
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn mic_switcher_stop(handle: MicSwitcherHandle) -> i32 {
    with_handle(handle, -1, |h| {
        h.switcher.stop_monitoring();
        Ok(0)
    })
}

/// 1 when monitoring, 0 when not, -1 on error.
#[no_mangle]
pub extern "C" fn mic_switcher_is_monitoring(handle: MicSwitcherHandle) -> i32 {
    with_handle(handle, -1, |h| Ok(h.switcher.is_monitoring() as i32))
}

/// Switch the default capture device to `device_id` now.
///
/// Fails with `Busy` (-9 from `mic_switcher_last_error_code`) while a recent
/// switch is still settling.
#[no_mangle]
pub extern "C" fn mic_switcher_switch_to(
    handle: MicSwitcherHandle,
    device_id: *const c_char,
) -> i32 {
    with_handle(handle, -1, |h| {
        let id = unsafe { parse_c_str(device_id) }
            .ok_or_else(|| FfiError::new(ErrorCode::InvalidArgument, "Invalid device ID"))?;
        h.switcher.switch_to_device(id)?;
        Ok(0)
    })
}

/// Set (or clear, with a null `callback`) the "device switched" callback.
///
/// The callback runs on the thread that performed the switch, usually an
/// audio notification thread.
#[no_mangle]
pub extern "C" fn mic_switcher_set_switched_callback(
    handle: MicSwitcherHandle,
    callback: Option<SwitchedCallback>,
    context: *mut c_void,
) -> i32 {
    with_handle(handle, -1, |h| {
        let mut slot = h
            .callback
            .lock()
            .map_err(|_| FfiError::new(ErrorCode::Panic, "Callback slot poisoned"))?;
        *slot = callback.map(|callback| CallbackSlot {
            callback,
            context: context as usize,
        });
        Ok(0)
    })
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by one of the mic_switcher_*
/// functions. Do not call this on strings from other sources.
#[no_mangle]
pub extern "C" fn mic_switcher_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = CString::from_raw(ptr);
    });
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code.
///
/// # Returns
/// The error code from the last failed operation, or 0 if no error.
#[no_mangle]
pub extern "C" fn mic_switcher_last_error_code() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message.
///
/// # Returns
/// Error message string. Caller must free with mic_switcher_free_string().
/// Returns null if no error.
#[no_mangle]
pub extern "C" fn mic_switcher_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Utility
// ============================================================================

/// Get the library version.
///
/// # Returns
/// Version string. Caller must free with mic_switcher_free_string().
#[no_mangle]
pub extern "C" fn mic_switcher_version() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================
