//! MicSwitcher - Library
//!
//! Keeps the Windows default capture device on whichever headset is in use.
//!
//! ## Features
//!
//! - Watches the mute state of a prioritized list of headset microphones
//! - Switches the console and communications default to the first unmuted
//!   headset, or to a stand microphone when every headset is muted
//! - Ignores the change echo of its own switches for a short settle window
//! - Start with Windows option
//! - Tray icon with balloon notifications (Windows binary)

pub mod audio;
pub mod engine;
pub mod logging;
pub mod platform;
pub mod ui;

pub use audio::{AudioError, DeviceDirectory, DeviceRole, EndpointPolicy, MicrophoneDevice};
pub use engine::{Backends, EngineOptions, MicSwitcher, SwitchError};
pub use platform::{Settings, SettingsError, SettingsStore};
