//! Platform services: settings persistence, autostart registration and
//! COM setup.

#[cfg(windows)]
pub mod com;
pub mod registry;
pub mod settings;

#[cfg(windows)]
pub use com::{with_com, ComGuard};
#[cfg(windows)]
pub use registry::RegistryAutostart;
pub use registry::{AutostartRegistrar, NoAutostart, PreferencesError};
pub use settings::{JsonSettingsStore, Settings, SettingsError, SettingsStore};
