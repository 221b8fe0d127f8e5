//! Audio module for Windows Core Audio API interactions.
//!
//! Platform-neutral traits for device lookup, default-endpoint policy and
//! mute notifications, plus their WASAPI implementations on Windows.

pub mod device;
pub mod directory;
#[cfg(windows)]
pub mod enumerator;
pub mod notifications;
pub mod policy;
#[cfg(windows)]
pub mod volume;

pub use device::{AudioError, DeviceRole, MicrophoneDevice, VolumeNotification};
pub use directory::DeviceDirectory;
#[cfg(windows)]
pub use enumerator::DeviceEnumerator;
pub use notifications::{ListenerRegistration, MuteEventSink, VolumeNotifier};
#[cfg(windows)]
pub use notifications::{TopologyWatch, WasapiNotifier};
pub use policy::EndpointPolicy;
#[cfg(windows)]
pub use policy::PolicyConfig;
