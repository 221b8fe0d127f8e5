//! Tray shell pieces: the notification-area icon and its context menu.

pub mod menu;
#[cfg(windows)]
pub mod tray;

#[cfg(windows)]
pub use tray::TrayIcon;

/// Tray icon callback message.
#[cfg(windows)]
pub const WM_TRAY_ICON: u32 = windows::Win32::UI::WindowsAndMessaging::WM_USER + 1;

/// Posted from the notification thread after a switch; `lparam` owns a
/// boxed `String` with the device name.
#[cfg(windows)]
pub const WM_DEVICE_SWITCHED: u32 = windows::Win32::UI::WindowsAndMessaging::WM_USER + 2;
