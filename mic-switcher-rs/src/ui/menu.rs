//! Tray context menu.
//!
//! Command ids encode which device row was picked; [`apply`] turns a picked
//! command into a settings change for the shell to run through
//! stop, save, start.

use crate::platform::Settings;
use std::collections::HashMap;

// Menu command IDs
pub const CMD_EXIT: u32 = 1;
pub const CMD_TOGGLE_STARTUP: u32 = 2;
pub const CMD_RELOAD: u32 = 3;
pub const CMD_STAND_BASE: u32 = 100; // Stand mic rows start at 100
pub const CMD_HEADSET_BASE: u32 = 1000; // Headset rows start at 1000

/// A microphone row in the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: String,
    pub name: String,
}

/// Menu rows ordered by display name.
pub fn sorted_entries(devices: HashMap<String, String>) -> Vec<DeviceEntry> {
    let mut entries: Vec<DeviceEntry> = devices
        .into_iter()
        .map(|(id, name)| DeviceEntry { id, name })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    entries
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    SetStandMic(usize),
    ToggleHeadset(usize),
    ToggleAutostart,
    ReloadSettings,
    Exit,
}

impl MenuCommand {
    pub fn id(self) -> u32 {
        match self {
            MenuCommand::SetStandMic(i) => CMD_STAND_BASE + i as u32,
            MenuCommand::ToggleHeadset(i) => CMD_HEADSET_BASE + i as u32,
            MenuCommand::ToggleAutostart => CMD_TOGGLE_STARTUP,
            MenuCommand::ReloadSettings => CMD_RELOAD,
            MenuCommand::Exit => CMD_EXIT,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            CMD_EXIT => Some(MenuCommand::Exit),
            CMD_TOGGLE_STARTUP => Some(MenuCommand::ToggleAutostart),
            CMD_RELOAD => Some(MenuCommand::ReloadSettings),
            id if id >= CMD_HEADSET_BASE => {
                Some(MenuCommand::ToggleHeadset((id - CMD_HEADSET_BASE) as usize))
            }
            id if id >= CMD_STAND_BASE => {
                Some(MenuCommand::SetStandMic((id - CMD_STAND_BASE) as usize))
            }
            _ => None,
        }
    }
}

/// What the shell should do after a menu pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Stop monitoring, save these settings, start again.
    Reconfigure(Settings),
    Reload,
    Exit,
    /// Stale row index; the device list changed under the open menu.
    Ignore,
}

/// Settings change for `command` against the rows the menu was built from.
pub fn apply(command: MenuCommand, entries: &[DeviceEntry], current: &Settings) -> MenuAction {
    let mut next = current.clone();
    match command {
        MenuCommand::SetStandMic(i) => {
            let Some(entry) = entries.get(i) else {
                return MenuAction::Ignore;
            };
            next.stand_mic_id = Some(entry.id.clone());
        }
        MenuCommand::ToggleHeadset(i) => {
            let Some(entry) = entries.get(i) else {
                return MenuAction::Ignore;
            };
            if !next.remove_headset(&entry.id) {
                next.add_headset(&entry.id);
            }
        }
        MenuCommand::ToggleAutostart => next.autostart = !next.autostart,
        MenuCommand::ReloadSettings => return MenuAction::Reload,
        MenuCommand::Exit => return MenuAction::Exit,
    }
    MenuAction::Reconfigure(next)
}

#[cfg(windows)]
pub use self::popup::show_context_menu;

#[cfg(windows)]
mod popup {
    use super::*;
    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        AppendMenuW, CreatePopupMenu, DestroyMenu, TrackPopupMenu, HMENU, MENU_ITEM_FLAGS,
        MF_CHECKED, MF_GRAYED, MF_POPUP, MF_SEPARATOR, MF_STRING, TPM_RIGHTBUTTON,
    };

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn append(menu: HMENU, flags: MENU_ITEM_FLAGS, id: usize, label: &str) {
        let label = wide(label);
        unsafe {
            let _ = AppendMenuW(menu, flags, id, PCWSTR(label.as_ptr()));
        }
    }

    fn checked(on: bool) -> MENU_ITEM_FLAGS {
        if on {
            MF_STRING | MF_CHECKED
        } else {
            MF_STRING
        }
    }

    fn device_submenu<F>(
        entries: &[DeviceEntry],
        command: F,
        is_checked: impl Fn(&str) -> bool,
    ) -> windows::core::Result<HMENU>
    where
        F: Fn(usize) -> MenuCommand,
    {
        let menu = unsafe { CreatePopupMenu()? };
        if entries.is_empty() {
            append(menu, MF_STRING | MF_GRAYED, 0, "(no microphones found)");
        }
        for (i, entry) in entries.iter().enumerate() {
            append(
                menu,
                checked(is_checked(&entry.id)),
                command(i).id() as usize,
                &entry.name,
            );
        }
        Ok(menu)
    }

    /// Show the context menu at the specified position.
    ///
    /// The picked item arrives as `WM_COMMAND` with a [`MenuCommand`] id.
    pub fn show_context_menu(
        hwnd: HWND,
        x: i32,
        y: i32,
        entries: &[DeviceEntry],
        settings: &Settings,
    ) -> windows::core::Result<()> {
        unsafe {
            let menu = CreatePopupMenu()?;

            let stand = device_submenu(entries, MenuCommand::SetStandMic, |id| {
                settings.stand_mic() == Some(id)
            })?;
            let _ = AppendMenuW(menu, MF_POPUP, stand.0 as usize, w!("Stand microphone"));

            let headsets = device_submenu(entries, MenuCommand::ToggleHeadset, |id| {
                settings.headset_mic_ids.iter().any(|h| h == id)
            })?;
            let _ = AppendMenuW(menu, MF_POPUP, headsets.0 as usize, w!("Headset microphones"));

            let _ = AppendMenuW(menu, MF_SEPARATOR, 0, None);
            append(
                menu,
                checked(settings.autostart),
                CMD_TOGGLE_STARTUP as usize,
                "Start with Windows",
            );
            append(menu, MF_STRING, CMD_RELOAD as usize, "Reload settings");

            let _ = AppendMenuW(menu, MF_SEPARATOR, 0, None);
            append(menu, MF_STRING, CMD_EXIT as usize, "Exit");

            let _ = TrackPopupMenu(menu, TPM_RIGHTBUTTON, x, y, 0, hwnd, None);

            // Destroys the submenus with it.
            let _ = DestroyMenu(menu);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<DeviceEntry> {
        sorted_entries(HashMap::from([
            ("id-b".to_string(), "Beta Headset".to_string()),
            ("id-a".to_string(), "Alpha Stand".to_string()),
        ]))
    }

    #[test]
    fn test_entries_sorted_by_name() {
        let names: Vec<_> = entries().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Alpha Stand", "Beta Headset"]);
    }

    #[test]
    fn test_command_ids_decode() {
        for command in [
            MenuCommand::SetStandMic(0),
            MenuCommand::SetStandMic(7),
            MenuCommand::ToggleHeadset(3),
            MenuCommand::ToggleAutostart,
            MenuCommand::ReloadSettings,
            MenuCommand::Exit,
        ] {
            assert_eq!(MenuCommand::from_id(command.id()), Some(command));
        }
        assert_eq!(MenuCommand::from_id(0), None);
        assert_eq!(MenuCommand::from_id(50), None);
    }

    #[test]
    fn test_pick_stand_mic() {
        let action = apply(MenuCommand::SetStandMic(0), &entries(), &Settings::default());
        match action {
            MenuAction::Reconfigure(settings) => {
                assert_eq!(settings.stand_mic_id.as_deref(), Some("id-a"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_headset_toggle_appends_then_removes() {
        let mut settings = Settings {
            headset_mic_ids: vec!["other".into()],
            ..Settings::default()
        };

        if let MenuAction::Reconfigure(next) =
            apply(MenuCommand::ToggleHeadset(1), &entries(), &settings)
        {
            assert_eq!(next.headset_mic_ids, vec!["other", "id-b"]);
            settings = next;
        } else {
            panic!("expected reconfigure");
        }

        if let MenuAction::Reconfigure(next) =
            apply(MenuCommand::ToggleHeadset(1), &entries(), &settings)
        {
            assert_eq!(next.headset_mic_ids, vec!["other"]);
        } else {
            panic!("expected reconfigure");
        }
    }

    #[test]
    fn test_stale_index_is_ignored() {
        assert_eq!(
            apply(MenuCommand::ToggleHeadset(9), &entries(), &Settings::default()),
            MenuAction::Ignore
        );
    }

    #[test]
    fn test_autostart_toggle_and_plain_commands() {
        let action = apply(MenuCommand::ToggleAutostart, &[], &Settings::default());
        assert!(matches!(action, MenuAction::Reconfigure(s) if s.autostart));
        assert_eq!(apply(MenuCommand::Exit, &[], &Settings::default()), MenuAction::Exit);
        assert_eq!(
            apply(MenuCommand::ReloadSettings, &[], &Settings::default()),
            MenuAction::Reload
        );
    }
}
