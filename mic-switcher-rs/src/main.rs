#![cfg_attr(windows, windows_subsystem = "windows")]

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("MicSwitcher only runs on Windows")
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    shell::run()
}

#[cfg(windows)]
mod shell {
    use anyhow::Context;
    use mic_switcher_rs::audio::{DeviceEnumerator, TopologyWatch};
    use mic_switcher_rs::platform::{ComGuard, RegistryAutostart};
    use mic_switcher_rs::ui::menu::{self, DeviceEntry, MenuAction, MenuCommand};
    use mic_switcher_rs::ui::{TrayIcon, WM_DEVICE_SWITCHED, WM_TRAY_ICON};
    use mic_switcher_rs::{logging, Backends, DeviceDirectory, EngineOptions, MicSwitcher};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use tracing::{debug, error, info, warn};
    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::WindowsAndMessaging::*;

    struct AppState {
        switcher: Arc<MicSwitcher>,
        tray: TrayIcon,
        /// Rows of the menu currently (or last) shown.
        entries: Vec<DeviceEntry>,
        _topology: Option<TopologyWatch>,
    }

    impl AppState {
        fn new(hwnd: HWND) -> anyhow::Result<Self> {
            let backends = Backends::windows().context("settings location unavailable")?;
            let switcher = Arc::new(MicSwitcher::new(backends, EngineOptions::default()));
            let tray = TrayIcon::new(hwnd, &current_device_label())
                .context("failed to add tray icon")?;

            // HWND is not Send; the raw handle is posted back to this thread.
            let target = hwnd.0 as isize;
            switcher.on_device_switched(move |name| post_switched(target, name));

            let topology = TopologyWatch::register()
                .map_err(|e| warn!(error = %e, "device topology logging unavailable"))
                .ok();

            Ok(Self {
                switcher,
                tray,
                entries: Vec::new(),
                _topology: topology,
            })
        }

        fn start(&self) {
            let settings = self.switcher.load_settings();
            let registered = RegistryAutostart::new().is_enabled();
            if registered != settings.autostart {
                warn!(
                    configured = settings.autostart,
                    registered, "autostart registration differs from settings"
                );
            }
            if settings.is_complete() {
                self.switcher.start_monitoring();
            } else {
                info!("configuration incomplete, waiting for the user");
                self.tray.show_balloon(
                    "MicSwitcher",
                    "Pick a stand microphone and headsets from the tray menu.",
                );
            }
        }

        fn menu_snapshot(&mut self) -> (Vec<DeviceEntry>, mic_switcher_rs::Settings) {
            self.entries = menu::sorted_entries(self.switcher.list_all_microphones());
            (self.entries.clone(), self.switcher.get_current_settings())
        }

        fn on_switched(&self, name: &str) {
            self.tray.set_tooltip(&format!("MicSwitcher: {name}"));
            self.tray
                .show_balloon("Microphone switched", &format!("Active microphone: {name}"));
        }

        /// Returns `true` when the user asked to exit.
        fn handle_command(&self, command: MenuCommand) -> bool {
            let current = self.switcher.get_current_settings();
            match menu::apply(command, &self.entries, &current) {
                MenuAction::Reconfigure(next) => {
                    self.switcher.stop_monitoring();
                    if let Err(e) = self.switcher.save_settings(next) {
                        error!(error = %e, "settings not saved");
                    }
                    if self.switcher.get_current_settings().is_complete() {
                        self.switcher.start_monitoring();
                    }
                }
                MenuAction::Reload => {
                    self.switcher.stop_monitoring();
                    self.start();
                }
                MenuAction::Exit => return true,
                MenuAction::Ignore => {}
            }
            false
        }

        fn shutdown(&self) {
            self.switcher.stop_monitoring();
            self.tray.remove();
        }
    }

    fn current_device_label() -> String {
        let name = DeviceEnumerator::default_device_id()
            .and_then(|id| DeviceEnumerator::new().resolve(&id).ok())
            .map(|device| device.name)
            .unwrap_or_else(|| "no default microphone".to_string());
        format!("MicSwitcher: {name}")
    }

    fn post_switched(hwnd: isize, name: &str) {
        let payload = Box::into_raw(Box::new(name.to_string()));
        let posted = unsafe {
            PostMessageW(
                HWND(hwnd as *mut _),
                WM_DEVICE_SWITCHED,
                WPARAM(0),
                LPARAM(payload as isize),
            )
        };
        if posted.is_err() {
            // Not delivered, so still ours to free.
            drop(unsafe { Box::from_raw(payload) });
        }
    }

    thread_local! {
        static APP_STATE: RefCell<Option<Rc<RefCell<AppState>>>> = const { RefCell::new(None) };
    }

    /// Run `f` on the app state unless it is already borrowed further up the
    /// stack (a modal menu loop dispatching messages).
    fn with_app_state<F, R>(f: F) -> Option<R>
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let app = APP_STATE.with(|state| state.borrow().clone())?;
        let mut app = app.try_borrow_mut().ok()?;
        Some(f(&mut app))
    }

    pub fn run() -> anyhow::Result<()> {
        logging::init(None);
        let _com = ComGuard::new().context("COM initialization failed")?;

        unsafe {
            let instance = GetModuleHandleW(None)?;
            let window_class = w!("MicSwitcherWindow");
            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(window_proc),
                hInstance: instance.into(),
                lpszClassName: window_class,
                ..Default::default()
            };
            RegisterClassExW(&wc);

            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                window_class,
                w!("MicSwitcher"),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                None,
                None,
                instance,
                None,
            )?;

            let app = match AppState::new(hwnd) {
                Ok(app) => Rc::new(RefCell::new(app)),
                Err(e) => {
                    error!(error = ?e, "startup failed");
                    show_error(&format!("MicSwitcher failed to start: {e:#}"));
                    return Err(e);
                }
            };
            app.borrow().start();
            APP_STATE.with(|state| *state.borrow_mut() = Some(app));

            let mut msg = MSG::default();
            while GetMessageW(&mut msg, None, 0, 0).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        APP_STATE.with(|state| state.borrow_mut().take());
        info!("exiting");
        Ok(())
    }

    fn show_error(msg: &str) {
        let msg_wide: Vec<u16> = msg.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            MessageBoxW(
                None,
                PCWSTR(msg_wide.as_ptr()),
                w!("MicSwitcher"),
                MB_OK | MB_ICONERROR,
            );
        }
    }

    fn show_menu(hwnd: HWND) {
        let Some((entries, settings)) = with_app_state(|app| app.menu_snapshot()) else {
            return;
        };
        let mut pt = POINT::default();
        unsafe {
            let _ = GetCursorPos(&mut pt);
            let _ = SetForegroundWindow(hwnd);
        }
        if let Err(e) = menu::show_context_menu(hwnd, pt.x, pt.y, &entries, &settings) {
            warn!(error = %e, "context menu failed");
        }
    }

    unsafe extern "system" fn window_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_TRAY_ICON => {
                let event = (lparam.0 & 0xFFFF) as u32;
                if matches!(event, WM_RBUTTONUP | WM_LBUTTONDBLCLK | WM_CONTEXTMENU) {
                    show_menu(hwnd);
                }
                LRESULT(0)
            }
            WM_DEVICE_SWITCHED => {
                let name = *Box::from_raw(lparam.0 as *mut String);
                if with_app_state(|app| app.on_switched(&name)).is_none() {
                    debug!(name = %name, "switch balloon skipped, app state busy");
                }
                LRESULT(0)
            }
            WM_COMMAND => {
                let cmd_id = (wparam.0 & 0xFFFF) as u32;
                let exit = MenuCommand::from_id(cmd_id)
                    .and_then(|command| with_app_state(|app| app.handle_command(command)))
                    .unwrap_or(false);
                if exit {
                    // Outside the state borrow so WM_DESTROY can shut down.
                    let _ = DestroyWindow(hwnd);
                }
                LRESULT(0)
            }
            WM_DESTROY => {
                with_app_state(|app| app.shutdown());
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}
