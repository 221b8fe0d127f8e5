//! Notification-area icon.

use super::WM_TRAY_ICON;
use windows::core::{Error, Result, HRESULT};
use windows::Win32::Foundation::{GetLastError, COLORREF, HWND, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    Arc, CreateBitmap, CreateCompatibleBitmap, CreateCompatibleDC, CreatePen, CreateSolidBrush,
    DeleteDC, DeleteObject, Ellipse, FillRect, GetDC, GetStockObject, LineTo, MoveToEx,
    ReleaseDC, SelectObject, BLACK_BRUSH, HBRUSH, PS_SOLID,
};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_SHOWTIP, NIF_TIP, NIIF_INFO, NIM_ADD,
    NIM_DELETE, NIM_MODIFY, NIM_SETVERSION, NOTIFYICONDATAW, NOTIFYICON_VERSION_4,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateIconIndirect, DestroyIcon, LoadIconW, HICON, ICONINFO, IDI_APPLICATION,
};

const TRAY_ICON_ID: u32 = 1;

/// Copy `text` into a fixed UTF-16 buffer, truncating and keeping the
/// terminator.
fn fill_wide<const N: usize>(buf: &mut [u16; N], text: &str) {
    let wide: Vec<u16> = text.encode_utf16().take(N - 1).collect();
    buf[..wide.len()].copy_from_slice(&wide);
    buf[wide.len()] = 0;
}

/// Manages the system tray icon
pub struct TrayIcon {
    hwnd: HWND,
    icon: HICON,
    owns_icon: bool,
}

impl TrayIcon {
    pub fn new(hwnd: HWND, tooltip: &str) -> Result<Self> {
        // Fall back to the stock application icon
        let (icon, owns_icon) = match create_microphone_icon() {
            Ok(icon) => (icon, true),
            Err(_) => (unsafe { LoadIconW(None, IDI_APPLICATION)? }, false),
        };

        let tray = Self {
            hwnd,
            icon,
            owns_icon,
        };
        tray.add(tooltip)?;
        Ok(tray)
    }

    fn base_data(&self) -> NOTIFYICONDATAW {
        NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: self.hwnd,
            uID: TRAY_ICON_ID,
            ..Default::default()
        }
    }

    fn add(&self, tooltip: &str) -> Result<()> {
        let mut nid = self.base_data();
        nid.uFlags = NIF_ICON | NIF_MESSAGE | NIF_TIP | NIF_SHOWTIP;
        nid.uCallbackMessage = WM_TRAY_ICON;
        nid.hIcon = self.icon;
        fill_wide(&mut nid.szTip, tooltip);

        unsafe {
            if !Shell_NotifyIconW(NIM_ADD, &nid).as_bool() {
                let err = GetLastError();
                return Err(Error::new(HRESULT::from_win32(err.0), "Shell_NotifyIconW failed"));
            }

            // Set version for modern behavior
            nid.Anonymous.uVersion = NOTIFYICON_VERSION_4;
            let _ = Shell_NotifyIconW(NIM_SETVERSION, &nid);
        }
        Ok(())
    }

    pub fn set_tooltip(&self, tooltip: &str) {
        let mut nid = self.base_data();
        nid.uFlags = NIF_TIP | NIF_SHOWTIP;
        fill_wide(&mut nid.szTip, tooltip);
        unsafe {
            let _ = Shell_NotifyIconW(NIM_MODIFY, &nid);
        }
    }

    /// Show a transient balloon notification.
    pub fn show_balloon(&self, title: &str, text: &str) {
        let mut nid = self.base_data();
        nid.uFlags = NIF_INFO;
        nid.dwInfoFlags = NIIF_INFO;
        fill_wide(&mut nid.szInfoTitle, title);
        fill_wide(&mut nid.szInfo, text);
        unsafe {
            let _ = Shell_NotifyIconW(NIM_MODIFY, &nid);
        }
    }

    pub fn remove(&self) {
        let nid = self.base_data();
        unsafe {
            let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
        }
    }
}

impl Drop for TrayIcon {
    fn drop(&mut self) {
        // Stock icons must not be destroyed
        if self.owns_icon {
            unsafe {
                let _ = DestroyIcon(self.icon);
            }
        }
    }
}

/// Draw a 16x16 microphone glyph.
fn create_microphone_icon() -> Result<HICON> {
    unsafe {
        let size = 16i32;

        let screen_dc = GetDC(None);
        if screen_dc.is_invalid() {
            return Err(Error::from_win32());
        }

        let mem_dc = CreateCompatibleDC(screen_dc);
        if mem_dc.is_invalid() {
            ReleaseDC(None, screen_dc);
            return Err(Error::from_win32());
        }

        let bitmap = CreateCompatibleBitmap(screen_dc, size, size);
        if bitmap.is_invalid() {
            let _ = DeleteDC(mem_dc);
            ReleaseDC(None, screen_dc);
            return Err(Error::from_win32());
        }

        let old_bitmap = SelectObject(mem_dc, bitmap);
        let rect = RECT {
            left: 0,
            top: 0,
            right: size,
            bottom: size,
        };
        FillRect(mem_dc, &rect, HBRUSH(GetStockObject(BLACK_BRUSH).0));

        let color = COLORREF(0x00FFFFFF);
        let pen = CreatePen(PS_SOLID, 1, color);
        let brush = CreateSolidBrush(color);
        let old_pen = SelectObject(mem_dc, pen);
        let old_brush = SelectObject(mem_dc, brush);

        // Capsule, stem and base
        let _ = Ellipse(mem_dc, 5, 1, 11, 9);
        let _ = MoveToEx(mem_dc, 8, 9, None);
        let _ = LineTo(mem_dc, 8, 12);
        let _ = MoveToEx(mem_dc, 5, 12, None);
        let _ = LineTo(mem_dc, 11, 12);
        let _ = Arc(mem_dc, 3, 4, 13, 11, 12, 8, 4, 8);

        SelectObject(mem_dc, old_pen);
        SelectObject(mem_dc, old_brush);
        let _ = DeleteObject(pen);
        let _ = DeleteObject(brush);
        SelectObject(mem_dc, old_bitmap);

        let mask = CreateBitmap(size, size, 1, 1, None);
        if mask.is_invalid() {
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(None, screen_dc);
            return Err(Error::from_win32());
        }

        // All-zero mask: fully opaque
        let mask_dc = CreateCompatibleDC(screen_dc);
        let old_mask = SelectObject(mask_dc, mask);
        FillRect(mask_dc, &rect, HBRUSH(GetStockObject(BLACK_BRUSH).0));
        SelectObject(mask_dc, old_mask);
        let _ = DeleteDC(mask_dc);

        let _ = DeleteDC(mem_dc);
        ReleaseDC(None, screen_dc);

        let icon_info = ICONINFO {
            fIcon: TRUE,
            xHotspot: 0,
            yHotspot: 0,
            hbmMask: mask,
            hbmColor: bitmap,
        };
        let icon = CreateIconIndirect(&icon_info);

        let _ = DeleteObject(bitmap);
        let _ = DeleteObject(mask);

        icon
    }
}
