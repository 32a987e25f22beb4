/// Foreground window and primary screen geometry.
///
/// On Windows this uses `GetForegroundWindow`/`GetWindowRect`/`GetSystemMetrics`
/// and resolves the owning process name through `sysinfo`. Elsewhere the desktop
/// never reports a window, which the presence classifier reads as "not gaming".
#[cfg(windows)]
use sysinfo::{Pid, ProcessesToUpdate, System};
#[cfg(windows)]
use windows::Win32::Foundation::{HWND, RECT};
#[cfg(windows)]
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetSystemMetrics, GetWindowRect, GetWindowThreadProcessId, SM_CXSCREEN,
    SM_CYSCREEN,
};

/// Window bounds in screen coordinates; `right`/`bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForegroundWindow {
    /// Lowercase executable name of the owning process, if it could be resolved.
    pub exe_name: Option<String>,
    pub rect: Option<Rect>,
}

pub trait DesktopView {
    /// `None` when there is no foreground window or the API is unavailable.
    fn foreground(&mut self) -> Option<ForegroundWindow>;

    /// Primary display size in pixels.
    fn screen_size(&mut self) -> Option<(i32, i32)>;
}

/// The real desktop of this machine.
pub struct SystemDesktop {
    #[cfg(windows)]
    system: System,
}

impl SystemDesktop {
    pub fn new() -> Self {
        Self {
            #[cfg(windows)]
            system: System::new(),
        }
    }
}

#[cfg(windows)]
impl DesktopView for SystemDesktop {
    fn foreground(&mut self) -> Option<ForegroundWindow> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd == HWND::default() {
            return None;
        }

        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
        let exe_name = if pid > 0 {
            let pid = Pid::from_u32(pid);
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
            self.system
                .process(pid)
                .map(|p| p.name().to_string_lossy().to_lowercase())
        } else {
            None
        };

        let mut raw = RECT::default();
        let rect = match unsafe { GetWindowRect(hwnd, &mut raw) } {
            Ok(()) => Some(Rect {
                left: raw.left,
                top: raw.top,
                right: raw.right,
                bottom: raw.bottom,
            }),
            Err(e) => {
                log::debug!("GetWindowRect failed: {e}");
                None
            }
        };

        Some(ForegroundWindow { exe_name, rect })
    }

    fn screen_size(&mut self) -> Option<(i32, i32)> {
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if width <= 0 || height <= 0 {
            return None;
        }
        Some((width, height))
    }
}

#[cfg(not(windows))]
impl DesktopView for SystemDesktop {
    fn foreground(&mut self) -> Option<ForegroundWindow> {
        None
    }

    fn screen_size(&mut self) -> Option<(i32, i32)> {
        None
    }
}
