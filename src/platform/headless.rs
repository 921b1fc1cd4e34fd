//! Scripted backend for replay and tests
//!
//! Answers every collaborator query from a [`HeadlessFixture`] that scripts
//! can edit between steps. The wallpaper is a solid color so rendered frames
//! are deterministic.

use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::{
    AppInfo, CaptureError, DisplayId, DisplayInfo, MenuBarItems, MenuBarQuery, Pid, QueryError,
    StatusAnchor, WallpaperCapture, WallpaperSnapshot, WindowInfo,
};
use crate::color::HexColor;
use crate::types::Rect;

/// Everything the scripted OS knows
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeadlessFixture {
    pub display: DisplayInfo,
    #[serde(default)]
    pub items: MenuBarItems,
    #[serde(default)]
    pub windows: Vec<WindowInfo>,
    #[serde(default)]
    pub applications: Vec<AppInfo>,
    /// Solid wallpaper color as hex; `None` makes capture fail
    #[serde(default = "default_wallpaper_color")]
    pub wallpaper_color: Option<String>,
    /// Simulated capture latency
    #[serde(default)]
    pub capture_delay_ms: u64,
    /// Every query fails with this error when set
    #[serde(default)]
    pub query_error: Option<ScriptedQueryError>,
}

/// Serializable stand-in for [`QueryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptedQueryError {
    PermissionDenied,
    MenuBarNotFound,
    Failed,
}

fn default_wallpaper_color() -> Option<String> {
    Some("#3A6EA5".to_string())
}

impl Default for HeadlessFixture {
    fn default() -> Self {
        Self {
            display: DisplayInfo {
                id: 1,
                frame: Rect::new(0.0, 0.0, 1440.0, 900.0),
                menu_bar_height: 24.0,
            },
            items: MenuBarItems::default(),
            windows: Vec::new(),
            applications: Vec::new(),
            wallpaper_color: default_wallpaper_color(),
            capture_delay_ms: 0,
            query_error: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    fixture: Mutex<HeadlessFixture>,
}

impl HeadlessBackend {
    pub fn new(fixture: HeadlessFixture) -> Self {
        Self { fixture: Mutex::new(fixture) }
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessFixture> {
        self.fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_status_items(&self, status_items: Vec<StatusAnchor>) {
        self.lock().items.status_items = status_items;
    }

    pub fn set_application_menu_frames(&self, frames: Vec<Rect>) {
        self.lock().items.application_menu_frames = frames;
    }

    pub fn set_windows(&self, windows: Vec<WindowInfo>) {
        self.lock().windows = windows;
    }

    /// Insert or replace the app with the same pid
    pub fn set_application(&self, app: AppInfo) {
        let mut fixture = self.lock();
        fixture.applications.retain(|a| a.pid != app.pid);
        fixture.applications.push(app);
    }

    pub fn set_query_error(&self, error: Option<ScriptedQueryError>) {
        self.lock().query_error = error;
    }

    pub fn set_wallpaper_color(&self, color: Option<String>) {
        self.lock().wallpaper_color = color;
    }

    pub fn set_capture_delay(&self, delay: Duration) {
        self.lock().capture_delay_ms = delay.as_millis() as u64;
    }

    fn check_query(fixture: &HeadlessFixture) -> Result<(), QueryError> {
        match fixture.query_error {
            None => Ok(()),
            Some(ScriptedQueryError::PermissionDenied) => Err(QueryError::PermissionDenied),
            Some(ScriptedQueryError::MenuBarNotFound) => Err(QueryError::MenuBarNotFound(fixture.display.id)),
            Some(ScriptedQueryError::Failed) => Err(QueryError::Failed("scripted failure".to_string())),
        }
    }
}

impl MenuBarQuery for HeadlessBackend {
    fn main_display(&self) -> Result<DisplayInfo, QueryError> {
        let fixture = self.lock();
        Self::check_query(&fixture)?;
        Ok(fixture.display)
    }

    fn menu_bar_items(&self, display: DisplayId) -> Result<MenuBarItems, QueryError> {
        let fixture = self.lock();
        Self::check_query(&fixture)?;
        if display != fixture.display.id {
            return Err(QueryError::MenuBarNotFound(display));
        }
        Ok(fixture.items.clone())
    }

    fn on_screen_windows(&self) -> Result<Vec<WindowInfo>, QueryError> {
        let fixture = self.lock();
        Self::check_query(&fixture)?;
        Ok(fixture.windows.clone())
    }

    fn application(&self, pid: Pid) -> Option<AppInfo> {
        self.lock().applications.iter().find(|a| a.pid == pid).cloned()
    }
}

impl WallpaperCapture for HeadlessBackend {
    fn capture(&self, display: DisplayId, region: Rect, timeout: Duration)
        -> Result<WallpaperSnapshot, CaptureError> {
        let (color, delay, display_id) = {
            let fixture = self.lock();
            (
                fixture.wallpaper_color.clone(),
                Duration::from_millis(fixture.capture_delay_ms),
                fixture.display.id,
            )
        };

        if display != display_id {
            return Err(CaptureError::Failed(format!("unknown display {display}")));
        }
        if delay > timeout {
            std::thread::sleep(timeout);
            return Err(CaptureError::Timeout(timeout));
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let Some(color) = color else {
            return Err(CaptureError::PermissionDenied);
        };
        let color = HexColor::parse(&color)
            .ok_or_else(|| CaptureError::Failed(format!("invalid wallpaper color '{color}'")))?;

        let width = region.width.ceil().max(0.0) as u32;
        let height = region.height.ceil().max(0.0) as u32;
        debug!(width, height, "Captured scripted wallpaper");
        let rgba = [color.red, color.green, color.blue, 0xFF]
            .repeat(width as usize * height as usize);
        Ok(WallpaperSnapshot { width, height, rgba })
    }
}
