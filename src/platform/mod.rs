//! Collaborator contracts for everything the OS provides
//!
//! The core never talks to the window server directly. Accessibility and
//! window queries go through [`MenuBarQuery`], wallpaper snapshots through
//! [`WallpaperCapture`]. Both may fail; callers treat failure as "nothing to
//! do this cycle".

pub mod headless;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::types::{Point, Rect};

pub type DisplayId = u32;
pub type Pid = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("accessibility permission has not been granted")]
    PermissionDenied,
    #[error("no menu bar found on display {0}")]
    MenuBarNotFound(DisplayId),
    #[error("query failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("wallpaper capture timed out after {0:?}")]
    Timeout(Duration),
    #[error("screen recording permission has not been granted")]
    PermissionDenied,
    #[error("wallpaper capture failed: {0}")]
    Failed(String),
}

/// The display hosting the menu bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub frame: Rect,
    pub menu_bar_height: f64,
}

impl DisplayInfo {
    /// Rectangle covered by the menu bar
    pub fn menu_bar_frame(&self) -> Rect {
        Rect::new(self.frame.x, self.frame.y, self.frame.width, self.menu_bar_height)
    }
}

/// An on-screen status item as reported by the accessibility tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusAnchor {
    /// Autosave name for our own control items, owner-qualified title otherwise
    pub id: String,
    pub frame: Rect,
    /// Ordinal counted from the trailing edge (0 = rightmost)
    pub ordinal: u32,
}

/// Everything a single accessibility query returns for one display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuBarItems {
    /// Ordered status anchors, control items included
    #[serde(default)]
    pub status_items: Vec<StatusAnchor>,
    /// Frames of the frontmost application's menu titles
    #[serde(default)]
    pub application_menu_frames: Vec<Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivationPolicy {
    Regular,
    Accessory,
    Prohibited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    pub pid: Pid,
    #[serde(default)]
    pub bundle_id: Option<String>,
    pub activation_policy: ActivationPolicy,
    pub is_active: bool,
    pub is_finished_launching: bool,
    pub owns_menu_bar: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub owner_pid: Pid,
    pub frame: Rect,
    pub layer: i32,
    #[serde(default)]
    pub title: Option<String>,
}

/// RGBA8 bitmap of the wallpaper beneath the menu bar
#[derive(Debug, Clone, PartialEq)]
pub struct WallpaperSnapshot {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Accessibility and window-server queries
///
/// Implementations may block; the daemon calls them from blocking tasks.
pub trait MenuBarQuery: Send + Sync {
    fn main_display(&self) -> Result<DisplayInfo, QueryError>;

    fn menu_bar_items(&self, display: DisplayId) -> Result<MenuBarItems, QueryError>;

    /// On-screen windows, frontmost first
    fn on_screen_windows(&self) -> Result<Vec<WindowInfo>, QueryError>;

    fn application(&self, pid: Pid) -> Option<AppInfo>;
}

/// Desktop wallpaper capture
pub trait WallpaperCapture: Send + Sync {
    /// Capture the wallpaper under `region`; implementations should honour
    /// `timeout` themselves, callers enforce it regardless
    fn capture(&self, display: DisplayId, region: Rect, timeout: Duration)
        -> Result<WallpaperSnapshot, CaptureError>;
}

/// Topmost titled window under `point` that is not overlay chrome or ours
pub fn window_under_point(
    windows: &[WindowInfo],
    point: Point,
    max_layer: i32,
    host_pid: Pid,
) -> Option<&WindowInfo> {
    windows.iter().find(|w| {
        w.layer < max_layer
            && w.owner_pid != host_pid
            && w.frame.contains(point)
            && w.title.as_deref().is_some_and(|t| !t.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(pid: Pid, layer: i32, title: Option<&str>) -> WindowInfo {
        WindowInfo {
            owner_pid: pid,
            frame: Rect::new(0.0, 0.0, 500.0, 500.0),
            layer,
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn test_window_under_point_skips_overlays_and_host() {
        let windows = vec![
            window(1, 2500, Some("cursor")),
            window(99, 0, Some("our overlay")),
            window(2, 0, None),
            window(3, 0, Some("Document")),
        ];
        let hit = window_under_point(&windows, Point::new(10.0, 10.0), 2000, 99);
        assert_eq!(hit.map(|w| w.owner_pid), Some(3));
    }

    #[test]
    fn test_menu_bar_items_fields_are_optional() {
        let items: MenuBarItems =
            serde_json::from_str(r#"{ "application_menu_frames": [{ "x": 10, "y": 0, "width": 200, "height": 24 }] }"#)
                .unwrap();
        assert!(items.status_items.is_empty());
        assert_eq!(items.application_menu_frames.len(), 1);
        assert_eq!(serde_json::from_str::<MenuBarItems>("{}").unwrap(), MenuBarItems::default());
    }

    #[test]
    fn test_window_under_point_misses() {
        let windows = vec![window(3, 0, Some("Document"))];
        assert!(window_under_point(&windows, Point::new(900.0, 10.0), 2000, 99).is_none());
    }

    #[test]
    fn test_menu_bar_frame() {
        let display = DisplayInfo {
            id: 1,
            frame: Rect::new(0.0, 0.0, 1440.0, 900.0),
            menu_bar_height: 24.0,
        };
        assert_eq!(display.menu_bar_frame(), Rect::new(0.0, 0.0, 1440.0, 24.0));
    }
}
