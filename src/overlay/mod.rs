//! Overlay geometry engine
//!
//! Keeps the computed background path for the current appearance and the
//! latest menu bar snapshot, plus the wallpaper backdrop used by shaped
//! modes. Geometry that cannot be resolved degrades to simpler shapes instead
//! of failing the draw.

pub mod refresh;
pub mod render;
pub mod shape;

use anyhow::{bail, Result};
use tiny_skia::Pixmap;
use tracing::{debug, info};

use crate::config::AppearanceConfig;
use crate::menu_bar::MenuBarSnapshot;
use crate::platform::WallpaperSnapshot;
use crate::types::Rect;
use shape::{compute_path, OverlayPath, ShapeKind};

#[derive(Debug)]
pub struct OverlayEngine {
    appearance: AppearanceConfig,
    bar: Option<Rect>,
    path: Option<OverlayPath>,
    wallpaper: Option<WallpaperSnapshot>,
    is_dragging: bool,
}

impl OverlayEngine {
    pub fn new(appearance: AppearanceConfig) -> Self {
        Self {
            appearance,
            bar: None,
            path: None,
            wallpaper: None,
            is_dragging: false,
        }
    }

    /// Swap the appearance; the path is recomputed on the next call to
    /// [`Self::recompute`]
    pub fn set_appearance(&mut self, appearance: AppearanceConfig) {
        if appearance.shape_kind == ShapeKind::None {
            self.wallpaper = None;
        }
        self.appearance = appearance;
        self.path = None;
    }

    /// Shaped modes draw the wallpaper outside the shape
    pub fn needs_wallpaper(&self) -> bool {
        self.appearance.shape_kind != ShapeKind::None
    }

    pub fn path(&self) -> Option<&OverlayPath> {
        self.path.as_ref()
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.path.as_ref().map(OverlayPath::bounds)
    }

    pub fn wallpaper(&self) -> Option<&WallpaperSnapshot> {
        self.wallpaper.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.is_dragging
    }

    /// Recompute the path; returns `true` when it changed
    ///
    /// Without a snapshot the last known bar is reused. Without either there
    /// is nothing to draw yet.
    pub fn recompute(&mut self, snapshot: Option<&MenuBarSnapshot>) -> bool {
        if let Some(snapshot) = snapshot {
            self.bar = Some(snapshot.bar_frame());
        }
        let Some(bar) = self.bar else {
            return false;
        };

        let path = compute_path(
            self.appearance.shape_kind,
            &self.appearance.full_shape_info,
            &self.appearance.split_shape_info,
            bar,
            snapshot,
        );
        if self.path.as_ref() == Some(&path) {
            return false;
        }
        debug!(regions = path.regions.len(), split = path.is_split(), bounds = ?path.bounds(), "Overlay path changed");
        self.path = Some(path);
        true
    }

    /// Store a fresh backdrop, or drop it after a failed capture
    pub fn set_wallpaper(&mut self, wallpaper: Option<WallpaperSnapshot>) -> bool {
        if !self.needs_wallpaper() && wallpaper.is_some() {
            return false;
        }
        if self.wallpaper == wallpaper {
            return false;
        }
        self.wallpaper = wallpaper;
        true
    }

    pub fn set_dragging(&mut self, dragging: bool) -> bool {
        if self.is_dragging == dragging {
            return false;
        }
        info!(dragging, "Overlay drag state changed");
        self.is_dragging = dragging;
        true
    }

    pub fn render(&self) -> Result<Pixmap> {
        let (Some(bar), Some(path)) = (self.bar, self.path.as_ref()) else {
            bail!("Overlay has no geometry yet");
        };
        render::render_frame(bar, path, &self.appearance, self.wallpaper.as_ref(), self.is_dragging)
    }
}
