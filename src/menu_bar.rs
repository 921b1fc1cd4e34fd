//! Live view of the menu bar geometry
//!
//! A [`MenuBarSnapshot`] is the last successful accessibility query. It is
//! never authoritative: a failed query keeps the previous snapshot, and a
//! missing snapshot makes every hit test answer "not in the bar".

use crate::platform::{DisplayInfo, MenuBarItems};
use crate::types::{Point, Rect};

#[derive(Debug, Clone, PartialEq)]
pub struct MenuBarSnapshot {
    pub display: DisplayInfo,
    pub items: MenuBarItems,
}

impl MenuBarSnapshot {
    pub fn new(display: DisplayInfo, items: MenuBarItems) -> Self {
        Self { display, items }
    }

    pub fn bar_frame(&self) -> Rect {
        self.display.menu_bar_frame()
    }

    /// Union of the application menu title frames
    pub fn application_menu_frame(&self) -> Option<Rect> {
        Rect::union_all(&self.items.application_menu_frames)
    }

    /// Frames of status items that are actually on screen
    pub fn on_screen_item_frames(&self) -> Vec<Rect> {
        let bar = self.bar_frame();
        self.items
            .status_items
            .iter()
            .map(|anchor| anchor.frame)
            .filter(|frame| !frame.is_degenerate() && frame.intersects(&bar))
            .collect()
    }

    /// Leading edge of the leftmost on-screen status item
    pub fn first_status_item_x(&self) -> Option<f64> {
        self.on_screen_item_frames()
            .iter()
            .map(Rect::min_x)
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.min(x))))
    }

    /// Pointer is within the vertical band of the bar on this display
    pub fn is_in_bar_band(&self, point: Point) -> bool {
        self.bar_frame().contains(point)
    }

    /// Pointer sits between the last application menu and the first status item
    pub fn is_in_empty_region(&self, point: Point) -> bool {
        if !self.is_in_bar_band(point) {
            return false;
        }
        let bar = self.bar_frame();
        let leading = self
            .application_menu_frame()
            .map_or(bar.min_x(), |frame| frame.max_x());
        let trailing = self.first_status_item_x().unwrap_or(bar.max_x());
        point.x > leading && point.x < trailing
    }
}
