//! Shape computation for the menu bar overlay
//!
//! Every drawable region is a pill-like segment: a central rectangle spanning
//! the region minus its own height, unioned with one end cap per side, each
//! cap as wide as the bar is tall. A square cap turns the end into a plain
//! corner, a round cap into a semicircle.

use serde::{Deserialize, Serialize};
use tiny_skia::PathBuilder;
use tracing::debug;

use crate::constants::overlay::{KAPPA, LEADING_REGION_PADDING, TRAILING_REGION_PADDING};
use crate::menu_bar::MenuBarSnapshot;
use crate::types::Rect;
#[cfg(test)]
use crate::types::Point;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndCap {
    Square,
    #[default]
    Round,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    #[default]
    None,
    Full,
    Split,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullShapeInfo {
    #[serde(default)]
    pub leading_end_cap: EndCap,
    #[serde(default)]
    pub trailing_end_cap: EndCap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitShapeInfo {
    #[serde(default)]
    pub leading: FullShapeInfo,
    #[serde(default)]
    pub trailing: FullShapeInfo,
}

impl SplitShapeInfo {
    /// End caps used when the split regions collapse into one
    pub fn as_full(&self) -> FullShapeInfo {
        FullShapeInfo {
            leading_end_cap: self.leading.leading_end_cap,
            trailing_end_cap: self.trailing.trailing_end_cap,
        }
    }
}

/// One segment of the overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionShape {
    pub bounds: Rect,
    pub leading_cap: EndCap,
    pub trailing_cap: EndCap,
}

impl RegionShape {
    pub fn new(bounds: Rect, info: FullShapeInfo) -> Self {
        Self {
            bounds,
            leading_cap: info.leading_end_cap,
            trailing_cap: info.trailing_end_cap,
        }
    }

    /// Plain rectangle (square caps on both ends)
    pub fn rectangle(bounds: Rect) -> Self {
        Self {
            bounds,
            leading_cap: EndCap::Square,
            trailing_cap: EndCap::Square,
        }
    }

    /// A region narrower than it is tall would have overlapping caps
    pub fn is_drawable(&self) -> bool {
        !self.bounds.is_degenerate() && self.bounds.width >= self.bounds.height
    }

    /// Append the outline of the union as one closed contour
    fn append_to(&self, pb: &mut PathBuilder) {
        let x = self.bounds.x as f32;
        let y = self.bounds.y as f32;
        let w = self.bounds.width as f32;
        let h = self.bounds.height as f32;
        let r = h / 2.0;
        let k = KAPPA * r;
        let cy = y + r;

        pb.move_to(x + r, y);
        pb.line_to(x + w - r, y);
        match self.trailing_cap {
            EndCap::Square => {
                pb.line_to(x + w, y);
                pb.line_to(x + w, y + h);
            }
            EndCap::Round => {
                let cx = x + w - r;
                pb.cubic_to(cx + k, y, x + w, cy - k, x + w, cy);
                pb.cubic_to(x + w, cy + k, cx + k, y + h, cx, y + h);
            }
        }
        pb.line_to(x + r, y + h);
        match self.leading_cap {
            EndCap::Square => {
                pb.line_to(x, y + h);
                pb.line_to(x, y);
            }
            EndCap::Round => {
                let cx = x + r;
                pb.cubic_to(cx - k, y + h, x, cy + k, x, cy);
                pb.cubic_to(x, cy - k, cx - k, y, cx, y);
            }
        }
        pb.close();
    }
}

/// Hit testing, used to check the geometry against the drawn outline
#[cfg(test)]
impl RegionShape {
    fn radius(&self) -> f64 {
        self.bounds.height / 2.0
    }

    pub fn center_rect(&self) -> Rect {
        let b = self.bounds;
        Rect::new(b.x + self.radius(), b.y, (b.width - b.height).max(0.0), b.height)
    }

    pub fn leading_cap_rect(&self) -> Rect {
        let b = self.bounds;
        Rect::new(b.x, b.y, b.height, b.height)
    }

    pub fn trailing_cap_rect(&self) -> Rect {
        let b = self.bounds;
        Rect::new(b.max_x() - b.height, b.y, b.height, b.height)
    }

    fn cap_contains(cap: EndCap, rect: Rect, point: Point) -> bool {
        match cap {
            EndCap::Square => rect.contains(point),
            EndCap::Round => {
                let r = rect.height / 2.0;
                let dx = point.x - (rect.x + rect.width / 2.0);
                let dy = point.y - (rect.y + r);
                dx * dx + dy * dy < r * r
            }
        }
    }

    /// Hit test against the union of the center and both caps
    pub fn contains(&self, point: Point) -> bool {
        self.center_rect().contains(point)
            || Self::cap_contains(self.leading_cap, self.leading_cap_rect(), point)
            || Self::cap_contains(self.trailing_cap, self.trailing_cap_rect(), point)
    }
}

/// Drawable overlay outline: one region, or two in split mode
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPath {
    pub regions: Vec<RegionShape>,
}

impl OverlayPath {
    pub fn bounds(&self) -> Rect {
        Rect::union_all(self.regions.iter().map(|r| &r.bounds)).unwrap_or_default()
    }

    pub fn is_split(&self) -> bool {
        self.regions.len() > 1
    }

    #[cfg(test)]
    pub fn contains(&self, point: Point) -> bool {
        self.regions.iter().any(|r| r.contains(point))
    }

    /// Outline as a tiny-skia path, `None` when nothing is drawable
    pub fn to_skia_path(&self) -> Option<tiny_skia::Path> {
        let mut pb = PathBuilder::new();
        for region in self.regions.iter().filter(|r| !r.bounds.is_degenerate()) {
            region.append_to(&mut pb);
        }
        pb.finish()
    }
}

/// Full-bar rectangle, the `none` shape and the universal fallback
pub fn full_bar_path(bar: Rect) -> OverlayPath {
    OverlayPath {
        regions: vec![RegionShape::rectangle(bar)],
    }
}

/// Single region spanning the whole bar with the requested end caps
pub fn full_shape_path(bar: Rect, info: &FullShapeInfo) -> OverlayPath {
    let region = RegionShape::new(bar, *info);
    if !region.is_drawable() {
        debug!(bar = ?bar, "Bar too small for end caps, using full-bar rectangle");
        return full_bar_path(bar);
    }
    OverlayPath { regions: vec![region] }
}

/// Leading split region: from the bar's leading edge past the application menu
pub fn leading_region_bounds(bar: Rect, application_menu_frame: Option<Rect>) -> Option<Rect> {
    let menu = application_menu_frame.filter(|f| !f.is_degenerate())?;
    let width = menu.max_x() - bar.min_x() + LEADING_REGION_PADDING;
    Some(Rect::new(bar.x, bar.y, width.min(bar.width), bar.height))
}

/// Trailing split region: as wide as the on-screen status items combined,
/// plus padding, anchored at the bar's trailing edge
pub fn trailing_region_bounds(bar: Rect, item_frames: &[Rect]) -> Option<Rect> {
    let visible: Vec<&Rect> = item_frames.iter().filter(|f| !f.is_degenerate()).collect();
    if visible.is_empty() {
        return None;
    }
    let combined: f64 = visible.iter().map(|f| f.width).sum();
    let width = (combined + TRAILING_REGION_PADDING).min(bar.width);
    Some(Rect::new(bar.max_x() - width, bar.y, width, bar.height))
}

/// Two independent regions, or the full shape when they would collide
pub fn split_shape_path(
    bar: Rect,
    leading: Option<Rect>,
    trailing: Option<Rect>,
    info: &SplitShapeInfo,
) -> OverlayPath {
    let regions = leading
        .zip(trailing)
        .map(|(l, t)| (RegionShape::new(l, info.leading), RegionShape::new(t, info.trailing)));

    match regions {
        Some((l, t)) if l.is_drawable() && t.is_drawable() && !l.bounds.intersects(&t.bounds) => {
            OverlayPath { regions: vec![l, t] }
        }
        _ => {
            debug!(leading = ?leading, trailing = ?trailing, "Split regions unusable, falling back to full shape");
            full_shape_path(bar, &info.as_full())
        }
    }
}

/// Path for the configured shape using the latest menu bar snapshot
///
/// Without a snapshot the split shape cannot be resolved and degrades to the
/// full shape; a degenerate bar degrades to the full-bar rectangle.
pub fn compute_path(
    kind: ShapeKind,
    full: &FullShapeInfo,
    split: &SplitShapeInfo,
    bar: Rect,
    snapshot: Option<&MenuBarSnapshot>,
) -> OverlayPath {
    if bar.is_degenerate() {
        return full_bar_path(bar);
    }
    match kind {
        ShapeKind::None => full_bar_path(bar),
        ShapeKind::Full => full_shape_path(bar, full),
        ShapeKind::Split => {
            let leading = snapshot.and_then(|s| leading_region_bounds(bar, s.application_menu_frame()));
            let trailing = snapshot.and_then(|s| trailing_region_bounds(bar, &s.on_screen_item_frames()));
            split_shape_path(bar, leading, trailing, split)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DisplayInfo, MenuBarItems, StatusAnchor};

    fn bar() -> Rect {
        Rect::new(0.0, 0.0, 300.0, 24.0)
    }

    fn round_square() -> SplitShapeInfo {
        SplitShapeInfo {
            leading: FullShapeInfo { leading_end_cap: EndCap::Round, trailing_end_cap: EndCap::Square },
            trailing: FullShapeInfo { leading_end_cap: EndCap::Square, trailing_end_cap: EndCap::Square },
        }
    }

    #[test]
    fn test_overlapping_split_regions_fall_back_to_full() {
        let info = round_square();
        let leading = Some(Rect::new(0.0, 0.0, 150.0, 24.0));
        let trailing = Some(Rect::new(100.0, 0.0, 200.0, 24.0));

        let split = split_shape_path(bar(), leading, trailing, &info);
        let full = full_shape_path(bar(), &info.as_full());
        assert_eq!(split, full);
        assert!(!split.is_split());
        assert_eq!(split.regions[0].leading_cap, EndCap::Round);
        assert_eq!(split.regions[0].trailing_cap, EndCap::Square);
    }

    #[test]
    fn test_disjoint_split_regions() {
        let leading = Some(Rect::new(0.0, 0.0, 100.0, 24.0));
        let trailing = Some(Rect::new(200.0, 0.0, 100.0, 24.0));
        let path = split_shape_path(bar(), leading, trailing, &SplitShapeInfo::default());
        assert!(path.is_split());
        assert!(!path.contains(Point::new(150.0, 12.0)));
        assert!(path.contains(Point::new(50.0, 12.0)));
        assert!(path.contains(Point::new(250.0, 12.0)));
    }

    #[test]
    fn test_missing_split_region_falls_back() {
        let path = split_shape_path(bar(), None, Some(Rect::new(200.0, 0.0, 100.0, 24.0)), &SplitShapeInfo::default());
        assert_eq!(path, full_shape_path(bar(), &FullShapeInfo::default()));
    }

    #[test]
    fn test_degenerate_split_region_falls_back() {
        let leading = Some(Rect::new(0.0, 0.0, 10.0, 24.0));
        let trailing = Some(Rect::new(200.0, 0.0, 100.0, 24.0));
        let path = split_shape_path(bar(), leading, trailing, &SplitShapeInfo::default());
        assert!(!path.is_split());
    }

    #[test]
    fn test_region_components() {
        let region = RegionShape::new(bar(), FullShapeInfo::default());
        assert_eq!(region.center_rect(), Rect::new(12.0, 0.0, 276.0, 24.0));
        assert_eq!(region.leading_cap_rect(), Rect::new(0.0, 0.0, 24.0, 24.0));
        assert_eq!(region.trailing_cap_rect(), Rect::new(276.0, 0.0, 24.0, 24.0));
    }

    #[test]
    fn test_round_caps_exclude_corners() {
        let round = full_shape_path(bar(), &FullShapeInfo::default());
        assert!(!round.contains(Point::new(0.5, 0.5)));
        assert!(!round.contains(Point::new(299.5, 23.5)));
        assert!(round.contains(Point::new(1.0, 12.0)));

        let square = full_shape_path(
            bar(),
            &FullShapeInfo { leading_end_cap: EndCap::Square, trailing_end_cap: EndCap::Square },
        );
        assert!(square.contains(Point::new(0.5, 0.5)));
        assert!(square.contains(Point::new(299.5, 23.5)));
    }

    #[test]
    fn test_none_shape_is_full_bar_rect() {
        let path = compute_path(ShapeKind::None, &FullShapeInfo::default(), &SplitShapeInfo::default(), bar(), None);
        assert_eq!(path, full_bar_path(bar()));
        assert_eq!(path.bounds(), bar());
    }

    #[test]
    fn test_degenerate_bar_degrades_to_rect() {
        let empty = Rect::new(0.0, 0.0, 0.0, 24.0);
        let path = compute_path(ShapeKind::Split, &FullShapeInfo::default(), &SplitShapeInfo::default(), empty, None);
        assert_eq!(path, full_bar_path(empty));
        assert!(path.to_skia_path().is_none());
    }

    #[test]
    fn test_compute_split_from_snapshot() {
        let snapshot = MenuBarSnapshot::new(
            DisplayInfo { id: 1, frame: Rect::new(0.0, 0.0, 1000.0, 800.0), menu_bar_height: 24.0 },
            MenuBarItems {
                status_items: vec![StatusAnchor { id: "Clock".into(), frame: Rect::new(900.0, 0.0, 80.0, 24.0), ordinal: 0 }],
                application_menu_frames: vec![Rect::new(20.0, 0.0, 180.0, 24.0)],
            },
        );
        let bar = snapshot.bar_frame();
        let path = compute_path(ShapeKind::Split, &FullShapeInfo::default(), &SplitShapeInfo::default(), bar, Some(&snapshot));
        assert!(path.is_split());
        assert_eq!(path.regions[0].bounds, Rect::new(0.0, 0.0, 210.0, 24.0));
        assert_eq!(path.regions[1].bounds, Rect::new(913.0, 0.0, 87.0, 24.0));
    }

    #[test]
    fn test_trailing_region_ignores_gaps_between_items() {
        let bar = Rect::new(0.0, 0.0, 1000.0, 24.0);
        let frames = [Rect::new(960.0, 0.0, 40.0, 24.0), Rect::new(600.0, 0.0, 30.0, 24.0)];
        let trailing = trailing_region_bounds(bar, &frames).unwrap();
        assert_eq!(trailing, Rect::new(923.0, 0.0, 77.0, 24.0));

        let leading = leading_region_bounds(bar, Some(Rect::new(10.0, 0.0, 400.0, 24.0)));
        let path = split_shape_path(bar, leading, Some(trailing), &SplitShapeInfo::default());
        assert!(path.is_split());
    }

    #[test]
    fn test_trailing_region_needs_items() {
        assert_eq!(trailing_region_bounds(bar(), &[]), None);
        assert_eq!(trailing_region_bounds(bar(), &[Rect::new(50.0, 0.0, 0.0, 24.0)]), None);
    }

    #[test]
    fn test_split_without_snapshot_uses_full() {
        let path = compute_path(ShapeKind::Split, &FullShapeInfo::default(), &round_square(), bar(), None);
        assert_eq!(path, full_shape_path(bar(), &round_square().as_full()));
    }

    #[test]
    fn test_skia_path_bounds() {
        let path = full_shape_path(bar(), &FullShapeInfo::default()).to_skia_path().unwrap();
        let bounds = path.bounds();
        assert!((bounds.left() - 0.0).abs() < 0.01);
        assert!((bounds.right() - 300.0).abs() < 0.01);
        assert!((bounds.bottom() - 24.0).abs() < 0.01);
    }
}
