//! Control item coordinator
//!
//! Keeps the control items ordered consistently with where the OS actually
//! placed them. The OS offers no API to reorder status items, so the only
//! source of truth is the observed anchor list; when a control item drifts
//! (the user dragged it, another app inserted an item), the sections are
//! re-derived from the new order.

use std::cmp::Ordering;
use tracing::{debug, info};

use crate::events::{EventBus, SectionEvent};
use crate::platform::StatusAnchor;
use crate::section::{ControlItem, ControlItemState, SectionName, SectionSet};

/// Rank used for visible items: collapsed expanding dividers have no
/// meaningful position and go after everything that does
fn visible_rank(item: &ControlItem) -> u8 {
    if item.state == ControlItemState::HideItems && item.expands_on_hide {
        1
    } else {
        0
    }
}

/// Comparator for control items
///
/// Invisible items sort last and compare equal among themselves, so a stable
/// sort keeps their previous relative order.
pub fn compare_control_items(lhs: &ControlItem, rhs: &ControlItem) -> Ordering {
    match (lhs.is_visible, rhs.is_visible) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (true, true) => visible_rank(lhs)
            .cmp(&visible_rank(rhs))
            .then_with(|| {
                let lhs_pos = lhs.position.unwrap_or(u32::MAX);
                let rhs_pos = rhs.position.unwrap_or(u32::MAX);
                lhs_pos.cmp(&rhs_pos)
            }),
    }
}

/// Stable sort of control items by observed position
pub fn sort_control_items(mut items: Vec<ControlItem>) -> Vec<ControlItem> {
    items.sort_by(compare_control_items);
    items
}

#[derive(Debug, Default)]
pub struct ControlItemCoordinator;

impl ControlItemCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Re-sort control items and hand them back to the sections by index
    ///
    /// Returns `true` when the assignment changed.
    pub fn assign_by_position(&self, sections: &mut SectionSet, bus: &mut EventBus) -> bool {
        let before: Vec<String> = sections
            .iter()
            .map(|s| s.control_item.autosave_name.clone())
            .collect();

        let sorted = sort_control_items(sections.control_items());
        let after: Vec<String> = sorted.iter().map(|i| i.autosave_name.clone()).collect();
        if before == after {
            debug!("Control item order unchanged");
            return false;
        }

        let Ok(items) = <[ControlItem; 3]>::try_from(sorted) else {
            // The arena always holds three items
            return false;
        };
        sections.assign_anchors(items);
        info!(before = ?before, after = ?after, "Re-assigned control items to sections");
        bus.emit(SectionEvent::SectionsReordered);
        true
    }

    /// Record freshly observed anchor frames and ordinals
    ///
    /// Returns `true` when any control item position moved, meaning a
    /// debounced [`Self::assign_by_position`] is due. Control items missing
    /// from the list keep their last observation.
    pub fn observe_anchors(
        &self,
        sections: &mut SectionSet,
        anchors: &[StatusAnchor],
        bus: &mut EventBus,
    ) -> bool {
        let mut moved = false;
        for name in SectionName::ALL {
            let item = &mut sections.get_mut(name).control_item;
            let Some(anchor) = anchors.iter().find(|a| a.id == item.autosave_name) else {
                continue;
            };

            item.window_frame = Some(anchor.frame);
            let position = Some(anchor.ordinal);
            if item.position != position {
                debug!(
                    section = %name,
                    old = ?item.position,
                    new = anchor.ordinal,
                    "Control item position changed"
                );
                item.position = position;
                moved = true;
                bus.emit(SectionEvent::ControlItemMoved { section: name });
            }
        }
        moved
    }
}
