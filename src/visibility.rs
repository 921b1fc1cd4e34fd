//! Visibility state machine
//!
//! Each section is either shown or hidden, stored as its control item's
//! state. Transitions respect the containment order: showing a section shows
//! every section below it, hiding a section hides every section above it.
//! The machine also owns the hover-suppression latch, the timed rehide
//! monitors and the drag reveal bookkeeping.

use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{Preferences, RehideStrategy};
use crate::events::{EventBus, SectionEvent};
use crate::menu_bar::MenuBarSnapshot;
use crate::scheduler::{TimerKey, Timers};
use crate::section::{ControlItemState, SectionName, SectionSet};
use crate::types::Point;

/// Everything a transition may touch, passed explicitly
pub struct MachineContext<'a> {
    pub sections: &'a mut SectionSet,
    pub bus: &'a mut EventBus,
    pub timers: &'a mut Timers,
    pub prefs: &'a Preferences,
    pub now: Instant,
}

#[derive(Debug, Default)]
pub struct VisibilityStateMachine {
    /// Set by explicit clicks on the bar; blocks hover-driven show and hide
    /// until the next hide transition
    show_on_hover_prevented: bool,
    /// Sections watched by the timed rehide rule
    rehide_monitors: BTreeSet<SectionName>,
    /// Lowest section force-shown by a Command-drag, hidden again on mouse up
    drag_revealed: Option<SectionName>,
}

impl VisibilityStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_show_on_hover_prevented(&self) -> bool {
        self.show_on_hover_prevented
    }

    pub fn prevent_show_on_hover(&mut self) {
        if !self.show_on_hover_prevented {
            debug!("Show on hover suppressed by user interaction");
        }
        self.show_on_hover_prevented = true;
    }

    pub fn is_monitoring(&self, section: SectionName) -> bool {
        self.rehide_monitors.contains(&section)
    }

    pub fn has_monitors(&self) -> bool {
        !self.rehide_monitors.is_empty()
    }

    /// Show `name` and every section below it
    ///
    /// Returns `true` when any section changed. Disabled sections refuse.
    pub fn show(&mut self, name: SectionName, ctx: &mut MachineContext) -> bool {
        if !ctx.sections.get(name).is_enabled {
            debug!(section = %name, "Ignoring show of disabled section");
            return false;
        }

        let mut changed = false;
        for section in name.and_below() {
            let item = &mut ctx.sections.get_mut(section).control_item;
            if item.state != ControlItemState::ShowItems {
                item.state = ControlItemState::ShowItems;
                changed = true;
                info!(section = %section, "Section shown");
                ctx.bus.emit(SectionEvent::SectionShown { section });
            }
        }

        if ctx.prefs.active_rehide_strategy() == Some(RehideStrategy::Timed) {
            for section in name.and_below().filter(|s| *s != SectionName::Visible) {
                if self.rehide_monitors.insert(section) {
                    debug!(section = %section, "Started rehide monitor");
                }
            }
        }
        changed
    }

    /// Hide `name` and every section above it
    ///
    /// Always clears the hover-suppression latch and cancels the rehide
    /// machinery of the affected sections.
    pub fn hide(&mut self, name: SectionName, ctx: &mut MachineContext) -> bool {
        let mut changed = false;
        // Top-down so every intermediate state respects containment
        for section in name.and_above().collect::<Vec<_>>().into_iter().rev() {
            let item = &mut ctx.sections.get_mut(section).control_item;
            if item.state != ControlItemState::HideItems {
                item.state = ControlItemState::HideItems;
                changed = true;
                info!(section = %section, "Section hidden");
                ctx.bus.emit(SectionEvent::SectionHidden { section });
            }
            if self.rehide_monitors.remove(&section) {
                debug!(section = %section, "Stopped rehide monitor");
            }
            ctx.timers.cancel(&TimerKey::RehideConfirm(section));
        }

        if name == SectionName::Hidden || name == SectionName::Visible {
            ctx.timers.cancel(&TimerKey::HoverHide);
            ctx.timers.cancel(&TimerKey::SmartRehide);
            ctx.timers.cancel_where(|k| matches!(k, TimerKey::FocusRehide { .. }));
        }
        if self.drag_revealed.is_some_and(|s| s >= name) {
            self.drag_revealed = None;
        }
        if self.show_on_hover_prevented {
            debug!("Show on hover suppression cleared");
        }
        self.show_on_hover_prevented = false;
        changed
    }

    pub fn toggle(&mut self, name: SectionName, ctx: &mut MachineContext) -> bool {
        if ctx.sections.is_shown(name) {
            self.hide(name, ctx)
        } else {
            self.show(name, ctx)
        }
    }

    /// Force every enabled section open for rearranging items
    pub fn reveal_all_for_drag(&mut self, ctx: &mut MachineContext) {
        if self.drag_revealed.is_some() {
            return;
        }
        let lowest_hidden = SectionName::ALL
            .into_iter()
            .find(|s| ctx.sections.get(*s).is_enabled && !ctx.sections.is_shown(*s));
        let Some(lowest_hidden) = lowest_hidden else {
            return;
        };

        let top = SectionName::ALL
            .into_iter()
            .rev()
            .find(|s| ctx.sections.get(*s).is_enabled)
            .unwrap_or(SectionName::Visible);
        info!(from = %lowest_hidden, to = %top, "Revealing all sections for drag");
        self.show(top, ctx);
        self.drag_revealed = Some(lowest_hidden);
    }

    /// Undo [`Self::reveal_all_for_drag`]
    pub fn restore_after_drag(&mut self, ctx: &mut MachineContext) {
        if let Some(section) = self.drag_revealed.take() {
            info!(section = %section, "Restoring sections after drag");
            // Restoring is not a user dismissal; keep the latch as it was
            let prevented = self.show_on_hover_prevented;
            self.hide(section, ctx);
            self.show_on_hover_prevented = prevented;
        }
    }

    /// Timed rule: arm or cancel the confirm timers as the pointer moves
    pub fn track_pointer_for_rehide(
        &mut self,
        point: Point,
        snapshot: &MenuBarSnapshot,
        ctx: &mut MachineContext,
    ) {
        let below = point.y >= snapshot.bar_frame().max_y();
        for section in self.rehide_monitors.iter().copied() {
            let key = TimerKey::RehideConfirm(section);
            if below {
                ctx.timers.arm_if_idle(key, ctx.now, ctx.prefs.rehide_interval());
            } else if ctx.timers.cancel(&key) {
                debug!(section = %section, "Pointer returned to the bar, rehide cancelled");
            }
        }
    }

    /// Drop everything that belongs to the previous rehide rule
    pub fn reset_rehide(&mut self, ctx: &mut MachineContext) {
        self.rehide_monitors.clear();
        ctx.timers.cancel_where(|k| {
            matches!(
                k,
                TimerKey::RehideConfirm(_) | TimerKey::SmartRehide | TimerKey::FocusRehide { .. }
            )
        });

        if ctx.prefs.active_rehide_strategy() == Some(RehideStrategy::Timed) {
            for section in SectionName::ALL {
                if section != SectionName::Visible && ctx.sections.is_shown(section) {
                    self.rehide_monitors.insert(section);
                }
            }
        }
    }

    /// Enable or disable a section; only `alwaysHidden` can be disabled
    pub fn set_section_enabled(&mut self, name: SectionName, enabled: bool, ctx: &mut MachineContext) -> bool {
        if name != SectionName::AlwaysHidden && !enabled {
            debug!(section = %name, "Only the always-hidden section can be disabled");
            return false;
        }
        if ctx.sections.get(name).is_enabled == enabled {
            return false;
        }
        if !enabled {
            self.hide(name, ctx);
        }
        let section = ctx.sections.get_mut(name);
        section.is_enabled = enabled;
        section.control_item.is_visible = enabled;
        info!(section = %name, enabled, "Section enablement changed");
        ctx.bus.emit(SectionEvent::SectionEnabledChanged { section: name, enabled });
        true
    }
}
