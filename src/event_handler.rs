//! Event trigger layer
//!
//! Maps raw pointer, keyboard and workspace events to semantic actions on the
//! visibility state machine. Every delayed action is armed on the shared
//! timer set and re-validated against the latest known state when it fires,
//! so a trigger invalidated by later pointer motion is dropped.

use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Preferences, RehideStrategy};
use crate::constants::{input, timing};
use crate::events::{ContextMenuItem, EventBus, SectionEvent};
use crate::hotkeys::{KeyCombination, Modifiers};
use crate::menu_bar::MenuBarSnapshot;
use crate::platform::{window_under_point, MenuBarQuery, Pid};
use crate::scheduler::{TimerKey, Timers};
use crate::section::{SectionName, SectionSet};
use crate::types::Point;
use crate::visibility::{MachineContext, VisibilityStateMachine};

/// Raw input as delivered by the OS event taps (or a replay script)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    PointerMoved {
        location: Point,
    },
    LeftMouseDown {
        location: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    LeftMouseUp {
        location: Point,
    },
    LeftMouseDragged {
        location: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    RightMouseDown {
        location: Point,
    },
    ScrollWheel {
        location: Point,
        delta_y: f64,
    },
    HotkeyPressed {
        combination: KeyCombination,
    },
    FrontmostAppChanged {
        pid: Pid,
    },
    ActiveSpaceChanged,
    ScreenParametersChanged,
    AppearanceChanged,
}

/// Work the caller has to schedule after an event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    /// Re-query anchors and recapture the wallpaper now
    Refresh,
}

/// Everything a trigger may read or mutate
pub struct TriggerContext<'a> {
    pub machine: &'a mut VisibilityStateMachine,
    pub sections: &'a mut SectionSet,
    pub bus: &'a mut EventBus,
    pub timers: &'a mut Timers,
    pub prefs: &'a Preferences,
    /// Last successful menu bar query; `None` makes every hit test fail
    pub snapshot: Option<&'a MenuBarSnapshot>,
    pub query: &'a dyn MenuBarQuery,
    pub host_pid: Pid,
    pub now: Instant,
}

impl TriggerContext<'_> {
    fn split(&mut self) -> (&mut VisibilityStateMachine, MachineContext<'_>) {
        (
            &mut *self.machine,
            MachineContext {
                sections: &mut *self.sections,
                bus: &mut *self.bus,
                timers: &mut *self.timers,
                prefs: self.prefs,
                now: self.now,
            },
        )
    }

    fn show(&mut self, section: SectionName) -> bool {
        let (machine, mut ctx) = self.split();
        machine.show(section, &mut ctx)
    }

    fn hide(&mut self, section: SectionName) -> bool {
        let (machine, mut ctx) = self.split();
        machine.hide(section, &mut ctx)
    }

    fn toggle(&mut self, section: SectionName) -> bool {
        let (machine, mut ctx) = self.split();
        machine.toggle(section, &mut ctx)
    }

    fn in_empty_region(&self, point: Point) -> bool {
        self.snapshot.is_some_and(|s| s.is_in_empty_region(point))
    }

    fn in_bar_band(&self, point: Point) -> bool {
        self.snapshot.is_some_and(|s| s.is_in_bar_band(point))
    }

    fn on_visible_anchor(&self, point: Point) -> bool {
        self.sections
            .get(SectionName::Visible)
            .control_item
            .window_frame
            .is_some_and(|frame| frame.contains(point))
    }
}

/// Pointer state shared by the individual observers
#[derive(Debug, Default)]
pub struct TriggerLayer {
    last_pointer: Option<Point>,
    is_dragging: bool,
}

impl TriggerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_dragging(&self) -> bool {
        self.is_dragging
    }

    pub fn handle_event(&mut self, event: InputEvent, ctx: &mut TriggerContext) -> Followup {
        match event {
            InputEvent::PointerMoved { location } => self.on_pointer_moved(location, ctx),
            InputEvent::LeftMouseDown { location, modifiers } => {
                self.last_pointer = Some(location);
                self.on_left_mouse_down(location, modifiers, ctx);
            }
            InputEvent::LeftMouseUp { location } => self.on_left_mouse_up(location, ctx),
            InputEvent::LeftMouseDragged { location, modifiers } => {
                self.on_left_mouse_dragged(location, modifiers, ctx)
            }
            InputEvent::RightMouseDown { location } => {
                self.last_pointer = Some(location);
                on_right_mouse_down(location, ctx);
            }
            InputEvent::ScrollWheel { location, delta_y } => on_scroll(location, delta_y, ctx),
            InputEvent::HotkeyPressed { combination } => on_hotkey(&combination, ctx),
            InputEvent::FrontmostAppChanged { pid } => {
                ctx.timers.cancel_where(|k| matches!(k, TimerKey::FocusRehide { .. }));
                if ctx.prefs.active_rehide_strategy() == Some(RehideStrategy::FocusedApp) {
                    confirm_focus_change(pid, 0, ctx);
                }
            }
            InputEvent::ActiveSpaceChanged => {
                ctx.timers.arm(TimerKey::SpaceChanged, ctx.now, timing::SPACE_CHANGE_DEBOUNCE);
            }
            other @ (InputEvent::ScreenParametersChanged | InputEvent::AppearanceChanged) => {
                debug!(event = ?other, "Environment changed, refreshing");
                return Followup::Refresh;
            }
        }
        Followup::None
    }

    /// Confirm a fired timer against the current state and commit its action
    pub fn fire_timer(&mut self, key: TimerKey, ctx: &mut TriggerContext) -> Followup {
        match key {
            TimerKey::HoverShow => {
                if self.hover_enabled(ctx)
                    && !ctx.sections.is_shown(SectionName::Hidden)
                    && self.last_pointer.is_some_and(|p| ctx.in_empty_region(p))
                {
                    info!("Hover confirmed, showing hidden section");
                    ctx.show(SectionName::Hidden);
                }
            }
            TimerKey::HoverHide => {
                if self.hover_enabled(ctx)
                    && ctx.sections.is_shown(SectionName::Hidden)
                    && self.last_pointer.is_some_and(|p| !ctx.in_bar_band(p))
                {
                    info!("Pointer left the bar, hiding hidden section");
                    ctx.hide(SectionName::Hidden);
                }
            }
            TimerKey::ClickShow(section) => {
                if ctx.prefs.show_on_click && !self.is_dragging && !ctx.sections.is_shown(section) {
                    info!(section = %section, "Click confirmed, showing section");
                    ctx.show(section);
                }
            }
            TimerKey::SmartRehide => {
                if ctx.prefs.active_rehide_strategy() == Some(RehideStrategy::Smart)
                    && !self.is_dragging
                    && self.last_pointer.is_some_and(|p| !ctx.in_bar_band(p))
                {
                    info!("Smart rehide confirmed");
                    ctx.hide(SectionName::Hidden);
                }
            }
            TimerKey::RehideConfirm(section) => {
                let below = match (self.last_pointer, ctx.snapshot) {
                    (Some(p), Some(snapshot)) => p.y >= snapshot.bar_frame().max_y(),
                    _ => false,
                };
                if below && ctx.machine.is_monitoring(section) {
                    info!(section = %section, "Rehide interval elapsed");
                    ctx.hide(section);
                }
            }
            TimerKey::FocusRehide { pid, attempt } => {
                if ctx.prefs.active_rehide_strategy() == Some(RehideStrategy::FocusedApp) {
                    confirm_focus_change(pid, attempt, ctx);
                }
            }
            TimerKey::SpaceChanged => return Followup::Refresh,
            // Owned by the manager
            TimerKey::AssignByPosition | TimerKey::PersistSections => {}
        }
        Followup::None
    }

    fn hover_enabled(&self, ctx: &TriggerContext) -> bool {
        ctx.prefs.show_on_hover && !ctx.machine.is_show_on_hover_prevented()
    }

    fn on_pointer_moved(&mut self, location: Point, ctx: &mut TriggerContext) {
        self.last_pointer = Some(location);
        let Some(snapshot) = ctx.snapshot else {
            return;
        };

        if ctx.machine.has_monitors() {
            let (machine, mut machine_ctx) = ctx.split();
            machine.track_pointer_for_rehide(location, snapshot, &mut machine_ctx);
        }

        if !self.hover_enabled(ctx) || self.is_dragging {
            return;
        }
        if ctx.sections.is_shown(SectionName::Hidden) {
            if snapshot.is_in_bar_band(location) {
                ctx.timers.cancel(&TimerKey::HoverHide);
            } else {
                ctx.timers.arm_if_idle(TimerKey::HoverHide, ctx.now, timing::HOVER_HIDE_DELAY);
            }
        } else if snapshot.is_in_empty_region(location) {
            ctx.timers.arm_if_idle(TimerKey::HoverShow, ctx.now, timing::HOVER_SHOW_DELAY);
        } else {
            ctx.timers.cancel(&TimerKey::HoverShow);
        }
    }

    fn on_left_mouse_down(&mut self, location: Point, modifiers: Modifiers, ctx: &mut TriggerContext) {
        if ctx.in_empty_region(location) {
            ctx.machine.prevent_show_on_hover();
            ctx.timers.cancel(&TimerKey::HoverShow);
            if ctx.prefs.show_on_click {
                let target = if modifiers.option && ctx.sections.get(SectionName::AlwaysHidden).is_enabled {
                    SectionName::AlwaysHidden
                } else {
                    SectionName::Hidden
                };
                debug!(section = %target, "Click in empty region");
                ctx.timers.arm(TimerKey::ClickShow(target), ctx.now, timing::CLICK_SHOW_DELAY);
            }
        } else if ctx.on_visible_anchor(location) {
            ctx.machine.prevent_show_on_hover();
        }
    }

    fn on_left_mouse_up(&mut self, location: Point, ctx: &mut TriggerContext) {
        self.last_pointer = Some(location);

        if self.is_dragging {
            self.is_dragging = false;
            ctx.bus.emit(SectionEvent::DraggingChanged { dragging: false });
            let (machine, mut machine_ctx) = ctx.split();
            machine.restore_after_drag(&mut machine_ctx);
            return;
        }

        if ctx.prefs.active_rehide_strategy() != Some(RehideStrategy::Smart)
            || !ctx.sections.is_shown(SectionName::Hidden)
            || ctx.snapshot.is_none()
            || ctx.in_bar_band(location)
        {
            return;
        }
        if click_signals_other_app(location, ctx) {
            ctx.timers.arm(TimerKey::SmartRehide, ctx.now, timing::SMART_REHIDE_DELAY);
        }
    }

    fn on_left_mouse_dragged(&mut self, location: Point, modifiers: Modifiers, ctx: &mut TriggerContext) {
        self.last_pointer = Some(location);
        if self.is_dragging || !modifiers.command || !ctx.in_bar_band(location) {
            return;
        }

        info!("Command-drag in the menu bar started");
        self.is_dragging = true;
        ctx.timers.cancel(&TimerKey::HoverShow);
        ctx.timers.cancel(&TimerKey::HoverHide);
        ctx.bus.emit(SectionEvent::DraggingChanged { dragging: true });
        if ctx.prefs.show_all_sections_on_user_drag {
            let (machine, mut machine_ctx) = ctx.split();
            machine.reveal_all_for_drag(&mut machine_ctx);
        }
    }
}

fn on_right_mouse_down(location: Point, ctx: &mut TriggerContext) {
    if !ctx.in_empty_region(location) || ctx.sections.is_shown(SectionName::Hidden) {
        return;
    }
    ctx.machine.prevent_show_on_hover();
    ctx.bus.emit(SectionEvent::ContextMenuRequested {
        location,
        items: vec![ContextMenuItem::EditAppearance, ContextMenuItem::OpenSettings],
    });
}

fn on_scroll(location: Point, delta_y: f64, ctx: &mut TriggerContext) {
    if !ctx.prefs.show_on_scroll || !ctx.in_bar_band(location) {
        return;
    }
    if delta_y > input::SCROLL_THRESHOLD {
        ctx.machine.prevent_show_on_hover();
        ctx.show(SectionName::Hidden);
    } else if delta_y < -input::SCROLL_THRESHOLD {
        ctx.hide(SectionName::Hidden);
    }
}

fn on_hotkey(combination: &KeyCombination, ctx: &mut TriggerContext) {
    let bound = ctx
        .sections
        .iter()
        .find(|s| s.hotkey.as_ref() == Some(combination))
        .map(|s| s.name);
    match bound {
        Some(section) => {
            info!(section = %section, hotkey = %combination, "Hotkey toggles section");
            ctx.machine.prevent_show_on_hover();
            ctx.toggle(section);
        }
        None => debug!(hotkey = %combination, "No section bound to hotkey"),
    }
}

/// Smart rule: does the window under the click belong to an app the user is
/// switching to?
fn click_signals_other_app(location: Point, ctx: &TriggerContext) -> bool {
    let policy = &ctx.prefs.smart_rehide;
    let windows = match ctx.query.on_screen_windows() {
        Ok(windows) => windows,
        Err(e) => {
            warn!(error = %e, "Failed to list windows for smart rehide");
            return false;
        }
    };
    let Some(window) = window_under_point(&windows, location, policy.max_window_layer, ctx.host_pid) else {
        return false;
    };
    let Some(app) = ctx.query.application(window.owner_pid) else {
        debug!(pid = window.owner_pid, "Window owner vanished");
        return false;
    };

    if app
        .bundle_id
        .as_ref()
        .is_some_and(|id| policy.always_rehide_bundle_ids.contains(id))
    {
        return true;
    }
    (!policy.require_active || app.is_active) && app.activation_policy == policy.required_activation_policy
}

/// Focus rule: hide once the new frontmost app is launched and owns a menu bar
fn confirm_focus_change(pid: Pid, attempt: u32, ctx: &mut TriggerContext) {
    if pid == ctx.host_pid || !ctx.sections.is_shown(SectionName::Hidden) {
        return;
    }
    let Some(app) = ctx.query.application(pid) else {
        debug!(pid, "Focused app is gone");
        return;
    };

    if !app.is_finished_launching {
        if attempt < timing::FOCUS_REHIDE_MAX_ATTEMPTS {
            ctx.timers.arm(
                TimerKey::FocusRehide { pid, attempt: attempt + 1 },
                ctx.now,
                timing::FOCUS_REHIDE_RETRY,
            );
        } else {
            debug!(pid, attempts = attempt, "Focused app never finished launching");
        }
        return;
    }
    if app.owns_menu_bar {
        info!(pid, "Focused app owns the menu bar, hiding");
        ctx.hide(SectionName::Hidden);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::{HeadlessBackend, HeadlessFixture};
    use crate::platform::{ActivationPolicy, AppInfo, DisplayInfo, MenuBarItems, WindowInfo};
    use crate::types::Rect;
    use std::time::Duration;

    const HOST_PID: Pid = 1;

    struct Harness {
        triggers: TriggerLayer,
        machine: VisibilityStateMachine,
        sections: SectionSet,
        bus: EventBus,
        timers: Timers,
        prefs: Preferences,
        snapshot: MenuBarSnapshot,
        backend: HeadlessBackend,
        now: Instant,
    }

    impl Harness {
        fn new(prefs: Preferences) -> Self {
            let display = DisplayInfo { id: 1, frame: Rect::new(0.0, 0.0, 1440.0, 900.0), menu_bar_height: 24.0 };
            let items = MenuBarItems {
                status_items: Vec::new(),
                application_menu_frames: vec![Rect::new(10.0, 0.0, 200.0, 24.0)],
            };
            let mut sections = SectionSet::default();
            sections.get_mut(SectionName::Visible).control_item.window_frame =
                Some(Rect::new(1400.0, 0.0, 24.0, 24.0));
            Self {
                triggers: TriggerLayer::new(),
                machine: VisibilityStateMachine::new(),
                sections,
                bus: EventBus::new(),
                timers: Timers::new(),
                prefs,
                snapshot: MenuBarSnapshot::new(display, items),
                backend: HeadlessBackend::new(HeadlessFixture::default()),
                now: Instant::now(),
            }
        }

        fn send(&mut self, event: InputEvent) -> Followup {
            let mut ctx = TriggerContext {
                machine: &mut self.machine,
                sections: &mut self.sections,
                bus: &mut self.bus,
                timers: &mut self.timers,
                prefs: &self.prefs,
                snapshot: Some(&self.snapshot),
                query: &self.backend,
                host_pid: HOST_PID,
                now: self.now,
            };
            self.triggers.handle_event(event, &mut ctx)
        }

        fn advance(&mut self, by: Duration) -> Vec<Followup> {
            self.now += by;
            let due = self.timers.take_due(self.now);
            let mut followups = Vec::new();
            for key in due {
                let mut ctx = TriggerContext {
                    machine: &mut self.machine,
                    sections: &mut self.sections,
                    bus: &mut self.bus,
                    timers: &mut self.timers,
                    prefs: &self.prefs,
                    snapshot: Some(&self.snapshot),
                    query: &self.backend,
                    host_pid: HOST_PID,
                    now: self.now,
                };
                followups.push(self.triggers.fire_timer(key, &mut ctx));
            }
            followups
        }

        fn show_hidden(&mut self) {
            let mut ctx = MachineContext {
                sections: &mut self.sections,
                bus: &mut self.bus,
                timers: &mut self.timers,
                prefs: &self.prefs,
                now: self.now,
            };
            self.machine.show(SectionName::Hidden, &mut ctx);
        }
    }

    fn at(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn hover_prefs() -> Preferences {
        Preferences { show_on_hover: true, auto_rehide: false, ..Default::default() }
    }

    fn app(pid: Pid, bundle: Option<&str>, policy: ActivationPolicy, active: bool) -> AppInfo {
        AppInfo {
            pid,
            bundle_id: bundle.map(str::to_string),
            activation_policy: policy,
            is_active: active,
            is_finished_launching: true,
            owns_menu_bar: true,
        }
    }

    fn window(pid: Pid) -> WindowInfo {
        WindowInfo {
            owner_pid: pid,
            frame: Rect::new(0.0, 24.0, 1440.0, 876.0),
            layer: 0,
            title: Some("Document".to_string()),
        }
    }

    #[test]
    fn test_hover_show_confirms_after_delay() {
        let mut h = Harness::new(hover_prefs());
        h.send(InputEvent::PointerMoved { location: at(600.0, 10.0) });
        assert!(h.timers.is_armed(&TimerKey::HoverShow));

        h.advance(ms(99));
        assert!(!h.sections.is_shown(SectionName::Hidden));
        h.advance(ms(1));
        assert!(h.sections.is_shown(SectionName::Hidden));
    }

    #[test]
    fn test_hover_show_cancelled_by_leaving_region() {
        let mut h = Harness::new(hover_prefs());
        h.send(InputEvent::PointerMoved { location: at(600.0, 10.0) });
        h.advance(ms(50));
        h.send(InputEvent::PointerMoved { location: at(100.0, 10.0) });
        assert!(h.timers.is_empty());
        h.advance(ms(200));
        assert!(!h.sections.is_shown(SectionName::Hidden));
    }

    #[test]
    fn test_hover_disabled_by_default() {
        let mut h = Harness::new(Preferences::default());
        h.send(InputEvent::PointerMoved { location: at(600.0, 10.0) });
        assert!(h.timers.is_empty());
    }

    #[test]
    fn test_hover_hide_when_leaving_band() {
        let mut h = Harness::new(hover_prefs());
        h.show_hidden();
        h.send(InputEvent::PointerMoved { location: at(600.0, 300.0) });
        assert!(h.timers.is_armed(&TimerKey::HoverHide));
        h.advance(ms(100));
        assert!(!h.sections.is_shown(SectionName::Hidden));
        assert!(h.sections.is_shown(SectionName::Visible));
    }

    #[test]
    fn test_click_in_empty_region_shows_and_latches() {
        let mut h = Harness::new(hover_prefs());
        h.send(InputEvent::LeftMouseDown { location: at(600.0, 10.0), modifiers: Modifiers::NONE });
        assert!(h.machine.is_show_on_hover_prevented());
        h.advance(ms(50));
        assert!(h.sections.is_shown(SectionName::Hidden));
        assert!(!h.sections.is_shown(SectionName::AlwaysHidden));

        // Latched: hover no longer arms anything
        h.send(InputEvent::PointerMoved { location: at(600.0, 300.0) });
        assert!(!h.timers.is_armed(&TimerKey::HoverHide));
    }

    #[test]
    fn test_option_click_targets_always_hidden() {
        let mut h = Harness::new(Preferences::default());
        h.send(InputEvent::LeftMouseDown { location: at(600.0, 10.0), modifiers: Modifiers::option() });
        h.advance(ms(50));
        assert!(h.sections.is_shown(SectionName::AlwaysHidden));
        assert!(h.sections.satisfies_containment());
    }

    #[test]
    fn test_click_show_dropped_once_drag_starts() {
        let mut h = Harness::new(Preferences { show_all_sections_on_user_drag: false, ..Default::default() });
        h.send(InputEvent::LeftMouseDown { location: at(600.0, 10.0), modifiers: Modifiers::NONE });
        assert!(h.timers.is_armed(&TimerKey::ClickShow(SectionName::Hidden)));

        h.advance(ms(20));
        h.send(InputEvent::LeftMouseDragged { location: at(620.0, 10.0), modifiers: Modifiers::command() });
        h.bus.drain();
        h.advance(ms(30));
        assert!(!h.sections.is_shown(SectionName::Hidden));
        assert!(!h.bus.has_pending());
    }

    #[test]
    fn test_click_show_skipped_when_already_shown() {
        let mut h = Harness::new(Preferences::default());
        h.send(InputEvent::LeftMouseDown { location: at(600.0, 10.0), modifiers: Modifiers::NONE });
        h.show_hidden();
        h.bus.drain();

        h.advance(ms(50));
        assert!(h.sections.is_shown(SectionName::Hidden));
        assert!(!h.bus.has_pending());
    }

    #[test]
    fn test_click_without_show_on_click_only_latches() {
        let mut h = Harness::new(Preferences { show_on_click: false, ..Default::default() });
        h.send(InputEvent::LeftMouseDown { location: at(600.0, 10.0), modifiers: Modifiers::NONE });
        assert!(h.machine.is_show_on_hover_prevented());
        assert!(h.timers.is_empty());
    }

    #[test]
    fn test_click_on_visible_anchor_latches() {
        let mut h = Harness::new(Preferences { show_on_click: false, ..Default::default() });
        h.send(InputEvent::LeftMouseDown { location: at(1410.0, 10.0), modifiers: Modifiers::NONE });
        assert!(h.machine.is_show_on_hover_prevented());
    }

    #[test]
    fn test_right_click_requests_context_menu() {
        let mut h = Harness::new(Preferences::default());
        h.send(InputEvent::RightMouseDown { location: at(600.0, 10.0) });
        assert_eq!(
            h.bus.drain(),
            vec![SectionEvent::ContextMenuRequested {
                location: at(600.0, 10.0),
                items: vec![ContextMenuItem::EditAppearance, ContextMenuItem::OpenSettings],
            }]
        );

        h.show_hidden();
        h.bus.drain();
        h.send(InputEvent::RightMouseDown { location: at(600.0, 10.0) });
        assert!(!h.bus.has_pending());
    }

    #[test]
    fn test_smart_rehide_for_active_regular_app() {
        let mut h = Harness::new(Preferences::default());
        h.backend.set_windows(vec![window(42)]);
        h.backend.set_application(app(42, Some("com.example.editor"), ActivationPolicy::Regular, true));
        h.show_hidden();

        h.send(InputEvent::LeftMouseUp { location: at(600.0, 400.0) });
        assert!(h.timers.is_armed(&TimerKey::SmartRehide));
        h.advance(ms(250));
        assert!(!h.sections.is_shown(SectionName::Hidden));
    }

    #[test]
    fn test_smart_rehide_for_dock() {
        let mut h = Harness::new(Preferences::default());
        h.backend.set_windows(vec![window(7)]);
        h.backend.set_application(app(7, Some("com.apple.dock"), ActivationPolicy::Accessory, false));
        h.show_hidden();

        h.send(InputEvent::LeftMouseUp { location: at(600.0, 400.0) });
        assert!(h.timers.is_armed(&TimerKey::SmartRehide));
    }

    #[test]
    fn test_smart_rehide_ignores_accessory_app_and_bar_clicks() {
        let mut h = Harness::new(Preferences::default());
        h.backend.set_windows(vec![window(42)]);
        h.backend.set_application(app(42, None, ActivationPolicy::Accessory, true));
        h.show_hidden();

        h.send(InputEvent::LeftMouseUp { location: at(600.0, 400.0) });
        assert!(h.timers.is_empty());

        h.backend.set_application(app(42, None, ActivationPolicy::Regular, true));
        h.send(InputEvent::LeftMouseUp { location: at(600.0, 10.0) });
        assert!(h.timers.is_empty());
    }

    #[test]
    fn test_smart_rehide_rechecks_pointer() {
        let mut h = Harness::new(Preferences::default());
        h.backend.set_windows(vec![window(42)]);
        h.backend.set_application(app(42, None, ActivationPolicy::Regular, true));
        h.show_hidden();

        h.send(InputEvent::LeftMouseUp { location: at(600.0, 400.0) });
        h.send(InputEvent::PointerMoved { location: at(600.0, 10.0) });
        h.advance(ms(250));
        assert!(h.sections.is_shown(SectionName::Hidden));
    }

    #[test]
    fn test_command_drag_reveals_and_mouse_up_restores() {
        let mut h = Harness::new(Preferences::default());
        h.send(InputEvent::LeftMouseDragged { location: at(1300.0, 10.0), modifiers: Modifiers::command() });
        assert!(h.triggers.is_dragging());
        assert!(h.sections.is_shown(SectionName::AlwaysHidden));

        h.send(InputEvent::LeftMouseUp { location: at(1300.0, 10.0) });
        assert!(!h.triggers.is_dragging());
        assert!(!h.sections.is_shown(SectionName::Visible));

        let drags: Vec<_> = h
            .bus
            .drain()
            .into_iter()
            .filter(|e| matches!(e, SectionEvent::DraggingChanged { .. }))
            .collect();
        assert_eq!(
            drags,
            vec![
                SectionEvent::DraggingChanged { dragging: true },
                SectionEvent::DraggingChanged { dragging: false },
            ]
        );
    }

    #[test]
    fn test_plain_drag_is_ignored() {
        let mut h = Harness::new(Preferences::default());
        h.send(InputEvent::LeftMouseDragged { location: at(1300.0, 10.0), modifiers: Modifiers::NONE });
        h.send(InputEvent::LeftMouseDragged { location: at(600.0, 400.0), modifiers: Modifiers::command() });
        assert!(!h.triggers.is_dragging());
        assert!(!h.bus.has_pending());
    }

    #[test]
    fn test_scroll_shows_and_hides() {
        let mut h = Harness::new(Preferences::default());
        h.send(InputEvent::ScrollWheel { location: at(600.0, 10.0), delta_y: 3.0 });
        assert!(!h.sections.is_shown(SectionName::Hidden));
        h.send(InputEvent::ScrollWheel { location: at(600.0, 10.0), delta_y: 8.0 });
        assert!(h.sections.is_shown(SectionName::Hidden));
        h.send(InputEvent::ScrollWheel { location: at(600.0, 10.0), delta_y: -8.0 });
        assert!(!h.sections.is_shown(SectionName::Hidden));
    }

    #[test]
    fn test_hotkey_toggles_bound_section() {
        let mut h = Harness::new(Preferences::default());
        let combo: KeyCombination = "cmd+shift+h".parse().unwrap();
        h.sections.get_mut(SectionName::AlwaysHidden).hotkey = Some(combo.clone());

        h.send(InputEvent::HotkeyPressed { combination: combo.clone() });
        assert!(h.sections.is_shown(SectionName::AlwaysHidden));
        h.send(InputEvent::HotkeyPressed { combination: combo });
        assert!(!h.sections.is_shown(SectionName::AlwaysHidden));
        assert!(h.sections.is_shown(SectionName::Visible));

        h.send(InputEvent::HotkeyPressed { combination: "cmd+j".parse().unwrap() });
        assert!(h.sections.is_shown(SectionName::Visible));
    }

    #[test]
    fn test_focus_rehide_waits_for_launch() {
        let prefs = Preferences { rehide_strategy: RehideStrategy::FocusedApp, ..Default::default() };
        let mut h = Harness::new(prefs);
        let mut launching = app(42, None, ActivationPolicy::Regular, true);
        launching.is_finished_launching = false;
        h.backend.set_application(launching.clone());
        h.show_hidden();

        h.send(InputEvent::FrontmostAppChanged { pid: 42 });
        assert!(h.timers.is_armed(&TimerKey::FocusRehide { pid: 42, attempt: 1 }));
        h.advance(ms(250));
        assert!(h.timers.is_armed(&TimerKey::FocusRehide { pid: 42, attempt: 2 }));

        launching.is_finished_launching = true;
        h.backend.set_application(launching);
        h.advance(ms(250));
        assert!(!h.sections.is_shown(SectionName::Hidden));
        assert!(h.timers.is_empty());
    }

    #[test]
    fn test_focus_rehide_gives_up() {
        let prefs = Preferences { rehide_strategy: RehideStrategy::FocusedApp, ..Default::default() };
        let mut h = Harness::new(prefs);
        let mut launching = app(42, None, ActivationPolicy::Regular, true);
        launching.is_finished_launching = false;
        h.backend.set_application(launching);
        h.show_hidden();

        h.send(InputEvent::FrontmostAppChanged { pid: 42 });
        for _ in 0..timing::FOCUS_REHIDE_MAX_ATTEMPTS {
            h.advance(ms(250));
        }
        assert!(h.timers.is_empty());
        assert!(h.sections.is_shown(SectionName::Hidden));
    }

    #[test]
    fn test_focus_rehide_ignores_host_and_menuless_apps() {
        let prefs = Preferences { rehide_strategy: RehideStrategy::FocusedApp, ..Default::default() };
        let mut h = Harness::new(prefs);
        h.backend.set_application(app(HOST_PID, None, ActivationPolicy::Regular, true));
        let mut menuless = app(9, None, ActivationPolicy::Accessory, true);
        menuless.owns_menu_bar = false;
        h.backend.set_application(menuless);
        h.show_hidden();

        h.send(InputEvent::FrontmostAppChanged { pid: HOST_PID });
        h.send(InputEvent::FrontmostAppChanged { pid: 9 });
        assert!(h.sections.is_shown(SectionName::Hidden));
    }

    #[test]
    fn test_timed_rehide_confirm() {
        let prefs = Preferences {
            rehide_strategy: RehideStrategy::Timed,
            rehide_interval_secs: 2.0,
            ..Default::default()
        };
        let mut h = Harness::new(prefs);
        h.show_hidden();

        h.send(InputEvent::PointerMoved { location: at(600.0, 400.0) });
        h.advance(ms(1000));
        h.send(InputEvent::PointerMoved { location: at(600.0, 10.0) });
        h.advance(ms(2000));
        assert!(h.sections.is_shown(SectionName::Hidden));

        h.send(InputEvent::PointerMoved { location: at(600.0, 400.0) });
        h.advance(ms(2000));
        assert!(!h.sections.is_shown(SectionName::Hidden));
    }

    #[test]
    fn test_space_change_is_debounced() {
        let mut h = Harness::new(Preferences::default());
        assert_eq!(h.send(InputEvent::ActiveSpaceChanged), Followup::None);
        h.advance(ms(200));
        h.send(InputEvent::ActiveSpaceChanged);
        assert_eq!(h.advance(ms(200)), Vec::<Followup>::new());
        assert_eq!(h.advance(ms(50)), vec![Followup::Refresh]);
    }

    #[test]
    fn test_environment_changes_refresh_immediately() {
        let mut h = Harness::new(Preferences::default());
        assert_eq!(h.send(InputEvent::AppearanceChanged), Followup::Refresh);
        assert_eq!(h.send(InputEvent::ScreenParametersChanged), Followup::Refresh);
    }

    #[test]
    fn test_input_event_from_json() {
        let event: InputEvent = serde_json::from_str(
            r#"{ "type": "leftMouseDown", "location": { "x": 5, "y": 6 }, "modifiers": { "option": true } }"#,
        )
        .unwrap();
        assert_eq!(event, InputEvent::LeftMouseDown { location: at(5.0, 6.0), modifiers: Modifiers::option() });

        let event: InputEvent =
            serde_json::from_str(r#"{ "type": "hotkeyPressed", "combination": "cmd+h" }"#).unwrap();
        assert!(matches!(event, InputEvent::HotkeyPressed { .. }));
    }
}
