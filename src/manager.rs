//! Menu bar manager
//!
//! Owns every piece of state and is the only place inputs, timers and
//! refresh results enter. Each entry point mutates state, then drains the
//! event outbox synchronously: persistence is scheduled, the coordinator is
//! poked and the overlay recomputed before the next input is looked at.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::{save_sections, Preferences, Store};
use crate::constants::timing;
use crate::coordinator::ControlItemCoordinator;
use crate::event_handler::{Followup, InputEvent, TriggerContext, TriggerLayer};
use crate::events::{EventBus, SectionEvent};
use crate::hotkeys::KeyCombination;
use crate::menu_bar::MenuBarSnapshot;
use crate::overlay::refresh::{RefreshJob, RefreshResult};
use crate::overlay::OverlayEngine;
use crate::platform::{MenuBarQuery, Pid, QueryError, WallpaperCapture};
use crate::scheduler::{TimerKey, Timers};
use crate::section::{Section, SectionName, SectionSet};
use crate::visibility::{MachineContext, VisibilityStateMachine};

/// Requests from collaborators (settings UI, replay scripts)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    Show { section: SectionName },
    Hide { section: SectionName },
    Toggle { section: SectionName },
    SetEnabled { section: SectionName, enabled: bool },
    BindHotkey {
        section: SectionName,
        #[serde(default)]
        hotkey: Option<KeyCombination>,
    },
    SetPreferences { preferences: Box<Preferences> },
}

pub struct MenuBarManager {
    sections: SectionSet,
    machine: VisibilityStateMachine,
    triggers: TriggerLayer,
    coordinator: ControlItemCoordinator,
    timers: Timers,
    bus: EventBus,
    prefs: Preferences,
    snapshot: Option<MenuBarSnapshot>,
    overlay: OverlayEngine,
    store: Box<dyn Store>,
    query: Arc<dyn MenuBarQuery>,
    capture: Arc<dyn WallpaperCapture>,
    host_pid: Pid,
    permission_reported: bool,
}

impl MenuBarManager {
    pub fn new(
        prefs: Preferences,
        store: Box<dyn Store>,
        query: Arc<dyn MenuBarQuery>,
        capture: Arc<dyn WallpaperCapture>,
        host_pid: Pid,
    ) -> Self {
        let sections = crate::config::load_sections(store.as_ref());
        let overlay = OverlayEngine::new(prefs.appearance.clone());
        let mut manager = Self {
            sections,
            machine: VisibilityStateMachine::new(),
            triggers: TriggerLayer::new(),
            coordinator: ControlItemCoordinator::new(),
            timers: Timers::new(),
            bus: EventBus::new(),
            prefs,
            snapshot: None,
            overlay,
            store,
            query,
            capture,
            host_pid,
            permission_reported: false,
        };

        // Restored sections may already be shown; start the matching rehide rule
        let now = Instant::now();
        let (machine, mut ctx) = manager.machine_context(now);
        machine.reset_rehide(&mut ctx);
        manager
    }

    fn machine_context(&mut self, now: Instant) -> (&mut VisibilityStateMachine, MachineContext<'_>) {
        (
            &mut self.machine,
            MachineContext {
                sections: &mut self.sections,
                bus: &mut self.bus,
                timers: &mut self.timers,
                prefs: &self.prefs,
                now,
            },
        )
    }

    fn trigger_context(&mut self, now: Instant) -> (&mut TriggerLayer, TriggerContext<'_>) {
        (
            &mut self.triggers,
            TriggerContext {
                machine: &mut self.machine,
                sections: &mut self.sections,
                bus: &mut self.bus,
                timers: &mut self.timers,
                prefs: &self.prefs,
                snapshot: self.snapshot.as_ref(),
                query: self.query.as_ref(),
                host_pid: self.host_pid,
                now,
            },
        )
    }

    /// Read-only stream of section, anchor and overlay changes
    pub fn subscribe(&self) -> broadcast::Receiver<SectionEvent> {
        self.bus.subscribe()
    }

    pub fn sections(&self) -> &SectionSet {
        &self.sections
    }

    pub fn section_named(&self, name: &str) -> Option<&Section> {
        self.sections.section_named(name)
    }

    pub fn snapshot(&self) -> Option<&MenuBarSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn overlay(&self) -> &OverlayEngine {
        &self.overlay
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn show(&mut self, section: SectionName, now: Instant) -> bool {
        let (machine, mut ctx) = self.machine_context(now);
        let changed = machine.show(section, &mut ctx);
        self.process_events(now);
        changed
    }

    pub fn hide(&mut self, section: SectionName, now: Instant) -> bool {
        let (machine, mut ctx) = self.machine_context(now);
        let changed = machine.hide(section, &mut ctx);
        self.process_events(now);
        changed
    }

    pub fn toggle(&mut self, section: SectionName, now: Instant) -> bool {
        let (machine, mut ctx) = self.machine_context(now);
        let changed = machine.toggle(section, &mut ctx);
        self.process_events(now);
        changed
    }

    pub fn set_section_enabled(&mut self, section: SectionName, enabled: bool, now: Instant) -> bool {
        let (machine, mut ctx) = self.machine_context(now);
        let changed = machine.set_section_enabled(section, enabled, &mut ctx);
        if changed {
            self.timers.arm(TimerKey::AssignByPosition, now, timing::POSITION_DEBOUNCE);
        }
        self.process_events(now);
        changed
    }

    pub fn bind_hotkey(&mut self, section: SectionName, hotkey: Option<KeyCombination>, now: Instant) {
        let previous_owner = hotkey.as_ref().and_then(|combination| {
            self.sections
                .iter()
                .find(|s| s.name != section && s.hotkey.as_ref() == Some(combination))
                .map(|s| s.name)
        });
        if let (Some(owner), Some(combination)) = (previous_owner, &hotkey) {
            warn!(hotkey = %combination, from = %owner, to = %section, "Hotkey moved to another section");
            self.sections.get_mut(owner).hotkey = None;
        }
        self.sections.get_mut(section).hotkey = hotkey;
        self.timers.arm(TimerKey::PersistSections, now, timing::PERSIST_DEBOUNCE);
    }

    /// Replace the preferences, cancelling whatever belonged to the old rules
    pub fn set_preferences(&mut self, mut prefs: Preferences, now: Instant) {
        prefs.validate_and_clamp();
        let rule_changed = prefs.auto_rehide != self.prefs.auto_rehide
            || prefs.rehide_strategy != self.prefs.rehide_strategy
            || prefs.rehide_interval_secs != self.prefs.rehide_interval_secs;
        let appearance_changed = prefs.appearance != self.prefs.appearance;
        self.prefs = prefs;

        if rule_changed {
            info!(strategy = ?self.prefs.active_rehide_strategy(), "Rehide rule changed");
            let (machine, mut ctx) = self.machine_context(now);
            machine.reset_rehide(&mut ctx);
        }
        if !self.prefs.show_on_hover {
            self.timers.cancel(&TimerKey::HoverShow);
            self.timers.cancel(&TimerKey::HoverHide);
        }
        if appearance_changed {
            self.overlay.set_appearance(self.prefs.appearance.clone());
            self.overlay.recompute(self.snapshot.as_ref());
            self.bus.emit(SectionEvent::OverlayInvalidated);
        }
        self.process_events(now);
    }

    pub fn apply_command(&mut self, command: Command, now: Instant) {
        debug!(command = ?command, "Applying command");
        match command {
            Command::Show { section } => {
                self.show(section, now);
            }
            Command::Hide { section } => {
                self.hide(section, now);
            }
            Command::Toggle { section } => {
                self.toggle(section, now);
            }
            Command::SetEnabled { section, enabled } => {
                self.set_section_enabled(section, enabled, now);
            }
            Command::BindHotkey { section, hotkey } => self.bind_hotkey(section, hotkey, now),
            Command::SetPreferences { preferences } => self.set_preferences(*preferences, now),
        }
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) -> Followup {
        let (triggers, mut ctx) = self.trigger_context(now);
        let followup = triggers.handle_event(event, &mut ctx);
        self.process_events(now);
        followup
    }

    /// Fire every timer due at `now`
    pub fn tick(&mut self, now: Instant) -> Followup {
        let mut followup = Followup::None;
        for key in self.timers.take_due(now) {
            match key {
                TimerKey::AssignByPosition => {
                    self.coordinator.assign_by_position(&mut self.sections, &mut self.bus);
                }
                TimerKey::PersistSections => self.persist(),
                key => {
                    let (triggers, mut ctx) = self.trigger_context(now);
                    if triggers.fire_timer(key, &mut ctx) == Followup::Refresh {
                        followup = Followup::Refresh;
                    }
                }
            }
            self.process_events(now);
        }
        followup
    }

    /// Detached job that re-queries anchors and, for shaped modes, the wallpaper
    pub fn refresh_job(&self, with_wallpaper: bool) -> RefreshJob {
        RefreshJob {
            query: Arc::clone(&self.query),
            capture: Arc::clone(&self.capture),
            with_wallpaper: with_wallpaper && self.overlay.needs_wallpaper(),
            capture_timeout: timing::CAPTURE_TIMEOUT,
        }
    }

    pub fn apply_refresh(&mut self, result: RefreshResult, now: Instant) {
        match result.items {
            Ok((display, items)) => {
                self.permission_reported = false;
                if self
                    .coordinator
                    .observe_anchors(&mut self.sections, &items.status_items, &mut self.bus)
                {
                    debug!("Control items moved, scheduling re-assignment");
                }
                self.snapshot = Some(MenuBarSnapshot::new(display, items));
                if self.overlay.recompute(self.snapshot.as_ref()) {
                    self.bus.emit(SectionEvent::OverlayInvalidated);
                }
            }
            Err(QueryError::PermissionDenied) => {
                if !self.permission_reported {
                    error!("Accessibility permission missing, menu bar cannot be observed");
                    self.permission_reported = true;
                    self.bus.emit(SectionEvent::PermissionRequired);
                }
            }
            Err(e) => warn!(error = %e, "Skipping menu bar update this cycle"),
        }

        match result.wallpaper {
            Some(Ok(wallpaper)) => {
                if self.overlay.set_wallpaper(Some(wallpaper)) {
                    self.bus.emit(SectionEvent::OverlayInvalidated);
                }
            }
            Some(Err(e)) => {
                debug!(error = %e, "Drawing without wallpaper backdrop");
                if self.overlay.set_wallpaper(None) {
                    self.bus.emit(SectionEvent::OverlayInvalidated);
                }
            }
            None => {}
        }
        self.process_events(now);
    }

    /// Save immediately if a debounced save is pending
    pub fn flush(&mut self) {
        if self.timers.cancel(&TimerKey::PersistSections) {
            self.persist();
        }
    }

    fn persist(&mut self) {
        match save_sections(self.store.as_ref(), &self.sections) {
            Ok(()) => debug!("Persisted sections"),
            Err(e) => error!(error = %e, "Failed to persist sections"),
        }
    }

    /// Drain the outbox and run the synchronous subscribers
    fn process_events(&mut self, now: Instant) {
        loop {
            let events = self.bus.drain();
            if events.is_empty() {
                break;
            }

            if events.iter().any(SectionEvent::affects_persisted_state) {
                self.timers.arm(TimerKey::PersistSections, now, timing::PERSIST_DEBOUNCE);
            }
            if events.iter().any(|e| matches!(e, SectionEvent::ControlItemMoved { .. })) {
                self.timers.arm(TimerKey::AssignByPosition, now, timing::POSITION_DEBOUNCE);
            }
            for event in &events {
                if let SectionEvent::DraggingChanged { dragging } = event
                    && self.overlay.set_dragging(*dragging)
                {
                    self.bus.emit(SectionEvent::OverlayInvalidated);
                }
            }
            if events.iter().any(SectionEvent::affects_overlay) && self.overlay.recompute(self.snapshot.as_ref()) {
                self.bus.emit(SectionEvent::OverlayInvalidated);
            }
        }
        debug_assert!(self.sections.satisfies_containment(), "section containment broken");
    }
}
