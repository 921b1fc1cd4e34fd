//! Scripted replay of recorded event streams
//!
//! A script pairs a [`HeadlessFixture`] with timed steps. Inputs and commands
//! go through the daemon exactly as live events would; fixture edits change
//! what the scripted OS reports and trigger a refresh where the real system
//! would have noticed the change.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::{Preferences, Store};
use crate::daemon::{Daemon, DaemonMessage};
use crate::event_handler::InputEvent;
use crate::events::SectionEvent;
use crate::manager::{Command, MenuBarManager};
use crate::platform::headless::{HeadlessBackend, HeadlessFixture, ScriptedQueryError};
use crate::platform::{AppInfo, StatusAnchor, WindowInfo};
use crate::section::SectionName;
use crate::types::Rect;

#[derive(Debug, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub fixture: HeadlessFixture,
    #[serde(default)]
    pub preferences: Option<Preferences>,
    #[serde(default)]
    pub steps: Vec<ReplayStep>,
    /// How long to keep the daemon running after the last step
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_settle_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize)]
pub struct ReplayStep {
    /// Offset from the start of the replay
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: StepAction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepAction {
    Input(InputEvent),
    Command(Command),
    SetStatusItems(Vec<StatusAnchor>),
    SetApplicationMenus(Vec<Rect>),
    SetWindows(Vec<WindowInfo>),
    SetApplication(AppInfo),
    /// `null` makes wallpaper capture fail
    SetWallpaperColor(Option<String>),
    SetCaptureDelayMs(u64),
    /// `null` lets queries succeed again
    SetQueryError(Option<ScriptedQueryError>),
    Refresh {},
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read replay script {}", path.display()))?;
        let script: ReplayScript = serde_json::from_str(&contents)
            .context(format!("Failed to parse replay script {}", path.display()))?;
        script.validate()?;
        Ok(script)
    }

    /// Preferences for the run: the script's own, else the user's file
    ///
    /// Without a file (`--no-persist`) the built-in defaults are used so the
    /// run stays isolated from the user's settings.
    pub fn take_preferences(&mut self, user_file: Option<&Path>) -> Preferences {
        match (self.preferences.take(), user_file) {
            (Some(prefs), _) => prefs,
            (None, Some(path)) => Preferences::load_from(path),
            (None, None) => Preferences::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(pair) = self.steps.windows(2).find(|pair| pair[1].at_ms < pair[0].at_ms) {
            bail!(
                "Replay steps must be ordered by at_ms ({} comes after {})",
                pair[1].at_ms,
                pair[0].at_ms
            );
        }
        Ok(())
    }
}

/// Final state of a replay, printed by the CLI
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub sections: Vec<SectionSummary>,
    pub overlay_bounds: Option<Rect>,
    pub overlay_regions: usize,
    pub has_wallpaper: bool,
    pub events: Vec<SectionEvent>,
}

#[derive(Debug, Serialize)]
pub struct SectionSummary {
    pub name: SectionName,
    pub shown: bool,
    pub enabled: bool,
    pub autosave_name: String,
    pub position: Option<u32>,
}

impl ReplaySummary {
    pub fn new(manager: &MenuBarManager, events: Vec<SectionEvent>) -> Self {
        let sections = manager
            .sections()
            .iter()
            .map(|s| SectionSummary {
                name: s.name,
                shown: s.is_shown(),
                enabled: s.is_enabled,
                autosave_name: s.control_item.autosave_name.clone(),
                position: s.control_item.position,
            })
            .collect();
        let overlay = manager.overlay();
        Self {
            sections,
            overlay_bounds: overlay.bounds(),
            overlay_regions: overlay.path().map_or(0, |p| p.regions.len()),
            has_wallpaper: overlay.wallpaper().is_some(),
            events,
        }
    }
}

/// Run a script to completion and return the manager with everything observed
pub async fn run(
    script: ReplayScript,
    mut prefs: Preferences,
    store: Box<dyn Store>,
) -> Result<(MenuBarManager, Vec<SectionEvent>)> {
    let backend = Arc::new(HeadlessBackend::new(script.fixture));
    prefs.validate_and_clamp();

    let manager = MenuBarManager::new(prefs, store, backend.clone(), backend.clone(), std::process::id());
    let mut events_rx = manager.subscribe();
    let (tx, rx) = mpsc::channel(64);

    info!(steps = script.steps.len(), "Starting replay");
    let feeder = feed(script.steps, script.settle_ms, backend, tx);
    let (manager, fed) = tokio::join!(Daemon::new(manager).run(rx), feeder);
    fed?;

    let mut events = Vec::new();
    loop {
        match events_rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Replay produced more events than the stream keeps");
            }
            Err(_) => break,
        }
    }
    info!(events = events.len(), "Replay finished");
    Ok((manager, events))
}

async fn feed(
    steps: Vec<ReplayStep>,
    settle_ms: u64,
    backend: Arc<HeadlessBackend>,
    tx: mpsc::Sender<DaemonMessage>,
) -> Result<()> {
    let start = time::Instant::now();
    for (index, step) in steps.into_iter().enumerate() {
        time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        debug!(index, at_ms = step.at_ms, action = ?step.action, "Replaying step");

        let message = match step.action {
            StepAction::Input(event) => Some(DaemonMessage::Input(event)),
            StepAction::Command(command) => Some(DaemonMessage::Command(command)),
            StepAction::SetStatusItems(items) => {
                backend.set_status_items(items);
                Some(DaemonMessage::Refresh)
            }
            StepAction::SetApplicationMenus(frames) => {
                backend.set_application_menu_frames(frames);
                Some(DaemonMessage::Refresh)
            }
            StepAction::SetWindows(windows) => {
                backend.set_windows(windows);
                None
            }
            StepAction::SetApplication(app) => {
                backend.set_application(app);
                None
            }
            StepAction::SetWallpaperColor(color) => {
                backend.set_wallpaper_color(color);
                Some(DaemonMessage::Refresh)
            }
            StepAction::SetCaptureDelayMs(delay_ms) => {
                backend.set_capture_delay(Duration::from_millis(delay_ms));
                None
            }
            StepAction::SetQueryError(error) => {
                backend.set_query_error(error);
                Some(DaemonMessage::Refresh)
            }
            StepAction::Refresh {} => Some(DaemonMessage::Refresh),
        };
        if let Some(message) = message {
            tx.send(message)
                .await
                .context(format!("Daemon stopped before step {index}"))?;
        }
    }
    time::sleep(Duration::from_millis(settle_ms)).await;
    Ok(())
}
