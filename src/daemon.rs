//! Daemon main loop
//!
//! A single task owns the [`MenuBarManager`] and serializes everything that
//! touches it: inputs and commands from the channel, due timers, periodic
//! refreshes and refresh results coming back from the blocking pool. Nothing
//! else ever holds a mutable reference to section state.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::constants::timing;
use crate::event_handler::{Followup, InputEvent};
use crate::manager::{Command, MenuBarManager};
use crate::overlay::refresh::RefreshResult;

/// Messages accepted by the daemon
#[derive(Debug)]
pub enum DaemonMessage {
    Input(InputEvent),
    Command(Command),
    /// Re-query anchors and wallpaper now
    Refresh,
}

pub struct Daemon {
    manager: MenuBarManager,
    refresh_in_flight: bool,
    /// A refresh was requested while another one was running
    refresh_pending: bool,
}

impl Daemon {
    pub fn new(manager: MenuBarManager) -> Self {
        Self {
            manager,
            refresh_in_flight: false,
            refresh_pending: false,
        }
    }

    /// Run until the inbox closes, then flush pending saves and hand the
    /// manager back
    pub async fn run(mut self, mut inbox: mpsc::Receiver<DaemonMessage>) -> MenuBarManager {
        let (refresh_tx, mut refresh_rx) = mpsc::channel::<RefreshResult>(4);

        let start = time::Instant::now();
        let mut anchor_tick = time::interval_at(start + timing::ANCHOR_REFRESH_INTERVAL, timing::ANCHOR_REFRESH_INTERVAL);
        anchor_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut wallpaper_tick =
            time::interval_at(start + timing::WALLPAPER_REFRESH_INTERVAL, timing::WALLPAPER_REFRESH_INTERVAL);
        wallpaper_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Daemon started");
        self.spawn_refresh(true, &refresh_tx);

        loop {
            let deadline = self.manager.next_deadline();
            let wake_at = deadline
                .map(time::Instant::from_std)
                .unwrap_or_else(|| time::Instant::now() + Duration::from_secs(3600));
            let wants_wallpaper = self.manager.overlay().needs_wallpaper();

            tokio::select! {
                message = inbox.recv() => {
                    let Some(message) = message else {
                        info!("Inbox closed, shutting down");
                        break;
                    };
                    self.handle_message(message, &refresh_tx);
                }
                Some(result) = refresh_rx.recv() => {
                    self.refresh_in_flight = false;
                    self.manager.apply_refresh(result, Instant::now());
                    if std::mem::take(&mut self.refresh_pending) {
                        self.spawn_refresh(true, &refresh_tx);
                    }
                }
                _ = time::sleep_until(wake_at), if deadline.is_some() => {
                    if self.manager.tick(Instant::now()) == Followup::Refresh {
                        self.spawn_refresh(true, &refresh_tx);
                    }
                }
                _ = anchor_tick.tick() => self.spawn_refresh(false, &refresh_tx),
                _ = wallpaper_tick.tick(), if wants_wallpaper => self.spawn_refresh(true, &refresh_tx),
            }
        }

        self.manager.flush();
        self.manager
    }

    fn handle_message(&mut self, message: DaemonMessage, refresh_tx: &mpsc::Sender<RefreshResult>) {
        let now = Instant::now();
        match message {
            DaemonMessage::Input(event) => {
                if self.manager.handle_input(event, now) == Followup::Refresh {
                    self.spawn_refresh(true, refresh_tx);
                }
            }
            DaemonMessage::Command(command) => {
                let refresh = matches!(command, Command::SetPreferences { .. });
                self.manager.apply_command(command, now);
                if refresh {
                    self.spawn_refresh(true, refresh_tx);
                }
            }
            DaemonMessage::Refresh => self.spawn_refresh(true, refresh_tx),
        }
    }

    fn spawn_refresh(&mut self, with_wallpaper: bool, refresh_tx: &mpsc::Sender<RefreshResult>) {
        if self.refresh_in_flight {
            // Periodic anchor refreshes are cheap to drop; explicit ones are not
            if with_wallpaper {
                self.refresh_pending = true;
            }
            return;
        }

        let job = self.manager.refresh_job(with_wallpaper);
        debug!(with_wallpaper = job.with_wallpaper, "Starting refresh");
        self.refresh_in_flight = true;
        let tx = refresh_tx.clone();
        tokio::spawn(async move {
            let result = job.run().await;
            if tx.send(result).await.is_err() {
                debug!("Daemon stopped, dropping refresh result");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryStore, Preferences};
    use crate::platform::headless::{HeadlessBackend, HeadlessFixture};
    use crate::section::SectionName;
    use crate::types::Point;
    use std::sync::Arc;

    fn daemon(prefs: Preferences) -> (Daemon, Arc<HeadlessBackend>) {
        let mut fixture = HeadlessFixture::default();
        fixture.items.application_menu_frames = vec![crate::types::Rect::new(10.0, 0.0, 200.0, 24.0)];
        let backend = Arc::new(HeadlessBackend::new(fixture));
        let manager = MenuBarManager::new(prefs, Box::new(MemoryStore::new()), backend.clone(), backend.clone(), 1);
        (Daemon::new(manager), backend)
    }

    async fn feed(tx: mpsc::Sender<DaemonMessage>, messages: Vec<(u64, DaemonMessage)>, settle_ms: u64) {
        for (delay_ms, message) in messages {
            time::sleep(Duration::from_millis(delay_ms)).await;
            tx.send(message).await.unwrap();
        }
        time::sleep(Duration::from_millis(settle_ms)).await;
    }

    #[tokio::test]
    async fn test_commands_are_applied_in_order() {
        let (daemon, _) = daemon(Preferences::default());
        let (tx, rx) = mpsc::channel(8);
        let messages = vec![
            (0, DaemonMessage::Command(Command::Show { section: SectionName::AlwaysHidden })),
            (0, DaemonMessage::Command(Command::Hide { section: SectionName::Hidden })),
        ];
        let (manager, _) = tokio::join!(daemon.run(rx), feed(tx, messages, 10));

        assert!(manager.sections().is_shown(SectionName::Visible));
        assert!(!manager.sections().is_shown(SectionName::Hidden));
        assert!(!manager.sections().is_shown(SectionName::AlwaysHidden));
    }

    #[tokio::test]
    async fn test_initial_refresh_populates_snapshot() {
        let (daemon, _) = daemon(Preferences::default());
        let (tx, rx) = mpsc::channel(8);
        let (manager, _) = tokio::join!(daemon.run(rx), feed(tx, Vec::new(), 100));

        assert!(manager.snapshot().is_some());
        assert!(manager.overlay().path().is_some());
    }

    #[tokio::test]
    async fn test_hover_timer_fires_inside_loop() {
        let prefs = Preferences { show_on_hover: true, ..Default::default() };
        let (daemon, _) = daemon(prefs);
        let (tx, rx) = mpsc::channel(8);
        let messages = vec![(
            100,
            DaemonMessage::Input(InputEvent::PointerMoved { location: Point::new(600.0, 10.0) }),
        )];
        let (manager, _) = tokio::join!(daemon.run(rx), feed(tx, messages, 300));

        assert!(manager.sections().is_shown(SectionName::Hidden));
    }
}
