//! Background refresh of anchors and wallpaper
//!
//! Collaborator calls may block, so they run on the blocking pool. The
//! display is resolved first; the item query and the wallpaper capture then
//! run concurrently and the refresh completes once both are back. Capture is
//! bounded by a timeout so a stuck capture never holds up the anchors.

use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, warn};

use crate::platform::{
    CaptureError, DisplayInfo, MenuBarItems, MenuBarQuery, QueryError, WallpaperCapture,
    WallpaperSnapshot,
};

/// Outcome of one refresh cycle
#[derive(Debug)]
pub struct RefreshResult {
    pub items: Result<(DisplayInfo, MenuBarItems), QueryError>,
    /// `None` when no capture was requested or the display was unknown
    pub wallpaper: Option<Result<WallpaperSnapshot, CaptureError>>,
}

/// Everything a refresh needs, detached from the manager
#[derive(Clone)]
pub struct RefreshJob {
    pub query: Arc<dyn MenuBarQuery>,
    pub capture: Arc<dyn WallpaperCapture>,
    pub with_wallpaper: bool,
    pub capture_timeout: Duration,
}

impl RefreshJob {
    pub async fn run(self) -> RefreshResult {
        let query = Arc::clone(&self.query);
        let display = match task::spawn_blocking(move || query.main_display()).await {
            Ok(Ok(display)) => display,
            Ok(Err(e)) => return RefreshResult { items: Err(e), wallpaper: None },
            Err(e) => {
                return RefreshResult {
                    items: Err(QueryError::Failed(format!("display query panicked: {e}"))),
                    wallpaper: None,
                }
            }
        };

        let query = Arc::clone(&self.query);
        let items = async move {
            task::spawn_blocking(move || query.menu_bar_items(display.id))
                .await
                .unwrap_or_else(|e| Err(QueryError::Failed(format!("item query panicked: {e}"))))
        };

        let capture = Arc::clone(&self.capture);
        let timeout = self.capture_timeout;
        let with_wallpaper = self.with_wallpaper;
        let wallpaper = async move {
            if !with_wallpaper {
                return None;
            }
            let region = display.menu_bar_frame();
            let blocking = task::spawn_blocking(move || capture.capture(display.id, region, timeout));
            let result = match tokio::time::timeout(timeout, blocking).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(CaptureError::Failed(format!("capture panicked: {e}"))),
                Err(_) => Err(CaptureError::Timeout(timeout)),
            };
            Some(result)
        };

        let (items, wallpaper) = tokio::join!(items, wallpaper);
        match &items {
            Ok(items) => debug!(status_items = items.status_items.len(), "Menu bar items refreshed"),
            Err(e) => warn!(error = %e, "Menu bar item query failed"),
        }
        if let Some(Err(e)) = &wallpaper {
            warn!(error = %e, "Wallpaper capture failed");
        }

        RefreshResult {
            items: items.map(|items| (display, items)),
            wallpaper,
        }
    }
}
