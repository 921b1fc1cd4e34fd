//! Application-wide constants
//!
//! This module contains the magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Timing of the arm/confirm delays and debounce windows
pub mod timing {
    use std::time::Duration;

    /// Coalescing window for control item position changes
    pub const POSITION_DEBOUNCE: Duration = Duration::from_millis(100);

    /// Delay before a hover in the empty bar region reveals the hidden section
    pub const HOVER_SHOW_DELAY: Duration = Duration::from_millis(100);

    /// Delay before leaving the bar band hides a hover-revealed section
    pub const HOVER_HIDE_DELAY: Duration = Duration::from_millis(100);

    /// Delay between a click in the empty region and the reveal
    pub const CLICK_SHOW_DELAY: Duration = Duration::from_millis(50);

    /// Delay between a qualifying click-up and the smart rehide
    pub const SMART_REHIDE_DELAY: Duration = Duration::from_millis(250);

    /// Interval between re-checks of an app that is still launching
    pub const FOCUS_REHIDE_RETRY: Duration = Duration::from_millis(250);

    /// Maximum number of launch re-checks before giving up
    pub const FOCUS_REHIDE_MAX_ATTEMPTS: u32 = 10;

    /// Coalescing window for persisting section state
    pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

    /// Coalescing window for space changes
    pub const SPACE_CHANGE_DEBOUNCE: Duration = Duration::from_millis(250);

    /// Wallpaper snapshot refresh period (non-`none` shapes only)
    pub const WALLPAPER_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

    /// Anchor frame refresh period
    pub const ANCHOR_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

    /// Upper bound on a single wallpaper capture
    pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);
}

/// Input interpretation thresholds
pub mod input {
    /// Minimum vertical scroll delta that counts as a show/hide gesture
    pub const SCROLL_THRESHOLD: f64 = 5.0;
}

/// Overlay geometry constants
pub mod overlay {
    /// Padding added after the application menu in split mode
    pub const LEADING_REGION_PADDING: f64 = 10.0;

    /// Padding added before the first on-screen status item in split mode
    pub const TRAILING_REGION_PADDING: f64 = 7.0;

    /// Magic number for approximating a quarter circle with a cubic bezier
    pub const KAPPA: f32 = 0.552_284_8;
}

/// Window server conventions used by the smart rehide rule
pub mod window_server {
    /// Layer of the cursor window; anything at or above it is overlay chrome
    pub const CURSOR_WINDOW_LAYER: i32 = 2000;

    /// Bundle identifier of the Dock
    pub const DOCK_BUNDLE_ID: &str = "com.apple.dock";
}

/// Configuration file paths
pub mod config {
    /// Application directory name under the platform config dir
    pub const APP_DIR: &str = "barkeep";

    /// Preferences file name
    pub const FILENAME: &str = "config.json";

    /// Store key for the persisted section list
    pub const SECTIONS_KEY: &str = "sections";
}

/// Validation bounds for user preferences
pub mod validation {
    pub const MIN_REHIDE_INTERVAL_SECS: f64 = 1.0;
    pub const MAX_REHIDE_INTERVAL_SECS: f64 = 300.0;
    pub const MAX_BORDER_WIDTH: f64 = 10.0;
}
