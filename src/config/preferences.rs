//! User preferences read by the core
//!
//! The settings UI owns editing; the core only loads, validates and reads
//! these values. Every field has a serde default so older files keep loading
//! after new settings are added.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::color::HexColor;
use crate::constants::{validation, window_server};
use crate::overlay::shape::{FullShapeInfo, ShapeKind, SplitShapeInfo};
use crate::platform::ActivationPolicy;

/// When a shown section hides itself again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RehideStrategy {
    /// Hide after a click that signals the user moved on to another app
    #[default]
    Smart,
    /// Hide once the pointer has stayed out of the bar for the rehide interval
    Timed,
    /// Hide when another app that owns a menu bar becomes frontmost
    FocusedApp,
}

/// Which click targets count as "moving on" for the smart rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartRehidePolicy {
    /// Bundles that always trigger a rehide, whatever their activation state
    #[serde(default = "default_always_rehide_bundle_ids")]
    pub always_rehide_bundle_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub require_active: bool,
    #[serde(default = "default_required_activation_policy")]
    pub required_activation_policy: ActivationPolicy,
    /// Windows at or above this layer are overlay chrome and ignored
    #[serde(default = "default_max_window_layer")]
    pub max_window_layer: i32,
}

impl Default for SmartRehidePolicy {
    fn default() -> Self {
        Self {
            always_rehide_bundle_ids: default_always_rehide_bundle_ids(),
            require_active: true,
            required_activation_policy: default_required_activation_policy(),
            max_window_layer: default_max_window_layer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderConfig {
    pub color: String,
    #[serde(default = "default_border_width")]
    pub width: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppearanceConfig {
    #[serde(default)]
    pub shape_kind: ShapeKind,
    #[serde(default)]
    pub full_shape_info: FullShapeInfo,
    #[serde(default)]
    pub split_shape_info: SplitShapeInfo,
    /// Tint color as hex (`RRGGBB` or `AARRGGBB`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderConfig>,
}

impl AppearanceConfig {
    pub fn tint_color(&self) -> Option<HexColor> {
        self.tint.as_deref().and_then(HexColor::parse)
    }

    pub fn border_color(&self) -> Option<(HexColor, f64)> {
        let border = self.border.as_ref()?;
        HexColor::parse(&border.color).map(|c| (c, border.width))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub show_on_hover: bool,
    #[serde(default = "default_true")]
    pub show_on_click: bool,
    #[serde(default = "default_true")]
    pub show_on_scroll: bool,
    #[serde(default = "default_true")]
    pub show_all_sections_on_user_drag: bool,
    #[serde(default = "default_true")]
    pub auto_rehide: bool,
    #[serde(default)]
    pub rehide_strategy: RehideStrategy,
    #[serde(default = "default_rehide_interval_secs")]
    pub rehide_interval_secs: f64,
    #[serde(default)]
    pub smart_rehide: SmartRehidePolicy,
    #[serde(default)]
    pub appearance: AppearanceConfig,
}

fn default_true() -> bool {
    true
}

fn default_rehide_interval_secs() -> f64 {
    15.0
}

fn default_border_width() -> f64 {
    1.0
}

fn default_always_rehide_bundle_ids() -> Vec<String> {
    vec![window_server::DOCK_BUNDLE_ID.to_string()]
}

fn default_required_activation_policy() -> ActivationPolicy {
    ActivationPolicy::Regular
}

fn default_max_window_layer() -> i32 {
    window_server::CURSOR_WINDOW_LAYER
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            show_on_hover: false,
            show_on_click: true,
            show_on_scroll: true,
            show_all_sections_on_user_drag: true,
            auto_rehide: true,
            rehide_strategy: RehideStrategy::default(),
            rehide_interval_secs: default_rehide_interval_secs(),
            smart_rehide: SmartRehidePolicy::default(),
            appearance: AppearanceConfig::default(),
        }
    }
}

impl Preferences {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    pub fn rehide_interval(&self) -> Duration {
        Duration::from_secs_f64(self.rehide_interval_secs)
    }

    /// Rehide rule in force, if auto-rehide is on
    pub fn active_rehide_strategy(&self) -> Option<RehideStrategy> {
        self.auto_rehide.then_some(self.rehide_strategy)
    }

    /// Validate and clamp values to safe ranges
    pub fn validate_and_clamp(&mut self) {
        use validation::*;

        if !self.rehide_interval_secs.is_finite() || self.rehide_interval_secs < MIN_REHIDE_INTERVAL_SECS {
            warn!(rehide_interval_secs = self.rehide_interval_secs, min = MIN_REHIDE_INTERVAL_SECS, "rehide_interval_secs below minimum, clamping");
            self.rehide_interval_secs = MIN_REHIDE_INTERVAL_SECS;
        } else if self.rehide_interval_secs > MAX_REHIDE_INTERVAL_SECS {
            warn!(rehide_interval_secs = self.rehide_interval_secs, max = MAX_REHIDE_INTERVAL_SECS, "rehide_interval_secs exceeds maximum, clamping");
            self.rehide_interval_secs = MAX_REHIDE_INTERVAL_SECS;
        }

        if let Some(tint) = self.appearance.tint.clone()
            && HexColor::parse(&tint).is_none()
        {
            error!(tint = %tint, "Invalid tint hex, disabling tint");
            self.appearance.tint = None;
        }

        if let Some(color) = self.appearance.border.as_ref().map(|b| b.color.clone())
            && HexColor::parse(&color).is_none()
        {
            error!(border_color = %color, "Invalid border color hex, disabling border");
            self.appearance.border = None;
        }

        if let Some(border) = &mut self.appearance.border {
            if !border.width.is_finite() || border.width < 0.0 {
                warn!(width = border.width, "Negative border width, clamping to 0");
                border.width = 0.0;
            } else if border.width > MAX_BORDER_WIDTH {
                warn!(width = border.width, max = MAX_BORDER_WIDTH, "Border width exceeds maximum, clamping");
                border.width = MAX_BORDER_WIDTH;
            }
        }
    }

    /// Load from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load preferences, never failing
    ///
    /// A missing file is created with defaults. A file that does not parse is
    /// left untouched for the user to fix and defaults are used meanwhile.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Preferences>(&contents) {
                Ok(mut prefs) => {
                    prefs.validate_and_clamp();
                    info!(path = %path.display(), "Loaded preferences");
                    prefs
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to parse preferences, using defaults");
                    error!(path = %path.display(), "The file has been preserved - fix the syntax to restore your settings.");
                    Self::default()
                }
            },
            Err(_) => {
                let prefs = Self::default();
                if let Err(e) = prefs.save_to(path) {
                    error!(error = ?e, "Failed to write default preferences");
                } else {
                    info!(path = %path.display(), "Generated default preferences file");
                }
                prefs
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize preferences to JSON")?;
        fs::write(path, contents)
            .context(format!("Failed to write preferences to {}", path.display()))?;
        Ok(())
    }
}
