//! Hotkey bindings for sections
//!
//! Bindings are stored as strings like `"cmd+shift+h"` and parsed into a
//! [`KeyCombination`]. Recording new bindings is left to the settings UI;
//! this module only parses, prints and matches them.

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Modifier keys held during an input event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub command: bool,
    #[serde(default)]
    pub option: bool,
    #[serde(default)]
    pub control: bool,
    #[serde(default)]
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { command: false, option: false, control: false, shift: false };

    #[cfg(test)]
    pub fn command() -> Self {
        Self { command: true, ..Self::NONE }
    }

    #[cfg(test)]
    pub fn option() -> Self {
        Self { option: true, ..Self::NONE }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// A key plus the exact set of modifiers that must accompany it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombination {
    pub modifiers: Modifiers,
    /// Lowercased key name (`"h"`, `"space"`, `"f5"`)
    pub key: String,
}

impl FromStr for KeyCombination {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut modifiers = Modifiers::NONE;
        let mut key = None;

        for part in s.split('+').map(|p| p.trim().to_ascii_lowercase()) {
            match part.as_str() {
                "cmd" | "command" => modifiers.command = true,
                "opt" | "option" | "alt" => modifiers.option = true,
                "ctrl" | "control" => modifiers.control = true,
                "shift" => modifiers.shift = true,
                "" => bail!("Empty component in hotkey '{s}'"),
                _ if key.is_some() => bail!("Hotkey '{s}' names more than one key"),
                _ => key = Some(part),
            }
        }

        let Some(key) = key else {
            bail!("Hotkey '{s}' has no key");
        };
        if modifiers.is_empty() {
            bail!("Hotkey '{s}' needs at least one modifier");
        }
        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.control {
            write!(f, "ctrl+")?;
        }
        if self.modifiers.option {
            write!(f, "opt+")?;
        }
        if self.modifiers.shift {
            write!(f, "shift+")?;
        }
        if self.modifiers.command {
            write!(f, "cmd+")?;
        }
        write!(f, "{}", self.key)
    }
}

impl Serialize for KeyCombination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KeyCombination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
