//! Section model: the three visibility groups of the menu bar
//!
//! Sections live in a fixed arena ([`SectionSet`]) indexed by [`SectionName`].
//! Each section exclusively owns one [`ControlItem`], the on-screen anchor
//! marking the section boundary. Nothing outside the state machine and the
//! coordinator mutates a section.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::hotkeys::KeyCombination;
use crate::types::Rect;

/// The three sections, in containment order (`visible ⊇ hidden ⊇ alwaysHidden`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionName {
    Visible,
    Hidden,
    AlwaysHidden,
}

impl SectionName {
    pub const ALL: [SectionName; 3] = [
        SectionName::Visible,
        SectionName::Hidden,
        SectionName::AlwaysHidden,
    ];

    /// Position in the containment order, also the arena index
    pub fn index(self) -> usize {
        match self {
            SectionName::Visible => 0,
            SectionName::Hidden => 1,
            SectionName::AlwaysHidden => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SectionName::Visible => "visible",
            SectionName::Hidden => "hidden",
            SectionName::AlwaysHidden => "alwaysHidden",
        }
    }

    /// Sections that must be shown together with this one
    pub fn and_below(self) -> impl Iterator<Item = SectionName> {
        Self::ALL.into_iter().filter(move |s| *s <= self)
    }

    /// Sections that must be hidden together with this one
    pub fn and_above(self) -> impl Iterator<Item = SectionName> {
        Self::ALL.into_iter().filter(move |s| *s >= self)
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "visible" => Ok(SectionName::Visible),
            "hidden" => Ok(SectionName::Hidden),
            "alwaysHidden" | "always-hidden" | "always_hidden" => Ok(SectionName::AlwaysHidden),
            other => anyhow::bail!("Unknown section '{other}'"),
        }
    }
}

/// Whether a control item currently reveals or hides the items of its section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlItemState {
    ShowItems,
    HideItems,
}

/// The on-screen anchor for a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlItem {
    /// Stable identifier the OS uses to remember the anchor's position
    pub autosave_name: String,
    /// Ordinal counted from the trailing edge of the bar (0 = rightmost)
    #[serde(default)]
    pub position: Option<u32>,
    pub state: ControlItemState,
    pub is_visible: bool,
    /// Last observed screen rectangle (not persisted)
    #[serde(skip)]
    pub window_frame: Option<Rect>,
    /// Divider-style items grow to push their section off screen when collapsed
    pub expands_on_hide: bool,
}

impl ControlItem {
    pub fn is_showing(&self) -> bool {
        self.state == ControlItemState::ShowItems
    }
}

/// One named visibility group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: SectionName,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    pub control_item: ControlItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<KeyCombination>,
}

fn default_enabled() -> bool {
    true
}

impl Section {
    /// Canonical default for a section, with its fixed default anchor
    pub fn default_for(name: SectionName) -> Self {
        let (position, expands_on_hide) = match name {
            SectionName::Visible => (Some(0), false),
            SectionName::Hidden => (Some(1), true),
            SectionName::AlwaysHidden => (None, true),
        };
        Self {
            name,
            is_enabled: true,
            control_item: ControlItem {
                autosave_name: format!("Item-{}", name.index()),
                position,
                state: ControlItemState::HideItems,
                is_visible: true,
                window_frame: None,
                expands_on_hide,
            },
            hotkey: None,
        }
    }

    pub fn is_shown(&self) -> bool {
        self.control_item.is_showing()
    }

    #[cfg(test)]
    pub fn is_hidden(&self) -> bool {
        !self.is_shown()
    }
}

/// Fixed arena of exactly three sections, indexed by [`SectionName::index`]
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSet {
    sections: [Section; 3],
}

impl Default for SectionSet {
    fn default() -> Self {
        Self {
            sections: SectionName::ALL.map(Section::default_for),
        }
    }
}

impl SectionSet {
    pub fn get(&self, name: SectionName) -> &Section {
        &self.sections[name.index()]
    }

    pub(crate) fn get_mut(&mut self, name: SectionName) -> &mut Section {
        &mut self.sections[name.index()]
    }

    /// Look a section up by its external name (`"visible"`, `"hidden"`, `"alwaysHidden"`)
    pub fn section_named(&self, name: &str) -> Option<&Section> {
        name.parse::<SectionName>().ok().map(|n| self.get(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn is_shown(&self, name: SectionName) -> bool {
        self.get(name).is_shown()
    }

    pub fn control_items(&self) -> Vec<ControlItem> {
        self.sections.iter().map(|s| s.control_item.clone()).collect()
    }

    /// Hand anchor identities back to sections by index
    ///
    /// Only the anchor moves. Show state, visibility and divider behavior
    /// belong to the section and stay put, so containment survives a re-sort.
    pub(crate) fn assign_anchors(&mut self, items: [ControlItem; 3]) {
        for (section, item) in self.sections.iter_mut().zip(items) {
            let current = &mut section.control_item;
            current.autosave_name = item.autosave_name;
            current.position = item.position;
            current.window_frame = item.window_frame;
        }
    }

    pub fn to_vec(&self) -> Vec<Section> {
        self.sections.to_vec()
    }

    /// Containment invariant: a shown section implies every section below it is shown
    pub fn satisfies_containment(&self) -> bool {
        self.sections
            .windows(2)
            .all(|pair| !pair[1].is_shown() || pair[0].is_shown())
    }
}

/// Build the section arena from persisted state
///
/// Anything other than exactly one section per name resets to the canonical
/// defaults. A valid but permuted list is re-ordered into containment order.
pub fn initialize_sections(persisted: Option<Vec<Section>>) -> SectionSet {
    let Some(persisted) = persisted else {
        info!("No persisted sections, using defaults");
        return SectionSet::default();
    };

    if persisted.len() != SectionName::ALL.len() {
        warn!(count = persisted.len(), "Persisted section count is not 3, resetting to defaults");
        return SectionSet::default();
    }

    let mut slots: [Option<Section>; 3] = [None, None, None];
    for section in persisted {
        let slot = &mut slots[section.name.index()];
        if slot.is_some() {
            warn!(section = %section.name, "Duplicate persisted section, resetting to defaults");
            return SectionSet::default();
        }
        *slot = Some(section);
    }

    match slots {
        [Some(visible), Some(hidden), Some(always_hidden)] => {
            let mut set = SectionSet {
                sections: [visible, hidden, always_hidden],
            };
            repair_containment(&mut set);
            set
        }
        _ => {
            warn!("Persisted sections incomplete, resetting to defaults");
            SectionSet::default()
        }
    }
}

/// Hide any section whose lower neighbour is hidden
fn repair_containment(set: &mut SectionSet) {
    for index in 1..set.sections.len() {
        if set.sections[index].is_shown() && !set.sections[index - 1].is_shown() {
            warn!(section = %set.sections[index].name, "Restored state breaks containment, hiding section");
            set.sections[index].control_item.state = ControlItemState::HideItems;
        }
    }
}
