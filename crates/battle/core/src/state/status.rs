//! Status effect storage for battle entities.
//!
//! Status effects are named stack counters. The registry of names is open:
//! [`StatusKind`] lists the well-known names, but any string key is valid.
//! Reads and writes go through [`crate::StatusEffectsManager`]; this module
//! only holds the map and upholds the "no zero entries" invariant.

use std::collections::BTreeMap;

/// Stack counts of named status conditions on one entity.
///
/// Invariant: every stored count is `>= 1`. An entry that would drop to 0 is
/// removed, so a later query cannot resurrect a stale value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusEffects {
    stacks: BTreeMap<String, u32>,
}

impl StatusEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, name: &str) -> u32 {
        self.stacks.get(name).copied().unwrap_or(0)
    }

    pub(crate) fn add(&mut self, name: &str, stacks: u32) -> u32 {
        let entry = self.stacks.entry(name.to_owned()).or_insert(0);
        *entry = entry.saturating_add(stacks);
        *entry
    }

    pub(crate) fn subtract(&mut self, name: &str, stacks: u32) -> u32 {
        let remaining = self.get(name).saturating_sub(stacks);
        self.set(name, remaining);
        remaining
    }

    pub(crate) fn set(&mut self, name: &str, value: u32) {
        if value == 0 {
            self.stacks.remove(name);
        } else {
            self.stacks.insert(name.to_owned(), value);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.stacks.clear();
    }

    /// Names of all active statuses, in sorted order (display only).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stacks.keys().map(String::as_str)
    }

    /// `(name, stacks)` pairs in sorted order (display only).
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.stacks.iter().map(|(name, stacks)| (name.as_str(), *stacks))
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }
}

/// Well-known status names.
///
/// Effects pass these wherever a status name is expected (`impl AsRef<str>`);
/// ad-hoc names are plain strings.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StatusKind {
    /// Damage over time, applied by poison potions.
    Poisoned,
    /// Damage over time, applied by fire spells.
    Burned,
    /// Skips actions while present.
    Frozen,
    /// Attacks may miss while present.
    Clouded,
    /// Healing has no effect while present.
    HealBlock,
    /// Stored heals for the healing-reserve artifact; one stack per heal.
    HealingReserve,
    /// Potion primed to fire on the hero's next low-health check.
    HealthPotionReady,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
