//! Per-effect tuning numbers.
//!
//! Every magnitude an effect module uses (stack counts, damage, shield per
//! stack, target counts) is read from [`EffectTables`]. Missing keys in a
//! tables file fall back to the defaults below, so a partial file only has to
//! name what it changes.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EffectTables {
    pub potions: PotionTables,
    pub spells: SpellTables,
    pub creatures: CreatureTables,
    pub artifacts: ArtifactTables,
    pub resistance: ResistanceTables,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PotionTables {
    /// `poisoned` stacks per enemy from a Poison Vial.
    pub poison_vial_stacks: u32,
    /// `frozen` stacks per enemy from an Elixir of Cold.
    pub elixir_of_cold_stacks: u32,
    /// `health_potion_ready` stacks per ally hero from a Healing Potion.
    pub healing_potion_stacks: u32,
    /// HP a primed potion leaves its hero with after a lethal hit.
    pub healing_potion_heal: u32,
}

impl Default for PotionTables {
    fn default() -> Self {
        Self {
            poison_vial_stacks: 1,
            elixir_of_cold_stacks: 1,
            healing_potion_stacks: 1,
            healing_potion_heal: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpellTables {
    pub burning_rain_targets: usize,
    pub burning_rain_damage: u32,
    /// Extra damage per Fireball in the caster's graveyard.
    pub burning_rain_damage_per_fireball: u32,
    pub burning_rain_burn_stacks: u32,
    pub cloud_of_confusion_stacks: u32,
    pub heal_block_stacks: u32,
}

impl Default for SpellTables {
    fn default() -> Self {
        Self {
            burning_rain_targets: 3,
            burning_rain_damage: 60,
            burning_rain_damage_per_fireball: 10,
            burning_rain_burn_stacks: 1,
            cloud_of_confusion_stacks: 1,
            heal_block_stacks: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CreatureTables {
    /// Attack bonus each allied hero gains from a Skeleton Rally.
    pub skeleton_rally_bonus: i32,
    pub cannon_burst_damage: u32,
}

impl Default for CreatureTables {
    fn default() -> Self {
        Self {
            skeleton_rally_bonus: 10,
            cannon_burst_damage: 120,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArtifactTables {
    pub guardian_shield_per_stack: u32,
    /// Extra shield per stack for each distinct living Wisp on the side.
    pub guardian_shield_per_wisp: u32,
    pub healing_reserve_heal: u32,
}

impl Default for ArtifactTables {
    fn default() -> Self {
        Self {
            guardian_shield_per_stack: 40,
            guardian_shield_per_wisp: 10,
            healing_reserve_heal: 75,
        }
    }
}

/// Chances (percent) for the default resistance oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResistanceTables {
    pub spell_percent: u32,
    pub area_percent: u32,
}

impl Default for ResistanceTables {
    fn default() -> Self {
        Self {
            spell_percent: 10,
            area_percent: 15,
        }
    }
}

impl ResistanceTables {
    pub fn oracle(&self) -> battle_core::ChanceResistance {
        battle_core::ChanceResistance {
            spell_percent: self.spell_percent,
            area_percent: self.area_percent,
        }
    }
}
