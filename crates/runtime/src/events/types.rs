//! Wire types for host-to-guest battle updates.
//!
//! Every payload carries canonical [`EntityRef`]s and the host's final
//! values (HP, shield, bonus, stack count). The guest writes those values
//! with the overwrite primitives, so replaying an update twice leaves the
//! same state as replaying it once.

use battle_core::{AbsoluteSide, BattleOutcome, EntityRef};
use serde::{Deserialize, Serialize};

/// One message on the battle update channel.
///
/// Serialized as `{ "seq", "timestamp", "type", "payload" }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkUpdate {
    /// Host send order, starting at 1.
    pub seq: u64,
    /// Milliseconds since the host session started.
    pub timestamp: u64,
    #[serde(flatten)]
    pub payload: UpdatePayload,
}

/// Status stacks written on one target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub target: EntityRef,
    pub status: String,
    /// Stacks added by this effect (0 when resisted).
    pub stacks: u32,
    pub resisted: bool,
    /// Stack count after the effect resolved.
    pub final_stacks: u32,
}

/// One resolved hit, in host application order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRecord {
    pub target: EntityRef,
    pub damage: u32,
    pub shield_absorbed: u32,
    pub new_hp: u32,
    pub new_shield: u32,
    pub died: bool,
    pub resisted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRecord {
    pub hero: EntityRef,
    pub bonus: i32,
    pub new_attack_bonus: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldRecord {
    pub target: EntityRef,
    pub amount: u32,
    pub new_shield: u32,
}

/// Update catalogue. `type` on the wire is the snake_case variant name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UpdatePayload {
    StatusApplied {
        effect: String,
        caster: Option<EntityRef>,
        targets: Vec<StatusRecord>,
    },
    DamageDealt {
        effect: String,
        caster: EntityRef,
        hits: Vec<HitRecord>,
        /// Statuses written alongside the hits (burn, spent potions).
        statuses: Vec<StatusRecord>,
    },
    AttackRally {
        effect: String,
        caster: EntityRef,
        boosts: Vec<BoostRecord>,
    },
    ShieldGranted {
        effect: String,
        /// Card that registered the shield.
        source: String,
        side: AbsoluteSide,
        /// Shield granted to each target (`stacks * shield_per_stack`).
        total_shield: u32,
        grants: Vec<ShieldRecord>,
    },
    Healed {
        effect: String,
        /// Entity whose stack paid for the heal.
        holder: EntityRef,
        target: EntityRef,
        amount: u32,
        new_hp: u32,
        status: String,
        stacks_remaining: u32,
    },
    EffectFizzled {
        effect: String,
        caster: Option<EntityRef>,
        reason: String,
    },
    /// `apply` failed; `core` is what the module's reduced path wrote.
    Misfired {
        effect: String,
        core: Box<UpdatePayload>,
    },
    StatusConsumed {
        target: EntityRef,
        status: String,
        remaining: u32,
        /// Effect that was skipped because of the consumed stack.
        skipped_effect: String,
    },
    BattleEnded {
        outcome: BattleOutcome,
    },
}

/// Discriminant of [`UpdatePayload`], used as the replay dispatch key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    StatusApplied,
    DamageDealt,
    AttackRally,
    ShieldGranted,
    Healed,
    EffectFizzled,
    Misfired,
    StatusConsumed,
    BattleEnded,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 9] = [
        UpdateKind::StatusApplied,
        UpdateKind::DamageDealt,
        UpdateKind::AttackRally,
        UpdateKind::ShieldGranted,
        UpdateKind::Healed,
        UpdateKind::EffectFizzled,
        UpdateKind::Misfired,
        UpdateKind::StatusConsumed,
        UpdateKind::BattleEnded,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StatusApplied => "status_applied",
            Self::DamageDealt => "damage_dealt",
            Self::AttackRally => "attack_rally",
            Self::ShieldGranted => "shield_granted",
            Self::Healed => "healed",
            Self::EffectFizzled => "effect_fizzled",
            Self::Misfired => "misfired",
            Self::StatusConsumed => "status_consumed",
            Self::BattleEnded => "battle_ended",
        }
    }
}

impl UpdatePayload {
    pub fn kind(&self) -> UpdateKind {
        match self {
            Self::StatusApplied { .. } => UpdateKind::StatusApplied,
            Self::DamageDealt { .. } => UpdateKind::DamageDealt,
            Self::AttackRally { .. } => UpdateKind::AttackRally,
            Self::ShieldGranted { .. } => UpdateKind::ShieldGranted,
            Self::Healed { .. } => UpdateKind::Healed,
            Self::EffectFizzled { .. } => UpdateKind::EffectFizzled,
            Self::Misfired { .. } => UpdateKind::Misfired,
            Self::StatusConsumed { .. } => UpdateKind::StatusConsumed,
            Self::BattleEnded { .. } => UpdateKind::BattleEnded,
        }
    }

    /// Name of the effect module that produced this update, if any.
    pub fn effect(&self) -> Option<&str> {
        match self {
            Self::StatusApplied { effect, .. }
            | Self::DamageDealt { effect, .. }
            | Self::AttackRally { effect, .. }
            | Self::ShieldGranted { effect, .. }
            | Self::Healed { effect, .. }
            | Self::EffectFizzled { effect, .. }
            | Self::Misfired { effect, .. } => Some(effect),
            Self::StatusConsumed { skipped_effect, .. } => Some(skipped_effect),
            Self::BattleEnded { .. } => None,
        }
    }

    /// Number of targets the effect actually changed.
    pub fn affected_count(&self) -> usize {
        match self {
            Self::StatusApplied { targets, .. } => {
                targets.iter().filter(|record| !record.resisted).count()
            }
            Self::DamageDealt { hits, .. } => hits.iter().filter(|hit| !hit.resisted).count(),
            Self::AttackRally { boosts, .. } => boosts.len(),
            Self::ShieldGranted { grants, .. } => grants.len(),
            Self::Healed { amount, .. } => usize::from(*amount > 0),
            Self::Misfired { core, .. } => core.affected_count(),
            Self::StatusConsumed { .. } => 1,
            Self::EffectFizzled { .. } | Self::BattleEnded { .. } => 0,
        }
    }

    /// Every entity the payload references, in payload order.
    pub fn entities(&self) -> Vec<EntityRef> {
        match self {
            Self::StatusApplied { caster, targets, .. } => caster
                .iter()
                .copied()
                .chain(targets.iter().map(|record| record.target))
                .collect(),
            Self::DamageDealt {
                caster,
                hits,
                statuses,
                ..
            } => std::iter::once(*caster)
                .chain(hits.iter().map(|hit| hit.target))
                .chain(statuses.iter().map(|record| record.target))
                .collect(),
            Self::AttackRally { caster, boosts, .. } => std::iter::once(*caster)
                .chain(boosts.iter().map(|boost| boost.hero))
                .collect(),
            Self::ShieldGranted { grants, .. } => grants.iter().map(|grant| grant.target).collect(),
            Self::Healed { holder, target, .. } => vec![*holder, *target],
            Self::EffectFizzled { caster, .. } => caster.iter().copied().collect(),
            Self::Misfired { core, .. } => core.entities(),
            Self::StatusConsumed { target, .. } => vec![*target],
            Self::BattleEnded { .. } => Vec::new(),
        }
    }
}
