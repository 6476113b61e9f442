//! Rendering seam between battle logic and whatever draws it.
//!
//! The presentation layer only ever sees viewer-relative coordinates
//! ([`ViewTarget`]); the context converts canonical refs before calling in.
//! Failures here never abort a mutation: the context logs them and moves on.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use battle_core::{Position, RelativeSide};
use thiserror::Error;

/// Viewer-relative address of a hero or creature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewTarget {
    pub side: RelativeSide,
    pub position: Position,
    pub creature: Option<usize>,
}

/// One visual effect to play.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Animation {
    pub effect: String,
    pub target: ViewTarget,
    /// Delay before this animation starts, already speed-adjusted.
    pub start_offset_ms: u64,
    /// How long the effect runs, already speed-adjusted.
    pub duration_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatureView {
    pub name: String,
    pub hp: u32,
    pub max_hp: u32,
    pub alive: bool,
}

#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("no visual anchor for {0:?}")]
    MissingAnchor(ViewTarget),

    #[error("presentation unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Presentation: Send + Sync {
    /// Starts `animation`. Timing is handled by the caller.
    async fn play(&self, animation: &Animation) -> Result<(), PresentationError>;

    fn update_hero_health_bar(
        &self,
        target: ViewTarget,
        hp: u32,
        max_hp: u32,
    ) -> Result<(), PresentationError>;

    fn update_hero_attack_display(&self, target: ViewTarget, attack: i32) -> Result<(), PresentationError>;

    fn update_creature_visuals(
        &self,
        hero: ViewTarget,
        creatures: &[CreatureView],
    ) -> Result<(), PresentationError>;

    fn update_status_icons(
        &self,
        target: ViewTarget,
        statuses: &[(String, u32)],
    ) -> Result<(), PresentationError>;

    /// Removes lingering visuals of one effect.
    fn cleanup(&self, _effect: &str) {}
}

/// Headless presentation: every call succeeds and draws nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPresentation;

#[async_trait]
impl Presentation for NullPresentation {
    async fn play(&self, _animation: &Animation) -> Result<(), PresentationError> {
        Ok(())
    }

    fn update_hero_health_bar(&self, _: ViewTarget, _: u32, _: u32) -> Result<(), PresentationError> {
        Ok(())
    }

    fn update_hero_attack_display(&self, _: ViewTarget, _: i32) -> Result<(), PresentationError> {
        Ok(())
    }

    fn update_creature_visuals(&self, _: ViewTarget, _: &[CreatureView]) -> Result<(), PresentationError> {
        Ok(())
    }

    fn update_status_icons(&self, _: ViewTarget, _: &[(String, u32)]) -> Result<(), PresentationError> {
        Ok(())
    }
}

/// What a [`RecordingPresentation`] was asked to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentationCall {
    Play(Animation),
    HealthBar { target: ViewTarget, hp: u32, max_hp: u32 },
    Attack { target: ViewTarget, attack: i32 },
    Creatures { hero: ViewTarget, creatures: Vec<CreatureView> },
    Statuses { target: ViewTarget, statuses: Vec<(String, u32)> },
    Cleanup(String),
}

/// Records every call; targets registered as missing fail like an absent
/// visual anchor would.
#[derive(Clone, Debug, Default)]
pub struct RecordingPresentation {
    calls: Arc<Mutex<Vec<PresentationCall>>>,
    missing: Arc<Mutex<HashSet<ViewTarget>>>,
}

impl RecordingPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_anchor(self, target: ViewTarget) -> Self {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(target);
        }
        self
    }

    pub fn calls(&self) -> Vec<PresentationCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn played(&self) -> Vec<Animation> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PresentationCall::Play(animation) => Some(animation),
                _ => None,
            })
            .collect()
    }

    fn record(&self, target: ViewTarget, call: PresentationCall) -> Result<(), PresentationError> {
        let missing = self
            .missing
            .lock()
            .map(|missing| missing.contains(&target))
            .unwrap_or(false);
        if missing {
            return Err(PresentationError::MissingAnchor(target));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(())
    }
}

#[async_trait]
impl Presentation for RecordingPresentation {
    async fn play(&self, animation: &Animation) -> Result<(), PresentationError> {
        self.record(animation.target, PresentationCall::Play(animation.clone()))
    }

    fn update_hero_health_bar(
        &self,
        target: ViewTarget,
        hp: u32,
        max_hp: u32,
    ) -> Result<(), PresentationError> {
        self.record(target, PresentationCall::HealthBar { target, hp, max_hp })
    }

    fn update_hero_attack_display(&self, target: ViewTarget, attack: i32) -> Result<(), PresentationError> {
        self.record(target, PresentationCall::Attack { target, attack })
    }

    fn update_creature_visuals(
        &self,
        hero: ViewTarget,
        creatures: &[CreatureView],
    ) -> Result<(), PresentationError> {
        self.record(
            hero,
            PresentationCall::Creatures {
                hero,
                creatures: creatures.to_vec(),
            },
        )
    }

    fn update_status_icons(
        &self,
        target: ViewTarget,
        statuses: &[(String, u32)],
    ) -> Result<(), PresentationError> {
        self.record(
            target,
            PresentationCall::Statuses {
                target,
                statuses: statuses.to_vec(),
            },
        )
    }

    fn cleanup(&self, effect: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(PresentationCall::Cleanup(effect.to_owned()));
        }
    }
}

/// Shared handle type stored by the context.
pub type SharedPresentation = Arc<dyn Presentation>;
