//! Data-driven battle content and loaders.
//!
//! - Effect tuning tables (TOML)
//! - Battle configuration (TOML)
//! - Battle scenarios: hero placement, graveyards, delayed effects and
//!   scripted triggers (RON)
//!
//! Content parameterizes effect modules and battle setup; it never appears
//! in replicated battle state.

pub mod scenario;
pub mod tables;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use scenario::{CreatureSpec, DelayedSpec, HeroSpec, Scenario, SideSpec, TriggerSpec};
pub use tables::{
    ArtifactTables, CreatureTables, EffectTables, PotionTables, ResistanceTables, SpellTables,
};

#[cfg(feature = "loaders")]
pub use loaders::{ConfigLoader, ContentFactory, LoadResult, ScenarioLoader, TablesLoader};
