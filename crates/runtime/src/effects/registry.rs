//! Name-keyed lookup of effect modules, built once per session.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    BurningRain, CannonBurst, CloudOfConfusion, EffectCategory, EffectModule, ElixirOfCold, GuardianShield,
    HealBlockCurse, HealingPotion, HealingReserve, PoisonVial, SkeletonRally,
};
use crate::api::{Result, RuntimeError};
use crate::context::BattleContext;

#[derive(Clone, Default)]
pub struct EffectRegistry {
    modules: HashMap<&'static str, Arc<dyn EffectModule>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in artifact, creature attack, potion and spell.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(GuardianShield);
        registry.register(HealingReserve);
        registry.register(SkeletonRally);
        registry.register(CannonBurst);
        registry.register(PoisonVial);
        registry.register(ElixirOfCold);
        registry.register(HealingPotion);
        registry.register(BurningRain);
        registry.register(CloudOfConfusion);
        registry.register(HealBlockCurse);
        registry
    }

    /// Adds or replaces the module registered under `module.name()`.
    pub fn register(&mut self, module: impl EffectModule + 'static) {
        self.modules.insert(module.name(), Arc::new(module));
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn EffectModule>> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownEffect { name: name.to_owned() })
    }

    /// Module that resolves delayed effects of `effect_type`.
    pub fn by_delayed_type(&self, effect_type: &str) -> Option<Arc<dyn EffectModule>> {
        self.modules
            .values()
            .find(|module| module.delayed_type() == Some(effect_type))
            .cloned()
    }

    /// Modules in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EffectModule>> {
        let mut modules: Vec<_> = self.modules.values().collect();
        modules.sort_by_key(|module| module.name());
        modules.into_iter()
    }

    pub fn by_category(&self, category: EffectCategory) -> impl Iterator<Item = &Arc<dyn EffectModule>> {
        self.iter().filter(move |module| module.category() == category)
    }

    /// Runs every module's `cleanup`. Safe to call at any time.
    pub fn cleanup_all(&self, ctx: &BattleContext) {
        for module in self.iter() {
            module.cleanup(ctx);
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("modules", &self.iter().map(|module| module.name()).collect::<Vec<_>>())
            .finish()
    }
}
