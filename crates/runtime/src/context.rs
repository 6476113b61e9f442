//! The battle facade every effect module talks to.
//!
//! [`BattleContext`] owns one peer's [`BattleState`] and wraps the rules
//! crate's mutators with the runtime concerns around them: authority checks,
//! presentation refreshes after each mutation, update emission, combat log
//! mirroring and speed-adjusted delays.
//!
//! Effects receive the context explicitly instead of reaching for a global,
//! so a test can build one around any state it likes.

use std::sync::Arc;
use std::time::Duration;

use battle_content::EffectTables;
use battle_core::{
    AbsoluteSide, BattleConfig, BattleOutcome, BattleState, Combatant, DamageDescriptor,
    DamageApplied, DamageSource, DelayedEffectRegistry, EntityRef, LogEntry, LogSeverity, ResistanceManager,
    StatusEffectsManager, StatusKind, TargetCollector, TargetPolicy,
};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::api::{Result, RuntimeError};
use crate::events::{
    Event, EventBus, HitRecord, NetworkUpdate, StatusRecord, SyncEvent, UpdatePayload, UpdateSender,
};
use crate::presentation::{Animation, CreatureView, NullPresentation, SharedPresentation, ViewTarget};

/// Result of one authoritative hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DamageOutcome {
    pub hit: HitRecord,
    /// Set when a primed healing potion turned a lethal hit into a survival.
    pub potion: Option<StatusRecord>,
}

pub struct BattleContext {
    state: BattleState,
    config: BattleConfig,
    tables: Arc<EffectTables>,
    resistance: Arc<ResistanceManager>,
    updates: Option<UpdateSender>,
    presentation: SharedPresentation,
    bus: EventBus,
    delayed: DelayedEffectRegistry,
}

impl BattleContext {
    pub fn new(state: BattleState, config: BattleConfig, tables: Arc<EffectTables>) -> Self {
        let bus = EventBus::with_capacity(config.update_buffer_size);
        Self {
            state,
            config,
            tables,
            resistance: Arc::new(ResistanceManager::default()),
            updates: None,
            presentation: Arc::new(NullPresentation),
            bus,
            delayed: DelayedEffectRegistry::new(),
        }
    }

    pub fn with_resistance(mut self, resistance: ResistanceManager) -> Self {
        self.resistance = Arc::new(resistance);
        self
    }

    pub fn with_presentation(mut self, presentation: SharedPresentation) -> Self {
        self.presentation = presentation;
        self
    }

    /// Connects the host to a guest. Without a sender the host plays solo.
    pub fn with_update_sender(mut self, updates: UpdateSender) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_delayed_effects(mut self, delayed: DelayedEffectRegistry) -> Self {
        self.delayed = delayed;
        self
    }

    // ===== read access =====

    pub fn is_authoritative(&self) -> bool {
        self.state.is_authoritative()
    }

    pub fn is_host(&self) -> bool {
        self.state.is_host()
    }

    pub fn my_side(&self) -> AbsoluteSide {
        self.state.my_side()
    }

    pub fn state(&self) -> &BattleState {
        &self.state
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn tables(&self) -> &EffectTables {
        &self.tables
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn combatant(&self, entity: EntityRef) -> Result<&Combatant> {
        Ok(self.state.resolve(entity)?)
    }

    /// Display name for logs; falls back to the canonical ref.
    pub fn name_of(&self, entity: EntityRef) -> String {
        self.state
            .combatant(entity)
            .map_or_else(|| entity.to_string(), |combatant| combatant.name().to_owned())
    }

    pub fn status_stacks(&self, entity: EntityRef, status: impl AsRef<str>) -> u32 {
        StatusEffectsManager::get_status_effect_stacks(&self.state, entity, status)
    }

    pub fn outcome(&self) -> BattleOutcome {
        self.state.outcome()
    }

    pub fn fingerprint(&self) -> Result<[u8; 32]> {
        self.state.fingerprint().map_err(RuntimeError::Fingerprint)
    }

    // ===== randomness (host only) =====

    pub fn get_random_int(&mut self, min: i64, max: i64) -> Result<i64> {
        self.ensure_authoritative("get_random_int")?;
        Ok(self.state.rng_mut().random_int(min, max))
    }

    pub fn get_random(&mut self) -> Result<f64> {
        self.ensure_authoritative("get_random")?;
        Ok(self.state.rng_mut().random())
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) -> Result<()> {
        self.ensure_authoritative("shuffle")?;
        self.state.rng_mut().shuffle(items);
        Ok(())
    }

    pub fn collect_targets(&mut self, caster: EntityRef, policy: &TargetPolicy) -> Vec<EntityRef> {
        TargetCollector::collect(&mut self.state, caster, policy)
    }

    pub fn should_resist_spell(
        &mut self,
        target: EntityRef,
        effect: &str,
        attacker: Option<EntityRef>,
    ) -> Result<bool> {
        Ok(self
            .resistance
            .should_resist_spell(&mut self.state, target, effect, attacker)?)
    }

    pub fn should_resist_area_spell(&mut self, target: EntityRef, effect: &str) -> Result<bool> {
        Ok(self
            .resistance
            .should_resist_area_spell(&mut self.state, target, effect)?)
    }

    // ===== log, sync and timing =====

    /// Appends a combat log line and mirrors it to tracing and the bus.
    pub fn add_combat_log(&mut self, message: impl Into<String>, severity: LogSeverity) {
        let entry = LogEntry {
            message: message.into(),
            severity,
        };
        debug!(
            target: "runtime::combat_log",
            peer = %self.my_side(),
            severity = severity.as_str(),
            "{}",
            entry.message
        );
        self.state.log_mut().push(entry.message.clone(), severity);
        self.bus.publish(Event::CombatLog {
            peer: self.my_side(),
            entry,
        });
    }

    /// Emits one update to the guest. A host without a guest skips the send
    /// and returns `None`.
    pub fn send_battle_update(&self, payload: UpdatePayload) -> Result<Option<NetworkUpdate>> {
        self.ensure_authoritative("send_battle_update")?;
        let Some(updates) = &self.updates else {
            debug!(target: "runtime::sync", kind = payload.kind().as_str(), "no guest connected, update dropped");
            return Ok(None);
        };
        let update = updates.send(payload)?;
        self.bus.publish(Event::Sync(SyncEvent::Emitted(update.clone())));
        Ok(Some(update))
    }

    /// Sequence number of the last update sent to the guest.
    pub fn last_sent_seq(&self) -> u64 {
        self.updates.as_ref().map_or(0, UpdateSender::last_seq)
    }

    pub fn speed_adjusted_delay(&self, ms: u64) -> u64 {
        self.config.speed_adjusted_delay(ms)
    }

    /// Sleeps for `ms` scaled by the battle speed setting.
    pub async fn delay(&self, ms: u64) {
        let ms = self.speed_adjusted_delay(ms);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Host-side wait between emitting an update and animating it.
    pub async fn guest_head_start(&self) {
        let ms = self.config.guest_head_start_ms;
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    // ===== presentation =====

    pub fn view_target(&self, entity: EntityRef) -> ViewTarget {
        ViewTarget {
            side: entity.relative_side(self.my_side()),
            position: entity.position(),
            creature: entity.creature_index(),
        }
    }

    /// Builds an animation with speed-adjusted timings.
    pub fn animation(&self, effect: &str, target: EntityRef, start_offset_ms: u64, duration_ms: u64) -> Animation {
        Animation {
            effect: effect.to_owned(),
            target: self.view_target(target),
            start_offset_ms: self.speed_adjusted_delay(start_offset_ms),
            duration_ms: self.speed_adjusted_delay(duration_ms),
        }
    }

    /// Plays animations concurrently and waits for all of them.
    pub async fn play_animations(&self, animations: Vec<Animation>) {
        let mut running = JoinSet::new();
        for animation in animations {
            let presentation = Arc::clone(&self.presentation);
            running.spawn(async move {
                if animation.start_offset_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(animation.start_offset_ms)).await;
                }
                let result = presentation.play(&animation).await;
                if animation.duration_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(animation.duration_ms)).await;
                }
                (animation, result)
            });
        }
        while let Some(joined) = running.join_next().await {
            match joined {
                Ok((animation, Err(error))) => {
                    warn!(target: "runtime::presentation", effect = %animation.effect, %error, "animation failed");
                }
                Ok(_) => {}
                Err(error) => warn!(target: "runtime::presentation", %error, "animation task failed"),
            }
        }
    }

    pub fn cleanup_presentation(&self, effect: &str) {
        self.presentation.cleanup(effect);
    }

    /// Pushes the entity's current numbers to the presentation layer.
    pub fn refresh(&self, entity: EntityRef) {
        let Some(combatant) = self.state.combatant(entity) else {
            warn!(target: "runtime::presentation", %entity, "refresh of unknown entity");
            return;
        };
        let view = self.view_target(entity);
        let statuses: Vec<(String, u32)> = combatant
            .statuses()
            .iter()
            .map(|(name, stacks)| (name.to_owned(), stacks))
            .collect();

        let mut results = vec![self.presentation.update_status_icons(view, &statuses)];
        if entity.is_hero() {
            results.push(self.presentation.update_hero_health_bar(
                view,
                combatant.current_hp(),
                combatant.max_hp(),
            ));
            results.push(
                self.presentation
                    .update_hero_attack_display(view, combatant.attack()),
            );
        }
        if let Some(hero) = self.state.hero(entity.side(), entity.position()) {
            let creatures: Vec<CreatureView> = hero
                .creatures()
                .iter()
                .map(|creature| CreatureView {
                    name: creature.name().to_owned(),
                    hp: creature.current_hp(),
                    max_hp: creature.max_hp(),
                    alive: creature.is_alive(),
                })
                .collect();
            results.push(
                self.presentation
                    .update_creature_visuals(self.view_target(entity.owner()), &creatures),
            );
        }
        for error in results.into_iter().filter_map(|result| result.err()) {
            warn!(target: "runtime::presentation", %entity, %error, "refresh failed");
        }
    }

    // ===== authoritative mutators =====

    /// Applies a caller-computed hit to a hero.
    pub fn authoritative_apply_damage(
        &mut self,
        descriptor: &DamageDescriptor,
        source: &DamageSource,
    ) -> Result<DamageApplied> {
        let applied = battle_core::apply_damage(&mut self.state, descriptor, source)?;
        self.after_hit(&applied);
        Ok(applied)
    }

    /// Applies a caller-computed hit to a creature.
    pub fn authoritative_apply_damage_to_creature(
        &mut self,
        descriptor: &DamageDescriptor,
        source: &DamageSource,
    ) -> Result<DamageApplied> {
        let applied = battle_core::apply_damage_to_creature(&mut self.state, descriptor, source)?;
        self.after_hit(&applied);
        Ok(applied)
    }

    /// Computes and applies `damage` to a hero or creature.
    ///
    /// A hero primed with `health_potion_ready` survives a lethal hit: one
    /// stack is spent and the hero is left at the potion's heal value.
    pub fn deal_damage(&mut self, target: EntityRef, damage: u32, source: &DamageSource) -> Result<DamageOutcome> {
        self.ensure_authoritative("deal_damage")?;
        if !self.combatant(target)?.is_alive() {
            return Err(RuntimeError::TargetDead { entity: target });
        }
        let mut descriptor = DamageDescriptor::compute(&self.state, target, damage)?;

        let mut potion = None;
        let potion_status = StatusKind::HealthPotionReady.as_str();
        if descriptor.died
            && target.is_hero()
            && StatusEffectsManager::consume_stack(&mut self.state, target, potion_status)?
        {
            let max_hp = self.combatant(target)?.max_hp();
            descriptor.new_hp = self.tables.potions.healing_potion_heal.clamp(1, max_hp.max(1));
            descriptor.died = false;
            potion = Some(StatusRecord {
                target,
                status: potion_status.to_owned(),
                stacks: 0,
                resisted: false,
                final_stacks: self.status_stacks(target, potion_status),
            });
        }

        let applied = if target.is_hero() {
            self.authoritative_apply_damage(&descriptor, source)?
        } else {
            self.authoritative_apply_damage_to_creature(&descriptor, source)?
        };

        Ok(DamageOutcome {
            hit: HitRecord {
                target,
                damage,
                shield_absorbed: descriptor.shield_absorbed,
                new_hp: applied.new_hp,
                new_shield: applied.shield_remaining,
                died: applied.died,
                resisted: false,
            },
            potion,
        })
    }

    fn after_hit(&self, applied: &DamageApplied) {
        debug!(
            target: "runtime::combat",
            entity = %applied.target,
            effect = %applied.source.effect,
            previous_hp = applied.previous_hp,
            new_hp = applied.new_hp,
            died = applied.died,
            "damage applied"
        );
        self.refresh(applied.target);
    }

    /// Adds status stacks; returns the new count.
    pub fn apply_status(&mut self, target: EntityRef, status: &str, stacks: u32) -> Result<u32> {
        let total = StatusEffectsManager::apply_status_effect(&mut self.state, target, status, stacks)?;
        self.refresh(target);
        Ok(total)
    }

    /// Spends one stack. Returns the remaining count, or `None` when there
    /// was nothing to spend.
    pub fn consume_status_stack(&mut self, target: EntityRef, status: &str) -> Result<Option<u32>> {
        if !StatusEffectsManager::consume_stack(&mut self.state, target, status)? {
            return Ok(None);
        }
        self.refresh(target);
        Ok(Some(self.status_stacks(target, status)))
    }

    pub fn heal(&mut self, target: EntityRef, amount: u32) -> Result<u32> {
        let healed = battle_core::heal(&mut self.state, target, amount)?;
        self.refresh(target);
        Ok(healed)
    }

    pub fn add_shield(&mut self, target: EntityRef, amount: u32) -> Result<u32> {
        let shield = battle_core::add_shield(&mut self.state, target, amount)?;
        self.refresh(target);
        Ok(shield)
    }

    pub fn add_attack_bonus(&mut self, target: EntityRef, amount: i32) -> Result<i32> {
        let bonus = battle_core::add_attack_bonus(&mut self.state, target, amount)?;
        self.refresh(target);
        Ok(bonus)
    }

    // ===== overwrite primitives (any peer) =====

    pub fn set_hp(&mut self, target: EntityRef, hp: u32) -> Result<()> {
        battle_core::set_hp(&mut self.state, target, hp)?;
        self.refresh(target);
        Ok(())
    }

    pub fn set_shield(&mut self, target: EntityRef, shield: u32) -> Result<()> {
        battle_core::set_shield(&mut self.state, target, shield)?;
        self.refresh(target);
        Ok(())
    }

    pub fn set_attack_bonus(&mut self, target: EntityRef, bonus: i32) -> Result<()> {
        battle_core::set_attack_bonus(&mut self.state, target, bonus)?;
        self.refresh(target);
        Ok(())
    }

    pub fn set_status_stacks(&mut self, target: EntityRef, status: &str, stacks: u32) -> Result<()> {
        StatusEffectsManager::set_status_effect_stacks(&mut self.state, target, status, stacks)?;
        self.refresh(target);
        Ok(())
    }

    /// End-of-battle status wipe.
    pub fn clear_battle(&mut self) {
        StatusEffectsManager::clear_battle(&mut self.state);
    }

    // ===== delayed effects =====

    pub fn delayed_effects(&self) -> &DelayedEffectRegistry {
        &self.delayed
    }

    pub fn delayed_effects_mut(&mut self) -> &mut DelayedEffectRegistry {
        &mut self.delayed
    }

    // ===== checkpoints =====

    pub(crate) fn checkpoint(&self) -> BattleState {
        self.state.clone()
    }

    pub(crate) fn restore(&mut self, checkpoint: BattleState) {
        self.state = checkpoint;
    }

    fn ensure_authoritative(&self, operation: &'static str) -> Result<()> {
        if self.is_authoritative() {
            Ok(())
        } else {
            Err(RuntimeError::NotAuthoritative { operation })
        }
    }
}
