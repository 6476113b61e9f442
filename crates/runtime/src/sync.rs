//! Guest-side replay of host updates.
//!
//! The guest never rolls dice and never derives numbers: [`reconcile`]
//! writes the host's final values with the overwrite primitives, then the
//! effect module plays its log lines and animations. Updates are handled
//! strictly in arrival order, and the entries of one payload in list order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use battle_core::{BattleError, BattleOutcome, LogSeverity};
use tracing::{debug, error, info, warn};

use crate::api::{Result, RuntimeError};
use crate::context::BattleContext;
use crate::effects::{EffectRegistry, log_fizzle, log_frozen, log_misfire};
use crate::events::{Event, NetworkUpdate, SyncEvent, UpdateKind, UpdatePayload};

/// Writes the host's final values from `payload` into the local mirror.
///
/// Every referenced entity is resolved before anything is written, so a
/// payload naming a missing hero or creature leaves the mirror untouched.
/// Applying the same payload twice yields the same state as applying it once.
pub fn reconcile(ctx: &mut BattleContext, payload: &UpdatePayload) -> Result<()> {
    for entity in payload.entities() {
        ctx.combatant(entity)?;
    }

    match payload {
        UpdatePayload::StatusApplied { targets, .. } => {
            for record in targets {
                ctx.set_status_stacks(record.target, &record.status, record.final_stacks)?;
            }
        }
        UpdatePayload::DamageDealt { hits, statuses, .. } => {
            for hit in hits {
                ctx.set_shield(hit.target, hit.new_shield)?;
                ctx.set_hp(hit.target, hit.new_hp)?;
                let alive = ctx.combatant(hit.target)?.is_alive();
                if alive == hit.died {
                    error!(
                        target: "runtime::replay",
                        entity = %hit.target,
                        new_hp = hit.new_hp,
                        died = hit.died,
                        "host death flag disagrees with replayed hp"
                    );
                }
            }
            for record in statuses {
                ctx.set_status_stacks(record.target, &record.status, record.final_stacks)?;
            }
        }
        UpdatePayload::AttackRally { boosts, .. } => {
            for boost in boosts {
                ctx.set_attack_bonus(boost.hero, boost.new_attack_bonus)?;
            }
        }
        UpdatePayload::ShieldGranted { grants, .. } => {
            for grant in grants {
                ctx.set_shield(grant.target, grant.new_shield)?;
            }
        }
        UpdatePayload::Healed {
            holder,
            target,
            new_hp,
            status,
            stacks_remaining,
            ..
        } => {
            ctx.set_status_stacks(*holder, status, *stacks_remaining)?;
            ctx.set_hp(*target, *new_hp)?;
        }
        UpdatePayload::StatusConsumed {
            target,
            status,
            remaining,
            ..
        } => {
            ctx.set_status_stacks(*target, status, *remaining)?;
        }
        UpdatePayload::Misfired { core, .. } => reconcile(ctx, core)?,
        UpdatePayload::EffectFizzled { .. } | UpdatePayload::BattleEnded { .. } => {}
    }
    Ok(())
}

/// Combat log line for the end of the battle, from the viewer's side.
pub(crate) fn log_battle_end(ctx: &mut BattleContext, outcome: BattleOutcome) {
    let (message, severity) = match outcome {
        BattleOutcome::Victory(side) if side == ctx.my_side() => ("Victory! The battle is won.", LogSeverity::Success),
        BattleOutcome::Victory(_) => ("Defeat. The battle is lost.", LogSeverity::Error),
        BattleOutcome::Draw => ("The battle ends in a draw.", LogSeverity::Warning),
        BattleOutcome::Ongoing => return,
    };
    ctx.add_combat_log(message, severity);
}

// ============================================================================
// Replay handlers
// ============================================================================

/// Guest handler for one update kind.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    async fn replay(&self, ctx: &mut BattleContext, effects: &EffectRegistry, payload: &UpdatePayload) -> Result<()>;
}

/// Routes an effect payload to the module that produced it.
struct EffectReplay;

#[async_trait]
impl ReplayHandler for EffectReplay {
    async fn replay(&self, ctx: &mut BattleContext, effects: &EffectRegistry, payload: &UpdatePayload) -> Result<()> {
        let name = payload.effect().unwrap_or_default();
        match effects.get(name) {
            Ok(module) => module.replay(ctx, payload).await,
            Err(error) => {
                // State still converges; only the flourish is lost.
                warn!(target: "runtime::replay", effect = name, %error, "no module for update, reconciling only");
                reconcile(ctx, payload)
            }
        }
    }
}

struct FizzleReplay;

#[async_trait]
impl ReplayHandler for FizzleReplay {
    async fn replay(&self, ctx: &mut BattleContext, effects: &EffectRegistry, payload: &UpdatePayload) -> Result<()> {
        let UpdatePayload::EffectFizzled { effect, reason, .. } = payload else {
            return Err(RuntimeError::UnknownUpdateType {
                kind: payload.kind().as_str(),
            });
        };
        reconcile(ctx, payload)?;
        let display = effects
            .get(effect)
            .map_or_else(|_| effect.clone(), |module| module.display_name().to_owned());
        log_fizzle(ctx, &display, reason);
        Ok(())
    }
}

/// Writes a fallback's reduced result and the host's misfire line. The
/// module's `play` does not run, matching the host.
struct MisfireReplay;

#[async_trait]
impl ReplayHandler for MisfireReplay {
    async fn replay(&self, ctx: &mut BattleContext, effects: &EffectRegistry, payload: &UpdatePayload) -> Result<()> {
        let UpdatePayload::Misfired { effect, .. } = payload else {
            return Err(RuntimeError::UnknownUpdateType {
                kind: payload.kind().as_str(),
            });
        };
        reconcile(ctx, payload)?;
        let display = effects
            .get(effect)
            .map_or_else(|_| effect.clone(), |module| module.display_name().to_owned());
        log_misfire(ctx, &display);
        Ok(())
    }
}

struct FrozenReplay;

#[async_trait]
impl ReplayHandler for FrozenReplay {
    async fn replay(&self, ctx: &mut BattleContext, effects: &EffectRegistry, payload: &UpdatePayload) -> Result<()> {
        let UpdatePayload::StatusConsumed {
            target,
            skipped_effect,
            ..
        } = payload
        else {
            return Err(RuntimeError::UnknownUpdateType {
                kind: payload.kind().as_str(),
            });
        };
        reconcile(ctx, payload)?;
        let display = effects
            .get(skipped_effect)
            .map_or_else(|_| skipped_effect.clone(), |module| module.display_name().to_owned());
        log_frozen(ctx, *target, &display);
        Ok(())
    }
}

struct BattleEndReplay;

#[async_trait]
impl ReplayHandler for BattleEndReplay {
    async fn replay(&self, ctx: &mut BattleContext, effects: &EffectRegistry, payload: &UpdatePayload) -> Result<()> {
        let UpdatePayload::BattleEnded { outcome } = payload else {
            return Err(RuntimeError::UnknownUpdateType {
                kind: payload.kind().as_str(),
            });
        };
        let local = ctx.outcome();
        if local != *outcome {
            error!(target: "runtime::replay", ?local, host = ?outcome, "battle outcome diverged");
        }
        log_battle_end(ctx, *outcome);
        ctx.clear_battle();
        effects.cleanup_all(ctx);
        Ok(())
    }
}

/// Map from update kind to handler, built once per guest session.
#[derive(Clone)]
pub struct ReplayRegistry {
    handlers: HashMap<UpdateKind, Arc<dyn ReplayHandler>>,
    effects: EffectRegistry,
}

impl ReplayRegistry {
    pub fn new(effects: EffectRegistry) -> Self {
        let effect: Arc<dyn ReplayHandler> = Arc::new(EffectReplay);
        let mut handlers: HashMap<UpdateKind, Arc<dyn ReplayHandler>> = HashMap::new();
        for kind in [
            UpdateKind::StatusApplied,
            UpdateKind::DamageDealt,
            UpdateKind::AttackRally,
            UpdateKind::ShieldGranted,
            UpdateKind::Healed,
        ] {
            handlers.insert(kind, Arc::clone(&effect));
        }
        handlers.insert(UpdateKind::EffectFizzled, Arc::new(FizzleReplay));
        handlers.insert(UpdateKind::Misfired, Arc::new(MisfireReplay));
        handlers.insert(UpdateKind::StatusConsumed, Arc::new(FrozenReplay));
        handlers.insert(UpdateKind::BattleEnded, Arc::new(BattleEndReplay));
        Self { handlers, effects }
    }

    /// Replaces the handler for `kind`.
    pub fn with_handler(mut self, kind: UpdateKind, handler: Arc<dyn ReplayHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    pub async fn dispatch(&self, ctx: &mut BattleContext, update: &NetworkUpdate) -> Result<()> {
        let kind = update.payload.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(RuntimeError::UnknownUpdateType { kind: kind.as_str() })?;
        handler.replay(ctx, &self.effects, &update.payload).await
    }
}

impl std::fmt::Debug for ReplayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayRegistry")
            .field("kinds", &self.handlers.len())
            .field("effects", &self.effects)
            .finish()
    }
}

// ============================================================================
// Guest replayer
// ============================================================================

/// What became of one received update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayStatus {
    Applied,
    /// Already seen; skipped so log lines are not repeated.
    Duplicate,
    /// Logged and dropped; the mirror may have diverged.
    Rejected,
}

/// Applies host updates to the guest mirror in arrival order.
#[derive(Debug)]
pub struct GuestReplayer {
    registry: ReplayRegistry,
    last_seq: u64,
}

impl GuestReplayer {
    pub fn new(registry: ReplayRegistry) -> Self {
        Self { registry, last_seq: 0 }
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn registry(&self) -> &ReplayRegistry {
        &self.registry
    }

    pub async fn receive(&mut self, ctx: &mut BattleContext, update: NetworkUpdate) -> ReplayStatus {
        let seq = update.seq;
        if seq <= self.last_seq {
            warn!(target: "runtime::replay", seq, last = self.last_seq, "duplicate update skipped");
            return ReplayStatus::Duplicate;
        }
        if seq != self.last_seq + 1 {
            warn!(target: "runtime::replay", seq, expected = self.last_seq + 1, "gap in update sequence");
        }
        self.last_seq = seq;

        let kind = update.payload.kind().as_str();
        debug!(target: "runtime::replay", seq, kind, "replaying update");
        match self.registry.dispatch(ctx, &update).await {
            Ok(()) => {
                ctx.bus().publish(Event::Sync(SyncEvent::Replayed(update)));
                ReplayStatus::Applied
            }
            Err(error) => {
                self.reject(ctx, seq, &error);
                ReplayStatus::Rejected
            }
        }
    }

    /// Reports an update that could not be applied, or a frame that could
    /// not be decoded (`seq` 0).
    pub fn reject(&self, ctx: &BattleContext, seq: u64, error: &RuntimeError) {
        error!(
            target: "runtime::replay",
            seq,
            code = error.error_code(),
            severity = ?error.severity(),
            %error,
            "update rejected"
        );
        ctx.bus().publish(Event::Sync(SyncEvent::Rejected {
            seq,
            error: error.to_string(),
        }));
    }

    pub fn log_summary(&self, ctx: &BattleContext) {
        let fingerprint = ctx.fingerprint().map(hex::encode).unwrap_or_default();
        info!(
            target: "runtime::replay",
            last_seq = self.last_seq,
            outcome = ?ctx.outcome(),
            %fingerprint,
            "guest replay finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use battle_content::EffectTables;
    use battle_core::{AbsoluteSide, BattleConfig, BattleState, EntityRef, Hero, Position, RelativeSide};

    use super::*;
    use crate::events::{BoostRecord, HitRecord, StatusRecord, Topic};
    use crate::presentation::{PresentationCall, RecordingPresentation};

    fn bob() -> EntityRef {
        EntityRef::hero(AbsoluteSide::Guest, Position::Left)
    }

    fn alice() -> EntityRef {
        EntityRef::hero(AbsoluteSide::Host, Position::Center)
    }

    fn guest_state() -> BattleState {
        let mut state = BattleState::new(AbsoluteSide::Guest, 0);
        state.place_hero(Hero::new("Alice", AbsoluteSide::Host, Position::Center, 400, 30));
        state.place_hero(Hero::new("Bob", AbsoluteSide::Guest, Position::Left, 500, 20).with_creature("Imp", 80, 10));
        state
    }

    fn guest() -> BattleContext {
        BattleContext::new(guest_state(), BattleConfig::new(), Arc::new(EffectTables::default()))
    }

    fn update(seq: u64, payload: UpdatePayload) -> NetworkUpdate {
        NetworkUpdate {
            seq,
            timestamp: seq * 10,
            payload,
        }
    }

    fn poison() -> UpdatePayload {
        UpdatePayload::StatusApplied {
            effect: "poison_vial".into(),
            caster: Some(alice()),
            targets: vec![StatusRecord {
                target: bob(),
                status: "poisoned".into(),
                stacks: 1,
                resisted: false,
                final_stacks: 3,
            }],
        }
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut ctx = guest();
        reconcile(&mut ctx, &poison()).unwrap();
        let once = ctx.fingerprint().unwrap();
        reconcile(&mut ctx, &poison()).unwrap();
        assert_eq!(ctx.fingerprint().unwrap(), once);
        assert_eq!(ctx.status_stacks(bob(), "poisoned"), 3);
    }

    #[test]
    fn missing_entity_leaves_mirror_untouched() {
        let mut ctx = guest();
        let before = ctx.fingerprint().unwrap();
        let payload = UpdatePayload::DamageDealt {
            effect: "burning_rain".into(),
            caster: alice(),
            hits: vec![
                HitRecord {
                    target: bob(),
                    damage: 60,
                    shield_absorbed: 0,
                    new_hp: 440,
                    new_shield: 0,
                    died: false,
                    resisted: false,
                },
                HitRecord {
                    target: EntityRef::creature(AbsoluteSide::Guest, Position::Left, 4),
                    damage: 60,
                    shield_absorbed: 0,
                    new_hp: 20,
                    new_shield: 0,
                    died: false,
                    resisted: false,
                },
            ],
            statuses: Vec::new(),
        };
        let error = reconcile(&mut ctx, &payload).unwrap_err();
        assert!(matches!(error, RuntimeError::CreatureIndexOutOfRange { index: 4, .. }));
        assert_eq!(ctx.fingerprint().unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn rally_from_host_updates_opponent_heroes_on_guest() {
        let presentation = RecordingPresentation::new();
        let mut ctx = guest().with_presentation(Arc::new(presentation.clone()));
        let mut replayer = GuestReplayer::new(ReplayRegistry::new(EffectRegistry::standard()));

        let rally = UpdatePayload::AttackRally {
            effect: "skeleton_rally".into(),
            caster: EntityRef::creature(AbsoluteSide::Host, Position::Center, 0),
            boosts: vec![BoostRecord {
                hero: alice(),
                bonus: 10,
                new_attack_bonus: 10,
            }],
        };
        // The caster creature is absent on this mirror, so the update is
        // rejected before any write.
        assert_eq!(replayer.receive(&mut ctx, update(1, rally)).await, ReplayStatus::Rejected);

        let rally = UpdatePayload::AttackRally {
            effect: "skeleton_rally".into(),
            caster: alice(),
            boosts: vec![BoostRecord {
                hero: alice(),
                bonus: 10,
                new_attack_bonus: 10,
            }],
        };
        assert_eq!(replayer.receive(&mut ctx, update(2, rally)).await, ReplayStatus::Applied);
        assert_eq!(ctx.combatant(alice()).unwrap().battle_attack_bonus(), 10);

        let attack_updates: Vec<_> = presentation
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                PresentationCall::Attack { target, attack } => Some((target, attack)),
                _ => None,
            })
            .collect();
        assert_eq!(attack_updates.len(), 1);
        assert_eq!(attack_updates[0].0.side, RelativeSide::Opponent);
        assert_eq!(attack_updates[0].1, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_updates_are_skipped() {
        let mut ctx = guest();
        let mut replayer = GuestReplayer::new(ReplayRegistry::new(EffectRegistry::standard()));

        assert_eq!(replayer.receive(&mut ctx, update(1, poison())).await, ReplayStatus::Applied);
        assert_eq!(replayer.receive(&mut ctx, update(1, poison())).await, ReplayStatus::Duplicate);
        assert_eq!(replayer.last_seq(), 1);
        assert_eq!(ctx.state().log().entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fizzle_replay_logs_display_name() {
        let mut ctx = guest();
        let mut replayer = GuestReplayer::new(ReplayRegistry::new(EffectRegistry::standard()));
        let fizzle = UpdatePayload::EffectFizzled {
            effect: "skeleton_rally".into(),
            caster: None,
            reason: "no other living ally creature".into(),
        };
        replayer.receive(&mut ctx, update(1, fizzle)).await;
        assert!(ctx
            .state()
            .log()
            .contains("Skeleton Rally fizzles: no other living ally creature."));
    }

    #[tokio::test(start_paused = true)]
    async fn misfire_replay_writes_core_and_skips_play() {
        let presentation = RecordingPresentation::new();
        let mut ctx = guest().with_presentation(Arc::new(presentation.clone()));
        let mut replayer = GuestReplayer::new(ReplayRegistry::new(EffectRegistry::standard()));
        let misfired = UpdatePayload::Misfired {
            effect: "poison_vial".into(),
            core: Box::new(poison()),
        };

        assert_eq!(replayer.receive(&mut ctx, update(1, misfired)).await, ReplayStatus::Applied);
        assert_eq!(ctx.status_stacks(bob(), "poisoned"), 3);
        let lines: Vec<_> = ctx.state().log().entries().iter().map(|entry| entry.message.clone()).collect();
        assert_eq!(lines, vec!["Poison Vial misfired; only its core effect was applied.".to_owned()]);
        assert!(presentation.calls().iter().all(|call| !matches!(call, PresentationCall::Play(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_updates_reach_the_bus() {
        let mut ctx = guest();
        let mut sync = ctx.bus().subscribe(Topic::Sync);
        let mut replayer = GuestReplayer::new(ReplayRegistry::new(EffectRegistry::standard()));

        let bogus = UpdatePayload::StatusConsumed {
            target: EntityRef::hero(AbsoluteSide::Host, Position::Right),
            status: "frozen".into(),
            remaining: 0,
            skipped_effect: "cannon_burst".into(),
        };
        assert_eq!(replayer.receive(&mut ctx, update(1, bogus)).await, ReplayStatus::Rejected);
        match sync.recv().await.unwrap() {
            Event::Sync(SyncEvent::Rejected { seq, .. }) => assert_eq!(seq, 1),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn battle_end_wipes_statuses() {
        let mut ctx = guest();
        let mut replayer = GuestReplayer::new(ReplayRegistry::new(EffectRegistry::standard()));
        replayer.receive(&mut ctx, update(1, poison())).await;

        let ended = UpdatePayload::BattleEnded {
            outcome: BattleOutcome::Victory(AbsoluteSide::Guest),
        };
        assert_eq!(replayer.receive(&mut ctx, update(2, ended)).await, ReplayStatus::Applied);
        assert_eq!(ctx.status_stacks(bob(), "poisoned"), 0);
        assert!(ctx.state().log().contains("Victory! The battle is won."));
    }
}
