//! Host-side state machine for one effect activation.
//!
//! `Idle → TriggerEvaluated → TargetsCollected → MutationApplied →
//! UpdateEmitted → AnimationPlayed → Idle`. The mutation step finishes
//! before the first suspension point, so the next trigger never sees a
//! half-applied effect even while animations are still running.

use battle_core::{BattleError, EntityRef, LogSeverity, StatusKind};
use tracing::{debug, error, info, warn};

use super::{EffectModule, Readiness, Trigger};
use crate::api::{Result, RuntimeError};
use crate::context::BattleContext;
use crate::events::UpdatePayload;

/// How an activation ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Full path: mutation, update, animation.
    Applied,
    /// `apply` failed; the module's reduced path ran instead.
    Fallback,
    /// Nothing to do; a fizzle update was sent.
    Fizzled { reason: String },
    /// The caster was frozen and spent a stack instead of acting.
    Frozen,
    /// The battle had already ended; nothing ran.
    BattleOver,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectOutcome {
    pub effect: &'static str,
    pub resolution: Resolution,
    pub targets_affected: usize,
    /// Update sent to the guest (or that would have been, without one).
    pub payload: Option<UpdatePayload>,
}

impl EffectOutcome {
    pub(crate) fn battle_over(effect: &'static str) -> Self {
        Self::new(effect, Resolution::BattleOver, None)
    }

    fn new(effect: &'static str, resolution: Resolution, payload: Option<UpdatePayload>) -> Self {
        let targets_affected = payload.as_ref().map_or(0, UpdatePayload::affected_count);
        Self {
            effect,
            resolution,
            targets_affected,
            payload,
        }
    }

    pub fn fizzled(&self) -> bool {
        matches!(self.resolution, Resolution::Fizzled { .. })
    }
}

pub struct EffectExecutor;

impl EffectExecutor {
    /// Runs one activation on the host.
    ///
    /// Errors from the module never escape: they are logged, recorded in the
    /// combat log and answered with the module's fallback or a fizzle. The
    /// only error returned is calling this on a non-authoritative peer.
    pub async fn execute(
        module: &dyn EffectModule,
        ctx: &mut BattleContext,
        trigger: &Trigger,
    ) -> Result<EffectOutcome> {
        if !ctx.is_authoritative() {
            return Err(RuntimeError::NotAuthoritative {
                operation: "execute_effect",
            });
        }
        let effect = module.name();

        if let Some(caster) = trigger.caster() {
            // An unresolved caster would make the guest reject the update.
            if let Err(error) = ctx.combatant(caster) {
                debug!(target: "runtime::effects", effect, %caster, %error, "caster not found");
                return Ok(Self::fizzle(module, ctx, None, "caster not found".to_owned()));
            }
            if let Some(outcome) = Self::frozen_caster(module, ctx, caster) {
                return Ok(outcome);
            }
        }

        if let Readiness::Fizzle { reason } = module.precondition(ctx, trigger) {
            return Ok(Self::fizzle(module, ctx, trigger.caster(), reason));
        }

        let targets = module.collect_targets(ctx, trigger);
        if targets.is_empty() {
            return Ok(Self::fizzle(module, ctx, trigger.caster(), "no targets".to_owned()));
        }
        debug!(target: "runtime::effects", effect, targets = targets.len(), "targets collected");

        let checkpoint = ctx.checkpoint();
        let (payload, resolution) = match module.apply(ctx, trigger, &targets) {
            Ok(payload) => (payload, Resolution::Applied),
            Err(apply_error) => {
                warn!(
                    target: "runtime::effects",
                    effect,
                    code = apply_error.error_code(),
                    error = %apply_error,
                    "effect failed, trying fallback"
                );
                ctx.restore(checkpoint);
                Self::refresh_all(ctx, &targets);
                let before_fallback = ctx.checkpoint();
                match module.fallback(ctx, trigger, &targets) {
                    Ok(Some(core)) => {
                        log_misfire(ctx, module.display_name());
                        let payload = UpdatePayload::Misfired {
                            effect: effect.to_owned(),
                            core: Box::new(core),
                        };
                        (payload, Resolution::Fallback)
                    }
                    Ok(None) => {
                        return Ok(Self::fizzle(module, ctx, trigger.caster(), apply_error.to_string()));
                    }
                    Err(fallback_error) => {
                        error!(
                            target: "runtime::effects",
                            effect,
                            error = %fallback_error,
                            "fallback failed"
                        );
                        ctx.restore(before_fallback);
                        Self::refresh_all(ctx, &targets);
                        return Ok(Self::fizzle(module, ctx, trigger.caster(), apply_error.to_string()));
                    }
                }
            }
        };

        Self::emit(ctx, payload.clone());
        ctx.guest_head_start().await;
        if resolution == Resolution::Applied {
            module.play(ctx, &payload).await;
        }

        let outcome = EffectOutcome::new(effect, resolution, Some(payload));
        info!(
            target: "runtime::effects",
            effect,
            affected = outcome.targets_affected,
            fallback = outcome.resolution == Resolution::Fallback,
            "effect resolved"
        );
        Ok(outcome)
    }

    /// A frozen caster spends one stack instead of acting.
    fn frozen_caster(
        module: &dyn EffectModule,
        ctx: &mut BattleContext,
        caster: EntityRef,
    ) -> Option<EffectOutcome> {
        let frozen = StatusKind::Frozen.as_str();
        let remaining = match ctx.consume_status_stack(caster, frozen) {
            Ok(Some(remaining)) => remaining,
            Ok(None) => return None,
            Err(error) => {
                warn!(target: "runtime::effects", effect = module.name(), %error, "frozen check failed");
                return None;
            }
        };
        let payload = UpdatePayload::StatusConsumed {
            target: caster,
            status: frozen.to_owned(),
            remaining,
            skipped_effect: module.name().to_owned(),
        };
        log_frozen(ctx, caster, module.display_name());
        Self::emit(ctx, payload.clone());
        Some(EffectOutcome::new(module.name(), Resolution::Frozen, Some(payload)))
    }

    fn fizzle(
        module: &dyn EffectModule,
        ctx: &mut BattleContext,
        caster: Option<EntityRef>,
        reason: String,
    ) -> EffectOutcome {
        info!(target: "runtime::effects", effect = module.name(), %reason, "effect fizzled");
        log_fizzle(ctx, module.display_name(), &reason);
        let payload = UpdatePayload::EffectFizzled {
            effect: module.name().to_owned(),
            caster,
            reason: reason.clone(),
        };
        Self::emit(ctx, payload.clone());
        EffectOutcome::new(module.name(), Resolution::Fizzled { reason }, Some(payload))
    }

    fn emit(ctx: &BattleContext, payload: UpdatePayload) {
        let kind = payload.kind().as_str();
        if let Err(error) = ctx.send_battle_update(payload) {
            error!(target: "runtime::sync", kind, %error, "failed to emit battle update");
        }
    }

    fn refresh_all(ctx: &BattleContext, targets: &[EntityRef]) {
        for &target in targets {
            ctx.refresh(target);
        }
    }
}

/// Shared by the host fizzle path and the guest's fizzle replay.
pub(crate) fn log_fizzle(ctx: &mut BattleContext, display_name: &str, reason: &str) {
    ctx.add_combat_log(format!("{display_name} fizzles: {reason}."), LogSeverity::Info);
}

/// Shared by the host fallback path and the guest's replay.
pub(crate) fn log_misfire(ctx: &mut BattleContext, display_name: &str) {
    ctx.add_combat_log(
        format!("{display_name} misfired; only its core effect was applied."),
        LogSeverity::Warning,
    );
}

/// Shared by the host frozen path and the guest's replay.
pub(crate) fn log_frozen(ctx: &mut BattleContext, caster: EntityRef, display_name: &str) {
    let name = ctx.name_of(caster);
    ctx.add_combat_log(
        format!("{name} is frozen and cannot use {display_name}."),
        LogSeverity::Warning,
    );
}
