//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from the rules crate, the update channel, and worker
//! coordination so callers can bubble them up with consistent context.
use battle_core::{
    AbsoluteSide, BattleError, DelayedEffectError, EntityRef, ErrorSeverity, MutationError,
    Position, ResistanceError, StatusError, TargetError,
};
use thiserror::Error;
use tokio::sync::oneshot;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{operation} requires the authoritative peer")]
    NotAuthoritative { operation: &'static str },

    #[error("no hero at {side}:{position}")]
    MissingHero {
        side: AbsoluteSide,
        position: Position,
    },

    #[error("creature {index} out of range at {side}:{position} ({len} creatures)")]
    CreatureIndexOutOfRange {
        side: AbsoluteSide,
        position: Position,
        index: usize,
        len: usize,
    },

    #[error("entity {entity} is not alive")]
    TargetDead { entity: EntityRef },

    #[error("no effect module named '{name}'")]
    UnknownEffect { name: String },

    #[error("no battle state provided for the {peer} peer")]
    MissingBattleState { peer: AbsoluteSide },

    #[error("{effect} needs a caster")]
    MissingCaster { effect: &'static str },

    #[error("{effect} was applied without a target")]
    NoTargets { effect: &'static str },

    #[error("{entity} has no '{status}' stack to spend")]
    StatusMissing { entity: EntityRef, status: &'static str },

    #[error("no replay handler for update type '{kind}'")]
    UnknownUpdateType { kind: &'static str },

    #[error("malformed battle update")]
    MalformedUpdate(#[source] serde_json::Error),

    #[error("battle update channel closed")]
    UpdateChannelClosed,

    #[error(transparent)]
    Mutation(MutationError),

    #[error(transparent)]
    Status(StatusError),

    #[error(transparent)]
    Resistance(#[from] ResistanceError),

    #[error(transparent)]
    Delayed(#[from] DelayedEffectError),

    #[error("state fingerprint failed")]
    Fingerprint(#[source] bincode::Error),

    #[error("session worker command channel closed")]
    CommandChannelClosed,

    #[error("session worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("session worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),
}

impl From<TargetError> for RuntimeError {
    fn from(error: TargetError) -> Self {
        match error {
            TargetError::MissingHero { side, position } => Self::MissingHero { side, position },
            TargetError::CreatureIndexOutOfRange {
                side,
                position,
                index,
                len,
            } => Self::CreatureIndexOutOfRange {
                side,
                position,
                index,
                len,
            },
        }
    }
}

impl From<MutationError> for RuntimeError {
    fn from(error: MutationError) -> Self {
        match error {
            MutationError::Target(target) => target.into(),
            MutationError::NotAuthoritative { operation } => Self::NotAuthoritative { operation },
            MutationError::TargetDead { target } => Self::TargetDead { entity: target },
            other => Self::Mutation(other),
        }
    }
}

impl From<StatusError> for RuntimeError {
    fn from(error: StatusError) -> Self {
        match error {
            StatusError::Target(target) => target.into(),
            other => Self::Status(other),
        }
    }
}

impl BattleError for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Mutation(error) => error.severity(),
            Self::Status(error) => error.severity(),
            Self::Resistance(error) => error.severity(),
            Self::Delayed(error) => error.severity(),
            Self::TargetDead { .. } => ErrorSeverity::Recoverable,
            Self::UnknownEffect { .. }
            | Self::MissingBattleState { .. }
            | Self::MissingCaster { .. }
            | Self::NoTargets { .. }
            | Self::StatusMissing { .. } => ErrorSeverity::Validation,
            Self::NotAuthoritative { .. }
            | Self::MissingHero { .. }
            | Self::CreatureIndexOutOfRange { .. }
            | Self::UnknownUpdateType { .. }
            | Self::MalformedUpdate(_)
            | Self::Fingerprint(_) => ErrorSeverity::Internal,
            Self::UpdateChannelClosed
            | Self::CommandChannelClosed
            | Self::ReplyChannelClosed(_)
            | Self::WorkerJoin(_) => ErrorSeverity::Fatal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAuthoritative { .. } => "RUNTIME_NOT_AUTHORITATIVE",
            Self::MissingHero { .. } => "RUNTIME_MISSING_HERO",
            Self::CreatureIndexOutOfRange { .. } => "RUNTIME_CREATURE_INDEX_OUT_OF_RANGE",
            Self::TargetDead { .. } => "RUNTIME_TARGET_DEAD",
            Self::UnknownEffect { .. } => "RUNTIME_UNKNOWN_EFFECT",
            Self::MissingBattleState { .. } => "RUNTIME_MISSING_BATTLE_STATE",
            Self::MissingCaster { .. } => "RUNTIME_MISSING_CASTER",
            Self::NoTargets { .. } => "RUNTIME_NO_TARGETS",
            Self::StatusMissing { .. } => "RUNTIME_STATUS_MISSING",
            Self::UnknownUpdateType { .. } => "RUNTIME_UNKNOWN_UPDATE_TYPE",
            Self::MalformedUpdate(_) => "RUNTIME_MALFORMED_UPDATE",
            Self::UpdateChannelClosed => "RUNTIME_UPDATE_CHANNEL_CLOSED",
            Self::Mutation(error) => error.error_code(),
            Self::Status(error) => error.error_code(),
            Self::Resistance(error) => error.error_code(),
            Self::Delayed(error) => error.error_code(),
            Self::Fingerprint(_) => "RUNTIME_FINGERPRINT",
            Self::CommandChannelClosed => "RUNTIME_COMMAND_CHANNEL_CLOSED",
            Self::ReplyChannelClosed(_) => "RUNTIME_REPLY_CHANNEL_CLOSED",
            Self::WorkerJoin(_) => "RUNTIME_WORKER_JOIN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_errors_flatten_through_wrappers() {
        let missing = TargetError::MissingHero {
            side: AbsoluteSide::Guest,
            position: Position::Right,
        };
        let error: RuntimeError = StatusError::Target(missing.clone()).into();
        assert!(matches!(
            error,
            RuntimeError::MissingHero {
                side: AbsoluteSide::Guest,
                position: Position::Right
            }
        ));

        let error: RuntimeError = MutationError::Target(missing).into();
        assert_eq!(error.error_code(), "RUNTIME_MISSING_HERO");
        assert!(error.severity().is_internal());
    }

    #[test]
    fn authority_violation_is_internal() {
        let error: RuntimeError = MutationError::NotAuthoritative { operation: "heal" }.into();
        assert!(matches!(
            error,
            RuntimeError::NotAuthoritative { operation: "heal" }
        ));
        assert_eq!(error.severity(), ErrorSeverity::Internal);
    }
}
