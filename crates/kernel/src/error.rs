use crate::handle::{ComponentHandle, GameObjectHandle};
use crate::init_batch::InitBatchId;
use crate::serialization::SerializationError;

/// Errors surfaced by the world runtime.
///
/// Recoverable conditions (stale handles, messages to destroyed receivers) are
/// never reported through this type; they resolve to `None` / `false` at the
/// call site. Everything here is a configuration or usage error that the
/// caller must act on.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("update function dependency cycle: {}", .functions.join(" -> "))]
    DependencyCycle { functions: Vec<String> },
    #[error("update function '{function}' depends on '{dependency}', which runs in a different phase")]
    CrossPhaseDependency { function: String, dependency: String },
    #[error("update function '{0}' is already registered")]
    DuplicateUpdateFunction(String),
    #[error("update function '{function}' cannot run in the {phase} phase")]
    InvalidPhase { function: String, phase: &'static str },
    #[error("component type {component} is already owned by manager {existing}")]
    ManagerConflict {
        component: &'static str,
        existing: &'static str,
    },
    #[error("too many component or module types registered in one world")]
    TypeIdsExhausted,
    #[error("game object {0} does not exist")]
    InvalidObject(GameObjectHandle),
    #[error("component {0} does not exist")]
    InvalidComponent(ComponentHandle),
    #[error("cannot parent {child} under {parent}: it would create a cycle")]
    HierarchyCycle {
        child: GameObjectHandle,
        parent: GameObjectHandle,
    },
    #[error("init batch {0:?} does not exist")]
    UnknownInitBatch(InitBatchId),
    #[error("init batch '{name}' could not finish within one frame ({initialized}/{total} initialized)")]
    InitBatchFailed {
        name: String,
        initialized: usize,
        total: usize,
    },
    #[error("init batch {0:?} was already submitted")]
    InitBatchClosed(InitBatchId),
    #[error("the default init batch cannot be {0}")]
    DefaultInitBatch(&'static str),
    #[error("no free world index (maximum {0} worlds)")]
    WorldIndexExhausted(usize),
    #[error("world index {0} is out of range")]
    InvalidWorldIndex(usize),
    #[error("{0} is not available")]
    Unavailable(&'static str),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
}
