use thiserror::Error;

/// Errors raised by the core domain model, calendar arithmetic and ordering.
///
/// Input-validation failures per spec §7: callers must validate at the
/// system boundary. Every variant here aborts the enclosing operation
/// without mutating state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed date: {0:?}")]
    MalformedDate(String),

    #[error("task id {0:?} is empty")]
    EmptyTaskId,

    #[error("duplicate task id {0:?}")]
    DuplicateTaskId(String),

    #[error("task {0:?} references unknown predecessor {1:?}")]
    UnknownPredecessor(String, String),

    #[error("hierarchy cycle detected at task {0:?}")]
    HierarchyCycle(String),

    #[error("dependency cycle detected involving task {0:?}")]
    DependencyCycle(String),

    #[error("fractional key ordering violated: {0}")]
    InvalidOrderingKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;
