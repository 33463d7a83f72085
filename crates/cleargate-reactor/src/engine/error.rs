//! Reactor error types.

use thiserror::Error;

use crate::executor::{BuildError, ExecutionError};

/// Errors from [`Reactor`](super::Reactor) operations.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ReactorError {
    /// The graph or the collaborator setup is invalid.
    #[error("build error: {0}")]
    Build(#[from] BuildError),
    /// An execution failed.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}
