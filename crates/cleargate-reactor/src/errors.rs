//! Error types for user callbacks and collaborator operations.

use std::any::Any;

use thiserror::Error;

/// Errors from [`Handler`](super::traits::Handler) invocations.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum HandlerError {
    #[error("handler failed: {message}")]
    Failed { message: String },
    #[error("handler panicked: {message}")]
    Panicked { message: String },
    #[error("subgraph {subgraph} failed: {cause}")]
    Subgraph {
        subgraph: String,
        #[source]
        cause: SubgraphError,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors from merger and router functions.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum MergeError {
    #[error("merger failed: {message}")]
    Failed { message: String },
    #[error("merger panicked: {message}")]
    Panicked { message: String },
}

impl MergeError {
    /// Shorthand for [`MergeError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors from [`SubgraphRunner`](super::traits::SubgraphRunner).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum SubgraphError {
    #[error("subgraph not registered: {name}")]
    NotFound { name: String },
    #[error("subgraph payload conversion failed: {message}")]
    Payload { message: String },
    #[error("subgraph execution failed: {message}")]
    Execution { message: String },
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_text() {
        let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom");

        let caught = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "code 7");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "non-string panic payload");
    }

    #[test]
    fn subgraph_error_is_source_of_handler_error() {
        let err = HandlerError::Subgraph {
            subgraph: "child".into(),
            cause: SubgraphError::NotFound {
                name: "child".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "subgraph child failed: subgraph not registered: child"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
