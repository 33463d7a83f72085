//! Plugin trait interfaces for the reactor.
//!
//! The engine talks to handlers and to every pluggable collaborator through
//! these traits. Default implementations live in [`crate::defaults`].
//! Adding a method to any trait requires a default implementation to
//! preserve backward compatibility.

use std::any::Any;
use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use super::errors::*;
use super::types::Status;

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Asynchronous business logic of a processor vertex.
///
/// `args` holds one value per declared argument extractor, in declaration
/// order, already copied where the graph asks for it.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, args: Vec<Value>) -> Result<Value, HandlerError>;
}

/// [`Handler`] backed by an async closure. Built by [`handler_fn`].
pub struct HandlerFn<F>(F);

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn handle(&self, args: Vec<Value>) -> Result<Value, HandlerError> {
        (self.0)(args).await
    }
}

// ---------------------------------------------------------------------------
// Profiler
// ---------------------------------------------------------------------------

/// Measures handler and merger calls.
///
/// Call names are `handle.<payload type>.<vertex>` and
/// `merge.<payload type>.<vertex>`.
pub trait Profiler: Send + Sync {
    fn start(&self, name: &str) -> Box<dyn ProfiledCall>;
}

/// A running measurement started by [`Profiler::start`].
pub trait ProfiledCall: Send {
    fn stop(self: Box<Self>);
}

// ---------------------------------------------------------------------------
// Tracer
// ---------------------------------------------------------------------------

/// Opaque value handed from a `before_*` hook to the matching `after_*` hook.
pub type TraceMarker = Box<dyn Any + Send + Sync>;

/// Per-payload tracing hooks around handler and merger calls.
///
/// Hooks fire only for payloads where [`is_traceable`](Self::is_traceable)
/// returns `true`.
pub trait Tracer<P>: Send + Sync {
    fn is_traceable(&self, _payload: &P) -> bool {
        false
    }

    fn before_handle(&self, _vertex: &str, _payload: &P) -> TraceMarker {
        Box::new(())
    }

    fn after_handle(
        &self,
        _marker: TraceMarker,
        _vertex: &str,
        _outcome: Result<&Value, &HandlerError>,
    ) {
    }

    fn before_merge(&self, _vertex: &str, _payload: &P, _result: Option<&Value>) -> TraceMarker {
        Box::new(())
    }

    fn after_merge(
        &self,
        _marker: TraceMarker,
        _vertex: &str,
        _outcome: Result<&Status, &MergeError>,
    ) {
    }
}

// ---------------------------------------------------------------------------
// ImmutabilityChecker
// ---------------------------------------------------------------------------

/// Opaque payload snapshot produced by [`ImmutabilityChecker::take_snapshot`].
pub type Snapshot = Box<dyn Any + Send + Sync>;

/// Detects payload modification while a handler runs.
///
/// Handlers are expected to return results rather than mutate the payload;
/// only mergers write to it. The engine takes a snapshot before each handler
/// call and diffs it after, unless the control level is `NoControl`.
pub trait ImmutabilityChecker<P>: Send + Sync {
    fn take_snapshot(&self, payload: &P) -> Snapshot;

    /// Human-readable description of the changes, `None` when unchanged.
    fn diff(&self, snapshot: &Snapshot, payload: &P) -> Option<String>;
}

// ---------------------------------------------------------------------------
// DefensiveCopier
// ---------------------------------------------------------------------------

/// Deep-copies handler arguments and child payloads flagged for copying.
pub trait DefensiveCopier: Send + Sync {
    fn copy(&self, value: &Value) -> Value;
}

// ---------------------------------------------------------------------------
// SubgraphRunner
// ---------------------------------------------------------------------------

/// Runs a named nested graph to its terminal result.
#[async_trait]
pub trait SubgraphRunner: Send + Sync {
    async fn run(&self, subgraph: &str, child: Value) -> Result<Value, SubgraphError>;
}

// ---------------------------------------------------------------------------
// DebugSerializer
// ---------------------------------------------------------------------------

/// Renders a payload for error messages and logs. Diagnostics only.
pub trait DebugSerializer<P>: Send + Sync {
    fn dump(&self, payload: &P) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn handler_fn_forwards_args() {
        let handler = handler_fn(|args: Vec<Value>| async move {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(sum))
        });
        let result = handler.handle(vec![json!(2), json!(5)]).await.unwrap();
        assert_eq!(result, json!(7));
    }

    #[tokio::test]
    async fn handler_fn_propagates_errors() {
        let handler = handler_fn(|_| async { Err(HandlerError::failed("nope")) });
        let err = handler.handle(vec![]).await.unwrap_err();
        assert!(matches!(err, HandlerError::Failed { ref message } if message == "nope"));
    }

    #[test]
    fn tracer_defaults_are_inert() {
        struct Silent;
        impl Tracer<u32> for Silent {}

        let tracer = Silent;
        assert!(!tracer.is_traceable(&1));
        let marker = tracer.before_handle("v", &1);
        tracer.after_handle(marker, "v", Ok(&json!(null)));
    }
}
