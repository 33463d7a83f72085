//! Tracers: no-op and `tracing`-backed.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::errors::{HandlerError, MergeError};
use crate::traits::{TraceMarker, Tracer};
use crate::types::Status;

/// Tracer that traces nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl<P> Tracer<P> for NoopTracer {}

/// Tracer that opens a `tracing` span per handler or merger call on
/// traceable payloads.
///
/// All payloads are traceable unless a filter is installed with
/// [`with_filter`](Self::with_filter).
pub struct TracingTracer<P> {
    filter: Option<Arc<dyn Fn(&P) -> bool + Send + Sync>>,
}

impl<P> TracingTracer<P> {
    pub fn new() -> Self {
        Self { filter: None }
    }

    /// Trace only payloads for which `filter` returns `true`.
    pub fn with_filter(filter: impl Fn(&P) -> bool + Send + Sync + 'static) -> Self {
        Self {
            filter: Some(Arc::new(filter)),
        }
    }
}

impl<P> Default for TracingTracer<P> {
    fn default() -> Self {
        Self::new()
    }
}

struct Marker {
    span: tracing::Span,
    started: Instant,
}

impl Marker {
    fn open(span: tracing::Span) -> TraceMarker {
        Box::new(Self {
            span,
            started: Instant::now(),
        })
    }
}

impl<P> Tracer<P> for TracingTracer<P> {
    fn is_traceable(&self, payload: &P) -> bool {
        self.filter.as_ref().map_or(true, |f| f(payload))
    }

    fn before_handle(&self, vertex: &str, _payload: &P) -> TraceMarker {
        Marker::open(tracing::info_span!("reactor_handle", %vertex))
    }

    fn after_handle(
        &self,
        marker: TraceMarker,
        vertex: &str,
        outcome: Result<&Value, &HandlerError>,
    ) {
        let Ok(marker) = marker.downcast::<Marker>() else {
            return;
        };
        let elapsed_us = marker.started.elapsed().as_micros() as u64;
        marker.span.in_scope(|| match outcome {
            Ok(result) => tracing::info!(%vertex, %result, elapsed_us, "handled"),
            Err(e) => tracing::warn!(%vertex, error = %e, elapsed_us, "handling failed"),
        });
    }

    fn before_merge(&self, vertex: &str, _payload: &P, _result: Option<&Value>) -> TraceMarker {
        Marker::open(tracing::info_span!("reactor_merge", %vertex))
    }

    fn after_merge(
        &self,
        marker: TraceMarker,
        vertex: &str,
        outcome: Result<&Status, &MergeError>,
    ) {
        let Ok(marker) = marker.downcast::<Marker>() else {
            return;
        };
        let elapsed_us = marker.started.elapsed().as_micros() as u64;
        marker.span.in_scope(|| match outcome {
            Ok(status) => tracing::info!(%vertex, %status, elapsed_us, "merged"),
            Err(e) => tracing::warn!(%vertex, error = %e, elapsed_us, "merge failed"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_limits_traceable_payloads() {
        let tracer = TracingTracer::<u32>::with_filter(|p| *p > 10);
        assert!(tracer.is_traceable(&11));
        assert!(!tracer.is_traceable(&3));
        assert!(TracingTracer::<u32>::new().is_traceable(&3));
    }

    #[test]
    fn hooks_accept_foreign_markers() {
        let tracer = TracingTracer::<u32>::new();
        tracer.after_handle(Box::new(()), "v", Ok(&json!(1)));

        let marker = tracer.before_merge("v", &1, None);
        tracer.after_merge(marker, "v", Ok(&Status::from("DONE")));
    }
}
