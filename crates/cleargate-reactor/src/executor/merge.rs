//! Merge phase: incoming-merge join, the merger or router call, and
//! transition selection.

use std::panic::{self, AssertUnwindSafe};

use futures::future::join_all;
use serde_json::Value;
use tracing::debug;

use super::run::RunContext;
use super::vertex::{join, Flow, Handled, Join, Routed, RuntimeVertex};
use super::ExecutionError;
use crate::errors::{panic_message, MergeError};
use crate::types::{
    ItemKind, MergerDescriptor, ProcessingItem, RouterDescriptor, Status, Transition,
    TransitionTarget,
};

enum Decider<'a, P> {
    Merger(&'a MergerDescriptor<P>),
    Router(&'a RouterDescriptor<P>),
}

/// Wait for the handle result (absent for detached merge points) and every
/// incoming merging flow, then decide the status and select transitions.
pub(super) async fn resolve<P: Send + Sync + 'static>(
    run: &RunContext<P>,
    vertex: &RuntimeVertex<P>,
    item: &ProcessingItem<P>,
    handled: Option<Flow<Handled<P>>>,
) -> Flow<Routed<P>> {
    let incoming = join_all(vertex.incoming_merge.iter().map(|slot| slot.wait())).await;

    let handled = match handled {
        None => None,
        Some(Flow::Terminal) => return Flow::Terminal,
        Some(Flow::Dead) => return Flow::Dead,
        Some(Flow::Normal(handled)) => Some(handled),
    };

    let (payload, result) = match (handled, join(incoming)) {
        (_, Join::Terminal) => return Flow::Terminal,
        (_, Join::Unresolved) => {
            run.fail(inconsistency(
                vertex,
                "incoming merging flow resolved without a value".to_string(),
            ));
            return Flow::Terminal;
        }
        (_, Join::Ambiguous(count)) => {
            run.fail(inconsistency(
                vertex,
                format!(
                    "{count} active incoming merging flows, can not determine which transition to take the payload from"
                ),
            ));
            return Flow::Terminal;
        }
        (Some(handled), Join::Inactive { .. }) if vertex.incoming_merge.is_empty() => {
            (handled.payload, Some(handled.result))
        }
        (Some(handled), Join::Active(payload)) => (payload, Some(handled.result)),
        (None, Join::Active(payload)) => (payload, None),
        (None, Join::Inactive { dead: 0 }) => {
            run.fail(inconsistency(
                vertex,
                "detached merge point has no incoming merging flows".to_string(),
            ));
            return Flow::Terminal;
        }
        (_, Join::Inactive { .. }) => {
            debug!(vertex = %vertex.id, "no active incoming merging flow");
            return Flow::Dead;
        }
    };

    let decider = match &item.kind {
        ItemKind::Processor { merger, .. } | ItemKind::Subgraph { merger, .. } => {
            merger.as_ref().map(Decider::Merger)
        }
        ItemKind::MergePoint { router } => Some(Decider::Router(router)),
    };
    let Some(decider) = decider else {
        debug!(vertex = %vertex.id, "no merger, branch ends here");
        return Flow::Dead;
    };

    let status = match decide(run, vertex, decider, &payload, result.as_ref()) {
        Ok(status) => status,
        Err(cause) => {
            run.fail(ExecutionError::Merger {
                vertex: vertex.id.clone(),
                payload_dump: run.dump(&payload),
                cause,
            });
            return Flow::Terminal;
        }
    };

    let selected: Vec<&Transition> = item
        .transitions
        .iter()
        .filter(|t| t.on.matches(&status))
        .collect();
    if selected.is_empty() {
        run.fail(inconsistency(
            vertex,
            format!("merger returned status {status} that has no matching transition"),
        ));
        return Flow::Terminal;
    }
    if selected
        .iter()
        .any(|t| t.target == TransitionTarget::Complete)
    {
        run.complete(&vertex.id, payload);
        return Flow::Terminal;
    }

    Flow::Normal(Routed { payload, status })
}

fn decide<P: Send + Sync + 'static>(
    run: &RunContext<P>,
    vertex: &RuntimeVertex<P>,
    decider: Decider<'_, P>,
    payload: &P,
    result: Option<&Value>,
) -> Result<Status, MergeError> {
    let c = &run.collaborators;
    let call = c
        .profiler
        .start(&format!("merge.{}.{}", run.payload_type, vertex.id));
    let marker = c
        .tracer
        .is_traceable(payload)
        .then(|| c.tracer.before_merge(&vertex.id, payload, result));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match decider {
        Decider::Merger(merger) => {
            let null = Value::Null;
            (merger.merge)(payload, result.unwrap_or(&null))
        }
        Decider::Router(router) => (router.route)(payload),
    }))
    .unwrap_or_else(|panic| {
        Err(MergeError::Panicked {
            message: panic_message(panic.as_ref()),
        })
    });

    call.stop();
    if let Some(marker) = marker {
        c.tracer.after_merge(marker, &vertex.id, outcome.as_ref());
    }
    outcome
}

fn inconsistency<P>(vertex: &RuntimeVertex<P>, message: String) -> ExecutionError {
    ExecutionError::Inconsistency {
        vertex: vertex.id.clone(),
        message,
    }
}
