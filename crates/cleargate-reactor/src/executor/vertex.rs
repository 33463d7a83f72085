//! Per-run vertex state: the four synchronization points of each item.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::slot::Slot;
use crate::types::{Status, StatusPredicate};

/// Value carried by an edge or a synchronization point.
///
/// `Dead` and `Terminal` are absorbing: a vertex that observes either never
/// treats the run as normal on that path.
pub(crate) enum Flow<T> {
    Normal(T),
    /// The branch produced nothing.
    Dead,
    /// The run already has, or is about to have, its outcome.
    Terminal,
}

impl<T: Clone> Clone for Flow<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Normal(v) => Self::Normal(v.clone()),
            Self::Dead => Self::Dead,
            Self::Terminal => Self::Terminal,
        }
    }
}

impl<T> Flow<T> {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Normal(_) => "normal",
            Self::Dead => "dead",
            Self::Terminal => "terminal",
        }
    }
}

/// Payload reference carried along an edge.
pub(crate) type Edge<P> = Flow<Arc<P>>;

/// Output of a successful handling phase.
pub(crate) struct Handled<P> {
    pub payload: Arc<P>,
    pub result: Value,
}

impl<P> Clone for Handled<P> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            result: self.result.clone(),
        }
    }
}

/// Output of a merge phase that routes onward.
pub(crate) struct Routed<P> {
    pub payload: Arc<P>,
    pub status: Status,
}

impl<P> Clone for Routed<P> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            status: self.status.clone(),
        }
    }
}

/// Outcome of a join over a vertex's incoming edges.
pub(crate) enum Join<P> {
    /// An edge was torn down without a value.
    Unresolved,
    Terminal,
    /// No normal edge; `dead` counts the dead ones.
    Inactive { dead: usize },
    Active(Arc<P>),
    /// More than one normal edge: payload provenance is ambiguous.
    Ambiguous(usize),
}

pub(crate) fn join<P>(flows: Vec<Option<Edge<P>>>) -> Join<P> {
    if flows.iter().any(Option::is_none) {
        return Join::Unresolved;
    }
    let mut dead = 0;
    let mut active = Vec::new();
    for flow in flows.into_iter().flatten() {
        match flow {
            Flow::Terminal => return Join::Terminal,
            Flow::Dead => dead += 1,
            Flow::Normal(payload) => active.push(payload),
        }
    }
    if active.len() > 1 {
        return Join::Ambiguous(active.len());
    }
    match active.pop() {
        Some(payload) => Join::Active(payload),
        None => Join::Inactive { dead },
    }
}

/// A wired transition out of a vertex's merge point.
pub(crate) struct OutgoingEdge<P> {
    pub on: StatusPredicate,
    pub slot: Arc<Slot<Edge<P>>>,
}

impl<P> OutgoingEdge<P> {
    /// Classify the source's merge result for this edge.
    pub(crate) fn classify(&self, routed: &Flow<Routed<P>>) -> Edge<P> {
        match routed {
            Flow::Terminal => Flow::Terminal,
            Flow::Dead => Flow::Dead,
            Flow::Normal(r) if self.on.matches(&r.status) => Flow::Normal(Arc::clone(&r.payload)),
            Flow::Normal(_) => Flow::Dead,
        }
    }
}

/// Runtime state of one processing item within one execution.
pub(crate) struct RuntimeVertex<P> {
    pub id: String,
    pub detached: bool,
    pub incoming_handle: Vec<Arc<Slot<Edge<P>>>>,
    pub handle_result: Slot<Flow<Handled<P>>>,
    pub incoming_merge: Vec<Arc<Slot<Edge<P>>>>,
    pub merge_result: Slot<Flow<Routed<P>>>,
    pub outgoing: Vec<OutgoingEdge<P>>,
}

impl<P: Send + Sync> RuntimeVertex<P> {
    pub(crate) fn new(id: impl Into<String>, detached: bool) -> Self {
        Self {
            id: id.into(),
            detached,
            incoming_handle: Vec::new(),
            handle_result: Slot::new(),
            incoming_merge: Vec::new(),
            merge_result: Slot::new(),
            outgoing: Vec::new(),
        }
    }

    /// Resolve every pending incoming join with `dead`.
    pub(crate) fn poison(&self, merge_joins: bool) {
        for slot in &self.incoming_handle {
            slot.complete(Flow::Dead);
        }
        if merge_joins {
            for slot in &self.incoming_merge {
                slot.complete(Flow::Dead);
            }
        }
    }

    /// Deliver the merge result to every outgoing edge.
    pub(crate) fn fan_out(&self, routed: &Flow<Routed<P>>) {
        for edge in &self.outgoing {
            edge.slot.complete(edge.classify(routed));
        }
    }

    pub(crate) fn state(&self) -> VertexState<'_, P> {
        VertexState(self)
    }
}

fn slot_label<T: Clone>(slot: &Slot<Flow<T>>) -> &'static str {
    slot.peek().map_or("pending", |flow| flow.label())
}

fn join_labels<T: Clone>(slots: &[Arc<Slot<Flow<T>>>]) -> String {
    let labels: Vec<&str> = slots.iter().map(|s| slot_label(s)).collect();
    format!("[{}]", labels.join(", "))
}

/// `Display` adapter describing the resolution state of a vertex.
pub(crate) struct VertexState<'a, P>(&'a RuntimeVertex<P>);

impl<P: Send + Sync> fmt::Display for VertexState<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        let handle = if v.detached {
            "n/a"
        } else {
            slot_label(&v.handle_result)
        };
        write!(
            f,
            "{}={{handle_result={}, merge_result={}, incoming_handle={}, incoming_merge={}}}",
            v.id,
            handle,
            slot_label(&v.merge_result),
            join_labels(&v.incoming_handle),
            join_labels(&v.incoming_merge),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routed(status: &'static str) -> Flow<Routed<u8>> {
        Flow::Normal(Routed {
            payload: Arc::new(1),
            status: Status::from(status),
        })
    }

    fn normal() -> Option<Edge<u8>> {
        Some(Flow::Normal(Arc::new(1)))
    }

    #[test]
    fn join_resolution() {
        assert!(matches!(join::<u8>(vec![]), Join::Inactive { dead: 0 }));
        assert!(matches!(join(vec![Some(Flow::Dead), normal()]), Join::Active(_)));
        assert!(matches!(
            join::<u8>(vec![Some(Flow::Dead), Some(Flow::Dead)]),
            Join::Inactive { dead: 2 }
        ));
        assert!(matches!(join(vec![normal(), normal()]), Join::Ambiguous(2)));
        assert!(matches!(
            join(vec![normal(), Some(Flow::Terminal)]),
            Join::Terminal
        ));
        assert!(matches!(
            join::<u8>(vec![Some(Flow::Terminal), None]),
            Join::Unresolved
        ));
    }

    #[test]
    fn classify_edges() {
        let edge = OutgoingEdge::<u8> {
            on: StatusPredicate::one_of(["A"]),
            slot: Arc::new(Slot::new()),
        };
        assert!(matches!(edge.classify(&routed("A")), Flow::Normal(_)));
        assert!(matches!(edge.classify(&routed("B")), Flow::Dead));
        assert!(matches!(edge.classify(&Flow::Dead), Flow::Dead));
        assert!(matches!(edge.classify(&Flow::Terminal), Flow::Terminal));
    }

    #[test]
    fn poison_respects_join_kind() {
        let mut v = RuntimeVertex::<u8>::new("v", false);
        v.incoming_handle.push(Arc::new(Slot::new()));
        v.incoming_merge.push(Arc::new(Slot::new()));

        v.poison(false);
        assert!(v.incoming_handle[0].is_done());
        assert!(!v.incoming_merge[0].is_done());

        v.poison(true);
        assert!(v.incoming_merge[0].is_done());
    }

    #[test]
    fn state_dump_format() {
        let mut v = RuntimeVertex::<u8>::new("a", false);
        v.incoming_handle.push(Arc::new(Slot::new()));
        v.incoming_handle.push(Arc::new(Slot::new()));
        v.incoming_handle[0].complete(Flow::Normal(Arc::new(1)));
        v.handle_result.complete(Flow::Dead);

        assert_eq!(
            v.state().to_string(),
            "a={handle_result=dead, merge_result=pending, incoming_handle=[normal, pending], incoming_merge=[]}"
        );

        let detached = RuntimeVertex::<u8>::new("m", true);
        assert!(detached.state().to_string().starts_with("m={handle_result=n/a"));
    }
}
