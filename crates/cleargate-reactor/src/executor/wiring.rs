//! Build-time pass materializing a graph definition into per-run vertices.

use std::collections::HashMap;
use std::sync::Arc;

use super::slot::Slot;
use super::vertex::{Edge, OutgoingEdge, RuntimeVertex};
use super::BuildError;
use crate::types::{GraphDef, ItemKind, TransitionTarget};

/// All runtime vertices of one execution, indexed like `GraphDef::items`.
pub(crate) struct VertexTable<P> {
    pub vertices: Vec<RuntimeVertex<P>>,
    /// Slots fed by `submit`.
    pub start: Vec<Arc<Slot<Edge<P>>>>,
}

/// Allocate a vertex per item and connect every transition into the
/// destination's incoming-handle or incoming-merge join.
///
/// The start point is a synthetic always-matching transition. When it
/// targets a detached merge point it feeds the incoming-merge join.
pub(crate) fn wire<P: Send + Sync>(graph: &GraphDef<P>) -> Result<VertexTable<P>, BuildError> {
    let mut vertices: Vec<RuntimeVertex<P>> = graph
        .items
        .iter()
        .map(|item| {
            RuntimeVertex::new(
                item.id.clone(),
                matches!(item.kind, ItemKind::MergePoint { .. }),
            )
        })
        .collect();
    let index: HashMap<&str, usize> = graph
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id.as_str(), i))
        .collect();
    let lookup = |id: &str| {
        index
            .get(id)
            .copied()
            .ok_or_else(|| BuildError::UnknownItem { id: id.to_string() })
    };

    let mut start = Vec::with_capacity(graph.start.len());
    for id in &graph.start {
        let i = lookup(id.as_str())?;
        let target = &mut vertices[i];
        let slot = Arc::new(Slot::new());
        if target.detached {
            target.incoming_merge.push(Arc::clone(&slot));
        } else {
            target.incoming_handle.push(Arc::clone(&slot));
        }
        start.push(slot);
    }

    for (source, item) in graph.items.iter().enumerate() {
        for transition in &item.transitions {
            let slot = Arc::new(Slot::new());
            match &transition.target {
                TransitionTarget::Complete => continue,
                TransitionTarget::Handle(id) => {
                    let i = lookup(id.as_str())?;
                    let target = &mut vertices[i];
                    if target.detached {
                        return Err(BuildError::InvalidGraph {
                            graph: graph.name.clone(),
                            errors: vec![format!(
                                "Detached merge point {id} can not be a handle-by target of {}",
                                item.id
                            )],
                        });
                    }
                    target.incoming_handle.push(Arc::clone(&slot));
                }
                TransitionTarget::Merge(id) => {
                    let i = lookup(id.as_str())?;
                    vertices[i].incoming_merge.push(Arc::clone(&slot));
                }
            }
            vertices[source].outgoing.push(OutgoingEdge {
                on: transition.on.clone(),
                slot,
            });
        }
    }

    Ok(VertexTable { vertices, start })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{GraphBuilder, VertexBuilder};
    use crate::traits::handler_fn;
    use serde_json::{json, Value};

    struct Job;

    fn processor(id: &str) -> VertexBuilder<Job> {
        VertexBuilder::processor(id, handler_fn(|_: Vec<Value>| async { Ok(json!(1)) }))
            .merger(|_, _| "OK".into())
    }

    #[test]
    fn wires_handle_and_merge_joins() {
        let graph = GraphBuilder::new("wiring")
            .start("a")
            .start("route")
            .vertex(
                processor("a")
                    .on(["OK"], TransitionTarget::handle("b"))
                    .on(["OK"], TransitionTarget::merge("b"))
                    .on(["OK"], TransitionTarget::Complete),
            )
            .vertex(processor("b").on_any(TransitionTarget::Complete))
            .vertex(
                VertexBuilder::router("route", |_: &Job| "GO".into())
                    .on_any(TransitionTarget::Complete),
            )
            .build()
            .unwrap();

        let table = wire(&graph).unwrap();
        assert_eq!(table.start.len(), 2);

        let a = &table.vertices[0];
        assert_eq!(a.incoming_handle.len(), 1);
        assert_eq!(a.outgoing.len(), 2, "complete transitions are not wired");

        let b = &table.vertices[1];
        assert_eq!(b.incoming_handle.len(), 1);
        assert_eq!(b.incoming_merge.len(), 1);

        let route = &table.vertices[2];
        assert!(route.detached);
        assert!(route.incoming_handle.is_empty());
        assert_eq!(route.incoming_merge.len(), 1);
    }

    #[test]
    fn outgoing_edge_shares_slot_with_destination() {
        let graph = GraphBuilder::new("wiring")
            .start("a")
            .vertex(processor("a").on(["OK"], TransitionTarget::handle("b")))
            .vertex(processor("b").on_any(TransitionTarget::Complete))
            .build()
            .unwrap();

        let table = wire(&graph).unwrap();
        let edge = &table.vertices[0].outgoing[0];
        assert!(Arc::ptr_eq(&edge.slot, &table.vertices[1].incoming_handle[0]));
        assert!(Arc::ptr_eq(&table.start[0], &table.vertices[0].incoming_handle[0]));
    }

    #[test]
    fn unknown_target_is_a_build_error() {
        let mut graph = GraphBuilder::new("wiring")
            .start("a")
            .vertex(processor("a").on_any(TransitionTarget::Complete))
            .build()
            .unwrap();
        graph.start.push("missing".into());

        let err = wire(&graph).err().unwrap();
        assert!(matches!(err, BuildError::UnknownItem { ref id } if id == "missing"));
    }
}
