//! Serializable shape of a graph, for documentation and visualization.
//!
//! The model drops every function and handler from a [`GraphDef`] and keeps
//! only identities, roles, arities, and transitions.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::graph::{GraphDef, ItemKind, ItemRole, Transition, TransitionTarget};
use super::status::Status;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GraphModel {
    pub name: String,
    pub start: Vec<String>,
    pub vertices: Vec<VertexModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VertexModel {
    pub id: String,
    pub role: ItemRole,
    /// Number of handler arguments. Zero for subgraphs and merge points.
    pub arity: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<String>,
    pub has_merger: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_statuses: Vec<Status>,
    pub transitions: Vec<Transition>,
}

impl<P> From<&GraphDef<P>> for GraphModel {
    fn from(graph: &GraphDef<P>) -> Self {
        let vertices = graph
            .items
            .iter()
            .map(|item| {
                let (arity, subgraph) = match &item.kind {
                    ItemKind::Processor { handler, .. } => (handler.args.len(), None),
                    ItemKind::Subgraph { subgraph, .. } => (0, Some(subgraph.subgraph.clone())),
                    ItemKind::MergePoint { .. } => (0, None),
                };
                VertexModel {
                    id: item.id.clone(),
                    role: item.kind.role(),
                    arity,
                    subgraph,
                    has_merger: item.kind.has_merger(),
                    declared_statuses: item
                        .kind
                        .declared_domain()
                        .map(|domain| domain.iter().cloned().collect())
                        .unwrap_or_default(),
                    transitions: item.transitions.clone(),
                }
            })
            .collect();

        Self {
            name: graph.name.clone(),
            start: graph.start.clone(),
            vertices,
        }
    }
}

impl GraphModel {
    /// Render the graph in Graphviz DOT syntax.
    ///
    /// Handle-by edges are solid, merge-by edges dashed, and every complete
    /// transition points at a shared `complete` node.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", self.name);
        let _ = writeln!(out, "  start [shape=circle];");
        let _ = writeln!(out, "  complete [shape=doublecircle];");
        for vertex in &self.vertices {
            let shape = match vertex.role {
                ItemRole::Processor => "box",
                ItemRole::Subgraph => "box3d",
                ItemRole::MergePoint => "diamond",
            };
            let _ = writeln!(out, "  \"{}\" [shape={shape}];", vertex.id);
        }
        for id in &self.start {
            let _ = writeln!(out, "  start -> \"{id}\";");
        }
        for vertex in &self.vertices {
            for transition in &vertex.transitions {
                let label = transition.on.to_string();
                let _ = match &transition.target {
                    TransitionTarget::Handle(to) => {
                        writeln!(out, "  \"{}\" -> \"{to}\" [label=\"{label}\"];", vertex.id)
                    }
                    TransitionTarget::Merge(to) => writeln!(
                        out,
                        "  \"{}\" -> \"{to}\" [label=\"{label}\", style=dashed];",
                        vertex.id
                    ),
                    TransitionTarget::Complete => {
                        writeln!(out, "  \"{}\" -> complete [label=\"{label}\"];", vertex.id)
                    }
                };
            }
        }
        out.push_str("}\n");
        out
    }
}
