//! Fluent authoring of [`GraphDef`] values.
//!
//! ```ignore
//! let graph = GraphBuilder::new("purchase")
//!     .start("withdraw")
//!     .vertex(
//!         VertexBuilder::processor("withdraw", bank)
//!             .arg(|p: &Purchase| json!(p.user_id))
//!             .merger(|p, result| p.record_withdrawal(result))
//!             .on(["OK"], TransitionTarget::handle("notify"))
//!             .on(["NO_FUNDS"], TransitionTarget::Complete),
//!     )
//!     .vertex(VertexBuilder::processor("notify", notifier).arg(|p: &Purchase| json!(p.user_id)))
//!     .build()?;
//! ```
//!
//! Misuse that the builder can detect locally (an argument on a router, a
//! second merger) is collected and reported by [`GraphBuilder::build`]
//! together with the structural checks of [`validate_graph`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::MergeError;
use crate::executor::BuildError;
use crate::traits::Handler;
use crate::types::*;
use crate::validate::validate_graph;

enum Draft<P> {
    Processor {
        handler: Arc<dyn Handler>,
        args: Vec<ArgExtractor<P>>,
        merger: Option<MergeFn<P>>,
    },
    Subgraph {
        subgraph: SubgraphDescriptor<P>,
        merger: Option<MergeFn<P>>,
    },
    MergePoint {
        route: RouteFn<P>,
    },
}

/// Builder for one processing item.
pub struct VertexBuilder<P> {
    id: String,
    draft: Draft<P>,
    domain: Option<BTreeSet<Status>>,
    transitions: Vec<Transition>,
    errors: Vec<String>,
}

impl<P: 'static> VertexBuilder<P> {
    fn with_draft(id: impl Into<String>, draft: Draft<P>) -> Self {
        Self {
            id: id.into(),
            draft,
            domain: None,
            transitions: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A vertex whose handling phase calls `handler`.
    pub fn processor(id: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self::processor_shared(id, Arc::new(handler))
    }

    /// Like [`processor`](Self::processor) for a handler shared between vertices.
    pub fn processor_shared(id: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self::with_draft(
            id,
            Draft::Processor {
                handler,
                args: Vec::new(),
                merger: None,
            },
        )
    }

    /// A vertex whose handling phase runs the nested graph `subgraph` on the
    /// child payload built by `child`.
    pub fn subgraph(
        id: impl Into<String>,
        subgraph: impl Into<String>,
        child: impl Fn(&P) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::with_draft(
            id,
            Draft::Subgraph {
                subgraph: SubgraphDescriptor {
                    subgraph: subgraph.into(),
                    child: Arc::new(child),
                    copy: false,
                },
                merger: None,
            },
        )
    }

    /// A detached merge point routing on the payload alone.
    pub fn router(
        id: impl Into<String>,
        route: impl Fn(&P) -> Status + Send + Sync + 'static,
    ) -> Self {
        Self::try_router(id, move |payload| Ok(route(payload)))
    }

    pub fn try_router(
        id: impl Into<String>,
        route: impl Fn(&P) -> Result<Status, MergeError> + Send + Sync + 'static,
    ) -> Self {
        Self::with_draft(
            id,
            Draft::MergePoint {
                route: Arc::new(route),
            },
        )
    }

    fn push_arg(mut self, extract: ExtractFn<P>, copy: bool) -> Self {
        match &mut self.draft {
            Draft::Processor { args, .. } => args.push(ArgExtractor { extract, copy }),
            _ => self
                .errors
                .push(format!("{}: only processors take handler arguments", self.id)),
        }
        self
    }

    /// Append a handler argument extracted from the payload.
    pub fn arg(self, extract: impl Fn(&P) -> Value + Send + Sync + 'static) -> Self {
        self.push_arg(Arc::new(extract), false)
    }

    /// Append a handler argument that is defensively copied before the call.
    pub fn arg_copy(self, extract: impl Fn(&P) -> Value + Send + Sync + 'static) -> Self {
        self.push_arg(Arc::new(extract), true)
    }

    /// Defensively copy the child payload of a subgraph vertex.
    pub fn copy_child(mut self) -> Self {
        match &mut self.draft {
            Draft::Subgraph { subgraph, .. } => subgraph.copy = true,
            _ => self
                .errors
                .push(format!("{}: only subgraph vertices build a child payload", self.id)),
        }
        self
    }

    pub fn merger(self, merge: impl Fn(&P, &Value) -> Status + Send + Sync + 'static) -> Self {
        self.try_merger(move |payload, result| Ok(merge(payload, result)))
    }

    pub fn try_merger(
        mut self,
        merge: impl Fn(&P, &Value) -> Result<Status, MergeError> + Send + Sync + 'static,
    ) -> Self {
        let merge: MergeFn<P> = Arc::new(merge);
        match &mut self.draft {
            Draft::Processor { merger, .. } | Draft::Subgraph { merger, .. } => {
                if merger.replace(merge).is_some() {
                    self.errors.push(format!("{}: merger declared twice", self.id));
                }
            }
            Draft::MergePoint { .. } => self
                .errors
                .push(format!("{}: a merge point routes with its router", self.id)),
        }
        self
    }

    /// Declare every status the merger or router can return.
    pub fn statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Status>,
    {
        self.domain = Some(statuses.into_iter().map(Into::into).collect());
        self
    }

    /// Declare the status domain from a [`StatusDomain`] type.
    pub fn domain<D: StatusDomain>(self) -> Self {
        self.statuses(D::domain())
    }

    /// Add a transition taken when the status is one of `statuses`.
    pub fn on<I, S>(mut self, statuses: I, target: TransitionTarget) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Status>,
    {
        self.transitions.push(Transition {
            on: StatusPredicate::one_of(statuses),
            target,
        });
        self
    }

    /// Add a transition taken for every status.
    pub fn on_any(mut self, target: TransitionTarget) -> Self {
        self.transitions.push(Transition {
            on: StatusPredicate::Any,
            target,
        });
        self
    }

    pub(crate) fn finish(self) -> (ProcessingItem<P>, Vec<String>) {
        let domain = self.domain;
        let kind = match self.draft {
            Draft::Processor {
                handler,
                args,
                merger,
            } => ItemKind::Processor {
                handler: HandlerDescriptor { handler, args },
                merger: merger.map(|merge| MergerDescriptor { merge, domain }),
            },
            Draft::Subgraph { subgraph, merger } => ItemKind::Subgraph {
                subgraph,
                merger: merger.map(|merge| MergerDescriptor { merge, domain }),
            },
            Draft::MergePoint { route } => ItemKind::MergePoint {
                router: RouterDescriptor { route, domain },
            },
        };
        let item = ProcessingItem {
            id: self.id,
            kind,
            transitions: self.transitions,
        };
        (item, self.errors)
    }
}

/// Builder for a whole graph.
pub struct GraphBuilder<P> {
    name: String,
    start: Vec<String>,
    items: Vec<ProcessingItem<P>>,
    errors: Vec<String>,
}

impl<P: 'static> GraphBuilder<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Vec::new(),
            items: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Feed the submitted payload to `id`. A detached merge point receives
    /// it on its incoming-merge join.
    pub fn start(mut self, id: impl Into<String>) -> Self {
        self.start.push(id.into());
        self
    }

    pub fn vertex(mut self, vertex: VertexBuilder<P>) -> Self {
        let (item, errors) = vertex.finish();
        self.errors.extend(errors);
        self.items.push(item);
        self
    }

    /// Assemble and validate the graph.
    pub fn build(self) -> Result<GraphDef<P>, BuildError> {
        let graph = GraphDef {
            name: self.name,
            start: self.start,
            items: self.items,
        };
        let mut errors = self.errors;
        if let Err(structural) = validate_graph(&graph) {
            errors.extend(structural);
        }
        if errors.is_empty() {
            Ok(graph)
        } else {
            Err(BuildError::InvalidGraph {
                graph: graph.name,
                errors,
            })
        }
    }
}
