//! Graph definition: processing items, their descriptors, and transitions.
//!
//! A [`GraphDef`] is plain data. It is produced by the
//! [`GraphBuilder`](crate::builder::GraphBuilder) (or by hand), validated
//! once, and shared between any number of executions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::{Status, StatusPredicate};
use crate::errors::MergeError;
use crate::traits::Handler;

/// Extracts one handler argument (or a child payload) from the payload.
pub type ExtractFn<P> = Arc<dyn Fn(&P) -> Value + Send + Sync>;

/// Decides a status from the payload and the handler result.
pub type MergeFn<P> = Arc<dyn Fn(&P, &Value) -> Result<Status, MergeError> + Send + Sync>;

/// Decides a status from the payload alone.
pub type RouteFn<P> = Arc<dyn Fn(&P) -> Result<Status, MergeError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// One positional handler argument.
pub struct ArgExtractor<P> {
    pub extract: ExtractFn<P>,
    /// Pass a defensive copy of the extracted value.
    pub copy: bool,
}

impl<P> Clone for ArgExtractor<P> {
    fn clone(&self) -> Self {
        Self {
            extract: Arc::clone(&self.extract),
            copy: self.copy,
        }
    }
}

pub struct HandlerDescriptor<P> {
    pub handler: Arc<dyn Handler>,
    pub args: Vec<ArgExtractor<P>>,
}

impl<P> Clone for HandlerDescriptor<P> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            args: self.args.clone(),
        }
    }
}

pub struct MergerDescriptor<P> {
    pub merge: MergeFn<P>,
    /// Every status `merge` can return, when known up front.
    pub domain: Option<BTreeSet<Status>>,
}

impl<P> Clone for MergerDescriptor<P> {
    fn clone(&self) -> Self {
        Self {
            merge: Arc::clone(&self.merge),
            domain: self.domain.clone(),
        }
    }
}

pub struct RouterDescriptor<P> {
    pub route: RouteFn<P>,
    pub domain: Option<BTreeSet<Status>>,
}

impl<P> Clone for RouterDescriptor<P> {
    fn clone(&self) -> Self {
        Self {
            route: Arc::clone(&self.route),
            domain: self.domain.clone(),
        }
    }
}

/// Delegation of a vertex's handling phase to a named nested graph.
pub struct SubgraphDescriptor<P> {
    pub subgraph: String,
    /// Builds the child payload from the parent payload.
    pub child: ExtractFn<P>,
    pub copy: bool,
}

impl<P> Clone for SubgraphDescriptor<P> {
    fn clone(&self) -> Self {
        Self {
            subgraph: self.subgraph.clone(),
            child: Arc::clone(&self.child),
            copy: self.copy,
        }
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Role of a processing item. Each variant carries only what it needs.
pub enum ItemKind<P> {
    Processor {
        handler: HandlerDescriptor<P>,
        merger: Option<MergerDescriptor<P>>,
    },
    Subgraph {
        subgraph: SubgraphDescriptor<P>,
        merger: Option<MergerDescriptor<P>>,
    },
    /// Detached merge point: no handling phase, routes on the payload alone.
    MergePoint { router: RouterDescriptor<P> },
}

impl<P> ItemKind<P> {
    pub fn role(&self) -> ItemRole {
        match self {
            Self::Processor { .. } => ItemRole::Processor,
            Self::Subgraph { .. } => ItemRole::Subgraph,
            Self::MergePoint { .. } => ItemRole::MergePoint,
        }
    }

    /// Whether this item has a merge phase that can select transitions.
    pub fn has_merger(&self) -> bool {
        match self {
            Self::Processor { merger, .. } | Self::Subgraph { merger, .. } => merger.is_some(),
            Self::MergePoint { .. } => true,
        }
    }

    /// Declared status domain of the merger or router, if any.
    pub fn declared_domain(&self) -> Option<&BTreeSet<Status>> {
        match self {
            Self::Processor { merger, .. } | Self::Subgraph { merger, .. } => {
                merger.as_ref().and_then(|m| m.domain.as_ref())
            }
            Self::MergePoint { router } => router.domain.as_ref(),
        }
    }
}

impl<P> Clone for ItemKind<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Processor { handler, merger } => Self::Processor {
                handler: handler.clone(),
                merger: merger.clone(),
            },
            Self::Subgraph { subgraph, merger } => Self::Subgraph {
                subgraph: subgraph.clone(),
                merger: merger.clone(),
            },
            Self::MergePoint { router } => Self::MergePoint {
                router: router.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    Processor,
    Subgraph,
    MergePoint,
}

impl fmt::Display for ItemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processor => f.write_str("processor"),
            Self::Subgraph => f.write_str("subgraph"),
            Self::MergePoint => f.write_str("merge point"),
        }
    }
}

/// Where a matched transition sends the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTarget {
    /// Into the target's incoming-handle join.
    Handle(String),
    /// Into the target's incoming-merge join, skipping its handler.
    Merge(String),
    /// Complete the run with the current payload.
    Complete,
}

impl TransitionTarget {
    pub fn handle(id: impl Into<String>) -> Self {
        Self::Handle(id.into())
    }

    pub fn merge(id: impl Into<String>) -> Self {
        Self::Merge(id.into())
    }

    /// Target vertex id, `None` for [`Complete`](Self::Complete).
    pub fn vertex(&self) -> Option<&str> {
        match self {
            Self::Handle(id) | Self::Merge(id) => Some(id),
            Self::Complete => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transition {
    pub on: StatusPredicate,
    pub target: TransitionTarget,
}

pub struct ProcessingItem<P> {
    pub id: String,
    pub kind: ItemKind<P>,
    /// Outgoing transitions of this item's merge point.
    pub transitions: Vec<Transition>,
}

impl<P> Clone for ProcessingItem<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind.clone(),
            transitions: self.transitions.clone(),
        }
    }
}

impl<P> fmt::Debug for ProcessingItem<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingItem")
            .field("id", &self.id)
            .field("role", &self.kind.role())
            .field("has_merger", &self.kind.has_merger())
            .field("transitions", &self.transitions)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A complete graph over payload type `P`.
pub struct GraphDef<P> {
    pub name: String,
    /// Items fed directly by the submitted payload.
    pub start: Vec<String>,
    pub items: Vec<ProcessingItem<P>>,
}

impl<P> GraphDef<P> {
    pub fn item(&self, id: &str) -> Option<&ProcessingItem<P>> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Position of an item in [`items`](Self::items).
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

impl<P> Clone for GraphDef<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            start: self.start.clone(),
            items: self.items.clone(),
        }
    }
}

impl<P> fmt::Debug for GraphDef<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphDef")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("items", &self.items)
            .finish()
    }
}
