//! Core data types: graph definitions, statuses, and execution identity.

pub mod execution;
pub mod graph;
pub mod model;
pub mod status;

pub use execution::ExecutionId;
pub use graph::{
    ArgExtractor, ExtractFn, GraphDef, HandlerDescriptor, ItemKind, ItemRole, MergeFn,
    MergerDescriptor, ProcessingItem, RouteFn, RouterDescriptor, SubgraphDescriptor, Transition,
    TransitionTarget,
};
pub use model::{GraphModel, VertexModel};
pub use status::{Status, StatusDomain, StatusPredicate};
