//! Reactor: in-process asynchronous dataflow engine for business-process
//! graphs.
//!
//! A graph is a set of processing items over one shared payload. Each item
//! runs a handler (or a nested subgraph) and then a merger that maps the
//! result to a status; transitions matching that status hand the payload to
//! downstream items or complete the run. Items with no dependency between
//! them run concurrently on tokio.
//!
//! The engine is designed to be embedded: collaborators for profiling,
//! tracing, immutability checking, defensive copying, subgraph dispatch and
//! payload dumps are explicit values, and no subscriber or global state is
//! installed by the library.

pub mod builder;
pub mod defaults;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod subgraph_registry;
pub mod traits;
pub mod types;
pub mod validate;

// Re-export public types at the crate level.

// builder
pub use builder::{GraphBuilder, VertexBuilder};

// defaults
pub use defaults::{
    CallStats, CloneCopier, DebugFmtSerializer, InMemoryProfiler, JsonDebugSerializer,
    JsonImmutabilityChecker, NoopImmutabilityChecker, NoopProfiler, NoopTracer, TracingProfiler,
    TracingTracer, TypeNameSerializer,
};

// engine
pub use engine::{Reactor, ReactorBuilder, ReactorError};

// errors
pub use errors::{HandlerError, MergeError, SubgraphError};

// executor
pub use executor::{
    BuildError, Collaborators, ExecutionBuilder, ExecutionError, ExecutionHandle,
    ExecutorConfig, ImmutabilityControlLevel, PoisonPolicy,
};

// subgraph_registry
pub use subgraph_registry::SubgraphRegistry;

// traits
pub use traits::{
    handler_fn, DebugSerializer, DefensiveCopier, Handler, HandlerFn, ImmutabilityChecker,
    ProfiledCall, Profiler, Snapshot, SubgraphRunner, TraceMarker, Tracer,
};

// types
pub use types::{
    ExecutionId, GraphDef, GraphModel, ItemKind, ItemRole, ProcessingItem, Status, StatusDomain,
    StatusPredicate, Transition, TransitionTarget, VertexModel,
};

// validate
pub use validate::validate_graph;
