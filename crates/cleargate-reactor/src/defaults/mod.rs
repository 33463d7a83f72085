//! Default implementations for all pluggable reactor traits.
//!
//! These defaults allow the engine to run with zero external configuration.
//! Each can be replaced via [`Collaborators`](crate::executor::Collaborators)
//! or the [`ReactorBuilder`](crate::engine::ReactorBuilder).

pub mod copier;
pub mod immutability;
pub mod profiler;
pub mod serializer;
pub mod tracer;
pub use copier::CloneCopier;
pub use immutability::{JsonImmutabilityChecker, NoopImmutabilityChecker};
pub use profiler::{CallStats, InMemoryProfiler, NoopProfiler, TracingProfiler};
pub use serializer::{DebugFmtSerializer, JsonDebugSerializer, TypeNameSerializer};
pub use tracer::{NoopTracer, TracingTracer};
