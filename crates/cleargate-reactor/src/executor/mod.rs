//! Graph executor: the core of the reactor.
//!
//! Every execution materializes a fresh vertex table from the graph and runs
//! one tokio task per vertex. A vertex waits on its incoming-handle join,
//! invokes its handler (or nested subgraph), waits on its incoming-merge
//! join, asks its merger or router for a status and forwards the payload
//! along every matching transition. The first terminal transition or the
//! first fatal error resolves the run's result.

mod handle;
mod merge;
pub(crate) mod run;
mod slot;
mod vertex;
mod wiring;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::defaults::{
    CloneCopier, NoopImmutabilityChecker, NoopProfiler, NoopTracer, TypeNameSerializer,
};
use super::errors::{HandlerError, MergeError};
use super::traits::{
    DebugSerializer, DefensiveCopier, ImmutabilityChecker, Profiler, SubgraphRunner, Tracer,
};
use super::types::{ExecutionId, GraphDef, ItemKind};
use super::validate::validate_graph;

use run::RunContext;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Configuration errors, raised synchronously while building.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The graph failed structural validation.
    #[error("invalid graph {graph}: {}", .errors.join("; "))]
    InvalidGraph { graph: String, errors: Vec<String> },
    /// A start point or transition names an item the graph does not have.
    #[error("unknown item: {id}")]
    UnknownItem { id: String },
}

/// Fatal outcomes of one execution, delivered through
/// [`ExecutionHandle::result`].
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// The run reached a state the graph does not allow: an uncovered
    /// status, several active incoming flows, or an unresolved join.
    #[error("execution inconsistency at {vertex}: {message}")]
    Inconsistency { vertex: String, message: String },
    #[error("handler of {vertex} failed on payload {payload_dump}: {cause}")]
    Handler {
        vertex: String,
        payload_dump: String,
        #[source]
        cause: HandlerError,
    },
    #[error("merger of {vertex} failed on payload {payload_dump}: {cause}")]
    Merger {
        vertex: String,
        payload_dump: String,
        #[source]
        cause: MergeError,
    },
    /// The payload changed while a handler was running.
    #[error("payload modified during handling by {vertex}: {diff}; payload {payload_dump}")]
    Immutability {
        vertex: String,
        diff: String,
        payload_dump: String,
    },
    /// Every vertex settled without reaching a terminal transition.
    #[error("execution settled without reaching a terminal transition")]
    Unfinished,
    #[error("execution already submitted")]
    AlreadySubmitted,
    #[error("runtime error: {message}")]
    Runtime { message: String },
}

/// What the engine does when a handler modifies the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImmutabilityControlLevel {
    /// No snapshots are taken.
    #[default]
    NoControl,
    LogWarn,
    LogError,
    /// Fail the run with [`ExecutionError::Immutability`].
    FailRun,
}

/// Which joins are resolved as dead once the run has its outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoisonPolicy {
    /// Incoming-handle and incoming-merge joins, on success and on failure.
    #[default]
    AllJoins,
    /// Incoming-handle joins only, and only on success. Merge-side joins of
    /// branches still running may stay pending.
    HandleJoinsOnly,
}

/// Configuration for the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Default: [`ImmutabilityControlLevel::NoControl`].
    pub immutability_control_level: ImmutabilityControlLevel,
    /// Default: [`PoisonPolicy::AllJoins`].
    pub poison_policy: PoisonPolicy,
}

/// Pluggable collaborators used by every execution.
///
/// `Default` wires the no-op implementations from [`crate::defaults`] and no
/// subgraph runner.
pub struct Collaborators<P> {
    pub profiler: Arc<dyn Profiler>,
    pub tracer: Arc<dyn Tracer<P>>,
    pub immutability_checker: Arc<dyn ImmutabilityChecker<P>>,
    pub copier: Arc<dyn DefensiveCopier>,
    pub subgraph_runner: Option<Arc<dyn SubgraphRunner>>,
    pub serializer: Arc<dyn DebugSerializer<P>>,
}

impl<P: 'static> Default for Collaborators<P> {
    fn default() -> Self {
        Self {
            profiler: Arc::new(NoopProfiler),
            tracer: Arc::new(NoopTracer),
            immutability_checker: Arc::new(NoopImmutabilityChecker),
            copier: Arc::new(CloneCopier),
            subgraph_runner: None,
            serializer: Arc::new(TypeNameSerializer),
        }
    }
}

impl<P> Clone for Collaborators<P> {
    fn clone(&self) -> Self {
        Self {
            profiler: Arc::clone(&self.profiler),
            tracer: Arc::clone(&self.tracer),
            immutability_checker: Arc::clone(&self.immutability_checker),
            copier: Arc::clone(&self.copier),
            subgraph_runner: self.subgraph_runner.clone(),
            serializer: Arc::clone(&self.serializer),
        }
    }
}

impl<P> std::fmt::Debug for Collaborators<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("subgraph_runner", &self.subgraph_runner.is_some())
            .finish_non_exhaustive()
    }
}

impl<P: 'static> Collaborators<P> {
    pub fn with_profiler(mut self, profiler: impl Profiler + 'static) -> Self {
        self.profiler = Arc::new(profiler);
        self
    }

    pub fn with_tracer(mut self, tracer: impl Tracer<P> + 'static) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    pub fn with_immutability_checker(
        mut self,
        checker: impl ImmutabilityChecker<P> + 'static,
    ) -> Self {
        self.immutability_checker = Arc::new(checker);
        self
    }

    pub fn with_copier(mut self, copier: impl DefensiveCopier + 'static) -> Self {
        self.copier = Arc::new(copier);
        self
    }

    pub fn with_subgraph_runner(mut self, runner: Arc<dyn SubgraphRunner>) -> Self {
        self.subgraph_runner = Some(runner);
        self
    }

    pub fn with_serializer(mut self, serializer: impl DebugSerializer<P> + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }
}

// ---------------------------------------------------------------------------
// ExecutionBuilder
// ---------------------------------------------------------------------------

/// Turns a graph definition into ready-to-submit executions.
pub struct ExecutionBuilder<P> {
    collaborators: Collaborators<P>,
    config: ExecutorConfig,
}

impl<P: Send + Sync + 'static> ExecutionBuilder<P> {
    pub fn new(collaborators: Collaborators<P>, config: ExecutorConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Structural validation plus the checks that depend on the
    /// collaborators.
    pub fn validate(&self, graph: &GraphDef<P>) -> Result<(), BuildError> {
        let mut errors = validate_graph(graph).err().unwrap_or_default();
        if self.collaborators.subgraph_runner.is_none() {
            for item in &graph.items {
                if let ItemKind::Subgraph { subgraph, .. } = &item.kind {
                    errors.push(format!(
                        "Subgraph item {} delegates to {} but no subgraph runner is configured",
                        item.id, subgraph.subgraph
                    ));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BuildError::InvalidGraph {
                graph: graph.name.clone(),
                errors,
            })
        }
    }

    /// Validate `graph` and prepare a single execution of it.
    pub fn build(&self, graph: &Arc<GraphDef<P>>) -> Result<ExecutionHandle<P>, BuildError> {
        self.validate(graph)?;
        self.instantiate(graph)
    }

    /// Prepare an execution of a graph that already passed [`validate`].
    ///
    /// [`validate`]: ExecutionBuilder::validate
    pub(crate) fn instantiate(
        &self,
        graph: &Arc<GraphDef<P>>,
    ) -> Result<ExecutionHandle<P>, BuildError> {
        let table = wiring::wire(graph)?;
        let run = RunContext::new(
            Arc::clone(graph),
            table,
            self.collaborators.clone(),
            self.config.clone(),
        );
        Ok(ExecutionHandle {
            run: Arc::new(run),
            submitted: AtomicBool::new(false),
        })
    }
}

// ---------------------------------------------------------------------------
// ExecutionHandle
// ---------------------------------------------------------------------------

/// Handle to one execution: submission, result, quiescence and diagnostics.
pub struct ExecutionHandle<P> {
    run: Arc<RunContext<P>>,
    submitted: AtomicBool,
}

impl<P: Send + Sync + 'static> ExecutionHandle<P> {
    pub fn execution_id(&self) -> ExecutionId {
        self.run.id
    }

    /// Start the execution on the current tokio runtime. Returns
    /// immediately; the outcome arrives through [`result`](Self::result).
    pub fn submit(&self, payload: impl Into<Arc<P>>) -> Result<(), ExecutionError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| ExecutionError::Runtime {
                message: e.to_string(),
            })?;
        if self.submitted.swap(true, Ordering::AcqRel) {
            return Err(ExecutionError::AlreadySubmitted);
        }
        run::start(&self.run, &runtime, payload.into());
        Ok(())
    }

    /// The payload of the first terminal transition, or the first fatal
    /// error. Every call observes the same outcome. Pending until
    /// [`submit`](Self::submit) is called.
    pub async fn result(&self) -> Result<Arc<P>, ExecutionError> {
        self.run.result().await
    }

    /// Resolves once every handling vertex has a handle result, including
    /// side branches still running after the result resolved.
    pub async fn quiescence(&self) {
        self.run.quiescence().await
    }

    pub fn is_done(&self) -> bool {
        self.run.is_done()
    }

    /// One line for the run plus one per vertex with the state of its
    /// synchronization points.
    pub fn dump_state(&self) -> String {
        self.run.dump_state()
    }
}

impl<P> std::fmt::Debug for ExecutionHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("execution_id", &self.run.id)
            .field("graph", &self.run.graph.name)
            .finish_non_exhaustive()
    }
}
