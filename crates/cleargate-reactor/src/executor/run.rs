//! Per-execution state and the vertex task loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};

use super::handle::{self, Callee};
use super::merge;
use super::slot::Slot;
use super::vertex::Flow;
use super::wiring::VertexTable;
use super::{Collaborators, ExecutionError, ExecutorConfig, PoisonPolicy};
use crate::errors::panic_message;
use crate::types::{ExecutionId, GraphDef, ItemKind};

/// Everything one execution needs, shared by all of its vertex tasks.
pub(crate) struct RunContext<P> {
    pub id: ExecutionId,
    pub graph: Arc<GraphDef<P>>,
    pub table: VertexTable<P>,
    pub collaborators: Collaborators<P>,
    pub config: ExecutorConfig,
    /// Short payload type name used in profiling call names.
    pub payload_type: &'static str,
    result: Slot<Result<Arc<P>, ExecutionError>>,
}

impl<P: Send + Sync + 'static> RunContext<P> {
    pub(crate) fn new(
        graph: Arc<GraphDef<P>>,
        table: VertexTable<P>,
        collaborators: Collaborators<P>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            graph,
            table,
            collaborators,
            config,
            payload_type: short_type_name::<P>(),
            result: Slot::new(),
        }
    }

    pub(crate) fn dump(&self, payload: &P) -> String {
        self.collaborators.serializer.dump(payload)
    }

    /// Complete the run with `payload`. The first completion wins; a losing
    /// one is logged with both payloads.
    pub(crate) fn complete(&self, vertex: &str, payload: Arc<P>) {
        if self.result.complete(Ok(Arc::clone(&payload))) {
            debug!(execution_id = %self.id, %vertex, "execution completed");
            self.poison(true);
            return;
        }
        let previous = match self.result.peek() {
            Some(Ok(previous)) => self.dump(&previous),
            Some(Err(e)) => format!("failure: {e}"),
            None => "<unset>".to_string(),
        };
        error!(
            execution_id = %self.id,
            %vertex,
            %previous,
            current = %self.dump(&payload),
            "execution result already completed, terminal transition ignored"
        );
    }

    /// Fail the run. Ignored, apart from logging, if the run already has an
    /// outcome.
    pub(crate) fn fail(&self, error: ExecutionError) {
        let message = error.to_string();
        if self.result.complete(Err(error)) {
            error!(execution_id = %self.id, error = %message, "execution failed");
            self.poison(false);
        } else {
            debug!(
                execution_id = %self.id,
                error = %message,
                "execution already has an outcome, failure dropped"
            );
        }
    }

    fn poison(&self, success: bool) {
        let merge_joins = match self.config.poison_policy {
            PoisonPolicy::AllJoins => true,
            PoisonPolicy::HandleJoinsOnly if success => false,
            PoisonPolicy::HandleJoinsOnly => return,
        };
        for vertex in &self.table.vertices {
            vertex.poison(merge_joins);
        }
    }

    pub(crate) async fn result(&self) -> Result<Arc<P>, ExecutionError> {
        self.result
            .wait()
            .await
            .unwrap_or(Err(ExecutionError::Unfinished))
    }

    pub(crate) fn is_done(&self) -> bool {
        self.result.is_done()
    }

    /// Resolves once every non-detached vertex has a handle result.
    pub(crate) async fn quiescence(&self) {
        let pending = self
            .table
            .vertices
            .iter()
            .filter(|v| !v.detached)
            .map(|v| v.handle_result.wait());
        join_all(pending).await;
    }

    pub(crate) fn dump_state(&self) -> String {
        let result = match self.result.peek() {
            None => "pending",
            Some(Ok(_)) => "completed",
            Some(Err(_)) => "failed",
        };
        let mut lines = vec![format!(
            "execution {} of {}: result={result}",
            self.id, self.graph.name
        )];
        lines.extend(self.table.vertices.iter().map(|v| v.state().to_string()));
        lines.join("\n")
    }
}

/// Spawn one task per vertex, feed the start edges, and watch for the run
/// settling without an outcome.
pub(crate) fn start<P: Send + Sync + 'static>(
    run: &Arc<RunContext<P>>,
    runtime: &tokio::runtime::Handle,
    payload: Arc<P>,
) {
    debug!(execution_id = %run.id, graph = %run.graph.name, "execution submitted");

    let tasks: Vec<JoinHandle<()>> = (0..run.table.vertices.len())
        .map(|index| {
            let span = tracing::debug_span!(
                "vertex",
                execution_id = %run.id,
                vertex = %run.table.vertices[index].id
            );
            runtime.spawn(run_vertex(Arc::clone(run), index).instrument(span))
        })
        .collect();

    for slot in &run.table.start {
        slot.complete(Flow::Normal(Arc::clone(&payload)));
    }

    let run = Arc::clone(run);
    runtime.spawn(async move {
        for outcome in join_all(tasks).await {
            if let Err(e) = outcome {
                error!(execution_id = %run.id, error = %e, "vertex task aborted");
            }
        }
        if run.result.complete(Err(ExecutionError::Unfinished)) {
            warn!(
                execution_id = %run.id,
                graph = %run.graph.name,
                "execution settled without reaching a terminal transition"
            );
        }
    });
}

/// Drive one vertex. A panic escaping a collaborator settles the vertex as
/// terminal so downstream joins still resolve, and fails the run.
async fn run_vertex<P: Send + Sync + 'static>(run: Arc<RunContext<P>>, index: usize) {
    let outcome = AssertUnwindSafe(process_vertex(&run, index))
        .catch_unwind()
        .await;
    let Err(panic) = outcome else {
        return;
    };

    let vertex = &run.table.vertices[index];
    let message = panic_message(panic.as_ref());
    error!(execution_id = %run.id, vertex = %vertex.id, %message, "vertex task panicked");
    vertex.handle_result.complete(Flow::Terminal);
    vertex.merge_result.complete(Flow::Terminal);
    vertex.fan_out(&Flow::Terminal);
    run.fail(ExecutionError::Runtime {
        message: format!("vertex {} panicked: {message}", vertex.id),
    });
}

/// Handling phase (unless detached), then merge phase, then fan-out.
async fn process_vertex<P: Send + Sync + 'static>(run: &RunContext<P>, index: usize) {
    let vertex = &run.table.vertices[index];
    let item = &run.graph.items[index];

    let callee = match &item.kind {
        ItemKind::Processor { handler, .. } => Some(Callee::Handler(handler)),
        ItemKind::Subgraph { subgraph, .. } => Some(Callee::Subgraph(subgraph)),
        ItemKind::MergePoint { .. } => None,
    };
    let handled = match callee {
        Some(callee) => {
            let handled = handle::resolve(run, vertex, callee).await;
            vertex.handle_result.complete(handled.clone());
            Some(handled)
        }
        None => None,
    };

    let routed = merge::resolve(run, vertex, item, handled).await;
    vertex.merge_result.complete(routed.clone());
    vertex.fan_out(&routed);
}

fn short_type_name<P>() -> &'static str {
    let full = std::any::type_name::<P>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
