//! Handling phase: incoming-handle join, argument resolution, and the
//! handler or subgraph call.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::run::RunContext;
use super::vertex::{join, Flow, Handled, Join, RuntimeVertex};
use super::{Collaborators, ExecutionError, ImmutabilityControlLevel};
use crate::errors::{panic_message, HandlerError, SubgraphError};
use crate::traits::DefensiveCopier;
use crate::types::{HandlerDescriptor, SubgraphDescriptor};

/// What the handling phase of a vertex calls.
pub(super) enum Callee<'a, P> {
    Handler(&'a HandlerDescriptor<P>),
    Subgraph(&'a SubgraphDescriptor<P>),
}

/// Wait for every incoming handling flow and, if exactly one is active,
/// run the handling call on its payload.
pub(super) async fn resolve<P: Send + Sync + 'static>(
    run: &RunContext<P>,
    vertex: &RuntimeVertex<P>,
    callee: Callee<'_, P>,
) -> Flow<Handled<P>> {
    let incoming = join_all(vertex.incoming_handle.iter().map(|slot| slot.wait())).await;

    let payload = match join(incoming) {
        Join::Active(payload) => payload,
        Join::Inactive { .. } => {
            debug!(vertex = %vertex.id, "no active incoming handling flow");
            return Flow::Dead;
        }
        Join::Terminal => return Flow::Terminal,
        Join::Unresolved => {
            run.fail(ExecutionError::Inconsistency {
                vertex: vertex.id.clone(),
                message: "incoming handling flow resolved without a value".to_string(),
            });
            return Flow::Terminal;
        }
        Join::Ambiguous(count) => {
            run.fail(ExecutionError::Inconsistency {
                vertex: vertex.id.clone(),
                message: format!(
                    "{count} active incoming handling flows, can not determine which transition to take the payload from"
                ),
            });
            return Flow::Terminal;
        }
    };

    invoke(run, vertex, callee, payload).await
}

async fn invoke<P: Send + Sync + 'static>(
    run: &RunContext<P>,
    vertex: &RuntimeVertex<P>,
    callee: Callee<'_, P>,
    payload: Arc<P>,
) -> Flow<Handled<P>> {
    let c = &run.collaborators;
    let call = c
        .profiler
        .start(&format!("handle.{}.{}", run.payload_type, vertex.id));
    let marker = c
        .tracer
        .is_traceable(&payload)
        .then(|| c.tracer.before_handle(&vertex.id, &payload));
    let level = run.config.immutability_control_level;
    let snapshot = (level != ImmutabilityControlLevel::NoControl)
        .then(|| c.immutability_checker.take_snapshot(&payload));

    let outcome = match callee {
        Callee::Handler(handler) => call_handler(handler, &payload, c.copier.as_ref()).await,
        Callee::Subgraph(subgraph) => call_subgraph(subgraph, &payload, c).await,
    };

    call.stop();
    if let Some(marker) = marker {
        c.tracer.after_handle(marker, &vertex.id, outcome.as_ref());
    }

    if let Some(snapshot) = snapshot {
        if let Some(diff) = c.immutability_checker.diff(&snapshot, &payload) {
            let payload_dump = run.dump(&payload);
            match level {
                ImmutabilityControlLevel::NoControl => {}
                ImmutabilityControlLevel::LogWarn => warn!(
                    vertex = %vertex.id,
                    %diff,
                    payload = %payload_dump,
                    "concurrent modification of payload detected"
                ),
                ImmutabilityControlLevel::LogError => error!(
                    vertex = %vertex.id,
                    %diff,
                    payload = %payload_dump,
                    "concurrent modification of payload detected"
                ),
                ImmutabilityControlLevel::FailRun => {
                    if let Err(cause) = &outcome {
                        error!(
                            vertex = %vertex.id,
                            error = %cause,
                            "handler failure superseded by immutability violation"
                        );
                    }
                    run.fail(ExecutionError::Immutability {
                        vertex: vertex.id.clone(),
                        diff,
                        payload_dump,
                    });
                    return Flow::Terminal;
                }
            }
        }
    }

    match outcome {
        Ok(result) => Flow::Normal(Handled { payload, result }),
        Err(cause) => {
            run.fail(ExecutionError::Handler {
                vertex: vertex.id.clone(),
                payload_dump: run.dump(&payload),
                cause,
            });
            Flow::Terminal
        }
    }
}

/// Extract the arguments and await the handler. Panics while extracting,
/// while creating the future, or while polling it become
/// [`HandlerError::Panicked`].
async fn call_handler<P>(
    descriptor: &HandlerDescriptor<P>,
    payload: &P,
    copier: &dyn DefensiveCopier,
) -> Result<Value, HandlerError> {
    let call = panic::catch_unwind(AssertUnwindSafe(|| {
        let args = descriptor
            .args
            .iter()
            .map(|arg| {
                let value = (arg.extract)(payload);
                if arg.copy {
                    copier.copy(&value)
                } else {
                    value
                }
            })
            .collect();
        descriptor.handler.handle(args)
    }))
    .map_err(|panic| HandlerError::Panicked {
        message: panic_message(panic.as_ref()),
    })?;

    AssertUnwindSafe(call)
        .catch_unwind()
        .await
        .map_err(|panic| HandlerError::Panicked {
            message: panic_message(panic.as_ref()),
        })?
}

async fn call_subgraph<P>(
    descriptor: &SubgraphDescriptor<P>,
    payload: &P,
    collaborators: &Collaborators<P>,
) -> Result<Value, HandlerError> {
    let wrap = |cause: SubgraphError| HandlerError::Subgraph {
        subgraph: descriptor.subgraph.clone(),
        cause,
    };
    let runner = collaborators.subgraph_runner.as_ref().ok_or_else(|| {
        wrap(SubgraphError::NotFound {
            name: descriptor.subgraph.clone(),
        })
    })?;

    let child = panic::catch_unwind(AssertUnwindSafe(|| (descriptor.child)(payload))).map_err(
        |panic| HandlerError::Panicked {
            message: panic_message(panic.as_ref()),
        },
    )?;
    let child = if descriptor.copy {
        collaborators.copier.copy(&child)
    } else {
        child
    };

    AssertUnwindSafe(runner.run(&descriptor.subgraph, child))
        .catch_unwind()
        .await
        .map_err(|panic| HandlerError::Panicked {
            message: panic_message(panic.as_ref()),
        })?
        .map_err(wrap)
}
