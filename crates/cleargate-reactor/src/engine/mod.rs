//! Reactor: the single entry point for running a graph.
//!
//! A [`Reactor`] owns one validated graph plus its collaborators and starts
//! a fresh execution for every submitted payload. Construct via
//! [`Reactor::builder()`].
//!
//! ```rust,ignore
//! let reactor = Reactor::builder(graph)
//!     .profiler(TracingProfiler)
//!     .subgraph_runner(registry)
//!     .build()?;
//!
//! let payload = reactor.run(Order::new(42)).await?;
//! ```

mod builder;
pub mod error;

pub use builder::ReactorBuilder;
pub use error::ReactorError;

use std::sync::Arc;

use tracing::debug;

use crate::executor::{ExecutionBuilder, ExecutionHandle, ExecutorConfig};
use crate::types::{GraphDef, GraphModel};

/// A graph bound to its collaborators, ready to run payloads.
///
/// Cheaply cloneable; clones share the graph and collaborators.
pub struct Reactor<P> {
    pub(super) graph: Arc<GraphDef<P>>,
    pub(super) executor: Arc<ExecutionBuilder<P>>,
}

impl<P> Clone for Reactor<P> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<P: Send + Sync + 'static> Reactor<P> {
    /// Create a new [`ReactorBuilder`] for `graph`.
    pub fn builder(graph: GraphDef<P>) -> ReactorBuilder<P> {
        ReactorBuilder::new(graph)
    }

    pub fn graph(&self) -> &GraphDef<P> {
        &self.graph
    }

    pub fn config(&self) -> &ExecutorConfig {
        self.executor.config()
    }

    /// Serializable description of the graph.
    pub fn model(&self) -> GraphModel {
        GraphModel::from(self.graph.as_ref())
    }

    /// Start an execution of `payload` and return its handle immediately.
    pub fn submit(&self, payload: impl Into<Arc<P>>) -> Result<ExecutionHandle<P>, ReactorError> {
        let handle = self.executor.instantiate(&self.graph)?;
        handle.submit(payload)?;
        debug!(
            graph = %self.graph.name,
            execution_id = %handle.execution_id(),
            "payload submitted"
        );
        Ok(handle)
    }

    /// Submit `payload` and wait for the run's result.
    pub async fn run(&self, payload: impl Into<Arc<P>>) -> Result<Arc<P>, ReactorError> {
        let handle = self.submit(payload)?;
        Ok(handle.result().await?)
    }
}

impl<P> std::fmt::Debug for Reactor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("graph", &self.graph.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{GraphBuilder, VertexBuilder};
    use crate::defaults::{InMemoryProfiler, JsonDebugSerializer, TracingProfiler, TracingTracer};
    use crate::executor::{BuildError, ExecutionError, PoisonPolicy};
    use crate::subgraph_registry::SubgraphRegistry;
    use crate::traits::handler_fn;
    use crate::types::{Status, TransitionTarget};
    use parking_lot::Mutex;
    use serde::Serialize;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[derive(Debug, Default, Serialize)]
    struct Order {
        amount: i64,
        discount: Mutex<Option<i64>>,
    }

    impl Order {
        fn new(amount: i64) -> Self {
            Self {
                amount,
                ..Self::default()
            }
        }
    }

    /// Orders above 100 get a 10% discount from the pricing vertex; smaller
    /// orders skip it through the router.
    fn pricing_graph() -> GraphDef<Order> {
        GraphBuilder::new("pricing")
            .start("route")
            .vertex(
                VertexBuilder::router("route", |o: &Order| {
                    if o.amount > 100 {
                        Status::from_static("LARGE")
                    } else {
                        Status::from_static("SMALL")
                    }
                })
                .on(["LARGE"], TransitionTarget::handle("discount"))
                .on(["SMALL"], TransitionTarget::Complete),
            )
            .vertex(
                VertexBuilder::processor(
                    "discount",
                    handler_fn(|args: Vec<Value>| async move {
                        Ok(json!(args[0].as_i64().unwrap_or(0) / 10))
                    }),
                )
                .arg(|o: &Order| json!(o.amount))
                .merger(|o: &Order, discount: &Value| {
                    *o.discount.lock() = discount.as_i64();
                    Status::from_static("PRICED")
                })
                .on_any(TransitionTarget::Complete),
            )
            .build()
            .unwrap()
    }

    async fn settle<T>(fut: impl std::future::Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), fut)
            .await
            .expect("reactor should settle")
    }

    #[tokio::test]
    async fn runs_each_payload_in_a_fresh_execution() {
        let reactor = Reactor::builder(pricing_graph()).build().unwrap();

        let large = settle(reactor.run(Order::new(250))).await.unwrap();
        assert_eq!(*large.discount.lock(), Some(25));

        let small = settle(reactor.run(Order::new(40))).await.unwrap();
        assert_eq!(*small.discount.lock(), None);
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[tokio::test]
    async fn tracing_collaborators_run_end_to_end() {
        init_tracing();
        let reactor = Reactor::builder(pricing_graph())
            .profiler(TracingProfiler)
            .tracer(TracingTracer::new())
            .build()
            .unwrap();

        let order = settle(reactor.run(Order::new(120))).await.unwrap();
        assert_eq!(*order.discount.lock(), Some(12));
    }

    #[tokio::test]
    async fn concurrent_submissions_are_independent() {
        let reactor = Reactor::builder(pricing_graph()).build().unwrap();
        let a = reactor.submit(Order::new(500)).unwrap();
        let b = reactor.clone().submit(Order::new(1000)).unwrap();
        assert_ne!(a.execution_id(), b.execution_id());

        let (a, b) = settle(async { tokio::join!(a.result(), b.result()) }).await;
        assert_eq!(*a.unwrap().discount.lock(), Some(50));
        assert_eq!(*b.unwrap().discount.lock(), Some(100));
    }

    #[tokio::test]
    async fn builder_wires_collaborators_and_config() {
        let profiler = InMemoryProfiler::new();
        let reactor = Reactor::builder(pricing_graph())
            .profiler(profiler.clone())
            .serializer(JsonDebugSerializer::new())
            .poison_policy(PoisonPolicy::HandleJoinsOnly)
            .build()
            .unwrap();
        assert_eq!(reactor.config().poison_policy, PoisonPolicy::HandleJoinsOnly);

        settle(reactor.run(Order::new(200))).await.unwrap();
        assert_eq!(profiler.count("merge.Order.route"), 1);
        assert_eq!(profiler.count("handle.Order.discount"), 1);
    }

    #[tokio::test]
    async fn failures_carry_the_serialized_payload() {
        let graph = GraphBuilder::new("failing")
            .start("a")
            .vertex(
                VertexBuilder::processor("a", handler_fn(|_: Vec<Value>| async { Ok(json!(1)) }))
                    .try_merger(|_: &Order, _: &Value| Err(crate::errors::MergeError::failed("no")))
                    .on_any(TransitionTarget::Complete),
            )
            .build()
            .unwrap();
        let reactor = Reactor::builder(graph)
            .serializer(JsonDebugSerializer::new())
            .build()
            .unwrap();

        let err = settle(reactor.run(Order::new(3))).await.unwrap_err();
        match err {
            ReactorError::Execution(ExecutionError::Merger { payload_dump, .. }) => {
                assert_eq!(payload_dump, r#"{"amount":3,"discount":null}"#);
            }
            other => panic!("expected merger failure, got {other}"),
        }
    }

    #[test]
    fn subgraph_vertices_need_a_runner() {
        let graph = || {
            GraphBuilder::new("parent")
                .start("child")
                .vertex(
                    VertexBuilder::subgraph("child", "pricing", |o: &Order| json!(o.amount))
                        .merger(|_: &Order, _: &Value| Status::from_static("OK"))
                        .on_any(TransitionTarget::Complete),
                )
                .build()
                .unwrap()
        };

        let err = Reactor::builder(graph()).build().unwrap_err();
        assert!(matches!(
            err,
            ReactorError::Build(BuildError::InvalidGraph { .. })
        ));

        Reactor::builder(graph())
            .subgraph_runner(SubgraphRegistry::new())
            .build()
            .unwrap();
    }

    #[test]
    fn model_describes_the_graph() {
        let reactor = Reactor::builder(pricing_graph()).build().unwrap();
        let model = reactor.model();
        assert_eq!(model.name, "pricing");
        assert_eq!(model.start, vec!["route"]);
        assert_eq!(model.vertices.len(), 2);
        assert_eq!(format!("{reactor:?}"), r#"Reactor { graph: "pricing", .. }"#);
    }
}
