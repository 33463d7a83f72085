//! Registry of named nested graphs.
//!
//! The [`SubgraphRegistry`] is the stock [`SubgraphRunner`]: subgraph
//! vertices name a child graph, and the registry dispatches the child
//! payload to whatever was registered under that name. A nested
//! [`Reactor`] is bridged through serde, so the child payload type only has
//! to round-trip through `serde_json::Value`.
//!
//! Thread-safe and cheaply cloneable; all instances share the same
//! underlying storage via `Arc`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::engine::Reactor;
use crate::errors::SubgraphError;
use crate::traits::SubgraphRunner;

type RunnerFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, SubgraphError>> + Send + Sync>;

/// Thread-safe registry of named child graphs.
#[derive(Clone, Default)]
pub struct SubgraphRegistry {
    inner: Arc<RwLock<HashMap<String, RunnerFn>>>,
}

impl SubgraphRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a nested reactor. The child value is deserialized into `C`,
    /// run to its terminal result, and serialized back. Overwrites any
    /// previous registration with the same name.
    pub fn register_graph<C>(&self, name: impl Into<String>, reactor: Reactor<C>)
    where
        C: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Arc::new(move |child: Value| {
                let reactor = reactor.clone();
                async move {
                    let payload: C =
                        serde_json::from_value(child).map_err(|e| SubgraphError::Payload {
                            message: e.to_string(),
                        })?;
                    let result = reactor.run(payload).await.map_err(|e| {
                        SubgraphError::Execution {
                            message: e.to_string(),
                        }
                    })?;
                    serde_json::to_value(&*result).map_err(|e| SubgraphError::Payload {
                        message: e.to_string(),
                    })
                }
                .boxed()
            }),
        );
    }

    /// Register an async function as a child graph.
    pub fn register<F, Fut>(&self, name: impl Into<String>, run: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, SubgraphError>> + Send + 'static,
    {
        self.insert(name.into(), Arc::new(move |child: Value| run(child).boxed()));
    }

    /// Register a synchronous function as a child graph. Convenient for
    /// tests and for children that need no asynchrony.
    pub fn register_sync<F>(&self, name: impl Into<String>, run: F)
    where
        F: Fn(Value) -> Result<Value, SubgraphError> + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Arc::new(move |child: Value| futures::future::ready(run(child)).boxed()),
        );
    }

    fn insert(&self, name: String, runner: RunnerFn) {
        let mut guard = self.inner.write();
        guard.insert(name, runner);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Returns the number of registered child graphs.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns `true` if no child graphs are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl SubgraphRunner for SubgraphRegistry {
    async fn run(&self, subgraph: &str, child: Value) -> Result<Value, SubgraphError> {
        let runner = self
            .inner
            .read()
            .get(subgraph)
            .cloned()
            .ok_or_else(|| SubgraphError::NotFound {
                name: subgraph.to_string(),
            })?;
        runner(child).await
    }
}

impl std::fmt::Debug for SubgraphRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.inner.read();
        let mut names: Vec<&String> = guard.keys().collect();
        names.sort();
        f.debug_struct("SubgraphRegistry")
            .field("subgraphs", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{GraphBuilder, VertexBuilder};
    use crate::traits::handler_fn;
    use crate::types::{Status, TransitionTarget};
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn sync_and_async_registrations_dispatch_by_name() {
        let registry = SubgraphRegistry::new();
        assert!(registry.is_empty());

        registry.register_sync("double", |v| Ok(json!(v.as_i64().unwrap_or(0) * 2)));
        registry.register("echo", |v| async move { Ok(v) });
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("echo"));

        assert_eq!(registry.run("double", json!(21)).await.unwrap(), json!(42));
        assert_eq!(
            registry.run("echo", json!({"a": 1})).await.unwrap(),
            json!({"a": 1})
        );
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let registry = SubgraphRegistry::new();
        let err = registry.run("missing", json!(null)).await.unwrap_err();
        assert!(matches!(err, SubgraphError::NotFound { ref name } if name == "missing"));
    }

    #[test]
    fn clone_shares_state_and_overwrites() {
        let registry = SubgraphRegistry::new();
        let clone = registry.clone();
        registry.register_sync("flow", |_| Ok(json!(1)));
        registry.register_sync("flow", |_| Ok(json!(2)));
        assert!(clone.contains("flow"));
        assert_eq!(clone.len(), 1);
        assert_eq!(format!("{registry:?}"), r#"SubgraphRegistry { subgraphs: ["flow"] }"#);
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ServiceRequest {
        service_id: i64,
        user_id: i64,
        #[serde(default)]
        status: Mutex<String>,
    }

    #[derive(Debug, Default)]
    struct Subscription {
        user_id: i64,
        status: Mutex<Option<String>>,
    }

    fn activation_reactor() -> Reactor<ServiceRequest> {
        let graph = GraphBuilder::new("activate-service")
            .start("activate")
            .vertex(
                VertexBuilder::processor(
                    "activate",
                    handler_fn(|args: Vec<Value>| async move {
                        match (args[0].as_i64(), args[1].as_i64()) {
                            (Some(107), Some(_)) => Ok(json!("ACTIVE")),
                            _ => Ok(json!("REJECTED")),
                        }
                    }),
                )
                .arg(|r: &ServiceRequest| json!(r.service_id))
                .arg(|r: &ServiceRequest| json!(r.user_id))
                .merger(|r: &ServiceRequest, result: &Value| {
                    *r.status.lock() = result.as_str().unwrap_or_default().to_string();
                    Status::from_static("DONE")
                })
                .on_any(TransitionTarget::Complete),
            )
            .build()
            .unwrap();
        Reactor::builder(graph).build().unwrap()
    }

    #[tokio::test]
    async fn parent_takes_status_from_child_graph() {
        let registry = SubgraphRegistry::new();
        registry.register_graph("activate-service", activation_reactor());

        let seen = Arc::new(Mutex::new(None));
        let seen_child = Arc::clone(&seen);
        let graph = GraphBuilder::new("subscribe")
            .start("subscribe")
            .vertex(
                VertexBuilder::subgraph("subscribe", "activate-service", move |p: &Subscription| {
                    let child = json!({ "serviceId": 107, "userId": p.user_id });
                    *seen_child.lock() = Some(child.clone());
                    child
                })
                .merger(|p: &Subscription, child: &Value| {
                    *p.status.lock() = child["status"].as_str().map(String::from);
                    Status::from_static("SUBSCRIBED")
                })
                .on_any(TransitionTarget::Complete),
            )
            .build()
            .unwrap();
        let reactor = Reactor::builder(graph)
            .subgraph_runner(registry)
            .build()
            .unwrap();

        let parent = tokio::time::timeout(
            Duration::from_secs(5),
            reactor.run(Subscription {
                user_id: 1,
                ..Subscription::default()
            }),
        )
        .await
        .expect("parent should settle")
        .unwrap();

        assert_eq!(
            *seen.lock(),
            Some(json!({ "serviceId": 107, "userId": 1 }))
        );
        assert_eq!(parent.status.lock().as_deref(), Some("ACTIVE"));
    }

    #[tokio::test]
    async fn child_payload_mismatch_is_reported() {
        let registry = SubgraphRegistry::new();
        registry.register_graph("activate-service", activation_reactor());

        let err = registry
            .run("activate-service", json!({ "serviceId": "not a number" }))
            .await
            .unwrap_err();
        assert!(matches!(err, SubgraphError::Payload { .. }), "{err}");
    }
}
