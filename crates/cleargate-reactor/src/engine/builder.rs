//! Reactor builder: binds a graph to its collaborators and configuration.

use std::sync::Arc;

use super::error::ReactorError;
use super::Reactor;
use crate::executor::{
    Collaborators, ExecutionBuilder, ExecutorConfig, ImmutabilityControlLevel, PoisonPolicy,
};
use crate::traits::{
    DebugSerializer, DefensiveCopier, ImmutabilityChecker, Profiler, SubgraphRunner, Tracer,
};
use crate::types::GraphDef;

/// Builder for a [`Reactor`].
///
/// Every collaborator is optional; the no-op defaults from
/// [`crate::defaults`] are used for the ones left unset.
pub struct ReactorBuilder<P> {
    graph: GraphDef<P>,
    collaborators: Collaborators<P>,
    config: ExecutorConfig,
}

impl<P: Send + Sync + 'static> ReactorBuilder<P> {
    pub(super) fn new(graph: GraphDef<P>) -> Self {
        Self {
            graph,
            collaborators: Collaborators::default(),
            config: ExecutorConfig::default(),
        }
    }

    /// Set the profiler. Default: [`NoopProfiler`](crate::defaults::NoopProfiler).
    pub fn profiler(mut self, profiler: impl Profiler + 'static) -> Self {
        self.collaborators = self.collaborators.with_profiler(profiler);
        self
    }

    /// Set the tracer. Default: [`NoopTracer`](crate::defaults::NoopTracer).
    pub fn tracer(mut self, tracer: impl Tracer<P> + 'static) -> Self {
        self.collaborators = self.collaborators.with_tracer(tracer);
        self
    }

    /// Set the immutability checker. Only consulted when the control level
    /// is not `NoControl`.
    pub fn immutability_checker(mut self, checker: impl ImmutabilityChecker<P> + 'static) -> Self {
        self.collaborators = self.collaborators.with_immutability_checker(checker);
        self
    }

    /// Set the defensive copier. Default: [`CloneCopier`](crate::defaults::CloneCopier).
    pub fn copier(mut self, copier: impl DefensiveCopier + 'static) -> Self {
        self.collaborators = self.collaborators.with_copier(copier);
        self
    }

    /// Set the runner for subgraph vertices. Required when the graph has any.
    pub fn subgraph_runner(mut self, runner: impl SubgraphRunner + 'static) -> Self {
        self.collaborators = self.collaborators.with_subgraph_runner(Arc::new(runner));
        self
    }

    /// Set the payload serializer used in error messages and logs.
    pub fn serializer(mut self, serializer: impl DebugSerializer<P> + 'static) -> Self {
        self.collaborators = self.collaborators.with_serializer(serializer);
        self
    }

    /// Replace every collaborator at once.
    pub fn collaborators(mut self, collaborators: Collaborators<P>) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn immutability_control_level(mut self, level: ImmutabilityControlLevel) -> Self {
        self.config.immutability_control_level = level;
        self
    }

    pub fn poison_policy(mut self, policy: PoisonPolicy) -> Self {
        self.config.poison_policy = policy;
        self
    }

    /// Validate the graph against the collaborators and assemble the
    /// reactor.
    pub fn build(self) -> Result<Reactor<P>, ReactorError> {
        let executor = ExecutionBuilder::new(self.collaborators, self.config);
        executor.validate(&self.graph)?;
        Ok(Reactor {
            graph: Arc::new(self.graph),
            executor: Arc::new(executor),
        })
    }
}
