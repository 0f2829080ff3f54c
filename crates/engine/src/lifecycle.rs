// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component lifecycle management: a DAG of named nodes with ordered
//! startup and reverse-order teardown.
//!
//! Each node has at most one parent plus extra dependencies. Startup
//! runs in topological order; every `start_fn` receives a cancellation
//! token derived from its parent's output token, forming a hierarchy of
//! cancellations. Shutdown runs in reverse order, so a node's
//! dependencies are still alive when its `stop_fn` runs. Stop functions
//! run at most once; their errors are logged and do not abort the chain.

use futures_util::future::BoxFuture;
use std::collections::HashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Error type produced by node start/stop functions.
pub type NodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

type StartFn =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<CancellationToken, NodeError>> + Send>;
type StopFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), NodeError>> + Send>;

/// Lifecycle errors. Any of these aborts the whole startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("duplicate node name {0:?}")]
    DuplicateName(String),

    #[error("node {node:?} depends on unknown node {dependency:?}")]
    UnknownDependency { node: String, dependency: String },

    #[error("dependency cycle involving node {0:?}")]
    Cycle(String),

    #[error("node {node:?} failed to start: {source}")]
    StartFailed {
        node: String,
        #[source]
        source: NodeError,
    },
}

/// Declaration of one lifecycle node.
///
/// The default start passes its context through unchanged; the default
/// stop is a no-op.
pub struct NodeSpec {
    name: String,
    parent: Option<String>,
    after: Vec<String>,
    start: StartFn,
    stop: StopFn,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            after: Vec::new(),
            start: Box::new(|ctx| Box::pin(async move { Ok(ctx) })),
            stop: Box::new(|| Box::pin(async { Ok(()) })),
        }
    }

    /// The node whose output context seeds this node's start.
    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parent = Some(name.into());
        self
    }

    /// Extra dependency: this node starts after `name` and stops before it.
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.after.push(name.into());
        self
    }

    pub fn on_start<F, Fut>(mut self, start: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<CancellationToken, NodeError>> + Send + 'static,
    {
        self.start = Box::new(move |ctx| Box::pin(start(ctx)));
        self
    }

    pub fn on_stop<F, Fut>(mut self, stop: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), NodeError>> + Send + 'static,
    {
        self.stop = Box::new(move || Box::pin(stop()));
        self
    }
}

struct Node {
    name: String,
    parent: Option<String>,
    after: Vec<String>,
    start: Option<StartFn>,
    stop: Option<StopFn>,
    output: Option<CancellationToken>,
}

impl Node {
    fn dependencies(&self) -> impl Iterator<Item = &String> {
        self.parent.iter().chain(self.after.iter())
    }
}

/// Registry and orchestrator for the lifecycle graph.
#[derive(Default)]
pub struct LifecycleManager {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    /// Indices of started nodes, in start order.
    started: Vec<usize>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Names must be unique.
    pub fn register(&mut self, spec: NodeSpec) -> Result<(), LifecycleError> {
        if self.index.contains_key(&spec.name) {
            return Err(LifecycleError::DuplicateName(spec.name));
        }
        self.index.insert(spec.name.clone(), self.nodes.len());
        self.nodes.push(Node {
            name: spec.name,
            parent: spec.parent,
            after: spec.after,
            start: Some(spec.start),
            stop: Some(spec.stop),
            output: None,
        });
        Ok(())
    }

    /// Start every node in topological order.
    ///
    /// Unknown dependencies and cycles fail the whole startup before any
    /// node runs. If a `start_fn` fails, already-started nodes are
    /// stopped in reverse order and the error surfaces.
    pub async fn start_all(&mut self, root: CancellationToken) -> Result<(), LifecycleError> {
        let order = self.topological_order()?;

        for idx in order {
            let input = match &self.nodes[idx].parent {
                Some(parent) => {
                    // Validated by topological_order; parent started first.
                    let parent_idx = self.index[parent.as_str()];
                    match &self.nodes[parent_idx].output {
                        Some(token) => token.child_token(),
                        None => root.child_token(),
                    }
                }
                None => root.child_token(),
            };

            let name = self.nodes[idx].name.clone();
            let Some(start) = self.nodes[idx].start.take() else {
                continue; // already started
            };
            match start(input).await {
                Ok(output) => {
                    info!(node = %name, "started");
                    self.nodes[idx].output = Some(output);
                    self.started.push(idx);
                }
                Err(source) => {
                    error!(node = %name, error = %source, "start failed; unwinding");
                    self.shutdown().await;
                    return Err(LifecycleError::StartFailed { node: name, source });
                }
            }
        }

        Ok(())
    }

    /// Stop started nodes in reverse start order.
    ///
    /// Each `stop_fn` runs at most once. Errors are logged and do not
    /// abort the chain, so every node gets its chance to tear down.
    pub async fn shutdown(&mut self) {
        while let Some(idx) = self.started.pop() {
            let name = self.nodes[idx].name.clone();
            let Some(stop) = self.nodes[idx].stop.take() else {
                continue;
            };
            match stop().await {
                Ok(()) => info!(node = %name, "stopped"),
                Err(e) => warn!(node = %name, error = %e, "stop failed; continuing shutdown"),
            }
        }
    }

    /// Kahn's algorithm over parent + extra-dependency edges, stable in
    /// registration order.
    fn topological_order(&self) -> Result<Vec<usize>, LifecycleError> {
        let mut indegree = vec![0_usize; self.nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];

        for (idx, node) in self.nodes.iter().enumerate() {
            for dep in node.dependencies() {
                let Some(&dep_idx) = self.index.get(dep.as_str()) else {
                    return Err(LifecycleError::UnknownDependency {
                        node: node.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                indegree[idx] += 1;
                dependents[dep_idx].push(idx);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut ready: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| indegree[idx] == 0)
            .collect();

        while !ready.is_empty() {
            // Lowest registration index first keeps the order deterministic.
            ready.sort_unstable_by(|a, b| b.cmp(a));
            let Some(idx) = ready.pop() else { break };
            order.push(idx);
            for &dependent in &dependents[idx] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = self
                .nodes
                .iter()
                .enumerate()
                .find(|(idx, _)| indegree[*idx] > 0)
                .map(|(_, node)| node.name.clone())
                .unwrap_or_default();
            return Err(LifecycleError::Cycle(stuck));
        }

        Ok(order)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
