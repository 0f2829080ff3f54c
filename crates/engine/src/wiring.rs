// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete lifecycle graph for the pipeline.
//!
//! The host application registers its collaborator nodes (peers,
//! connection, status, updates, cli) and calls
//! [`register_pipeline_nodes`] to add the pipeline's own nodes with the
//! right edges:
//!
//! - the queue starts after the connection, so an immediate catch-up
//!   drain can actually talk to the transport;
//! - the handlers start after the queue and the debouncer, and install
//!   the dispatcher into the lazy sink only once everything below them
//!   is running.

use crate::apptime;
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::dedup::Deduplicator;
use crate::dispatch::{LazyUpdateSink, UpdateDispatcher};
use crate::lifecycle::{LifecycleError, LifecycleManager, NodeSpec};
use crate::queue::NotificationQueue;
use magpie_adapters::PreparedSender;
use magpie_core::Clock;
use magpie_filter::{FilterEngine, LoadError};
use magpie_storage::{FailedStore, QueueStateFile};
use std::sync::Arc;
use std::time::Duration;

/// Node names owned by the pipeline.
pub const DEDUPLICATOR: &str = "deduplicator";
pub const DEBOUNCER: &str = "debouncer";
pub const NOTIFICATIONS_QUEUE: &str = "notifications_queue";
pub const DOMAIN_HANDLERS: &str = "domain_handlers";

/// Names of collaborator nodes the pipeline hangs off. The caller must
/// have registered them (or register them before `start_all`).
#[derive(Debug, Clone)]
pub struct CollaboratorNodes {
    /// The MTProto connection manager node.
    pub connection: String,
}

impl Default for CollaboratorNodes {
    fn default() -> Self {
        Self {
            connection: "connection_manager".to_string(),
        }
    }
}

/// Every pipeline component, built from one [`EngineConfig`].
pub struct Pipeline<S, C> {
    pub dedup: Arc<Deduplicator>,
    pub debounce: Arc<Debouncer>,
    pub filters: Arc<FilterEngine>,
    pub queue: Arc<NotificationQueue<S, C>>,
    pub dispatcher: UpdateDispatcher<S, C>,
    /// Hand this to the update source collaborator; the dispatcher is
    /// installed into it when `domain_handlers` starts.
    pub sink: LazyUpdateSink,
    shutdown_drain: Duration,
}

/// Build every pipeline component from validated configuration.
///
/// The initial filter load happens here and is fatal, matching startup
/// semantics; later `reload()` calls are non-fatal.
pub fn build_pipeline<S: PreparedSender, C: Clock>(
    config: &EngineConfig,
    sender: S,
    clock: C,
) -> Result<Pipeline<S, C>, LoadError> {
    apptime::init(config.app_timezone);

    let filters = Arc::new(FilterEngine::load(
        config.filters_path.clone(),
        config.recipients_path.clone(),
    )?);
    let dedup = Arc::new(Deduplicator::new(config.dedup_window));
    let debounce = Arc::new(Debouncer::new(config.debounce_edit));
    let queue = Arc::new(NotificationQueue::new(
        sender,
        clock,
        config.schedule.clone(),
        config.notify_timezone,
        QueueStateFile::new(config.queue_path.clone()),
        FailedStore::new(config.failed_path.clone()),
    ));
    let dispatcher = UpdateDispatcher::new(
        Arc::clone(&dedup),
        Arc::clone(&debounce),
        Arc::clone(&filters),
        Arc::clone(&queue),
        config.notifier,
    );

    Ok(Pipeline {
        dedup,
        debounce,
        filters,
        queue,
        dispatcher,
        sink: LazyUpdateSink::new(),
        shutdown_drain: config.shutdown_drain,
    })
}

impl<S: PreparedSender, C: Clock> Pipeline<S, C> {
    /// Register this pipeline's lifecycle nodes into `manager`.
    pub fn register_nodes(
        &self,
        manager: &mut LifecycleManager,
        collaborators: &CollaboratorNodes,
    ) -> Result<(), LifecycleError> {
        register_pipeline_nodes(
            manager,
            Arc::clone(&self.dedup),
            Arc::clone(&self.debounce),
            Arc::clone(&self.queue),
            self.dispatcher.clone(),
            self.sink.clone(),
            collaborators,
            self.shutdown_drain,
        )
    }
}

/// Register the pipeline's nodes into `manager`.
///
/// `shutdown_drain` bounds the queue's close-time drain.
pub fn register_pipeline_nodes<S: PreparedSender, C: Clock>(
    manager: &mut LifecycleManager,
    dedup: Arc<Deduplicator>,
    debounce: Arc<Debouncer>,
    queue: Arc<NotificationQueue<S, C>>,
    dispatcher: UpdateDispatcher<S, C>,
    sink: LazyUpdateSink,
    collaborators: &CollaboratorNodes,
    shutdown_drain: Duration,
) -> Result<(), LifecycleError> {
    {
        let start_dedup = Arc::clone(&dedup);
        manager.register(
            NodeSpec::new(DEDUPLICATOR)
                .on_start(move |ctx| async move {
                    start_dedup.start();
                    Ok(ctx)
                })
                .on_stop(move || async move {
                    dedup.stop().await;
                    Ok(())
                }),
        )?;
    }

    {
        let start_queue = Arc::clone(&queue);
        manager.register(
            NodeSpec::new(NOTIFICATIONS_QUEUE)
                .parent(collaborators.connection.clone())
                .on_start(move |ctx| async move {
                    start_queue.start()?;
                    Ok(ctx)
                })
                .on_stop(move || async move {
                    queue.close(shutdown_drain).await?;
                    Ok(())
                }),
        )?;
    }

    // Flushed debounce callbacks enqueue jobs, so the debouncer needs
    // the queue alive when it stops: it depends on the queue and is
    // therefore torn down first.
    manager.register(
        NodeSpec::new(DEBOUNCER)
            .parent(DEDUPLICATOR)
            .after(NOTIFICATIONS_QUEUE)
            .on_stop(move || async move {
                debounce.stop();
                Ok(())
            }),
    )?;

    {
        let install_sink = sink.clone();
        manager.register(
            NodeSpec::new(DOMAIN_HANDLERS)
                .parent(NOTIFICATIONS_QUEUE)
                .after(DEBOUNCER)
                .on_start(move |ctx| async move {
                    install_sink.install(Arc::new(dispatcher));
                    Ok(ctx)
                })
                .on_stop(move || async move {
                    sink.clear();
                    Ok(())
                }),
        )?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "wiring_tests.rs"]
mod tests;
