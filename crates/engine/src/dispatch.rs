// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Update dispatch: from typed update events to enqueued jobs.
//!
//! One dispatcher handles all four update kinds. The path per event:
//! dedup probe (cheap, in the transport's calling thread), then the rest
//! of the work is deferred through the debouncer keyed by message id so
//! rapid edits collapse into one evaluation. The debounced step gates
//! each rule by source scope, matches the normalized text, renders the
//! template, and enqueues one job per recipient.

use crate::config::NotifierKind;
use crate::debounce::Debouncer;
use crate::dedup::Deduplicator;
use crate::queue::NotificationQueue;
use magpie_adapters::{PreparedSender, UpdateSink};
use magpie_core::{Clock, CopyContent, ForwardRef, JobDraft, JobPayload, UpdateEvent};
use magpie_filter::{render, FilterEngine, TemplateVars};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace, warn};

struct DispatcherInner<S, C> {
    dedup: Arc<Deduplicator>,
    debounce: Arc<Debouncer>,
    filters: Arc<FilterEngine>,
    queue: Arc<NotificationQueue<S, C>>,
    notifier: NotifierKind,
}

/// Stateless façade over the per-message pipeline. Cheap to clone.
pub struct UpdateDispatcher<S, C> {
    inner: Arc<DispatcherInner<S, C>>,
}

impl<S, C> Clone for UpdateDispatcher<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PreparedSender, C: Clock> UpdateDispatcher<S, C> {
    pub fn new(
        dedup: Arc<Deduplicator>,
        debounce: Arc<Debouncer>,
        filters: Arc<FilterEngine>,
        queue: Arc<NotificationQueue<S, C>>,
        notifier: NotifierKind,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                dedup,
                debounce,
                filters,
                queue,
                notifier,
            }),
        }
    }

    /// Entry point for every update kind.
    pub fn handle(&self, update: UpdateEvent) {
        let message = update.message();
        let suppressed = self.inner.dedup.seen(
            message.peer.id,
            message.message_id,
            update.dedup_edit_date(),
        );
        if suppressed {
            trace!(
                kind = update.kind_name(),
                chat = message.peer.id,
                msg = message.message_id,
                "duplicate update suppressed"
            );
            return;
        }

        let key = i64::from(message.message_id);
        let inner = Arc::clone(&self.inner);
        self.inner.debounce.debounce(key, move || {
            inner.process(&update);
        });
    }
}

impl<S: PreparedSender, C: Clock> DispatcherInner<S, C> {
    fn process(&self, update: &UpdateEvent) {
        let message = update.message();
        let source = message.peer.to_string();
        let ruleset = self.filters.current();

        for rule in &ruleset.rules {
            if !rule.applies_to(message.peer.id) {
                continue;
            }

            let result = rule.matches(&message.text);
            if !result.should_notify() {
                debug!(
                    rule = %rule.name,
                    kind = ?result.kind,
                    witness = result.witness.as_deref().unwrap_or("-"),
                    "rule did not fire"
                );
                continue;
            }

            let rendered = render(
                &rule.template,
                TemplateVars {
                    rule: &rule.name,
                    source: &source,
                    text: &message.text,
                },
            );

            // Forward natively when the client delivers; fall back to a
            // copy (custom emoji dropped, UTF-16 offsets untouched) when
            // the bot does.
            let payload = match self.notifier {
                NotifierKind::Client => JobPayload::forwarded(
                    rendered,
                    ForwardRef {
                        from_peer: message.peer,
                        message_ids: vec![message.message_id],
                    },
                ),
                NotifierKind::Bot => JobPayload::copied(
                    rendered,
                    CopyContent {
                        text: message.text.clone(),
                        entities: message
                            .entities
                            .iter()
                            .filter(|entity| !entity.is_custom_emoji())
                            .cloned()
                            .collect(),
                    },
                ),
            };

            for recipient in &rule.recipients {
                let job_draft = JobDraft::new(rule.urgent, recipient.clone(), payload.clone());
                match self.queue.enqueue(job_draft) {
                    Ok(job_id) => debug!(
                        rule = %rule.name,
                        job_id,
                        peer = %recipient.peer,
                        witness = result.witness.as_deref().unwrap_or("-"),
                        "job enqueued"
                    ),
                    Err(e) => warn!(rule = %rule.name, error = %e, "dropping job"),
                }
            }
        }
    }
}

impl<S: PreparedSender, C: Clock> UpdateSink for UpdateDispatcher<S, C> {
    fn deliver(&self, update: UpdateEvent) {
        self.handle(update);
    }
}

/// Thread-safe reference cell breaking the dispatcher↔manager
/// construction cycle: the transport registers this sink before the
/// dispatcher exists, and the dispatcher is installed once the pipeline
/// is built.
#[derive(Clone, Default)]
pub struct LazyUpdateSink {
    inner: Arc<RwLock<Option<Arc<dyn UpdateSink>>>>,
}

impl LazyUpdateSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, sink: Arc<dyn UpdateSink>) {
        *self.inner.write() = Some(sink);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn is_installed(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl UpdateSink for LazyUpdateSink {
    fn deliver(&self, update: UpdateEvent) {
        let sink = self.inner.read().clone();
        match sink {
            Some(sink) => sink.deliver(update),
            None => warn!(
                kind = update.kind_name(),
                "update dropped: no handler installed yet"
            ),
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
