// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery jobs and payloads.

use crate::entity::MessageEntity;
use crate::peer::PeerRef;
use crate::recipient::Recipient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source reference for a native forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRef {
    pub from_peer: PeerRef,
    pub message_ids: Vec<i32>,
}

/// Re-sendable copy of a message, used when native forwarding is
/// unavailable (bot transport). Entity offsets are UTF-16 code units
/// carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyContent {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

/// What a job delivers: the rendered notification text plus either a
/// native forward reference or a copy fallback, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<ForwardRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<CopyContent>,
}

impl JobPayload {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            forward: None,
            copy: None,
        }
    }

    pub fn forwarded(text: impl Into<String>, forward: ForwardRef) -> Self {
        Self {
            text: text.into(),
            forward: Some(forward),
            copy: None,
        }
    }

    pub fn copied(text: impl Into<String>, copy: CopyContent) -> Self {
        Self {
            text: text.into(),
            forward: None,
            copy: Some(copy),
        }
    }
}

/// A single addressed delivery attempt toward one recipient.
///
/// `id` is unique and monotone across the process lifetime; it seeds the
/// idempotency token for every send attempt of this job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub urgent: bool,
    pub recipient: Recipient,
    pub payload: JobPayload,
}

/// An enqueue request, before the queue assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct JobDraft {
    pub urgent: bool,
    pub recipient: Recipient,
    pub payload: JobPayload,
}

impl JobDraft {
    pub fn new(urgent: bool, recipient: Recipient, payload: JobPayload) -> Self {
        Self {
            urgent,
            recipient,
            payload,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
