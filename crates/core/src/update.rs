// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed update events from the subscription collaborator.

use crate::entity::MessageEntity;
use crate::peer::PeerRef;
use serde::{Deserialize, Serialize};

/// Payload common to all four update kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdate {
    pub peer: PeerRef,
    pub message_id: i32,
    /// Unix time of the edit; absent for the first version of a message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,
    pub text: String,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

/// One update, tagged by kind. A single dispatch function branches on the
/// variant instead of an interface per event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    NewDirectMessage(MessageUpdate),
    NewChannelMessage(MessageUpdate),
    EditDirectMessage(MessageUpdate),
    EditChannelMessage(MessageUpdate),
}

impl UpdateEvent {
    pub fn message(&self) -> &MessageUpdate {
        match self {
            UpdateEvent::NewDirectMessage(m)
            | UpdateEvent::NewChannelMessage(m)
            | UpdateEvent::EditDirectMessage(m)
            | UpdateEvent::EditChannelMessage(m) => m,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            UpdateEvent::EditDirectMessage(_) | UpdateEvent::EditChannelMessage(_)
        )
    }

    /// Stable name for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            UpdateEvent::NewDirectMessage(_) => "new_direct_message",
            UpdateEvent::NewChannelMessage(_) => "new_channel_message",
            UpdateEvent::EditDirectMessage(_) => "edit_direct_message",
            UpdateEvent::EditChannelMessage(_) => "edit_channel_message",
        }
    }

    /// Edit date participating in the dedup key. Zero marks the first
    /// version of a message; each edit carries a fresh value.
    pub fn dedup_edit_date(&self) -> i64 {
        self.message().edit_date.unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
