// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telegram peer identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a Telegram peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerKind {
    User,
    Chat,
    Channel,
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerKind::User => write!(f, "user"),
            PeerKind::Chat => write!(f, "chat"),
            PeerKind::Channel => write!(f, "channel"),
        }
    }
}

/// A peer reference: class plus signed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRef {
    pub kind: PeerKind,
    pub id: i64,
}

impl PeerRef {
    pub fn user(id: i64) -> Self {
        Self {
            kind: PeerKind::User,
            id,
        }
    }

    pub fn chat(id: i64) -> Self {
        Self {
            kind: PeerKind::Chat,
            id,
        }
    }

    pub fn channel(id: i64) -> Self {
        Self {
            kind: PeerKind::Channel,
            id,
        }
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
