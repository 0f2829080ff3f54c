// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Match outcomes.

use serde::{Deserialize, Serialize};

/// How a rule decided about a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The deny stage matched; terminal for this rule.
    Drop,
    /// The allow stage matched.
    AllowMatch,
    /// The allow stage did not match.
    NoMatch,
    /// The rule has no allow stage; everything not denied passes.
    PassThrough,
}

/// Result of matching one rule against one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    pub matched: bool,
    pub kind: MatchKind,
    /// Label of the node whose evaluation determined the outcome; absent
    /// for pass-through.
    pub witness: Option<String>,
}

impl FilterResult {
    /// Whether the message should produce notifications for this rule.
    pub fn should_notify(&self) -> bool {
        matches!(self.kind, MatchKind::AllowMatch | MatchKind::PassThrough)
    }
}
