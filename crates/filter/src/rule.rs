// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filter rules.

use crate::expr::{Expr, ExprSpec};
use crate::normalize::normalize;
use crate::result::{FilterResult, MatchKind};
use magpie_core::Recipient;
use serde::{Deserialize, Serialize};

fn default_template() -> String {
    "${text}".to_string()
}

/// Raw rule as spelled in the rules document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    /// Source peer ids this rule watches; empty means every peer.
    #[serde(default)]
    pub sources: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<ExprSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<ExprSpec>,
    /// Names into the recipients document.
    pub recipients: Vec<String>,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub urgent: bool,
}

/// A compiled rule: patterns pre-built, recipients resolved.
#[derive(Debug)]
pub struct Rule {
    pub name: String,
    pub sources: Vec<i64>,
    pub deny: Option<Expr>,
    pub allow: Option<Expr>,
    pub recipients: Vec<Recipient>,
    pub template: String,
    pub urgent: bool,
}

impl Rule {
    /// Scope gate: does this rule watch the given source peer?
    pub fn applies_to(&self, peer_id: i64) -> bool {
        self.sources.is_empty() || self.sources.contains(&peer_id)
    }

    /// Match the rule against raw message text.
    ///
    /// The text is normalized first. Deny dominates: if the deny stage
    /// matches, the result is [`MatchKind::Drop`] regardless of allow.
    /// With no allow stage the rule is pass-through.
    pub fn matches(&self, text: &str) -> FilterResult {
        let normalized = normalize(text);

        if let Some(deny) = &self.deny {
            let verdict = deny.eval(&normalized);
            if verdict.value {
                return FilterResult {
                    matched: false,
                    kind: MatchKind::Drop,
                    witness: Some(verdict.witness),
                };
            }
        }

        match &self.allow {
            Some(allow) => {
                let verdict = allow.eval(&normalized);
                if verdict.value {
                    FilterResult {
                        matched: true,
                        kind: MatchKind::AllowMatch,
                        witness: Some(verdict.witness),
                    }
                } else {
                    FilterResult {
                        matched: false,
                        kind: MatchKind::NoMatch,
                        witness: Some(verdict.witness),
                    }
                }
            }
            None => FilterResult {
                matched: true,
                kind: MatchKind::PassThrough,
                witness: None,
            },
        }
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
