// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule loading with atomic reload.
//!
//! The active [`RuleSet`] lives behind an `Arc` swapped under a write
//! lock. Readers grab the `Arc` once per message and keep evaluating
//! against it even if a reload lands mid-flight; a failed reload leaves
//! the previous set in effect.

use crate::expr::CompileError;
use crate::rule::{Rule, RuleSpec};
use magpie_core::Recipient;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors loading the rules or recipients documents.
///
/// Fatal on initial load; on `reload()` the previous ruleset stays
/// active and the error is surfaced to the caller.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("rule {rule:?}: {source}")]
    BadExpression {
        rule: String,
        #[source]
        source: CompileError,
    },
    #[error("rule {rule:?} has neither deny nor allow")]
    NoStages { rule: String },
    #[error("rule {rule:?} has no recipients")]
    NoRecipients { rule: String },
    #[error("duplicate rule name {0:?}")]
    DuplicateRule(String),
    #[error("rule {rule:?} references unknown recipient {name:?}")]
    UnknownRecipient { rule: String, name: String },
}

/// One coherent generation of rules plus the recipients they resolve to.
#[derive(Debug, Default)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub recipients: HashMap<String, Recipient>,
}

/// The filter engine: owns the document paths and the active ruleset.
#[derive(Debug)]
pub struct FilterEngine {
    filters_path: PathBuf,
    recipients_path: PathBuf,
    active: RwLock<Arc<RuleSet>>,
}

impl FilterEngine {
    /// Initial load. Errors here are fatal at startup.
    pub fn load(
        filters_path: impl Into<PathBuf>,
        recipients_path: impl Into<PathBuf>,
    ) -> Result<Self, LoadError> {
        let filters_path = filters_path.into();
        let recipients_path = recipients_path.into();
        let ruleset = parse_documents(&filters_path, &recipients_path)?;
        tracing::info!(
            rules = ruleset.rules.len(),
            recipients = ruleset.recipients.len(),
            "loaded filter rules"
        );
        Ok(Self {
            filters_path,
            recipients_path,
            active: RwLock::new(Arc::new(ruleset)),
        })
    }

    /// Re-read both documents and swap atomically.
    ///
    /// Parse-then-swap: nothing is replaced until the new generation is
    /// fully valid, so a bad file leaves the previous rules in effect.
    pub fn reload(&self) -> Result<(), LoadError> {
        let ruleset = parse_documents(&self.filters_path, &self.recipients_path)?;
        tracing::info!(
            rules = ruleset.rules.len(),
            recipients = ruleset.recipients.len(),
            "reloaded filter rules"
        );
        *self.active.write() = Arc::new(ruleset);
        Ok(())
    }

    /// Snapshot of the active ruleset.
    pub fn current(&self) -> Arc<RuleSet> {
        Arc::clone(&self.active.read())
    }
}

#[derive(Deserialize)]
struct RulesDocument(Vec<RuleSpec>);

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| LoadError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn parse_documents(filters_path: &Path, recipients_path: &Path) -> Result<RuleSet, LoadError> {
    let recipients: HashMap<String, Recipient> = read_json(recipients_path)?;
    let RulesDocument(specs) = read_json(filters_path)?;

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(specs.len());
    for spec in specs {
        if !seen.insert(spec.name.clone()) {
            return Err(LoadError::DuplicateRule(spec.name));
        }
        rules.push(compile_rule(spec, &recipients)?);
    }

    Ok(RuleSet { rules, recipients })
}

fn compile_rule(
    spec: RuleSpec,
    recipients: &HashMap<String, Recipient>,
) -> Result<Rule, LoadError> {
    if spec.deny.is_none() && spec.allow.is_none() {
        return Err(LoadError::NoStages { rule: spec.name });
    }
    if spec.recipients.is_empty() {
        return Err(LoadError::NoRecipients { rule: spec.name });
    }

    let compile = |expr: &crate::expr::ExprSpec| {
        expr.compile().map_err(|source| LoadError::BadExpression {
            rule: spec.name.clone(),
            source,
        })
    };
    let deny = spec.deny.as_ref().map(compile).transpose()?;
    let allow = spec.allow.as_ref().map(compile).transpose()?;

    let mut resolved = Vec::with_capacity(spec.recipients.len());
    for name in &spec.recipients {
        let recipient = recipients
            .get(name)
            .ok_or_else(|| LoadError::UnknownRecipient {
                rule: spec.name.clone(),
                name: name.clone(),
            })?;
        resolved.push(recipient.clone());
    }

    Ok(Rule {
        name: spec.name,
        sources: spec.sources,
        deny,
        allow,
        recipients: resolved,
        template: spec.template,
        urgent: spec.urgent,
    })
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
