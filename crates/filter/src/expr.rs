// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filter expression trees.
//!
//! [`ExprSpec`] is the raw tree as spelled in the rules document;
//! [`Expr`] is the compiled form with every leaf pattern pre-built.
//! Compilation is the only place a pattern can fail, so evaluation is
//! infallible and allocation-free apart from the witness label.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw expression tree as spelled in the rules document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExprSpec {
    And { children: Vec<ExprSpec> },
    Or { children: Vec<ExprSpec> },
    Not { child: Box<ExprSpec> },
    AtLeast { n: usize, children: Vec<ExprSpec> },
    Keyword { pattern: String },
    Regex { pattern: String },
}

/// Errors compiling one expression tree. The owning rule name is
/// attached by the loader.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
    #[error("at_least count {n} out of range: must be in 1..={arity}")]
    AtLeastOutOfRange { n: usize, arity: usize },
    #[error("{op} requires at least one child")]
    EmptyChildren { op: &'static str },
}

/// Outcome of evaluating a compiled expression: the boolean value plus a
/// label of the node at which the decision crystallized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub value: bool,
    pub witness: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeafKind {
    Keyword,
    Regex,
}

/// A compiled pattern leaf. Construction only happens through
/// [`ExprSpec::compile`], so a leaf always holds a valid matcher.
#[derive(Debug)]
pub struct Leaf {
    kind: LeafKind,
    pattern: String,
    matcher: Regex,
}

impl Leaf {
    fn label(&self) -> String {
        match self.kind {
            LeafKind::Keyword => format!("keyword({:?})", self.pattern),
            LeafKind::Regex => format!("regex({:?})", self.pattern),
        }
    }
}

/// A compiled expression tree.
#[derive(Debug)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    AtLeast { n: usize, children: Vec<Expr> },
    Leaf(Leaf),
}

impl ExprSpec {
    /// Compile the tree, pre-building every leaf pattern.
    ///
    /// Keyword leaves become case-insensitive substring patterns over the
    /// normalized text; regex leaves are taken verbatim (anchored only if
    /// written so). Structural invariants checked here: non-empty child
    /// lists and `at_least` counts in `1..=arity`.
    pub fn compile(&self) -> Result<Expr, CompileError> {
        match self {
            ExprSpec::And { children } => {
                Ok(Expr::And(compile_children("and", children)?))
            }
            ExprSpec::Or { children } => Ok(Expr::Or(compile_children("or", children)?)),
            ExprSpec::Not { child } => Ok(Expr::Not(Box::new(child.compile()?))),
            ExprSpec::AtLeast { n, children } => {
                let compiled = compile_children("at_least", children)?;
                if *n == 0 || *n > compiled.len() {
                    return Err(CompileError::AtLeastOutOfRange {
                        n: *n,
                        arity: compiled.len(),
                    });
                }
                Ok(Expr::AtLeast {
                    n: *n,
                    children: compiled,
                })
            }
            ExprSpec::Keyword { pattern } => {
                let escaped = format!("(?i){}", regex::escape(pattern));
                let matcher = Regex::new(&escaped).map_err(|e| CompileError::InvalidRegex {
                    pattern: pattern.clone(),
                    source: Box::new(e),
                })?;
                Ok(Expr::Leaf(Leaf {
                    kind: LeafKind::Keyword,
                    pattern: pattern.clone(),
                    matcher,
                }))
            }
            ExprSpec::Regex { pattern } => {
                let matcher = Regex::new(pattern).map_err(|e| CompileError::InvalidRegex {
                    pattern: pattern.clone(),
                    source: Box::new(e),
                })?;
                Ok(Expr::Leaf(Leaf {
                    kind: LeafKind::Regex,
                    pattern: pattern.clone(),
                    matcher,
                }))
            }
        }
    }
}

fn compile_children(op: &'static str, children: &[ExprSpec]) -> Result<Vec<Expr>, CompileError> {
    if children.is_empty() {
        return Err(CompileError::EmptyChildren { op });
    }
    children.iter().map(ExprSpec::compile).collect()
}

impl Expr {
    /// Evaluate against already-normalized text.
    ///
    /// Short-circuit semantics: `and` stops at the first false child,
    /// `or` at the first true one, `at_least` once the count is reached.
    /// The witness is the child that decided the outcome, or the
    /// operator's own label when the decision is structural (all `and`
    /// children true, all `or` children false, `at_least` falling short,
    /// any `not`).
    pub fn eval(&self, text: &str) -> Verdict {
        match self {
            Expr::And(children) => {
                for child in children {
                    let v = child.eval(text);
                    if !v.value {
                        return Verdict {
                            value: false,
                            witness: v.witness,
                        };
                    }
                }
                Verdict {
                    value: true,
                    witness: "and".to_string(),
                }
            }
            Expr::Or(children) => {
                for child in children {
                    let v = child.eval(text);
                    if v.value {
                        return Verdict {
                            value: true,
                            witness: v.witness,
                        };
                    }
                }
                Verdict {
                    value: false,
                    witness: "or".to_string(),
                }
            }
            Expr::Not(child) => {
                let v = child.eval(text);
                Verdict {
                    value: !v.value,
                    witness: format!("not({})", v.witness),
                }
            }
            Expr::AtLeast { n, children } => {
                let mut count = 0;
                for child in children {
                    let v = child.eval(text);
                    if v.value {
                        count += 1;
                        if count >= *n {
                            return Verdict {
                                value: true,
                                witness: v.witness,
                            };
                        }
                    }
                }
                Verdict {
                    value: false,
                    witness: format!("at_least({n})"),
                }
            }
            Expr::Leaf(leaf) => Verdict {
                value: leaf.matcher.is_match(text),
                witness: leaf.label(),
            },
        }
    }
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;
