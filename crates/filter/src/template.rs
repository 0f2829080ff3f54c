// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template rendering for rule notifications.

use regex::Regex;
use std::sync::LazyLock;

/// Regex pattern for ${variable_name}
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("constant regex pattern is valid")
});

/// Variables available to a rule template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub rule: &'a str,
    pub source: &'a str,
    pub text: &'a str,
}

/// Interpolate `${rule}`, `${source}` and `${text}` placeholders.
///
/// Unknown placeholders are left as-is so a typo is visible in the
/// delivered notification instead of silently vanishing.
pub fn render(template: &str, vars: TemplateVars<'_>) -> String {
    VAR_PATTERN
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match &caps[1] {
                "rule" => vars.rule.to_string(),
                "source" => vars.source.to_string(),
                "text" => vars.text.to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
