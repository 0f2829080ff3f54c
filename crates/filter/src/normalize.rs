// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text normalization applied before any pattern matching.

/// Normalize message text for matching: fold `ё` to `е` (both cases),
/// collapse every whitespace run to a single space, and trim.
///
/// Patterns are matched against the normalized form only, so rule
/// authors never have to spell both Cyrillic variants or worry about
/// line breaks inside a message.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        match c {
            'ё' => out.push('е'),
            'Ё' => out.push('Е'),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
