// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    yo_lower = { "ёлка", "елка" },
    yo_upper = { "Ёж и ёж", "Еж и еж" },
    collapse_spaces = { "a   b\t\tc", "a b c" },
    collapse_newlines = { "first\n\nsecond", "first second" },
    trims = { "  padded  ", "padded" },
    empty = { "", "" },
    whitespace_only = { " \n\t ", "" },
    already_clean = { "nothing to do", "nothing to do" },
)]
fn normalizes(input: &str, expected: &str) {
    assert_eq!(normalize(input), expected);
}

#[test]
fn mixed_folding_and_collapsing() {
    assert_eq!(normalize("  Ёлка   в\nлесу ё  "), "Елка в лесу е");
}
