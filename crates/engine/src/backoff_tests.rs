// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    first = { 1, 1.0 },
    second = { 2, 2.0 },
    third = { 3, 4.0 },
    sixth = { 6, 32.0 },
    capped = { 7, 60.0 },
    deep = { 40, 60.0 },
)]
fn delay_doubles_and_caps(attempt: u32, expected_secs: f64) {
    // Sample repeatedly; jitter stays within ±10% of the nominal delay.
    for _ in 0..50 {
        let delay = retry_delay(attempt).as_secs_f64();
        assert!(
            delay >= expected_secs * 0.9 - f64::EPSILON
                && delay <= expected_secs * 1.1 + f64::EPSILON,
            "attempt {attempt}: {delay} outside ±10% of {expected_secs}"
        );
    }
}
