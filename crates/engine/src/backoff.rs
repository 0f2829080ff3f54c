// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry backoff for delivery attempts.

use std::time::Duration;

/// First retry delay.
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Backoff ceiling.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Jitter span around the computed delay (±10%).
const JITTER: f64 = 0.1;

/// Delay before retrying after `attempt` failed attempts (1-based):
/// 1 s doubling per attempt, capped at 60 s, with ±10% jitter so
/// synchronized retries spread out.
pub fn retry_delay(attempt: u32) -> Duration {
    use rand::Rng;

    // 2^6 already exceeds the cap; clamp the exponent so powi stays small.
    let exponent = attempt.saturating_sub(1).min(6);
    let raw = BASE_DELAY.as_secs_f64() * 2f64.powi(exponent as i32);
    let capped = raw.min(MAX_DELAY.as_secs_f64());

    let mut rng = rand::rng();
    let factor = rng.random_range(1.0 - JITTER..=1.0 + JITTER);
    Duration::from_secs_f64(capped * factor)
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
