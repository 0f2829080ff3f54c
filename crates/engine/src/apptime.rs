// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide application time zone.
//!
//! Published once at startup and never re-set. Components still take
//! their zone at construction; this singleton only serves display and
//! logging code that has no construction-time injection point.

use chrono_tz::Tz;
use std::sync::OnceLock;

static APP_TZ: OnceLock<Tz> = OnceLock::new();

/// Publish the application zone. The first caller wins; returns `false`
/// when the zone was already published.
pub fn init(tz: Tz) -> bool {
    APP_TZ.set(tz).is_ok()
}

/// The published zone, or UTC before [`init`] runs.
pub fn location() -> Tz {
    APP_TZ.get().copied().unwrap_or(Tz::UTC)
}
