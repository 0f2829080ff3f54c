// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and fixtures for tests in downstream crates.
#![allow(clippy::unwrap_used)]

use crate::clock::FakeClock;
use crate::job::{Job, JobDraft, JobPayload};
use crate::peer::PeerRef;
use crate::recipient::Recipient;
use chrono::{DateTime, TimeZone, Utc};

/// A fixed, readable instant for deterministic tests.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap()
}

/// Fake clock frozen at [`epoch`].
pub fn fake_clock() -> FakeClock {
    FakeClock::at(epoch())
}

/// A user recipient with no personal timezone or schedule.
pub fn recipient(id: i64) -> Recipient {
    Recipient::new(PeerRef::user(id))
}

/// A text-only draft addressed to [`recipient`]`(id)`.
pub fn draft(id: i64, urgent: bool, text: &str) -> JobDraft {
    JobDraft::new(urgent, recipient(id), JobPayload::text_only(text))
}

/// A fully-populated job, timestamps pinned to [`epoch`].
pub fn job(id: i64, text: &str) -> Job {
    Job {
        id,
        created_at: epoch(),
        scheduled_at: epoch(),
        urgent: false,
        recipient: recipient(1),
        payload: JobPayload::text_only(text),
    }
}
