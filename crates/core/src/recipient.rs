// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery recipients.

use crate::peer::PeerRef;
use crate::schedule::Schedule;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A delivery target: a peer plus optional personal timezone and
/// schedule overriding the application-wide ones.
///
/// Immutable once loaded; the whole set is replaced on rule reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub peer: PeerRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<Tz>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

impl Recipient {
    pub fn new(peer: PeerRef) -> Self {
        Self {
            peer,
            timezone: None,
            schedule: None,
        }
    }
}
