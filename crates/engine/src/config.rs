// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Parsing, validation and defaulting belong to the host application;
//! the engine receives already-validated values.

use chrono_tz::Tz;
use magpie_core::Schedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which transport delivers notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    /// The userbot client itself; jobs carry a native forward reference.
    Client,
    /// A separate bot; jobs carry a copy payload.
    Bot,
}

/// Validated configuration handed to the engine by the host application.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Passed through to the transport's flood-control middleware.
    pub throttle_rps: u32,
    pub dedup_window: Duration,
    pub debounce_edit: Duration,
    pub notifier: NotifierKind,
    /// Regular-drain slots in `notify_timezone`.
    pub schedule: Schedule,
    pub notify_timezone: Tz,
    pub app_timezone: Tz,
    pub queue_path: PathBuf,
    pub failed_path: PathBuf,
    pub filters_path: PathBuf,
    pub recipients_path: PathBuf,
    /// Peer allowed to drive the admin surface collaborator.
    pub admin_id: i64,
    /// Bound on the close-time drain of the notification queue.
    pub shutdown_drain: Duration,
}
