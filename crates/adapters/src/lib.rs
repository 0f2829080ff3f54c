// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! magpie-adapters: transport seams for the notification pipeline
//!
//! The pipeline core never talks to Telegram directly. It consumes an
//! injected [`PreparedSender`] for outbound delivery and hands an
//! [`UpdateSink`] to the injected [`UpdateSource`] for inbound updates.
//! Concrete MTProto/bot transports live outside this workspace and
//! implement these traits.

mod sender;
mod update;

pub use sender::{NoopSender, PreparedSender, SendOutcome, TracedSender};
pub use update::{UpdateSink, UpdateSource};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use sender::{FakeSender, SendCall};
#[cfg(any(test, feature = "test-support"))]
pub use update::FakeUpdateSource;
