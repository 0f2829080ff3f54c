// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Update subscription seam.

use magpie_core::UpdateEvent;
use std::sync::Arc;

/// Consumer of typed update events.
///
/// Implementations must not block beyond cheap in-memory work; the
/// transport calls [`deliver`](UpdateSink::deliver) from its own update
/// loop.
pub trait UpdateSink: Send + Sync + 'static {
    fn deliver(&self, update: UpdateEvent);
}

/// Registration interface exposed by the transport collaborator.
///
/// The pipeline registers one sink at startup; the transport then feeds
/// every new/edited message event through it.
pub trait UpdateSource {
    fn register(&self, sink: Arc<dyn UpdateSink>);
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeUpdateSource;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{UpdateSink, UpdateSource};
    use magpie_core::UpdateEvent;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake update source: tests push events by hand.
    #[derive(Default)]
    pub struct FakeUpdateSource {
        sink: Mutex<Option<Arc<dyn UpdateSink>>>,
    }

    impl FakeUpdateSource {
        pub fn new() -> Self {
            Self::default()
        }

        /// Deliver an event to the registered sink, if any.
        /// Returns whether a sink was installed.
        pub fn push(&self, update: UpdateEvent) -> bool {
            let sink = self.sink.lock().clone();
            match sink {
                Some(sink) => {
                    sink.deliver(update);
                    true
                }
                None => false,
            }
        }
    }

    impl UpdateSource for FakeUpdateSource {
        fn register(&self, sink: Arc<dyn UpdateSink>) {
            *self.sink.lock() = Some(sink);
        }
    }
}
