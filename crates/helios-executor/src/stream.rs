//! Streams, events, and the live-stream table.

use std::collections::HashSet;

use parking_lot::Mutex;

use helios_driver::{RawEvent, RawStream};

/// A queue of ordered device operations.
///
/// Created through [`crate::DeviceExecutor::create_stream`], which registers
/// the handle in the executor's live-stream table; destroy it through the
/// executor so the registration pairs with removal.
#[derive(Debug)]
pub struct Stream {
    pub(crate) raw: RawStream,
    priority: Option<i32>,
}

impl Stream {
    pub(crate) fn new(raw: RawStream, priority: Option<i32>) -> Self {
        Self { raw, priority }
    }

    /// The raw stream handle, suitable for launch/copy APIs.
    pub fn raw(&self) -> RawStream {
        self.raw
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }
}

/// A synchronization marker on a stream.
#[derive(Debug)]
pub struct Event {
    pub(crate) raw: RawEvent,
}

impl Event {
    pub fn raw(&self) -> RawEvent {
        self.raw
    }
}

/// Table of live stream handles.
///
/// Guarded by its own mutex, separate from the module registry, so stream
/// churn does not contend with module loads.
#[derive(Debug, Default)]
pub(crate) struct StreamRegistry {
    live: Mutex<HashSet<RawStream>>,
}

impl StreamRegistry {
    pub fn register(&self, stream: RawStream) {
        self.live.lock().insert(stream);
    }

    /// Returns whether the handle was present.
    pub fn unregister(&self, stream: RawStream) -> bool {
        self.live.lock().remove(&stream)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_tracks_live_streams() {
        let registry = StreamRegistry::default();
        registry.register(RawStream(1));
        registry.register(RawStream(2));
        assert_eq!(registry.live_count(), 2);

        assert!(registry.unregister(RawStream(1)));
        assert!(!registry.unregister(RawStream(1)));
        assert_eq!(registry.live_count(), 1);
    }
}
