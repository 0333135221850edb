//! Content-addressed deduplication of uploaded read-only constants.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use xxhash_rust::xxh3::xxh3_128;

use crate::context::DeviceContext;
use crate::error::{check, ExecError, Result};
use crate::memory::DeviceMemory;

/// An owned device buffer holding one deduplicated constant.
///
/// The `Arc` wrapping this type is the sole owner lifecycle: the device
/// buffer is freed exactly when the last strong reference drops. The cache
/// only holds a `Weak` observation.
pub struct ConstantBuffer {
    context: Arc<DeviceContext>,
    memory: DeviceMemory,
}

impl ConstantBuffer {
    pub fn memory(&self) -> DeviceMemory {
        self.memory
    }
}

impl Drop for ConstantBuffer {
    fn drop(&mut self) {
        let _activation = self.context.activate();
        if let Err(status) = self.context.driver().free(self.memory.ptr()) {
            // No safe retry at teardown time; log and leak.
            tracing::error!(
                "failed to free constant buffer at {}: {status}",
                self.memory.ptr()
            );
        } else {
            tracing::debug!(
                "freed {}-byte constant at {}",
                self.memory.size(),
                self.memory.ptr()
            );
        }
    }
}

impl std::fmt::Debug for ConstantBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantBuffer")
            .field("memory", &self.memory)
            .finish()
    }
}

/// Fingerprint-keyed cache of weak references to uploaded constants.
///
/// Content equality is assumed from fingerprint equality. A 128-bit
/// collision would hand back the wrong buffer, an unrecoverable
/// consistency fault this design accepts rather than guarding against with
/// a full content comparison.
#[derive(Default)]
pub(crate) struct ConstantCache {
    entries: Mutex<HashMap<u128, Weak<ConstantBuffer>>>,
}

impl ConstantCache {
    /// Return a strong reference to a device copy of `content`, reusing a
    /// live cached allocation when one exists.
    ///
    /// The whole create-or-share sequence runs under one lock so two threads
    /// cannot race to allocate for the same fingerprint. Constants are rare
    /// and large; the contention cost is accepted.
    pub fn create_or_share(
        &self,
        context: &Arc<DeviceContext>,
        content: &[u8],
    ) -> Result<Arc<ConstantBuffer>> {
        let mut entries = self.entries.lock();
        let fingerprint = xxh3_128(content);
        let entry = entries.entry(fingerprint).or_insert_with(Weak::new);

        if let Some(shared) = entry.upgrade() {
            return Ok(shared);
        }

        // Not cached, or the weak reference expired. Allocate and copy;
        // the copy fully completes before we return.
        let driver = context.driver();
        let _activation = context.activate();
        let ptr = check(driver.malloc(content.len() as u64), || {
            format!(
                "failed to allocate {} bytes for new constant",
                content.len()
            )
        })?;

        if let Err(status) = driver.memcpy_htod(ptr, content) {
            // Release the partially-created allocation; the expired entry
            // stays behind so a future call retries.
            if let Err(free_status) = driver.free(ptr) {
                tracing::error!(
                    "failed to free constant at {ptr} after copy failure: {free_status}"
                );
            }
            return Err(ExecError::from_status(
                status,
                format!("memcpy of constant to device address {ptr} failed"),
            ));
        }

        let shared = Arc::new(ConstantBuffer {
            context: Arc::clone(context),
            memory: DeviceMemory::new(ptr, content.len() as u64),
        });
        *entry = Arc::downgrade(&shared);
        Ok(shared)
    }
}
