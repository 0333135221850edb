//! Module identities and the refcounted module registry.
//!
//! A loaded binary is identified by the 128-bit fingerprint of its bytes,
//! a stable identity value, so the forward module registry and the reverse
//! kernel index can reference the same binary without pointer aliasing
//! between subsystems.

use std::collections::HashMap;

use helios_driver::RawModule;
use xxhash_rust::xxh3::xxh3_128;

use crate::kernel::KernelId;

/// Content-derived identity of a compiled binary blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub(crate) u128);

impl ModuleHandle {
    /// Fingerprint a binary blob into its module identity.
    pub fn from_binary(binary: &[u8]) -> Self {
        Self(xxh3_128(binary))
    }

    pub fn id(&self) -> u128 {
        self.0
    }
}

impl std::fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#034x}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct LoadedModule {
    pub raw: RawModule,
    pub refcount: u64,
}

/// Forward module registry plus the reverse kernel index.
///
/// Both maps are guarded by a single mutex in the executor; methods here
/// assume the caller holds it. Refcount changes for one identity are
/// strictly serialized by that lock.
#[derive(Debug, Default)]
pub(crate) struct ModuleRegistry {
    modules: HashMap<ModuleHandle, LoadedModule>,
    kernel_binaries: HashMap<KernelId, ModuleHandle>,
}

impl ModuleRegistry {
    /// Bump the refcount if the binary is already loaded.
    pub fn retain(&mut self, handle: ModuleHandle) -> Option<RawModule> {
        let entry = self.modules.get_mut(&handle)?;
        entry.refcount += 1;
        Some(entry.raw)
    }

    /// Record a freshly loaded module with refcount 1.
    pub fn insert(&mut self, handle: ModuleHandle, raw: RawModule) {
        let previous = self.modules.insert(
            handle,
            LoadedModule { raw, refcount: 1 },
        );
        debug_assert!(previous.is_none(), "module {handle} loaded twice");
    }

    /// Drop one reference. Yields the raw module for unloading once the
    /// count reaches zero and the entry has been removed.
    pub fn release(&mut self, handle: ModuleHandle) -> ReleaseOutcome {
        let Some(entry) = self.modules.get_mut(&handle) else {
            return ReleaseOutcome::NotLoaded;
        };
        entry.refcount -= 1;
        if entry.refcount == 0 {
            let raw = entry.raw;
            self.modules.remove(&handle);
            ReleaseOutcome::Unload(raw)
        } else {
            ReleaseOutcome::StillReferenced
        }
    }

    pub fn lookup(&self, handle: ModuleHandle) -> Option<RawModule> {
        self.modules.get(&handle).map(|m| m.raw)
    }

    pub fn iter_raw(&self) -> impl Iterator<Item = (ModuleHandle, RawModule)> + '_ {
        self.modules.iter().map(|(h, m)| (*h, m.raw))
    }

    pub fn record_kernel(&mut self, kernel: KernelId, handle: ModuleHandle) {
        self.kernel_binaries.insert(kernel, handle);
    }

    pub fn take_kernel(&mut self, kernel: KernelId) -> Option<ModuleHandle> {
        self.kernel_binaries.remove(&kernel)
    }

    pub fn live_kernels(&self) -> usize {
        self.kernel_binaries.len()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// Identity never loaded (or already fully released): a no-op.
    NotLoaded,
    /// Other references remain; nothing to unload.
    StillReferenced,
    /// Last reference dropped; caller must unload this raw module.
    Unload(RawModule),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_identity() {
        let a = ModuleHandle::from_binary(b"gcn code");
        let b = ModuleHandle::from_binary(b"gcn code");
        let c = ModuleHandle::from_binary(b"different gcn code");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_refcount_lifecycle() {
        let mut registry = ModuleRegistry::default();
        let handle = ModuleHandle::from_binary(b"blob");
        let raw = RawModule(0x10);

        assert_eq!(registry.retain(handle), None);
        registry.insert(handle, raw);
        assert_eq!(registry.retain(handle), Some(raw));

        assert_eq!(registry.release(handle), ReleaseOutcome::StillReferenced);
        assert_eq!(registry.release(handle), ReleaseOutcome::Unload(raw));
        assert_eq!(registry.release(handle), ReleaseOutcome::NotLoaded);
        assert_eq!(registry.lookup(handle), None);
    }

    #[test]
    fn test_kernel_reverse_index() {
        let mut registry = ModuleRegistry::default();
        let handle = ModuleHandle::from_binary(b"blob");
        let kernel = KernelId(7);

        registry.record_kernel(kernel, handle);
        assert_eq!(registry.live_kernels(), 1);
        assert_eq!(registry.take_kernel(kernel), Some(handle));
        assert_eq!(registry.take_kernel(kernel), None);
    }
}
