//! Device memory handles.

use helios_driver::DevicePtr;

/// Address space an allocation lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemorySpace {
    /// Device-resident memory.
    Device,
    /// Pinned host memory, visible to all contexts.
    Host,
    /// Unified/managed memory, visible to both CPU and GPU.
    Unified,
}

impl std::fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySpace::Device => write!(f, "device"),
            MemorySpace::Host => write!(f, "host"),
            MemorySpace::Unified => write!(f, "unified"),
        }
    }
}

/// An opaque device-visible allocation: address plus size.
///
/// This is a dumb handle, not an owner. Every successful allocation must be
/// paired with exactly one deallocation through its exclusive owner; the
/// executor does not defend against double-free or use-after-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceMemory {
    ptr: DevicePtr,
    size: u64,
}

impl DeviceMemory {
    pub fn new(ptr: DevicePtr, size: u64) -> Self {
        Self { ptr, size }
    }

    /// The null allocation, returned for zero-sized allocates.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Whether a memset over `[ptr, ptr+size)` can use the 4-byte-wide fill.
///
/// Requires both the destination alignment and the size to be multiples of
/// four; the observable result is identical to the byte-wide fill either way.
pub(crate) fn word_fill_applicable(ptr: DevicePtr, size: u64) -> bool {
    ptr.0 % 4 == 0 && size % 4 == 0
}
