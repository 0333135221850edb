//! Raw driver handle types shared between the HIP bindings and the
//! `DeviceDriver` seam.
//!
//! All handles are plain integers rather than pointers so they stay `Send`
//! and `Sync`, can key hash maps, and can be fabricated by test drivers.
//! The HIP implementation converts to and from its `*mut c_void` handles at
//! the FFI boundary.

/// A device-visible address. Depending on how it was allocated it may point
/// into device, host-pinned, or unified/managed address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DevicePtr(pub u64);

impl DevicePtr {
    /// The null address, returned for zero-sized allocations.
    pub const NULL: DevicePtr = DevicePtr(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A device handle as returned by `hipDeviceGet` (an ordinal-like integer).
pub type RawDevice = i32;

/// A loaded module handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawModule(pub u64);

/// A resolved kernel function handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawFunction(pub u64);

/// A stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawStream(pub u64);

/// An event handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawEvent(pub u64);

/// Device attribute selectors.
///
/// Discriminants match `hipDeviceAttribute_t` (ROCm 5+ numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DeviceAttribute {
    ClockRate = 5,
    L2CacheSize = 19,
    ComputeCapabilityMajor = 23,
    MaxBlockDimX = 26,
    MaxBlockDimY = 27,
    MaxBlockDimZ = 28,
    MaxGridDimX = 29,
    MaxGridDimY = 30,
    MaxGridDimZ = 31,
    MaxThreadsPerBlock = 56,
    MaxThreadsPerMultiprocessor = 57,
    MemoryBusWidth = 59,
    MemoryClockRate = 60,
    ComputeCapabilityMinor = 61,
    MultiprocessorCount = 63,
    MaxRegistersPerBlock = 71,
    MaxSharedMemoryPerBlock = 74,
    SharedMemPerMultiprocessor = 76,
    WarpSize = 87,
}

/// Kernel function attribute selectors.
///
/// Discriminants match `hipFunction_attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FunctionAttribute {
    MaxThreadsPerBlock = 0,
    SharedSizeBytes = 1,
    ConstSizeBytes = 2,
    LocalSizeBytes = 3,
    NumRegs = 4,
}

/// Memory-type values reported by the pointer-attribute query
/// (`hipMemoryType`).
pub const MEMORY_TYPE_HOST: u32 = 0;
pub const MEMORY_TYPE_DEVICE: u32 = 1;
pub const MEMORY_TYPE_UNIFIED: u32 = 3;
pub const MEMORY_TYPE_MANAGED: u32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_device_ptr() {
        assert!(DevicePtr::NULL.is_null());
        assert!(DevicePtr(0).is_null());
        assert!(!DevicePtr(0xdead_beef).is_null());
    }

    #[test]
    fn test_device_ptr_display() {
        assert_eq!(format!("{}", DevicePtr(0x10)), "0x10");
    }
}
