//! # helios-driver
//!
//! The vendor-driver seam for the Helios device-execution layer.
//!
//! Provides:
//! - Runtime-loaded HIP function pointers via dlopen (`hip` module), with no
//!   build-time ROCm dependency: works with any install that ships
//!   `libamdhip64.so`
//! - Integer handle newtypes that stay `Send`/`Sync` across the seam
//! - HIP status codes and classification helpers
//! - The [`DeviceDriver`] trait: the capability surface the executor
//!   consumes, implementable by the real driver or by a test double

pub mod hip;
pub mod status;
pub mod types;

pub use hip::{hip_driver, HipDriver};
pub use status::{DriverResult, DriverStatus};
pub use types::{
    DeviceAttribute, DevicePtr, FunctionAttribute, RawDevice, RawEvent, RawFunction,
    RawModule, RawStream,
};

/// The capability surface the execution layer consumes from the vendor
/// driver.
///
/// Every method maps to one driver call; no method holds locks or caches
/// anything. Errors are raw [`DriverStatus`] values; translation into the
/// executor's error taxonomy happens in the caller, where operation context
/// (addresses, sizes, names) is known.
///
/// Blocking behavior: `module_load_data`, the synchronous copies, and the
/// memsets run to completion before returning. None of them support
/// cancellation.
pub trait DeviceDriver: Send + Sync {
    // --- initialization / device selection ---------------------------------

    fn init(&self) -> DriverResult<()>;
    fn device_count(&self) -> DriverResult<i32>;
    fn device_get(&self, ordinal: i32) -> DriverResult<RawDevice>;
    /// The device currently targeted by this thread.
    fn current_device(&self) -> DriverResult<i32>;
    fn set_device(&self, ordinal: i32) -> DriverResult<()>;
    fn device_synchronize(&self) -> DriverResult<()>;

    // --- introspection ------------------------------------------------------

    fn device_name(&self, device: RawDevice) -> DriverResult<String>;
    fn pci_bus_id(&self, device: RawDevice) -> DriverResult<String>;
    fn device_attribute(&self, attr: DeviceAttribute, device: RawDevice)
        -> DriverResult<i32>;
    fn device_total_memory(&self, device: RawDevice) -> DriverResult<u64>;
    fn compute_capability(&self, device: RawDevice) -> DriverResult<(i32, i32)>;
    fn driver_version(&self) -> DriverResult<i32>;
    fn runtime_version(&self) -> DriverResult<i32>;

    // --- modules and kernels ------------------------------------------------

    fn module_load_data(&self, image: &[u8]) -> DriverResult<RawModule>;
    fn module_unload(&self, module: RawModule) -> DriverResult<()>;
    fn module_get_function(&self, module: RawModule, name: &str)
        -> DriverResult<RawFunction>;
    /// Resolve a global/constant symbol in a loaded module to its device
    /// address and size.
    fn module_get_global(
        &self,
        module: RawModule,
        name: &str,
    ) -> DriverResult<(DevicePtr, u64)>;
    fn func_attribute(
        &self,
        attr: FunctionAttribute,
        func: RawFunction,
    ) -> DriverResult<i32>;
    /// Resolve an in-process symbol address to a function handle.
    fn func_by_symbol(&self, symbol: u64) -> DriverResult<RawFunction>;

    // --- memory -------------------------------------------------------------

    fn malloc(&self, bytes: u64) -> DriverResult<DevicePtr>;
    fn free(&self, ptr: DevicePtr) -> DriverResult<()>;
    /// Portable pinned host allocation, visible to all contexts.
    fn host_malloc(&self, bytes: u64) -> DriverResult<DevicePtr>;
    fn host_free(&self, ptr: DevicePtr) -> DriverResult<()>;
    /// Managed allocation, visible to both CPU and GPU.
    fn malloc_managed(&self, bytes: u64) -> DriverResult<DevicePtr>;
    fn memset_d8(&self, dst: DevicePtr, value: u8, count: u64) -> DriverResult<()>;
    fn memset_d32(&self, dst: DevicePtr, value: u32, count: u64) -> DriverResult<()>;
    fn memcpy_htod(&self, dst: DevicePtr, src: &[u8]) -> DriverResult<()>;
    fn memcpy_dtoh(&self, dst: &mut [u8], src: DevicePtr) -> DriverResult<()>;
    /// Base address and size of the allocation containing `ptr`.
    fn mem_address_range(&self, ptr: DevicePtr) -> DriverResult<(DevicePtr, u64)>;
    /// Free and total memory in bytes on the currently targeted device.
    fn mem_get_info(&self) -> DriverResult<(u64, u64)>;
    /// Raw `hipMemoryType` value for `ptr` (see `types::MEMORY_TYPE_*`).
    fn pointer_memory_type(&self, ptr: DevicePtr) -> DriverResult<u32>;

    // --- peer access --------------------------------------------------------

    fn can_access_peer(&self, from: RawDevice, to: RawDevice) -> DriverResult<bool>;
    /// Enable access from the currently targeted device to `peer`.
    fn enable_peer_access(&self, peer: i32) -> DriverResult<()>;

    // --- streams and events -------------------------------------------------

    fn stream_create(&self, priority: Option<i32>) -> DriverResult<RawStream>;
    fn stream_destroy(&self, stream: RawStream) -> DriverResult<()>;
    fn stream_synchronize(&self, stream: RawStream) -> DriverResult<()>;
    fn event_create(&self) -> DriverResult<RawEvent>;
    fn event_destroy(&self, event: RawEvent) -> DriverResult<()>;
}
