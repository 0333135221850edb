//! The per-device executor: composes context activation, the module and
//! constant caches, the memory manager, and stream/peer bookkeeping behind
//! one API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use helios_driver::{
    types, DeviceDriver, DevicePtr, FunctionAttribute, RawFunction, RawModule,
};

use crate::constant::{ConstantBuffer, ConstantCache};
use crate::context::DeviceContext;
use crate::description::{create_device_description, DeviceDescription};
use crate::error::{check, ExecError, Result};
use crate::kernel::{Kernel, KernelId, KernelLoadSpec, KernelMetadata, KernelSource};
use crate::memory::{word_fill_applicable, DeviceMemory, MemorySpace};
use crate::module::{ModuleHandle, ModuleRegistry, ReleaseOutcome};
use crate::stream::{Event, Stream, StreamRegistry};
use crate::worker::DriverWorker;

/// Uniform per-device API over the vendor driver.
///
/// Multiple caller threads may invoke operations concurrently. The module
/// registry (with its reverse kernel index), the constant cache, and the
/// live-stream table are guarded by separate locks so orthogonal subsystems
/// do not contend.
pub struct DeviceExecutor {
    driver: Arc<dyn DeviceDriver>,
    context: Arc<DeviceContext>,
    description: DeviceDescription,
    modules: Mutex<ModuleRegistry>,
    constants: ConstantCache,
    streams: StreamRegistry,
    next_kernel_id: AtomicU64,
}

impl DeviceExecutor {
    /// Create the executor for one device ordinal, taking the device
    /// description snapshot.
    pub fn new(driver: Arc<dyn DeviceDriver>, ordinal: i32) -> Result<Self> {
        let context = Arc::new(DeviceContext::new(Arc::clone(&driver), ordinal)?);
        let description = create_device_description(driver.as_ref(), ordinal)?;
        Ok(Self {
            driver,
            context,
            description,
            modules: Mutex::new(ModuleRegistry::default()),
            constants: ConstantCache::default(),
            streams: StreamRegistry::default(),
            next_kernel_id: AtomicU64::new(1),
        })
    }

    pub fn ordinal(&self) -> i32 {
        self.context.ordinal()
    }

    /// The read-only property snapshot taken at initialization.
    pub fn device_description(&self) -> &DeviceDescription {
        &self.description
    }

    /// Block until all pending work on this device completes.
    pub fn synchronize(&self) -> Result<()> {
        self.context.synchronize()
    }

    // --- modules and kernels ------------------------------------------------

    /// Load a compiled binary as a module, or bump the reference count when
    /// the same bytes are already loaded. The underlying driver load happens
    /// at most once per binary identity.
    pub fn load_module(&self, binary: &[u8]) -> Result<ModuleHandle> {
        if binary.is_empty() {
            return Err(ExecError::Config(
                "no device binary provided".to_string(),
            ));
        }
        let handle = ModuleHandle::from_binary(binary);
        let mut registry = self.modules.lock();
        self.load_binary_locked(&mut registry, handle, binary)?;
        Ok(handle)
    }

    /// Drop one reference to a loaded module, unloading it from the driver
    /// when the count reaches zero. Returns `false` (never an error) for an
    /// identity that was never loaded.
    pub fn unload_module(&self, handle: ModuleHandle) -> bool {
        let mut registry = self.modules.lock();
        self.release_binary_locked(&mut registry, handle)
    }

    /// Resolve a kernel from either an embedded binary or an in-process
    /// symbol, depending on which source the load spec carries.
    pub fn load_kernel(&self, spec: &KernelLoadSpec) -> Result<Kernel> {
        let id = KernelId(self.next_kernel_id.fetch_add(1, Ordering::Relaxed));
        match &spec.source {
            Some(KernelSource::Binary(image)) => self.load_kernel_from_binary(id, spec, image),
            Some(KernelSource::InProcessSymbol(symbol)) => {
                tracing::debug!(
                    "resolving kernel '{}' from in-process symbol {symbol:#x}",
                    spec.name()
                );
                let function = check(self.driver.func_by_symbol(*symbol), || {
                    format!(
                        "failed to resolve kernel '{}' from symbol {symbol:#x}",
                        spec.name()
                    )
                })?;
                // The runtime resolved the symbol itself: no module load, no
                // refcount participation, and no attribute metadata.
                Ok(Kernel::new(id, function, spec, None, None))
            }
            None => Err(ExecError::Config(format!(
                "kernel load spec for '{}' provides neither a binary nor an in-process symbol",
                spec.name()
            ))),
        }
    }

    /// Release a kernel. Module-backed kernels drop one reference on their
    /// source binary; in-process kernels are a no-op.
    pub fn unload_kernel(&self, kernel: Kernel) {
        tracing::debug!("unloading kernel '{}'", kernel.name());
        let mut registry = self.modules.lock();
        match registry.take_kernel(kernel.id) {
            Some(handle) => {
                self.release_binary_locked(&mut registry, handle);
            }
            None => {
                tracing::debug!(
                    "kernel '{}' has no module to release",
                    kernel.name()
                );
            }
        }
    }

    /// Resolve a global/constant symbol to its device address and size.
    ///
    /// With a module handle the lookup is confined to that module; without
    /// one, every loaded module is tried in turn.
    pub fn get_symbol(
        &self,
        symbol_name: &str,
        module: Option<ModuleHandle>,
    ) -> Result<DeviceMemory> {
        let registry = self.modules.lock();
        if let Some(handle) = module {
            let raw = registry.lookup(handle).ok_or_else(|| {
                ExecError::NotFound(format!(
                    "module {handle} is not loaded (symbol '{symbol_name}')"
                ))
            })?;
            let _activation = self.context.activate();
            let (ptr, bytes) = check(
                self.driver.module_get_global(raw, symbol_name),
                || format!("failed to get symbol '{symbol_name}'"),
            )?;
            return Ok(DeviceMemory::new(ptr, bytes));
        }

        let _activation = self.context.activate();
        for (_, raw) in registry.iter_raw() {
            match self.driver.module_get_global(raw, symbol_name) {
                Ok((ptr, bytes)) => return Ok(DeviceMemory::new(ptr, bytes)),
                Err(status) if status.is_not_found() => continue,
                Err(status) => {
                    return Err(ExecError::from_status(
                        status,
                        format!("failed to get symbol '{symbol_name}'"),
                    ))
                }
            }
        }
        Err(ExecError::NotFound(format!(
            "symbol '{symbol_name}' not found in any loaded module"
        )))
    }

    // --- memory --------------------------------------------------------------

    /// Allocate `size` bytes in the given address space. Zero-sized requests
    /// return the null handle without touching the driver; driver
    /// out-of-memory surfaces as `ResourceExhausted`.
    pub fn allocate(&self, size: u64, space: MemorySpace) -> Result<DeviceMemory> {
        if size == 0 {
            return Ok(DeviceMemory::null());
        }
        let _activation = self.context.activate();
        let result = match space {
            MemorySpace::Device => self.driver.malloc(size),
            MemorySpace::Host => self.driver.host_malloc(size),
            MemorySpace::Unified => self.driver.malloc_managed(size),
        };
        let ptr = check(result, || {
            format!(
                "failed to allocate {size} bytes in {space} space on device {}",
                self.ordinal()
            )
        })?;
        tracing::debug!(
            "allocated {ptr} for device {} of {size} bytes ({space})",
            self.ordinal()
        );
        Ok(DeviceMemory::new(ptr, size))
    }

    /// Free a device allocation. Must pair exactly once with the allocate
    /// that produced it; there is no double-free protection.
    pub fn deallocate(&self, memory: &DeviceMemory) {
        if memory.is_null() {
            return;
        }
        let _activation = self.context.activate();
        if let Err(status) = self.driver.free(memory.ptr()) {
            tracing::error!(
                "failed to free device memory at {}: {status}",
                memory.ptr()
            );
        } else {
            tracing::debug!("deallocated {} for device {}", memory.ptr(), self.ordinal());
        }
    }

    /// Allocate pinned host memory, visible to all contexts.
    pub fn host_memory_allocate(&self, size: u64) -> Result<DeviceMemory> {
        self.allocate(size, MemorySpace::Host)
    }

    pub fn host_memory_deallocate(&self, memory: &DeviceMemory) {
        if memory.is_null() {
            return;
        }
        let _activation = self.context.activate();
        if let Err(status) = self.driver.host_free(memory.ptr()) {
            tracing::error!(
                "error deallocating host memory at {}: {status}",
                memory.ptr()
            );
        }
    }

    /// Allocate managed memory, visible to both CPU and GPU.
    pub fn unified_memory_allocate(&self, size: u64) -> Result<DeviceMemory> {
        self.allocate(size, MemorySpace::Unified)
    }

    pub fn unified_memory_deallocate(&self, memory: &DeviceMemory) {
        if memory.is_null() {
            return;
        }
        let _activation = self.context.activate();
        if let Err(status) = self.driver.free(memory.ptr()) {
            tracing::error!(
                "failed to free unified memory at {}: {status}",
                memory.ptr()
            );
        }
    }

    /// Zero `size` bytes at `location`. Uses a 4-byte-wide fill when both
    /// the destination alignment and the size allow it; the observable
    /// result is identical either way.
    pub fn synchronous_mem_zero(&self, location: &DeviceMemory, size: u64) -> Result<()> {
        let _activation = self.context.activate();
        let ptr = location.ptr();
        let result = if word_fill_applicable(ptr, size) {
            self.driver.memset_d32(ptr, 0, size / 4)
        } else {
            self.driver.memset_d8(ptr, 0, size)
        };
        check(result, || {
            format!("failed to memset {size} bytes at {ptr}")
        })
    }

    /// Copy host bytes into a device allocation, blocking until the copy
    /// completes.
    pub fn synchronous_memcpy_to_device(
        &self,
        dst: &DeviceMemory,
        src: &[u8],
    ) -> Result<()> {
        let _activation = self.context.activate();
        check(self.driver.memcpy_htod(dst.ptr(), src), || {
            format!(
                "failed to synchronous memcpy host to device: dst {}; size {}",
                dst.ptr(),
                src.len()
            )
        })?;
        tracing::debug!("sync memcpy'd h2d of {} bytes", src.len());
        Ok(())
    }

    /// Copy device bytes back to host, blocking until the copy completes.
    pub fn synchronous_memcpy_to_host(
        &self,
        dst: &mut [u8],
        src: &DeviceMemory,
    ) -> Result<()> {
        let _activation = self.context.activate();
        let size = dst.len();
        check(self.driver.memcpy_dtoh(dst, src.ptr()), || {
            format!(
                "failed to synchronous memcpy device to host: src {}; size {size}",
                src.ptr()
            )
        })?;
        tracing::debug!("sync memcpy'd d2h of {size} bytes");
        Ok(())
    }

    /// Base address and size of the allocation containing `ptr`.
    ///
    /// Distinguishes "this pointer is unknown to the driver" (`NotFound`)
    /// from an internal failure while performing the query.
    pub fn get_memory_range(&self, ptr: DevicePtr) -> Result<DeviceMemory> {
        match self.driver.mem_address_range(ptr) {
            Ok((base, size)) => Ok(DeviceMemory::new(base, size)),
            Err(status) if status.is_not_found() => Err(ExecError::NotFound(format!(
                "not a device pointer {ptr}: {status}"
            ))),
            Err(status) => Err(ExecError::Internal(format!(
                "failed to get address range for device pointer {ptr}: {status}"
            ))),
        }
    }

    /// Free and total device memory in bytes.
    pub fn memory_usage(&self) -> Result<(u64, u64)> {
        let _activation = self.context.activate();
        check(self.driver.mem_get_info(), || {
            format!("failed to query memory usage for device {}", self.ordinal())
        })
    }

    /// Which address space a pointer belongs to, per the driver.
    pub fn pointer_memory_space(&self, ptr: DevicePtr) -> Result<MemorySpace> {
        let value = check(self.driver.pointer_memory_type(ptr), || {
            format!("failed to query memory space for pointer {ptr}")
        })?;
        match value {
            types::MEMORY_TYPE_DEVICE => Ok(MemorySpace::Device),
            types::MEMORY_TYPE_HOST => Ok(MemorySpace::Host),
            types::MEMORY_TYPE_UNIFIED | types::MEMORY_TYPE_MANAGED => {
                Ok(MemorySpace::Unified)
            }
            other => Err(ExecError::Internal(format!(
                "unknown memory space provided by driver: {other}"
            ))),
        }
    }

    // --- constants ------------------------------------------------------------

    /// Return a device copy of `content`, shared with any other caller that
    /// uploaded identical bytes. The buffer is freed when the last returned
    /// reference drops.
    pub fn create_or_share_constant(&self, content: &[u8]) -> Result<Arc<ConstantBuffer>> {
        self.constants.create_or_share(&self.context, content)
    }

    // --- peer access ------------------------------------------------------------

    /// Whether this device can directly access `other`'s memory. Trivially
    /// true for the same device; `false` (never an error) when the driver
    /// query fails.
    pub fn can_enable_peer_access_to(&self, other: &DeviceExecutor) -> bool {
        if self.ordinal() == other.ordinal() {
            // A context can always access its own memory.
            return true;
        }
        match self
            .driver
            .can_access_peer(self.context.device(), other.context.device())
        {
            Ok(can_access) => can_access,
            Err(status) => {
                tracing::error!(
                    "failed to detect peer access capability from {} to {}: {status}",
                    self.ordinal(),
                    other.ordinal()
                );
                false
            }
        }
    }

    /// Enable direct access from this device to `other`'s memory.
    /// Already-enabled is success; same-device is a no-op.
    pub fn enable_peer_access_to(&self, other: &DeviceExecutor) -> Result<()> {
        if self.ordinal() == other.ordinal() {
            return Ok(());
        }
        let _activation = self.context.activate();
        match self.driver.enable_peer_access(other.ordinal()) {
            Ok(()) => Ok(()),
            Err(status) if status.is_peer_access_already_enabled() => Ok(()),
            Err(status) => Err(ExecError::Internal(format!(
                "failed to enable peer access from {} to {}: {status}",
                self.ordinal(),
                other.ordinal()
            ))),
        }
    }

    // --- streams and events ------------------------------------------------------

    /// Create a stream and register it in the live-stream table.
    pub fn create_stream(&self, priority: Option<i32>) -> Result<Stream> {
        let _activation = self.context.activate();
        let raw = check(self.driver.stream_create(priority), || {
            format!("failed to create stream on device {}", self.ordinal())
        })?;
        self.streams.register(raw);
        Ok(Stream::new(raw, priority))
    }

    /// Destroy a stream, removing it from the live-stream table.
    pub fn destroy_stream(&self, stream: Stream) {
        self.streams.unregister(stream.raw);
        let _activation = self.context.activate();
        if let Err(status) = self.driver.stream_destroy(stream.raw) {
            tracing::error!("failed to destroy stream {:?}: {status}", stream.raw);
        }
    }

    /// Block the calling thread until all work queued on `stream` completes.
    pub fn synchronize_stream(&self, stream: &Stream) -> Result<()> {
        check(self.driver.stream_synchronize(stream.raw), || {
            format!("failed to synchronize stream {:?}", stream.raw)
        })
    }

    /// Number of streams currently registered as live.
    pub fn live_streams(&self) -> usize {
        self.streams.live_count()
    }

    pub fn create_event(&self) -> Result<Event> {
        let _activation = self.context.activate();
        let raw = check(self.driver.event_create(), || {
            format!("failed to create event on device {}", self.ordinal())
        })?;
        Ok(Event { raw })
    }

    pub fn destroy_event(&self, event: Event) {
        let _activation = self.context.activate();
        if let Err(status) = self.driver.event_destroy(event.raw) {
            tracing::error!("failed to destroy event {:?}: {status}", event.raw);
        }
    }

    // --- internals ------------------------------------------------------------

    fn load_kernel_from_binary(
        &self,
        id: KernelId,
        spec: &KernelLoadSpec,
        image: &Arc<[u8]>,
    ) -> Result<Kernel> {
        let handle = ModuleHandle::from_binary(image);
        let raw_module = {
            let mut registry = self.modules.lock();
            let raw = self.load_binary_locked(&mut registry, handle, image)?;
            registry.record_kernel(id, handle);
            raw
        };

        let resolved = self.resolve_function(spec.name(), raw_module).and_then(
            |function| {
                let metadata = self.kernel_metadata(function)?;
                Ok((function, metadata))
            },
        );
        let (function, metadata) = match resolved {
            Ok(pair) => pair,
            Err(err) => {
                // Roll back the reference this kernel took on its binary.
                let mut registry = self.modules.lock();
                if let Some(handle) = registry.take_kernel(id) {
                    self.release_binary_locked(&mut registry, handle);
                }
                return Err(err);
            }
        };
        Ok(Kernel::new(id, function, spec, Some(metadata), Some(handle)))
    }

    fn resolve_function(&self, name: &str, module: RawModule) -> Result<RawFunction> {
        tracing::debug!("getting function '{name}' from module {module:?}");
        let _activation = self.context.activate();
        check(self.driver.module_get_function(module, name), || {
            format!("failed to get kernel '{name}'")
        })
    }

    fn kernel_metadata(&self, function: RawFunction) -> Result<KernelMetadata> {
        let _activation = self.context.activate();
        let registers_per_thread = check(
            self.driver
                .func_attribute(FunctionAttribute::NumRegs, function),
            || "failed to query kernel register count".to_string(),
        )?;
        let shared_memory_bytes = check(
            self.driver
                .func_attribute(FunctionAttribute::SharedSizeBytes, function),
            || "failed to query kernel shared memory size".to_string(),
        )?;
        Ok(KernelMetadata {
            registers_per_thread,
            shared_memory_bytes,
        })
    }

    /// Load (or retain) a binary while holding the registry lock. The lock
    /// is deliberately held across the worker load so two threads cannot
    /// race to load the same identity.
    fn load_binary_locked(
        &self,
        registry: &mut ModuleRegistry,
        handle: ModuleHandle,
        binary: &[u8],
    ) -> Result<RawModule> {
        if let Some(raw) = registry.retain(handle) {
            tracing::debug!("binary {handle} is already loaded as module {raw:?}");
            return Ok(raw);
        }

        // Driver module loaders may need deep stacks; run the load on the
        // dedicated worker and block on its completion.
        let driver = Arc::clone(&self.driver);
        let context = Arc::clone(&self.context);
        let image: Arc<[u8]> = Arc::from(binary);
        let size = image.len();
        let result = DriverWorker::global().run(move || {
            let _activation = context.activate();
            driver.module_load_data(&image)
        });
        let raw = check(result, || {
            format!("failed to load {size}-byte module {handle}")
        })?;
        registry.insert(handle, raw);
        tracing::debug!("loaded binary {handle} as module {raw:?}");
        Ok(raw)
    }

    /// Decrement-and-maybe-unload while holding the registry lock.
    fn release_binary_locked(
        &self,
        registry: &mut ModuleRegistry,
        handle: ModuleHandle,
    ) -> bool {
        match registry.release(handle) {
            ReleaseOutcome::NotLoaded => {
                tracing::debug!("no loaded module for binary {handle}");
                false
            }
            ReleaseOutcome::StillReferenced => true,
            ReleaseOutcome::Unload(raw) => {
                tracing::debug!("unloading module {raw:?} for binary {handle}");
                self.unload_raw_module(raw);
                true
            }
        }
    }

    fn unload_raw_module(&self, raw: RawModule) {
        let _activation = self.context.activate();
        if let Err(status) = self.driver.module_unload(raw) {
            // No safe retry; leak the native module.
            tracing::error!("failed to unload module {raw:?}; leaking: {status}");
        }
    }
}

impl Drop for DeviceExecutor {
    fn drop(&mut self) {
        let registry = self.modules.lock();
        if registry.live_kernels() > 0 {
            tracing::warn!(
                "executor for device {} dropped with {} live kernels",
                self.ordinal(),
                registry.live_kernels()
            );
        }
        for (handle, raw) in registry.iter_raw() {
            tracing::debug!("unloading leftover module {raw:?} for binary {handle}");
            self.unload_raw_module(raw);
        }
    }
}

impl std::fmt::Debug for DeviceExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceExecutor")
            .field("ordinal", &self.ordinal())
            .field("device", &self.description.name)
            .finish()
    }
}
