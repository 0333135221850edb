//! End-to-end executor tests against an in-memory fake driver.
//!
//! The fake models just enough driver behavior to exercise the executor's
//! contracts: a bump allocator with byte-addressable backing stores, a module
//! table that resolves functions and globals by searching the image bytes for
//! the requested name, and injectable failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use helios_driver::status::{
    HIP_ERROR_INVALID_VALUE, HIP_ERROR_NOT_FOUND, HIP_ERROR_OUT_OF_MEMORY,
    HIP_ERROR_PEER_ACCESS_ALREADY_ENABLED,
};
use helios_driver::{
    types, DeviceAttribute, DeviceDriver, DevicePtr, DriverResult, DriverStatus,
    FunctionAttribute, RawDevice, RawEvent, RawFunction, RawModule, RawStream,
};
use helios_executor::{
    DeviceExecutor, ExecError, KernelLoadSpec, MemorySpace,
};

// ============================================================
// Fake driver
// ============================================================

#[derive(Debug, Default)]
struct Allocation {
    bytes: Vec<u8>,
    host: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    current_device: i32,
    next_ptr: u64,
    allocations: HashMap<u64, Allocation>,
    modules: HashMap<u64, Vec<u8>>,
    next_module: u64,
    streams: Vec<u64>,
    next_stream: u64,
    enabled_peers: Vec<i32>,
    load_thread: Option<String>,
}

#[derive(Default)]
struct FakeDriver {
    state: Mutex<FakeState>,
    malloc_calls: AtomicU64,
    free_calls: AtomicU64,
    load_calls: AtomicU64,
    unload_calls: AtomicU64,
    memset8_calls: AtomicU64,
    memset32_calls: AtomicU64,
    fail_malloc: AtomicBool,
    fail_memcpy: AtomicBool,
    fail_peer_query: AtomicBool,
}

impl FakeDriver {
    fn new() -> Arc<Self> {
        let driver = Self::default();
        driver.state.lock().next_ptr = 0x1000;
        driver.state.lock().next_module = 1;
        driver.state.lock().next_stream = 1;
        Arc::new(driver)
    }

    fn live_device_allocations(&self) -> usize {
        self.state.lock().allocations.len()
    }

    fn current_device(&self) -> i32 {
        self.state.lock().current_device
    }

    fn allocate_backing(&self, bytes: u64, host: bool) -> DriverResult<DevicePtr> {
        if self.fail_malloc.load(Ordering::SeqCst) {
            return Err(DriverStatus::new(HIP_ERROR_OUT_OF_MEMORY));
        }
        let mut state = self.state.lock();
        let ptr = state.next_ptr;
        state.next_ptr += bytes.max(1).next_multiple_of(256);
        state.allocations.insert(
            ptr,
            Allocation {
                bytes: vec![0xAB; bytes as usize],
                host,
            },
        );
        Ok(DevicePtr(ptr))
    }

    fn with_backing<T>(
        &self,
        ptr: DevicePtr,
        f: impl FnOnce(u64, &mut Vec<u8>) -> DriverResult<T>,
    ) -> DriverResult<T> {
        let mut state = self.state.lock();
        let base = state
            .allocations
            .iter()
            .find(|(base, alloc)| {
                ptr.0 >= **base && ptr.0 < **base + alloc.bytes.len() as u64
            })
            .map(|(base, _)| *base);
        match base {
            Some(base) => {
                let alloc = state.allocations.get_mut(&base).unwrap();
                f(base, &mut alloc.bytes)
            }
            None => Err(DriverStatus::new(HIP_ERROR_NOT_FOUND)),
        }
    }
}

impl DeviceDriver for FakeDriver {
    fn init(&self) -> DriverResult<()> {
        Ok(())
    }

    fn device_count(&self) -> DriverResult<i32> {
        Ok(2)
    }

    fn device_get(&self, ordinal: i32) -> DriverResult<RawDevice> {
        if (0..2).contains(&ordinal) {
            Ok(ordinal)
        } else {
            Err(DriverStatus::new(HIP_ERROR_INVALID_VALUE))
        }
    }

    fn current_device(&self) -> DriverResult<i32> {
        Ok(self.state.lock().current_device)
    }

    fn set_device(&self, ordinal: i32) -> DriverResult<()> {
        self.state.lock().current_device = ordinal;
        Ok(())
    }

    fn device_synchronize(&self) -> DriverResult<()> {
        Ok(())
    }

    fn device_name(&self, _device: RawDevice) -> DriverResult<String> {
        Ok("Fake MI100".to_string())
    }

    fn pci_bus_id(&self, _device: RawDevice) -> DriverResult<String> {
        Ok("0000:0B:00.0".to_string())
    }

    fn device_attribute(
        &self,
        attr: DeviceAttribute,
        _device: RawDevice,
    ) -> DriverResult<i32> {
        Ok(match attr {
            DeviceAttribute::ClockRate => 1_502_000,
            DeviceAttribute::L2CacheSize => 8 * 1024 * 1024,
            DeviceAttribute::MaxBlockDimX => 1024,
            DeviceAttribute::MaxBlockDimY => 1024,
            DeviceAttribute::MaxBlockDimZ => 1024,
            DeviceAttribute::MaxGridDimX => i32::MAX,
            DeviceAttribute::MaxGridDimY => 65536,
            DeviceAttribute::MaxGridDimZ => 65536,
            DeviceAttribute::MaxThreadsPerBlock => 1024,
            DeviceAttribute::MaxThreadsPerMultiprocessor => 2560,
            DeviceAttribute::MemoryBusWidth => 4096,
            DeviceAttribute::MemoryClockRate => 1_200_000,
            DeviceAttribute::MultiprocessorCount => 120,
            DeviceAttribute::MaxRegistersPerBlock => 65536,
            DeviceAttribute::SharedMemPerMultiprocessor => 65536,
            DeviceAttribute::MaxSharedMemoryPerBlock => 65536,
            DeviceAttribute::WarpSize => 64,
            _ => 0,
        })
    }

    fn device_total_memory(&self, _device: RawDevice) -> DriverResult<u64> {
        Ok(32 * 1024 * 1024 * 1024)
    }

    fn compute_capability(&self, _device: RawDevice) -> DriverResult<(i32, i32)> {
        Ok((9, 8))
    }

    fn driver_version(&self) -> DriverResult<i32> {
        Ok(60032830)
    }

    fn runtime_version(&self) -> DriverResult<i32> {
        Ok(60032830)
    }

    fn module_load_data(&self, image: &[u8]) -> DriverResult<RawModule> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.load_thread = std::thread::current().name().map(str::to_string);
        let raw = state.next_module;
        state.next_module += 1;
        state.modules.insert(raw, image.to_vec());
        Ok(RawModule(raw))
    }

    fn module_unload(&self, module: RawModule) -> DriverResult<()> {
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.lock().modules.remove(&module.0) {
            Some(_) => Ok(()),
            None => Err(DriverStatus::new(HIP_ERROR_INVALID_VALUE)),
        }
    }

    fn module_get_function(
        &self,
        module: RawModule,
        name: &str,
    ) -> DriverResult<RawFunction> {
        let state = self.state.lock();
        let image = state
            .modules
            .get(&module.0)
            .ok_or(DriverStatus::new(HIP_ERROR_INVALID_VALUE))?;
        // The fake treats any image containing the name bytes as exporting
        // that kernel.
        if image
            .windows(name.len().max(1))
            .any(|w| w == name.as_bytes())
        {
            Ok(RawFunction(module.0 << 16 | name.len() as u64))
        } else {
            Err(DriverStatus::new(HIP_ERROR_NOT_FOUND))
        }
    }

    fn module_get_global(
        &self,
        module: RawModule,
        name: &str,
    ) -> DriverResult<(DevicePtr, u64)> {
        let state = self.state.lock();
        let image = state
            .modules
            .get(&module.0)
            .ok_or(DriverStatus::new(HIP_ERROR_INVALID_VALUE))?;
        if image
            .windows(name.len().max(1))
            .any(|w| w == name.as_bytes())
        {
            Ok((DevicePtr(0xDEAD_0000 + module.0 * 0x100), 64))
        } else {
            Err(DriverStatus::new(HIP_ERROR_NOT_FOUND))
        }
    }

    fn func_attribute(
        &self,
        attr: FunctionAttribute,
        _func: RawFunction,
    ) -> DriverResult<i32> {
        Ok(match attr {
            FunctionAttribute::NumRegs => 32,
            FunctionAttribute::SharedSizeBytes => 1024,
            _ => 0,
        })
    }

    fn func_by_symbol(&self, symbol: u64) -> DriverResult<RawFunction> {
        if symbol == 0 {
            Err(DriverStatus::new(HIP_ERROR_INVALID_VALUE))
        } else {
            Ok(RawFunction(symbol))
        }
    }

    fn malloc(&self, bytes: u64) -> DriverResult<DevicePtr> {
        self.malloc_calls.fetch_add(1, Ordering::SeqCst);
        self.allocate_backing(bytes, false)
    }

    fn free(&self, ptr: DevicePtr) -> DriverResult<()> {
        self.free_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.lock().allocations.remove(&ptr.0) {
            Some(_) => Ok(()),
            None => Err(DriverStatus::new(HIP_ERROR_INVALID_VALUE)),
        }
    }

    fn host_malloc(&self, bytes: u64) -> DriverResult<DevicePtr> {
        self.malloc_calls.fetch_add(1, Ordering::SeqCst);
        self.allocate_backing(bytes, true)
    }

    fn host_free(&self, ptr: DevicePtr) -> DriverResult<()> {
        self.free(ptr)
    }

    fn malloc_managed(&self, bytes: u64) -> DriverResult<DevicePtr> {
        self.malloc_calls.fetch_add(1, Ordering::SeqCst);
        self.allocate_backing(bytes, false)
    }

    fn memset_d8(&self, dst: DevicePtr, value: u8, count: u64) -> DriverResult<()> {
        self.memset8_calls.fetch_add(1, Ordering::SeqCst);
        self.with_backing(dst, |base, bytes| {
            let offset = (dst.0 - base) as usize;
            bytes[offset..offset + count as usize].fill(value);
            Ok(())
        })
    }

    fn memset_d32(&self, dst: DevicePtr, value: u32, count: u64) -> DriverResult<()> {
        self.memset32_calls.fetch_add(1, Ordering::SeqCst);
        self.with_backing(dst, |base, bytes| {
            let offset = (dst.0 - base) as usize;
            for word in bytes[offset..offset + count as usize * 4].chunks_exact_mut(4) {
                word.copy_from_slice(&value.to_le_bytes());
            }
            Ok(())
        })
    }

    fn memcpy_htod(&self, dst: DevicePtr, src: &[u8]) -> DriverResult<()> {
        if self.fail_memcpy.load(Ordering::SeqCst) {
            return Err(DriverStatus::new(HIP_ERROR_INVALID_VALUE));
        }
        self.with_backing(dst, |base, bytes| {
            let offset = (dst.0 - base) as usize;
            bytes[offset..offset + src.len()].copy_from_slice(src);
            Ok(())
        })
    }

    fn memcpy_dtoh(&self, dst: &mut [u8], src: DevicePtr) -> DriverResult<()> {
        self.with_backing(src, |base, bytes| {
            let offset = (src.0 - base) as usize;
            dst.copy_from_slice(&bytes[offset..offset + dst.len()]);
            Ok(())
        })
    }

    fn mem_address_range(&self, ptr: DevicePtr) -> DriverResult<(DevicePtr, u64)> {
        self.with_backing(ptr, |base, bytes| {
            Ok((DevicePtr(base), bytes.len() as u64))
        })
    }

    fn mem_get_info(&self) -> DriverResult<(u64, u64)> {
        let total = 32 * 1024 * 1024 * 1024u64;
        let used: u64 = self
            .state
            .lock()
            .allocations
            .values()
            .filter(|alloc| !alloc.host)
            .map(|alloc| alloc.bytes.len() as u64)
            .sum();
        Ok((total - used, total))
    }

    fn pointer_memory_type(&self, ptr: DevicePtr) -> DriverResult<u32> {
        let state = self.state.lock();
        let alloc = state
            .allocations
            .iter()
            .find(|(base, alloc)| {
                ptr.0 >= **base && ptr.0 < **base + alloc.bytes.len() as u64
            })
            .map(|(_, alloc)| alloc)
            .ok_or(DriverStatus::new(HIP_ERROR_INVALID_VALUE))?;
        Ok(if alloc.host {
            types::MEMORY_TYPE_HOST
        } else {
            types::MEMORY_TYPE_DEVICE
        })
    }

    fn can_access_peer(&self, from: RawDevice, to: RawDevice) -> DriverResult<bool> {
        if self.fail_peer_query.load(Ordering::SeqCst) {
            return Err(DriverStatus::new(HIP_ERROR_INVALID_VALUE));
        }
        Ok(from != to)
    }

    fn enable_peer_access(&self, peer: i32) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.enabled_peers.contains(&peer) {
            return Err(DriverStatus::new(HIP_ERROR_PEER_ACCESS_ALREADY_ENABLED));
        }
        state.enabled_peers.push(peer);
        Ok(())
    }

    fn stream_create(&self, _priority: Option<i32>) -> DriverResult<RawStream> {
        let mut state = self.state.lock();
        let raw = state.next_stream;
        state.next_stream += 1;
        state.streams.push(raw);
        Ok(RawStream(raw))
    }

    fn stream_destroy(&self, stream: RawStream) -> DriverResult<()> {
        let mut state = self.state.lock();
        match state.streams.iter().position(|s| *s == stream.0) {
            Some(index) => {
                state.streams.remove(index);
                Ok(())
            }
            None => Err(DriverStatus::new(HIP_ERROR_INVALID_VALUE)),
        }
    }

    fn stream_synchronize(&self, _stream: RawStream) -> DriverResult<()> {
        Ok(())
    }

    fn event_create(&self) -> DriverResult<RawEvent> {
        Ok(RawEvent(0xE0))
    }

    fn event_destroy(&self, _event: RawEvent) -> DriverResult<()> {
        Ok(())
    }
}

fn executor_with(driver: &Arc<FakeDriver>) -> DeviceExecutor {
    DeviceExecutor::new(Arc::clone(driver) as Arc<dyn DeviceDriver>, 0)
        .expect("executor creation")
}

// ============================================================
// Memory
// ============================================================

#[test]
fn test_allocate_zero_returns_null_without_driver_call() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let memory = executor.allocate(0, MemorySpace::Device).unwrap();
    assert!(memory.is_null());
    assert_eq!(driver.malloc_calls.load(Ordering::SeqCst), 0);

    // Deallocating the null handle is also a no-op.
    executor.deallocate(&memory);
    assert_eq!(driver.free_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_allocate_failure_is_resource_exhausted() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    driver.fail_malloc.store(true, Ordering::SeqCst);
    let err = executor.allocate(1 << 30, MemorySpace::Device).unwrap_err();
    assert!(matches!(err, ExecError::ResourceExhausted(_)));
    let message = format!("{err}");
    assert!(message.contains("1073741824"), "message was: {message}");
}

#[test]
fn test_memcpy_roundtrip() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    for size in 1..=16usize {
        let memory = executor.allocate(size as u64, MemorySpace::Device).unwrap();
        let pattern: Vec<u8> = (0..size as u8).map(|b| b.wrapping_mul(37)).collect();
        executor
            .synchronous_memcpy_to_device(&memory, &pattern)
            .unwrap();

        let mut readback = vec![0u8; size];
        executor
            .synchronous_memcpy_to_host(&mut readback, &memory)
            .unwrap();
        assert_eq!(readback, pattern, "size {size}");
        executor.deallocate(&memory);
    }
    assert_eq!(driver.live_device_allocations(), 0);
}

#[test]
fn test_mem_zero_picks_word_path_when_aligned() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    // Aligned base, word-multiple size: 4-byte-wide fill.
    let aligned = executor.allocate(64, MemorySpace::Device).unwrap();
    executor.synchronous_mem_zero(&aligned, 64).unwrap();
    assert_eq!(driver.memset32_calls.load(Ordering::SeqCst), 1);
    assert_eq!(driver.memset8_calls.load(Ordering::SeqCst), 0);

    // Ragged size falls back to the byte-wide fill.
    let ragged = executor.allocate(7, MemorySpace::Device).unwrap();
    executor.synchronous_mem_zero(&ragged, 7).unwrap();
    assert_eq!(driver.memset8_calls.load(Ordering::SeqCst), 1);

    // Both paths end with every byte zero.
    for memory in [&aligned, &ragged] {
        let mut contents = vec![0xFFu8; memory.size() as usize];
        executor
            .synchronous_memcpy_to_host(&mut contents, memory)
            .unwrap();
        assert!(contents.iter().all(|b| *b == 0));
    }
}

#[test]
fn test_get_memory_range_resolves_interior_pointers() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let memory = executor.allocate(256, MemorySpace::Device).unwrap();
    let interior = DevicePtr(memory.ptr().0 + 100);
    let range = executor.get_memory_range(interior).unwrap();
    assert_eq!(range.ptr(), memory.ptr());
    assert_eq!(range.size(), 256);

    let err = executor
        .get_memory_range(DevicePtr(0xBAD_F00D_0000))
        .unwrap_err();
    assert!(matches!(err, ExecError::NotFound(_)));
}

#[test]
fn test_pointer_memory_space() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let device = executor.allocate(32, MemorySpace::Device).unwrap();
    let host = executor.host_memory_allocate(32).unwrap();

    assert_eq!(
        executor.pointer_memory_space(device.ptr()).unwrap(),
        MemorySpace::Device
    );
    assert_eq!(
        executor.pointer_memory_space(host.ptr()).unwrap(),
        MemorySpace::Host
    );

    executor.deallocate(&device);
    executor.host_memory_deallocate(&host);
    assert_eq!(driver.live_device_allocations(), 0);
}

// ============================================================
// Modules and kernels
// ============================================================

#[test]
fn test_module_refcounting_loads_driver_once() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);
    let binary = b"code object exporting saxpy".as_slice();

    let first = executor.load_module(binary).unwrap();
    let second = executor.load_module(binary).unwrap();
    assert_eq!(first, second);
    assert_eq!(driver.load_calls.load(Ordering::SeqCst), 1);

    // Two references; the native unload happens only on the second release.
    assert!(executor.unload_module(first));
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 0);
    assert!(executor.unload_module(first));
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 1);

    // Fully released: further unloads report not-loaded.
    assert!(!executor.unload_module(first));
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unload_unknown_module_returns_false() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let never_loaded = helios_executor::ModuleHandle::from_binary(b"never loaded");
    assert!(!executor.unload_module(never_loaded));
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_binary_is_config_error() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let err = executor.load_module(b"").unwrap_err();
    assert!(matches!(err, ExecError::Config(_)));
    assert_eq!(driver.load_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_module_loads_run_on_worker_thread() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    executor.load_module(b"some code object").unwrap();
    let load_thread = driver.state.lock().load_thread.clone();
    assert_eq!(load_thread.as_deref(), Some("helios-driver-worker"));
}

#[test]
fn test_kernel_from_binary_shares_module_with_explicit_load() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);
    let binary = b"code object exporting saxpy".to_vec();

    let module = executor.load_module(&binary).unwrap();
    let spec = KernelLoadSpec::new("saxpy", 4).with_binary(binary);
    let kernel = executor.load_kernel(&spec).unwrap();

    // Same bytes, same module: one driver load total.
    assert_eq!(kernel.module(), Some(module));
    assert_eq!(driver.load_calls.load(Ordering::SeqCst), 1);

    let metadata = kernel.metadata().expect("module-backed kernel metadata");
    assert_eq!(metadata.registers_per_thread, 32);
    assert_eq!(metadata.shared_memory_bytes, 1024);

    // Each holder releases independently; the module unloads on the last.
    executor.unload_kernel(kernel);
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 0);
    assert!(executor.unload_module(module));
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_kernel_missing_function_rolls_back_module_reference() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let spec = KernelLoadSpec::new("missing_kernel", 0)
        .with_binary(b"image without that entry point".to_vec());
    let err = executor.load_kernel(&spec).unwrap_err();
    assert!(matches!(err, ExecError::NotFound(_)));

    // The failed load must not leave the module resident.
    assert_eq!(driver.load_calls.load(Ordering::SeqCst), 1);
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_kernel_from_in_process_symbol() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let spec = KernelLoadSpec::new("builtin_fill", 2).with_in_process_symbol(0x7F00_1234);
    let kernel = executor.load_kernel(&spec).unwrap();

    assert_eq!(kernel.function(), RawFunction(0x7F00_1234));
    assert!(kernel.metadata().is_none());
    assert!(kernel.module().is_none());
    assert_eq!(driver.load_calls.load(Ordering::SeqCst), 0);

    // No module reference to release.
    executor.unload_kernel(kernel);
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_kernel_spec_without_source_is_config_error() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let err = executor
        .load_kernel(&KernelLoadSpec::new("nowhere", 0))
        .unwrap_err();
    assert!(matches!(err, ExecError::Config(_)));
    assert!(format!("{err}").contains("nowhere"));
}

#[test]
fn test_get_symbol_scoped_and_unscoped() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let with_weights = executor.load_module(b"module holding weights").unwrap();
    let without = executor.load_module(b"module holding nothing useful").unwrap();

    // Scoped to the right module.
    let symbol = executor.get_symbol("weights", Some(with_weights)).unwrap();
    assert!(!symbol.is_null());
    assert_eq!(symbol.size(), 64);

    // Scoped to the wrong module misses.
    let err = executor.get_symbol("weights", Some(without)).unwrap_err();
    assert!(matches!(err, ExecError::NotFound(_)));

    // Unscoped lookup searches every loaded module.
    let found = executor.get_symbol("weights", None).unwrap();
    assert_eq!(found.ptr(), symbol.ptr());

    let missing = executor.get_symbol("no_such_symbol", None).unwrap_err();
    assert!(matches!(missing, ExecError::NotFound(_)));

    // A stale handle is reported as not-found, not as a driver error.
    let stale = helios_executor::ModuleHandle::from_binary(b"unloaded bytes");
    let err = executor.get_symbol("weights", Some(stale)).unwrap_err();
    assert!(matches!(err, ExecError::NotFound(_)));
}

// ============================================================
// Constants
// ============================================================

#[test]
fn test_constants_share_by_content() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let first = executor.create_or_share_constant(b"shared weights").unwrap();
    let second = executor.create_or_share_constant(b"shared weights").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(driver.malloc_calls.load(Ordering::SeqCst), 1);

    let other = executor.create_or_share_constant(b"different bytes").unwrap();
    assert_ne!(other.memory().ptr(), first.memory().ptr());

    // Upload happened: device bytes match the content.
    let mut readback = vec![0u8; first.memory().size() as usize];
    executor
        .synchronous_memcpy_to_host(&mut readback, &first.memory())
        .unwrap();
    assert_eq!(&readback, b"shared weights");

    // Freed only when the last holder drops.
    drop(first);
    assert_eq!(driver.free_calls.load(Ordering::SeqCst), 0);
    drop(second);
    assert_eq!(driver.free_calls.load(Ordering::SeqCst), 1);

    // Re-uploading after expiry allocates fresh.
    let revived = executor.create_or_share_constant(b"shared weights").unwrap();
    assert_eq!(driver.malloc_calls.load(Ordering::SeqCst), 3);
    drop(revived);
    drop(other);
}

#[test]
fn test_constant_copy_failure_frees_and_retries() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    // The upload fails after the allocation succeeds.
    driver.fail_memcpy.store(true, Ordering::SeqCst);
    let err = executor.create_or_share_constant(b"doomed upload").unwrap_err();
    assert!(matches!(err, ExecError::Internal(_)));

    // The partial allocation must not leak.
    assert_eq!(driver.live_device_allocations(), 0);
    assert_eq!(driver.free_calls.load(Ordering::SeqCst), 1);

    // The expired entry retries: the same content allocates fresh and works.
    driver.fail_memcpy.store(false, Ordering::SeqCst);
    let constant = executor.create_or_share_constant(b"doomed upload").unwrap();
    let mut readback = vec![0u8; constant.memory().size() as usize];
    executor
        .synchronous_memcpy_to_host(&mut readback, &constant.memory())
        .unwrap();
    assert_eq!(&readback, b"doomed upload");
}

// ============================================================
// Peer access
// ============================================================

#[test]
fn test_peer_access_to_self_is_trivially_available() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    assert!(executor.can_enable_peer_access_to(&executor));
    executor.enable_peer_access_to(&executor).unwrap();
    assert!(driver.state.lock().enabled_peers.is_empty());
}

#[test]
fn test_peer_access_between_devices() {
    let driver = FakeDriver::new();
    let executor0 = executor_with(&driver);
    let executor1 =
        DeviceExecutor::new(Arc::clone(&driver) as Arc<dyn DeviceDriver>, 1).unwrap();

    assert!(executor0.can_enable_peer_access_to(&executor1));
    executor0.enable_peer_access_to(&executor1).unwrap();
    // Enabling twice is success, not an error.
    executor0.enable_peer_access_to(&executor1).unwrap();
    assert_eq!(driver.state.lock().enabled_peers, vec![1]);
}

#[test]
fn test_peer_query_failure_reports_unavailable() {
    let driver = FakeDriver::new();
    let executor0 = executor_with(&driver);
    let executor1 =
        DeviceExecutor::new(Arc::clone(&driver) as Arc<dyn DeviceDriver>, 1).unwrap();

    driver.fail_peer_query.store(true, Ordering::SeqCst);
    assert!(!executor0.can_enable_peer_access_to(&executor1));
    // Same-device answer does not consult the driver.
    assert!(executor0.can_enable_peer_access_to(&executor0));
}

// ============================================================
// Streams, activation, description
// ============================================================

#[test]
fn test_stream_lifecycle_tracks_live_streams() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let a = executor.create_stream(None).unwrap();
    let b = executor.create_stream(Some(-1)).unwrap();
    assert_eq!(executor.live_streams(), 2);
    assert_eq!(b.priority(), Some(-1));

    executor.synchronize_stream(&a).unwrap();

    executor.destroy_stream(a);
    assert_eq!(executor.live_streams(), 1);
    executor.destroy_stream(b);
    assert_eq!(executor.live_streams(), 0);
    assert!(driver.state.lock().streams.is_empty());
}

#[test]
fn test_activation_restores_previous_device() {
    let driver = FakeDriver::new();
    let executor1 =
        DeviceExecutor::new(Arc::clone(&driver) as Arc<dyn DeviceDriver>, 1).unwrap();

    driver.set_device(0).unwrap();
    let memory = executor1.allocate(16, MemorySpace::Device).unwrap();
    // The operation ran on device 1 but the thread's selection is restored.
    assert_eq!(driver.current_device(), 0);
    executor1.deallocate(&memory);
    assert_eq!(driver.current_device(), 0);
}

#[test]
fn test_device_description_snapshot() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);
    let description = executor.device_description();

    assert_eq!(description.name, "Fake MI100");
    assert_eq!(description.pci_bus_id, "0000:0b:00.0");
    assert_eq!(description.gcn_arch_name, "gfx908");
    assert_eq!(description.isa_version, 908);
    assert_eq!(description.core_count, 120);
    assert_eq!(description.fpus_per_core, 128);
    assert_eq!(description.threads_per_warp, 64);
    assert!((description.clock_rate_ghz - 1.502).abs() < 1e-6);
    // 2 x 512 bytes x 1.2 GHz.
    assert_eq!(description.memory_bandwidth_bytes_per_sec, 1_228_800_000_000);
    assert_eq!(description.registers_per_core_limit, 64 * 1024);
    assert_eq!(description.device_memory_bytes, 32 * 1024 * 1024 * 1024);

    let json = serde_json::to_value(description).unwrap();
    assert_eq!(json["name"], "Fake MI100");
    assert_eq!(json["thread_dim_limit"]["x"], 1024);
}

#[test]
fn test_memory_usage_tracks_device_allocations() {
    let driver = FakeDriver::new();
    let executor = executor_with(&driver);

    let (free_before, total) = executor.memory_usage().unwrap();
    assert_eq!(free_before, total);

    let memory = executor.allocate(1 << 20, MemorySpace::Device).unwrap();
    let (free_after, total_after) = executor.memory_usage().unwrap();
    assert_eq!(total_after, total);
    assert_eq!(free_after, total - (1 << 20));

    executor.deallocate(&memory);
    let (free_final, _) = executor.memory_usage().unwrap();
    assert_eq!(free_final, total);
}

#[test]
fn test_executor_drop_unloads_leftover_modules() {
    let driver = FakeDriver::new();
    {
        let executor = executor_with(&driver);
        executor.load_module(b"leaked on purpose").unwrap();
    }
    assert_eq!(driver.unload_calls.load(Ordering::SeqCst), 1);
    assert!(driver.state.lock().modules.is_empty());
}
