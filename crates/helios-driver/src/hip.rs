//! Runtime-loaded HIP driver bindings via dlopen.
//!
//! This avoids pinning to a specific ROCm version; it works with any ROCm
//! install that provides `libamdhip64.so`. Function pointers are resolved
//! once and cached process-wide.

use std::ffi::{c_char, c_int, c_uint, c_void, CString};
use std::sync::{Arc, OnceLock};

use libloading::Library;

use crate::status::{check, DriverResult, DriverStatus, HipErrorT, HIP_ERROR_NOT_SUPPORTED};
use crate::types::{
    DeviceAttribute, DevicePtr, FunctionAttribute, RawDevice, RawEvent, RawFunction,
    RawModule, RawStream,
};
use crate::DeviceDriver;

const HIP_LIBRARY: &str = "libamdhip64.so";

// hipHostMalloc: memory visible to all contexts.
const HIP_HOST_MALLOC_PORTABLE: c_uint = 0x1;
// hipMallocManaged: memory visible to both CPU and GPU.
const HIP_MEM_ATTACH_GLOBAL: c_uint = 0x1;
// hipPointerGetAttribute selector for the memory type.
const HIP_POINTER_ATTRIBUTE_MEMORY_TYPE: c_int = 2;

// Opaque pointer aliases used only inside this module.
type HipModuleT = *mut c_void;
type HipFunctionT = *mut c_void;
type HipStreamT = *mut c_void;
type HipEventT = *mut c_void;
type HipDeviceptrT = *mut c_void;

type FnHipInit = unsafe extern "C" fn(c_uint) -> HipErrorT;
type FnHipDriverGetVersion = unsafe extern "C" fn(*mut c_int) -> HipErrorT;
type FnHipRuntimeGetVersion = unsafe extern "C" fn(*mut c_int) -> HipErrorT;
type FnHipGetDeviceCount = unsafe extern "C" fn(*mut c_int) -> HipErrorT;
type FnHipDeviceGet = unsafe extern "C" fn(*mut c_int, c_int) -> HipErrorT;
type FnHipGetDevice = unsafe extern "C" fn(*mut c_int) -> HipErrorT;
type FnHipSetDevice = unsafe extern "C" fn(c_int) -> HipErrorT;
type FnHipDeviceSynchronize = unsafe extern "C" fn() -> HipErrorT;
type FnHipDeviceGetName = unsafe extern "C" fn(*mut c_char, c_int, c_int) -> HipErrorT;
type FnHipDeviceGetPCIBusId = unsafe extern "C" fn(*mut c_char, c_int, c_int) -> HipErrorT;
type FnHipDeviceGetAttribute = unsafe extern "C" fn(*mut c_int, c_int, c_int) -> HipErrorT;
type FnHipDeviceTotalMem = unsafe extern "C" fn(*mut usize, c_int) -> HipErrorT;
type FnHipDeviceComputeCapability =
    unsafe extern "C" fn(*mut c_int, *mut c_int, c_int) -> HipErrorT;
type FnHipModuleLoadData = unsafe extern "C" fn(*mut HipModuleT, *const c_void) -> HipErrorT;
type FnHipModuleUnload = unsafe extern "C" fn(HipModuleT) -> HipErrorT;
type FnHipModuleGetFunction =
    unsafe extern "C" fn(*mut HipFunctionT, HipModuleT, *const c_char) -> HipErrorT;
type FnHipModuleGetGlobal = unsafe extern "C" fn(
    *mut HipDeviceptrT,
    *mut usize,
    HipModuleT,
    *const c_char,
) -> HipErrorT;
type FnHipFuncGetAttribute =
    unsafe extern "C" fn(*mut c_int, c_int, HipFunctionT) -> HipErrorT;
type FnHipGetFuncBySymbol =
    unsafe extern "C" fn(*mut HipFunctionT, *const c_void) -> HipErrorT;
type FnHipMalloc = unsafe extern "C" fn(*mut HipDeviceptrT, usize) -> HipErrorT;
type FnHipFree = unsafe extern "C" fn(HipDeviceptrT) -> HipErrorT;
type FnHipHostMalloc =
    unsafe extern "C" fn(*mut *mut c_void, usize, c_uint) -> HipErrorT;
type FnHipHostFree = unsafe extern "C" fn(*mut c_void) -> HipErrorT;
type FnHipMallocManaged =
    unsafe extern "C" fn(*mut HipDeviceptrT, usize, c_uint) -> HipErrorT;
type FnHipMemsetD8 = unsafe extern "C" fn(HipDeviceptrT, u8, usize) -> HipErrorT;
type FnHipMemsetD32 = unsafe extern "C" fn(HipDeviceptrT, c_int, usize) -> HipErrorT;
type FnHipMemcpyHtoD =
    unsafe extern "C" fn(HipDeviceptrT, *const c_void, usize) -> HipErrorT;
type FnHipMemcpyDtoH =
    unsafe extern "C" fn(*mut c_void, HipDeviceptrT, usize) -> HipErrorT;
type FnHipMemGetAddressRange =
    unsafe extern "C" fn(*mut HipDeviceptrT, *mut usize, HipDeviceptrT) -> HipErrorT;
type FnHipMemGetInfo = unsafe extern "C" fn(*mut usize, *mut usize) -> HipErrorT;
type FnHipPointerGetAttribute =
    unsafe extern "C" fn(*mut c_void, c_int, HipDeviceptrT) -> HipErrorT;
type FnHipDeviceCanAccessPeer =
    unsafe extern "C" fn(*mut c_int, c_int, c_int) -> HipErrorT;
type FnHipDeviceEnablePeerAccess = unsafe extern "C" fn(c_int, c_uint) -> HipErrorT;
type FnHipStreamCreateWithPriority =
    unsafe extern "C" fn(*mut HipStreamT, c_uint, c_int) -> HipErrorT;
type FnHipStreamCreate = unsafe extern "C" fn(*mut HipStreamT) -> HipErrorT;
type FnHipStreamDestroy = unsafe extern "C" fn(HipStreamT) -> HipErrorT;
type FnHipStreamSynchronize = unsafe extern "C" fn(HipStreamT) -> HipErrorT;
type FnHipEventCreate = unsafe extern "C" fn(*mut HipEventT) -> HipErrorT;
type FnHipEventDestroy = unsafe extern "C" fn(HipEventT) -> HipErrorT;

struct HipApi {
    _lib: Library,
    hip_init: FnHipInit,
    hip_driver_get_version: FnHipDriverGetVersion,
    hip_runtime_get_version: FnHipRuntimeGetVersion,
    hip_get_device_count: FnHipGetDeviceCount,
    hip_device_get: FnHipDeviceGet,
    hip_get_device: FnHipGetDevice,
    hip_set_device: FnHipSetDevice,
    hip_device_synchronize: FnHipDeviceSynchronize,
    hip_device_get_name: FnHipDeviceGetName,
    hip_device_get_pci_bus_id: FnHipDeviceGetPCIBusId,
    hip_device_get_attribute: FnHipDeviceGetAttribute,
    hip_device_total_mem: FnHipDeviceTotalMem,
    hip_device_compute_capability: FnHipDeviceComputeCapability,
    hip_module_load_data: FnHipModuleLoadData,
    hip_module_unload: FnHipModuleUnload,
    hip_module_get_function: FnHipModuleGetFunction,
    hip_module_get_global: FnHipModuleGetGlobal,
    hip_func_get_attribute: FnHipFuncGetAttribute,
    // Only present in newer ROCm releases.
    hip_get_func_by_symbol: Option<FnHipGetFuncBySymbol>,
    hip_malloc: FnHipMalloc,
    hip_free: FnHipFree,
    hip_host_malloc: FnHipHostMalloc,
    hip_host_free: FnHipHostFree,
    hip_malloc_managed: FnHipMallocManaged,
    hip_memset_d8: FnHipMemsetD8,
    hip_memset_d32: FnHipMemsetD32,
    hip_memcpy_htod: FnHipMemcpyHtoD,
    hip_memcpy_dtoh: FnHipMemcpyDtoH,
    hip_mem_get_address_range: FnHipMemGetAddressRange,
    hip_mem_get_info: FnHipMemGetInfo,
    hip_pointer_get_attribute: FnHipPointerGetAttribute,
    hip_device_can_access_peer: FnHipDeviceCanAccessPeer,
    hip_device_enable_peer_access: FnHipDeviceEnablePeerAccess,
    hip_stream_create_with_priority: FnHipStreamCreateWithPriority,
    hip_stream_create: FnHipStreamCreate,
    hip_stream_destroy: FnHipStreamDestroy,
    hip_stream_synchronize: FnHipStreamSynchronize,
    hip_event_create: FnHipEventCreate,
    hip_event_destroy: FnHipEventDestroy,
}

// Safety: the loaded function pointers are process-global and the HIP
// runtime is internally synchronized.
unsafe impl Send for HipApi {}
unsafe impl Sync for HipApi {}

/// Failure to load the HIP library or resolve a required symbol.
#[derive(Debug, thiserror::Error)]
pub enum HipLoadError {
    #[error("failed to load {library}: {source}")]
    Library {
        library: &'static str,
        source: libloading::Error,
    },

    #[error("missing symbol {symbol} in {library}: {source}")]
    Symbol {
        library: &'static str,
        symbol: &'static str,
        source: libloading::Error,
    },
}

macro_rules! resolve {
    ($lib:expr, $name:literal) => {
        unsafe {
            *$lib
                .get(concat!($name, "\0").as_bytes())
                .map_err(|source| HipLoadError::Symbol {
                    library: HIP_LIBRARY,
                    symbol: $name,
                    source,
                })?
        }
    };
}

impl HipApi {
    fn try_load() -> Result<Self, HipLoadError> {
        let lib = unsafe { Library::new(HIP_LIBRARY) }.map_err(|source| {
            HipLoadError::Library {
                library: HIP_LIBRARY,
                source,
            }
        })?;
        let api = HipApi {
            hip_init: resolve!(lib, "hipInit"),
            hip_driver_get_version: resolve!(lib, "hipDriverGetVersion"),
            hip_runtime_get_version: resolve!(lib, "hipRuntimeGetVersion"),
            hip_get_device_count: resolve!(lib, "hipGetDeviceCount"),
            hip_device_get: resolve!(lib, "hipDeviceGet"),
            hip_get_device: resolve!(lib, "hipGetDevice"),
            hip_set_device: resolve!(lib, "hipSetDevice"),
            hip_device_synchronize: resolve!(lib, "hipDeviceSynchronize"),
            hip_device_get_name: resolve!(lib, "hipDeviceGetName"),
            hip_device_get_pci_bus_id: resolve!(lib, "hipDeviceGetPCIBusId"),
            hip_device_get_attribute: resolve!(lib, "hipDeviceGetAttribute"),
            hip_device_total_mem: resolve!(lib, "hipDeviceTotalMem"),
            hip_device_compute_capability: resolve!(lib, "hipDeviceComputeCapability"),
            hip_module_load_data: resolve!(lib, "hipModuleLoadData"),
            hip_module_unload: resolve!(lib, "hipModuleUnload"),
            hip_module_get_function: resolve!(lib, "hipModuleGetFunction"),
            hip_module_get_global: resolve!(lib, "hipModuleGetGlobal"),
            hip_func_get_attribute: resolve!(lib, "hipFuncGetAttribute"),
            hip_get_func_by_symbol: unsafe {
                lib.get(b"hipGetFuncBySymbol\0").ok().map(|f| *f)
            },
            hip_malloc: resolve!(lib, "hipMalloc"),
            hip_free: resolve!(lib, "hipFree"),
            hip_host_malloc: resolve!(lib, "hipHostMalloc"),
            hip_host_free: resolve!(lib, "hipHostFree"),
            hip_malloc_managed: resolve!(lib, "hipMallocManaged"),
            hip_memset_d8: resolve!(lib, "hipMemsetD8"),
            hip_memset_d32: resolve!(lib, "hipMemsetD32"),
            hip_memcpy_htod: resolve!(lib, "hipMemcpyHtoD"),
            hip_memcpy_dtoh: resolve!(lib, "hipMemcpyDtoH"),
            hip_mem_get_address_range: resolve!(lib, "hipMemGetAddressRange"),
            hip_mem_get_info: resolve!(lib, "hipMemGetInfo"),
            hip_pointer_get_attribute: resolve!(lib, "hipPointerGetAttribute"),
            hip_device_can_access_peer: resolve!(lib, "hipDeviceCanAccessPeer"),
            hip_device_enable_peer_access: resolve!(lib, "hipDeviceEnablePeerAccess"),
            hip_stream_create_with_priority: resolve!(lib, "hipStreamCreateWithPriority"),
            hip_stream_create: resolve!(lib, "hipStreamCreate"),
            hip_stream_destroy: resolve!(lib, "hipStreamDestroy"),
            hip_stream_synchronize: resolve!(lib, "hipStreamSynchronize"),
            hip_event_create: resolve!(lib, "hipEventCreate"),
            hip_event_destroy: resolve!(lib, "hipEventDestroy"),
            _lib: lib,
        };
        Ok(api)
    }
}

/// [`DeviceDriver`] backed by the dlopen'd HIP runtime.
pub struct HipDriver {
    api: HipApi,
}

static HIP_DRIVER: OnceLock<Option<Arc<HipDriver>>> = OnceLock::new();

/// Process-wide HIP driver handle. Returns `None` (and logs the cause once)
/// when `libamdhip64.so` is not present or lacks a required symbol.
pub fn hip_driver() -> Option<Arc<HipDriver>> {
    HIP_DRIVER
        .get_or_init(|| match HipApi::try_load() {
            Ok(api) => Some(Arc::new(HipDriver { api })),
            Err(err) => {
                tracing::warn!("HIP driver unavailable: {err}");
                None
            }
        })
        .clone()
}

fn to_cstring(name: &str, what: &str) -> DriverResult<CString> {
    CString::new(name).map_err(|_| {
        tracing::error!("{what} contains a null byte: {name:?}");
        DriverStatus::new(crate::status::HIP_ERROR_INVALID_VALUE)
    })
}

/// Read a fixed-size C string the driver fills in.
fn read_chars(fill: impl FnOnce(&mut [c_char]) -> HipErrorT) -> DriverResult<String> {
    const LIMIT: usize = 64;
    let mut chars = [0 as c_char; LIMIT];
    check(fill(&mut chars))?;
    chars[LIMIT - 1] = 0;
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl DeviceDriver for HipDriver {
    fn init(&self) -> DriverResult<()> {
        check(unsafe { (self.api.hip_init)(0) })
    }

    fn device_count(&self) -> DriverResult<i32> {
        let mut count: c_int = 0;
        check(unsafe { (self.api.hip_get_device_count)(&mut count) })?;
        Ok(count)
    }

    fn device_get(&self, ordinal: i32) -> DriverResult<RawDevice> {
        let mut device: c_int = -1;
        check(unsafe { (self.api.hip_device_get)(&mut device, ordinal) })?;
        Ok(device)
    }

    fn current_device(&self) -> DriverResult<i32> {
        let mut device: c_int = -1;
        check(unsafe { (self.api.hip_get_device)(&mut device) })?;
        Ok(device)
    }

    fn set_device(&self, ordinal: i32) -> DriverResult<()> {
        check(unsafe { (self.api.hip_set_device)(ordinal) })
    }

    fn device_synchronize(&self) -> DriverResult<()> {
        check(unsafe { (self.api.hip_device_synchronize)() })
    }

    fn device_name(&self, device: RawDevice) -> DriverResult<String> {
        read_chars(|chars| unsafe {
            (self.api.hip_device_get_name)(
                chars.as_mut_ptr(),
                chars.len() as c_int - 1,
                device,
            )
        })
    }

    fn pci_bus_id(&self, device: RawDevice) -> DriverResult<String> {
        read_chars(|chars| unsafe {
            (self.api.hip_device_get_pci_bus_id)(
                chars.as_mut_ptr(),
                chars.len() as c_int - 1,
                device,
            )
        })
    }

    fn device_attribute(
        &self,
        attr: DeviceAttribute,
        device: RawDevice,
    ) -> DriverResult<i32> {
        let mut value: c_int = -1;
        check(unsafe {
            (self.api.hip_device_get_attribute)(&mut value, attr as c_int, device)
        })?;
        Ok(value)
    }

    fn device_total_memory(&self, device: RawDevice) -> DriverResult<u64> {
        let mut bytes: usize = 0;
        check(unsafe { (self.api.hip_device_total_mem)(&mut bytes, device) })?;
        Ok(bytes as u64)
    }

    fn compute_capability(&self, device: RawDevice) -> DriverResult<(i32, i32)> {
        let mut major: c_int = 0;
        let mut minor: c_int = 0;
        check(unsafe {
            (self.api.hip_device_compute_capability)(&mut major, &mut minor, device)
        })?;
        Ok((major, minor))
    }

    fn driver_version(&self) -> DriverResult<i32> {
        let mut version: c_int = 0;
        check(unsafe { (self.api.hip_driver_get_version)(&mut version) })?;
        Ok(version)
    }

    fn runtime_version(&self) -> DriverResult<i32> {
        let mut version: c_int = 0;
        check(unsafe { (self.api.hip_runtime_get_version)(&mut version) })?;
        Ok(version)
    }

    fn module_load_data(&self, image: &[u8]) -> DriverResult<RawModule> {
        let mut module: HipModuleT = std::ptr::null_mut();
        check(unsafe {
            (self.api.hip_module_load_data)(&mut module, image.as_ptr() as *const c_void)
        })?;
        Ok(RawModule(module as u64))
    }

    fn module_unload(&self, module: RawModule) -> DriverResult<()> {
        check(unsafe { (self.api.hip_module_unload)(module.0 as HipModuleT) })
    }

    fn module_get_function(
        &self,
        module: RawModule,
        name: &str,
    ) -> DriverResult<RawFunction> {
        let c_name = to_cstring(name, "kernel name")?;
        let mut func: HipFunctionT = std::ptr::null_mut();
        check(unsafe {
            (self.api.hip_module_get_function)(
                &mut func,
                module.0 as HipModuleT,
                c_name.as_ptr(),
            )
        })?;
        Ok(RawFunction(func as u64))
    }

    fn module_get_global(
        &self,
        module: RawModule,
        name: &str,
    ) -> DriverResult<(DevicePtr, u64)> {
        let c_name = to_cstring(name, "symbol name")?;
        let mut dptr: HipDeviceptrT = std::ptr::null_mut();
        let mut bytes: usize = 0;
        check(unsafe {
            (self.api.hip_module_get_global)(
                &mut dptr,
                &mut bytes,
                module.0 as HipModuleT,
                c_name.as_ptr(),
            )
        })?;
        Ok((DevicePtr(dptr as u64), bytes as u64))
    }

    fn func_attribute(
        &self,
        attr: FunctionAttribute,
        func: RawFunction,
    ) -> DriverResult<i32> {
        let mut value: c_int = 0;
        check(unsafe {
            (self.api.hip_func_get_attribute)(
                &mut value,
                attr as c_int,
                func.0 as HipFunctionT,
            )
        })?;
        Ok(value)
    }

    fn func_by_symbol(&self, symbol: u64) -> DriverResult<RawFunction> {
        let Some(get_func) = self.api.hip_get_func_by_symbol else {
            return Err(DriverStatus::new(HIP_ERROR_NOT_SUPPORTED));
        };
        let mut func: HipFunctionT = std::ptr::null_mut();
        check(unsafe { get_func(&mut func, symbol as *const c_void) })?;
        Ok(RawFunction(func as u64))
    }

    fn malloc(&self, bytes: u64) -> DriverResult<DevicePtr> {
        let mut ptr: HipDeviceptrT = std::ptr::null_mut();
        check(unsafe { (self.api.hip_malloc)(&mut ptr, bytes as usize) })?;
        Ok(DevicePtr(ptr as u64))
    }

    fn free(&self, ptr: DevicePtr) -> DriverResult<()> {
        check(unsafe { (self.api.hip_free)(ptr.0 as HipDeviceptrT) })
    }

    fn host_malloc(&self, bytes: u64) -> DriverResult<DevicePtr> {
        let mut ptr: *mut c_void = std::ptr::null_mut();
        check(unsafe {
            (self.api.hip_host_malloc)(&mut ptr, bytes as usize, HIP_HOST_MALLOC_PORTABLE)
        })?;
        Ok(DevicePtr(ptr as u64))
    }

    fn host_free(&self, ptr: DevicePtr) -> DriverResult<()> {
        check(unsafe { (self.api.hip_host_free)(ptr.0 as *mut c_void) })
    }

    fn malloc_managed(&self, bytes: u64) -> DriverResult<DevicePtr> {
        let mut ptr: HipDeviceptrT = std::ptr::null_mut();
        check(unsafe {
            (self.api.hip_malloc_managed)(&mut ptr, bytes as usize, HIP_MEM_ATTACH_GLOBAL)
        })?;
        Ok(DevicePtr(ptr as u64))
    }

    fn memset_d8(&self, dst: DevicePtr, value: u8, count: u64) -> DriverResult<()> {
        check(unsafe {
            (self.api.hip_memset_d8)(dst.0 as HipDeviceptrT, value, count as usize)
        })
    }

    fn memset_d32(&self, dst: DevicePtr, value: u32, count: u64) -> DriverResult<()> {
        check(unsafe {
            (self.api.hip_memset_d32)(
                dst.0 as HipDeviceptrT,
                value as c_int,
                count as usize,
            )
        })
    }

    fn memcpy_htod(&self, dst: DevicePtr, src: &[u8]) -> DriverResult<()> {
        check(unsafe {
            (self.api.hip_memcpy_htod)(
                dst.0 as HipDeviceptrT,
                src.as_ptr() as *const c_void,
                src.len(),
            )
        })
    }

    fn memcpy_dtoh(&self, dst: &mut [u8], src: DevicePtr) -> DriverResult<()> {
        check(unsafe {
            (self.api.hip_memcpy_dtoh)(
                dst.as_mut_ptr() as *mut c_void,
                src.0 as HipDeviceptrT,
                dst.len(),
            )
        })
    }

    fn mem_address_range(&self, ptr: DevicePtr) -> DriverResult<(DevicePtr, u64)> {
        let mut base: HipDeviceptrT = std::ptr::null_mut();
        let mut size: usize = 0;
        check(unsafe {
            (self.api.hip_mem_get_address_range)(
                &mut base,
                &mut size,
                ptr.0 as HipDeviceptrT,
            )
        })?;
        Ok((DevicePtr(base as u64), size as u64))
    }

    fn mem_get_info(&self) -> DriverResult<(u64, u64)> {
        let mut free: usize = 0;
        let mut total: usize = 0;
        check(unsafe { (self.api.hip_mem_get_info)(&mut free, &mut total) })?;
        Ok((free as u64, total as u64))
    }

    fn pointer_memory_type(&self, ptr: DevicePtr) -> DriverResult<u32> {
        let mut value: c_uint = 0;
        check(unsafe {
            (self.api.hip_pointer_get_attribute)(
                &mut value as *mut c_uint as *mut c_void,
                HIP_POINTER_ATTRIBUTE_MEMORY_TYPE,
                ptr.0 as HipDeviceptrT,
            )
        })?;
        Ok(value)
    }

    fn can_access_peer(&self, from: RawDevice, to: RawDevice) -> DriverResult<bool> {
        let mut can_access: c_int = -1;
        check(unsafe {
            (self.api.hip_device_can_access_peer)(&mut can_access, from, to)
        })?;
        Ok(can_access != 0)
    }

    fn enable_peer_access(&self, peer: i32) -> DriverResult<()> {
        check(unsafe { (self.api.hip_device_enable_peer_access)(peer, 0) })
    }

    fn stream_create(&self, priority: Option<i32>) -> DriverResult<RawStream> {
        let mut stream: HipStreamT = std::ptr::null_mut();
        let res = match priority {
            Some(priority) => unsafe {
                (self.api.hip_stream_create_with_priority)(&mut stream, 0, priority)
            },
            None => unsafe { (self.api.hip_stream_create)(&mut stream) },
        };
        check(res)?;
        Ok(RawStream(stream as u64))
    }

    fn stream_destroy(&self, stream: RawStream) -> DriverResult<()> {
        check(unsafe { (self.api.hip_stream_destroy)(stream.0 as HipStreamT) })
    }

    fn stream_synchronize(&self, stream: RawStream) -> DriverResult<()> {
        check(unsafe { (self.api.hip_stream_synchronize)(stream.0 as HipStreamT) })
    }

    fn event_create(&self) -> DriverResult<RawEvent> {
        let mut event: HipEventT = std::ptr::null_mut();
        check(unsafe { (self.api.hip_event_create)(&mut event) })?;
        Ok(RawEvent(event as u64))
    }

    fn event_destroy(&self, event: RawEvent) -> DriverResult<()> {
        check(unsafe { (self.api.hip_event_destroy)(event.0 as HipEventT) })
    }
}
