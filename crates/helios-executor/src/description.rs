//! Read-only device property snapshot.

use helios_driver::{DeviceAttribute, DeviceDriver};
use serde::Serialize;

use crate::error::{check, Result};

/// Three-axis limit (threads within a block, blocks within a grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dim3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Aggregated device properties, queried once at executor initialization
/// and never mutated afterward.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDescription {
    pub name: String,
    /// Lower-cased to match sysfs.
    pub pci_bus_id: String,
    pub gcn_arch_name: String,
    pub isa_version: i32,
    pub core_count: i32,
    pub fpus_per_core: i32,
    pub clock_rate_ghz: f32,
    /// 2 x bus-width-bytes x memory clock (Hz).
    pub memory_bandwidth_bytes_per_sec: i64,
    pub l2_cache_size_bytes: i32,
    pub device_memory_bytes: u64,
    pub threads_per_block_limit: i32,
    pub thread_dim_limit: Dim3,
    pub block_dim_limit: Dim3,
    pub threads_per_warp: i32,
    pub threads_per_core_limit: i32,
    pub shared_memory_per_core: i32,
    pub shared_memory_per_block: i32,
    pub registers_per_block_limit: i32,
    pub registers_per_core_limit: i32,
    pub driver_version: i32,
    pub runtime_version: i32,
}

/// Single-precision units per compute unit for known architectures.
/// gfx906 carries 64; gfx908/gfx90a carry 128.
pub(crate) fn fpus_per_core(gcn_arch_name: &str) -> i32 {
    if gcn_arch_name.starts_with("gfx906") {
        64
    } else {
        128
    }
}

/// Synthesize the gfx architecture name from the reported compute
/// capability. Letter-suffixed steppings (gfx90a) are not representable
/// this way and come back as their numeric neighbor.
pub(crate) fn gcn_arch_name(major: i32, minor: i32) -> String {
    format!("gfx{major}{minor:02}")
}

/// Query one snapshot of the device properties for `ordinal`.
pub fn create_device_description(
    driver: &dyn DeviceDriver,
    ordinal: i32,
) -> Result<DeviceDescription> {
    let device = check(driver.device_get(ordinal), || {
        format!("failed to get device for ordinal {ordinal}")
    })?;

    let attr = |attribute: DeviceAttribute| {
        check(driver.device_attribute(attribute, device), || {
            format!("failed to query device attribute {attribute:?} for device {ordinal}")
        })
    };

    let name = check(driver.device_name(device), || {
        format!("failed to get device name for device {ordinal}")
    })?;
    let pci_bus_id = check(driver.pci_bus_id(device), || {
        format!("failed to query PCI bus id for device {ordinal}")
    })?
    .to_ascii_lowercase();

    let (major, minor) = check(driver.compute_capability(device), || {
        format!("failed to determine ISA version for device {ordinal}")
    })?;
    let arch = gcn_arch_name(major, minor);

    let bus_width_bits = attr(DeviceAttribute::MemoryBusWidth)?;
    let memory_clock_khz = attr(DeviceAttribute::MemoryClockRate)?;
    let memory_bandwidth_bytes_per_sec =
        2 * (bus_width_bits as i64 / 8) * (memory_clock_khz as i64 * 1000);

    let device_memory_bytes = check(driver.device_total_memory(device), || {
        format!("failed to query total memory for device {ordinal}")
    })?;

    Ok(DeviceDescription {
        fpus_per_core: fpus_per_core(&arch),
        isa_version: major * 100 + minor,
        gcn_arch_name: arch,
        name,
        pci_bus_id,
        core_count: attr(DeviceAttribute::MultiprocessorCount)?,
        clock_rate_ghz: attr(DeviceAttribute::ClockRate)? as f32 / 1e6,
        memory_bandwidth_bytes_per_sec,
        l2_cache_size_bytes: attr(DeviceAttribute::L2CacheSize)?,
        device_memory_bytes,
        threads_per_block_limit: attr(DeviceAttribute::MaxThreadsPerBlock)?,
        thread_dim_limit: Dim3 {
            x: attr(DeviceAttribute::MaxBlockDimX)?,
            y: attr(DeviceAttribute::MaxBlockDimY)?,
            z: attr(DeviceAttribute::MaxBlockDimZ)?,
        },
        block_dim_limit: Dim3 {
            x: attr(DeviceAttribute::MaxGridDimX)?,
            y: attr(DeviceAttribute::MaxGridDimY)?,
            z: attr(DeviceAttribute::MaxGridDimZ)?,
        },
        threads_per_warp: attr(DeviceAttribute::WarpSize)?,
        threads_per_core_limit: attr(DeviceAttribute::MaxThreadsPerMultiprocessor)?,
        shared_memory_per_core: attr(DeviceAttribute::SharedMemPerMultiprocessor)?,
        shared_memory_per_block: attr(DeviceAttribute::MaxSharedMemoryPerBlock)?,
        registers_per_block_limit: attr(DeviceAttribute::MaxRegistersPerBlock)?,
        // Not exposed through an attribute query; fixed across the family.
        registers_per_core_limit: 64 * 1024,
        driver_version: driver.driver_version().unwrap_or(0),
        runtime_version: driver.runtime_version().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fpus_per_core() {
        assert_eq!(fpus_per_core("gfx906"), 64);
        assert_eq!(fpus_per_core("gfx906:sramecc+:xnack-"), 64);
        assert_eq!(fpus_per_core("gfx908"), 128);
        assert_eq!(fpus_per_core("gfx90a"), 128);
    }

    #[test]
    fn test_gcn_arch_name() {
        assert_eq!(gcn_arch_name(9, 8), "gfx908");
        assert_eq!(gcn_arch_name(9, 6), "gfx906");
        assert_eq!(gcn_arch_name(10, 30), "gfx1030");
    }
}
