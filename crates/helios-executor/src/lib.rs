//! # helios-executor
//!
//! Per-device execution layer: mediates between graph-runtime callers and
//! the vendor GPU driver behind [`DeviceExecutor`].
//!
//! Responsibilities:
//! - Scoped device activation around every driver call
//! - Refcounted module cache keyed by binary content identity
//! - Kernel resolution from embedded binaries or in-process symbols
//! - Synchronous memory operations (allocate, copy, zero-fill)
//! - Content-addressed sharing of uploaded constants
//! - Peer-access setup and a read-only device description snapshot
//!
//! ```no_run
//! use helios_executor::{DeviceExecutor, MemorySpace};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = helios_driver::hip_driver().ok_or("HIP runtime not available")?;
//! let executor = DeviceExecutor::new(driver, 0)?;
//! let buffer = executor.allocate(1 << 20, MemorySpace::Device)?;
//! executor.synchronous_mem_zero(&buffer, buffer.size())?;
//! executor.deallocate(&buffer);
//! # Ok(())
//! # }
//! ```

mod constant;
mod context;
mod description;
mod error;
mod executor;
mod kernel;
mod memory;
mod module;
mod stream;
mod worker;

pub use constant::ConstantBuffer;
pub use context::{DeviceContext, ScopedActivation};
pub use description::{create_device_description, DeviceDescription, Dim3};
pub use error::{ExecError, Result};
pub use executor::DeviceExecutor;
pub use kernel::{ArgumentPacking, Kernel, KernelId, KernelLoadSpec, KernelMetadata};
pub use memory::{DeviceMemory, MemorySpace};
pub use module::ModuleHandle;
pub use stream::{Event, Stream};
