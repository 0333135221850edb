//! Kernel load specs and resolved kernel handles.

use std::sync::Arc;

use helios_driver::RawFunction;

use crate::module::ModuleHandle;

/// How kernel arguments are laid out when launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentPacking {
    /// One pointer per argument, in declaration order.
    #[default]
    Individual,
    /// Arguments pre-packed into a single buffer by the caller.
    Packed,
}

/// Where a kernel's code comes from. The two modes are mutually exclusive.
#[derive(Debug, Clone)]
pub(crate) enum KernelSource {
    /// A compiled binary blob containing the kernel (loaded as a module).
    Binary(Arc<[u8]>),
    /// An address of a kernel symbol already present in the process.
    InProcessSymbol(u64),
}

/// Specification for loading one kernel.
#[derive(Debug, Clone)]
pub struct KernelLoadSpec {
    name: String,
    arity: usize,
    args_packing: ArgumentPacking,
    pub(crate) source: Option<KernelSource>,
}

impl KernelLoadSpec {
    /// Start a spec for the named kernel. The arity is trusted as given;
    /// the driver offers no way to reflect on expected argument counts.
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
            args_packing: ArgumentPacking::default(),
            source: None,
        }
    }

    /// Source the kernel from a compiled binary blob.
    pub fn with_binary(mut self, binary: impl Into<Arc<[u8]>>) -> Self {
        self.source = Some(KernelSource::Binary(binary.into()));
        self
    }

    /// Source the kernel from an in-process symbol address.
    pub fn with_in_process_symbol(mut self, symbol: u64) -> Self {
        self.source = Some(KernelSource::InProcessSymbol(symbol));
        self
    }

    pub fn with_args_packing(mut self, packing: ArgumentPacking) -> Self {
        self.args_packing = packing;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn args_packing(&self) -> ArgumentPacking {
        self.args_packing
    }
}

/// Stable identity of a loaded kernel, used by the reverse
/// kernel-to-binary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(pub(crate) u64);

/// Attributes read back from a resolved kernel function.
///
/// Only available for module-sourced kernels; the driver cannot report
/// attributes for in-process symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelMetadata {
    pub registers_per_thread: i32,
    pub shared_memory_bytes: i32,
}

/// A resolved kernel: an executable function handle plus metadata.
///
/// Owned by the caller. Pass it back to
/// [`crate::DeviceExecutor::unload_kernel`] when done; module-sourced
/// kernels hold a reference count on their module.
#[derive(Debug)]
pub struct Kernel {
    pub(crate) id: KernelId,
    function: RawFunction,
    name: String,
    arity: usize,
    args_packing: ArgumentPacking,
    metadata: Option<KernelMetadata>,
    module: Option<ModuleHandle>,
}

impl Kernel {
    pub(crate) fn new(
        id: KernelId,
        function: RawFunction,
        spec: &KernelLoadSpec,
        metadata: Option<KernelMetadata>,
        module: Option<ModuleHandle>,
    ) -> Self {
        Self {
            id,
            function,
            name: spec.name.clone(),
            arity: spec.arity,
            args_packing: spec.args_packing,
            metadata,
            module,
        }
    }

    pub fn id(&self) -> KernelId {
        self.id
    }

    /// The raw function handle, suitable for launch APIs.
    pub fn function(&self) -> RawFunction {
        self.function
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn args_packing(&self) -> ArgumentPacking {
        self.args_packing
    }

    /// `None` for in-process-symbol kernels.
    pub fn metadata(&self) -> Option<&KernelMetadata> {
        self.metadata.as_ref()
    }

    /// The module this kernel was resolved from, if any.
    pub fn module(&self) -> Option<ModuleHandle> {
        self.module
    }
}
