//! Device context and scoped activation.
//!
//! All module, memory, and stream operations that touch the driver run
//! "activated" against a context: the driver's current-device selection must
//! point at this context's ordinal for the duration of the call.

use std::sync::Arc;

use helios_driver::{DeviceDriver, RawDevice};

use crate::error::{check, Result};

/// Owns the native device handle for one device ordinal.
///
/// Exactly one context exists per logical device ordinal, logically owned by
/// its [`crate::DeviceExecutor`]. It is shared internally via `Arc` only so
/// constant buffers can activate it from their destructors; the executor
/// remains the lifecycle owner.
pub struct DeviceContext {
    driver: Arc<dyn DeviceDriver>,
    ordinal: i32,
    device: RawDevice,
}

impl DeviceContext {
    pub fn new(driver: Arc<dyn DeviceDriver>, ordinal: i32) -> Result<Self> {
        check(driver.init(), || "failed to initialize driver".to_string())?;
        let device = check(driver.device_get(ordinal), || {
            format!("failed to get device for ordinal {ordinal}")
        })?;
        Ok(Self {
            driver,
            ordinal,
            device,
        })
    }

    pub fn ordinal(&self) -> i32 {
        self.ordinal
    }

    pub fn device(&self) -> RawDevice {
        self.device
    }

    pub(crate) fn driver(&self) -> &Arc<dyn DeviceDriver> {
        &self.driver
    }

    /// Make this context current for the calling thread.
    ///
    /// The returned token restores the previous selection when dropped, on
    /// every exit path.
    ///
    /// # Panics
    ///
    /// Activating a valid context is a precondition of all driver-touching
    /// operations, not a recoverable error; a driver failure here panics.
    pub fn activate(&self) -> ScopedActivation<'_> {
        let previous = self
            .driver
            .current_device()
            .unwrap_or_else(|status| {
                panic!("failed to query current device: {status}")
            });
        if previous != self.ordinal {
            self.driver.set_device(self.ordinal).unwrap_or_else(|status| {
                panic!("failed to activate device {}: {status}", self.ordinal)
            });
        }
        ScopedActivation {
            driver: self.driver.as_ref(),
            previous,
            ordinal: self.ordinal,
        }
    }

    /// Block until all pending work on this device completes.
    pub fn synchronize(&self) -> Result<()> {
        let _activation = self.activate();
        check(self.driver.device_synchronize(), || {
            format!("failed to synchronize device {}", self.ordinal)
        })
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("ordinal", &self.ordinal)
            .field("device", &self.device)
            .finish()
    }
}

/// Activation token. While held, driver operations on this thread target the
/// owning context's device.
pub struct ScopedActivation<'a> {
    driver: &'a dyn DeviceDriver,
    previous: i32,
    ordinal: i32,
}

impl Drop for ScopedActivation<'_> {
    fn drop(&mut self) {
        if self.previous != self.ordinal {
            // Restoration is best-effort: a failure here leaves the wrong
            // device current, which the next activation corrects.
            if let Err(status) = self.driver.set_device(self.previous) {
                tracing::error!(
                    "failed to restore device {} after deactivating {}: {status}",
                    self.previous,
                    self.ordinal
                );
            }
        }
    }
}
