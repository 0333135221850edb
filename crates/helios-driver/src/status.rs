//! HIP status codes and the error value returned across the driver seam.

use std::ffi::c_int;

pub type HipErrorT = c_int;

pub const HIP_SUCCESS: HipErrorT = 0;
pub const HIP_ERROR_INVALID_VALUE: HipErrorT = 1;
pub const HIP_ERROR_OUT_OF_MEMORY: HipErrorT = 2;
pub const HIP_ERROR_NOT_INITIALIZED: HipErrorT = 3;
pub const HIP_ERROR_NO_DEVICE: HipErrorT = 100;
pub const HIP_ERROR_INVALID_DEVICE: HipErrorT = 101;
pub const HIP_ERROR_INVALID_IMAGE: HipErrorT = 200;
pub const HIP_ERROR_INVALID_CONTEXT: HipErrorT = 201;
pub const HIP_ERROR_SHARED_OBJECT_SYMBOL_NOT_FOUND: HipErrorT = 302;
pub const HIP_ERROR_SHARED_OBJECT_INIT_FAILED: HipErrorT = 303;
pub const HIP_ERROR_NOT_FOUND: HipErrorT = 500;
pub const HIP_ERROR_NOT_READY: HipErrorT = 600;
pub const HIP_ERROR_PEER_ACCESS_ALREADY_ENABLED: HipErrorT = 704;
pub const HIP_ERROR_PEER_ACCESS_NOT_ENABLED: HipErrorT = 705;
pub const HIP_ERROR_NOT_SUPPORTED: HipErrorT = 801;

/// A non-success driver status.
///
/// Carries the raw numeric code so callers can classify it (out-of-memory,
/// not-found, already-enabled) without the driver layer deciding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverStatus {
    pub code: HipErrorT,
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code)
    }
}

impl std::error::Error for DriverStatus {}

impl DriverStatus {
    pub fn new(code: HipErrorT) -> Self {
        Self { code }
    }

    /// The driver reported an allocation failure.
    pub fn is_out_of_memory(&self) -> bool {
        self.code == HIP_ERROR_OUT_OF_MEMORY
    }

    /// The driver could not find the queried pointer/symbol/function.
    pub fn is_not_found(&self) -> bool {
        self.code == HIP_ERROR_NOT_FOUND
            || self.code == HIP_ERROR_SHARED_OBJECT_SYMBOL_NOT_FOUND
    }

    /// Peer access was requested but is already enabled (treated as success).
    pub fn is_peer_access_already_enabled(&self) -> bool {
        self.code == HIP_ERROR_PEER_ACCESS_ALREADY_ENABLED
    }

    /// Human-readable name of the status code.
    pub fn name(&self) -> &'static str {
        match self.code {
            HIP_SUCCESS => "hipSuccess",
            HIP_ERROR_INVALID_VALUE => "hipErrorInvalidValue",
            HIP_ERROR_OUT_OF_MEMORY => "hipErrorOutOfMemory",
            HIP_ERROR_NOT_INITIALIZED => "hipErrorNotInitialized",
            HIP_ERROR_NO_DEVICE => "hipErrorNoDevice",
            HIP_ERROR_INVALID_DEVICE => "hipErrorInvalidDevice",
            HIP_ERROR_INVALID_IMAGE => "hipErrorInvalidImage",
            HIP_ERROR_INVALID_CONTEXT => "hipErrorInvalidContext",
            HIP_ERROR_SHARED_OBJECT_SYMBOL_NOT_FOUND => {
                "hipErrorSharedObjectSymbolNotFound"
            }
            HIP_ERROR_SHARED_OBJECT_INIT_FAILED => "hipErrorSharedObjectInitFailed",
            HIP_ERROR_NOT_FOUND => "hipErrorNotFound",
            HIP_ERROR_NOT_READY => "hipErrorNotReady",
            HIP_ERROR_PEER_ACCESS_ALREADY_ENABLED => "hipErrorPeerAccessAlreadyEnabled",
            HIP_ERROR_PEER_ACCESS_NOT_ENABLED => "hipErrorPeerAccessNotEnabled",
            HIP_ERROR_NOT_SUPPORTED => "hipErrorNotSupported",
            _ => "hipErrorUnknown",
        }
    }
}

/// Result type for raw driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverStatus>;

/// Convert a raw HIP return code into a `DriverResult`.
pub fn check(code: HipErrorT) -> DriverResult<()> {
    if code == HIP_SUCCESS {
        Ok(())
    } else {
        Err(DriverStatus::new(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(DriverStatus::new(HIP_ERROR_OUT_OF_MEMORY).is_out_of_memory());
        assert!(DriverStatus::new(HIP_ERROR_NOT_FOUND).is_not_found());
        assert!(
            DriverStatus::new(HIP_ERROR_PEER_ACCESS_ALREADY_ENABLED)
                .is_peer_access_already_enabled()
        );
        assert!(!DriverStatus::new(HIP_ERROR_INVALID_VALUE).is_out_of_memory());
    }

    #[test]
    fn test_status_display() {
        let status = DriverStatus::new(HIP_ERROR_OUT_OF_MEMORY);
        assert_eq!(format!("{status}"), "hipErrorOutOfMemory (2)");
        assert_eq!(DriverStatus::new(-42).name(), "hipErrorUnknown");
    }

    #[test]
    fn test_check() {
        assert!(check(HIP_SUCCESS).is_ok());
        assert_eq!(
            check(HIP_ERROR_NO_DEVICE).unwrap_err(),
            DriverStatus::new(HIP_ERROR_NO_DEVICE)
        );
    }
}
