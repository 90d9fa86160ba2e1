// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Status codes returned by the firmware services.
//!
//! Every error maps one-to-one onto a UEFI `EFI_STATUS` value, so results can be handed back to
//! the firmware framework unchanged.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Set in every `EFI_STATUS` value that denotes an error rather than success or a warning.
pub const EFI_ERROR_BIT: u64 = 1 << 63;

/// The `EFI_STATUS` value for success.
pub const EFI_SUCCESS: u64 = 0;

/// An `EFI_STATUS` error code.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive, thiserror::Error)]
#[repr(u64)]
pub enum Error {
    /// A parameter was incorrect.
    #[error("Invalid Parameter")]
    InvalidParameter = EFI_ERROR_BIT | 2,
    /// The operation is not supported.
    #[error("Unsupported")]
    Unsupported = EFI_ERROR_BIT | 3,
    /// The buffer was not the proper size for the request.
    #[error("Bad Buffer Size")]
    BadBufferSize = EFI_ERROR_BIT | 4,
    /// The buffer is not large enough to hold the requested data.
    #[error("Buffer Too Small")]
    BufferTooSmall = EFI_ERROR_BIT | 5,
    /// There is no data pending upon return.
    #[error("Not Ready")]
    NotReady = EFI_ERROR_BIT | 6,
    /// The physical device reported an error while attempting the operation.
    #[error("Device Error")]
    DeviceError = EFI_ERROR_BIT | 7,
    /// A resource has run out.
    #[error("Out of Resources")]
    OutOfResources = EFI_ERROR_BIT | 9,
    /// The item was not found.
    #[error("Not Found")]
    NotFound = EFI_ERROR_BIT | 14,
    /// Access was denied.
    #[error("Access Denied")]
    AccessDenied = EFI_ERROR_BIT | 15,
    /// A protocol error occurred.
    #[error("Protocol Error")]
    ProtocolError = EFI_ERROR_BIT | 17,
    /// The operation was aborted.
    #[error("Aborted")]
    Aborted = EFI_ERROR_BIT | 21,
}

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Converts a result into the raw `EFI_STATUS` value a firmware caller expects.
pub fn to_efi_status<T>(result: &Result<T>) -> u64 {
    match result {
        Ok(_) => EFI_SUCCESS,
        Err(error) => u64::from(*error),
    }
}
