// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Requests to the Boot and Power Management Processor.

pub mod clock;

use crate::error::Error;
use core::fmt::{self, Display, Formatter};

/// Message request code of the clock services.
pub const MRQ_CLK: u32 = 22;

/// Error code the BPMP returns for an invalid argument, such as an unknown clock.
pub const BPMP_EINVAL: i32 = -22;

/// Why a BPMP request failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IpcError {
    /// The request could not be delivered or its response was not received.
    Transport(Error),
    /// The BPMP processed the request and returned a negative error code.
    Message(i32),
}

impl Display for IpcError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{e}"),
            Self::Message(code) => write!(f, "BPMP error {code}"),
        }
    }
}

impl From<IpcError> for Error {
    fn from(error: IpcError) -> Self {
        match error {
            IpcError::Transport(e) => e,
            IpcError::Message(BPMP_EINVAL) => Error::NotFound,
            IpcError::Message(_) => Error::ProtocolError,
        }
    }
}

/// The IPC channel to the BPMP.
pub trait BpmpIpc {
    /// Sends `request` for the given message request code, and waits for the response.
    ///
    /// The response is copied to the start of `response`, which may be empty if none is
    /// expected.
    fn communicate(
        &mut self,
        mrq: u32,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<(), IpcError>;
}
