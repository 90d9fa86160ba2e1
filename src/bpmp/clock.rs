// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! SCMI clock management, implemented with `MRQ_CLK` requests to the BPMP.

use super::{BpmpIpc, IpcError, MRQ_CLK};
use crate::error::{Error, Result};
use alloc::vec::Vec;
use arrayvec::ArrayString;
use log::{debug, info};
use num_enum::IntoPrimitive;
use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout,
    little_endian::{I64, U32, U64},
};

/// The SCMI clock protocol version implemented.
pub const CLOCK_PROTOCOL_VERSION: u32 = 0x1_0000;

/// Clock ids must be below this, and there are never more clocks than this.
pub const NUM_CLOCKS_MASK: u32 = 0xffff;

/// Maximum length of an SCMI name, including the terminating NUL.
pub const SCMI_MAX_STR_LEN: usize = 16;

const MAX_PARENTS: usize = 16;
const MAX_NAME_LEN: usize = 40;

#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq)]
#[repr(u32)]
enum ClockSubcommand {
    GetRate = 1,
    SetRate = 2,
    #[allow(unused)]
    RoundRate = 3,
    GetParent = 4,
    SetParent = 5,
    IsEnabled = 6,
    Enable = 7,
    Disable = 8,
    GetAllInfo = 14,
    GetMaxClockId = 15,
}

/// The first word of every clock request.
fn command(subcommand: ClockSubcommand, clock_id: u32) -> u32 {
    (u32::from(subcommand) << 24) | (clock_id & 0x00ff_ffff)
}

/// A clock request with arguments.
#[derive(Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
struct ClockRequest {
    command: U32,
    parent_id: U32,
    rate: I64,
}

#[derive(Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
struct GetAllInfoResponse {
    flags: U32,
    parent: U32,
    parents: [U32; MAX_PARENTS],
    num_parents: u8,
    name: [u8; MAX_NAME_LEN],
}

/// Attributes of a clock.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClockAttributes {
    /// Whether the clock is running.
    pub enabled: bool,
    /// The clock name, cut to fit an SCMI name.
    pub name: ArrayString<{ SCMI_MAX_STR_LEN - 1 }>,
    /// Whether the name was too long and had to be cut.
    pub truncated: bool,
}

/// The SCMI clock protocol over a BPMP IPC channel.
pub struct BpmpClock<I: BpmpIpc> {
    ipc: I,
}

impl<I: BpmpIpc> BpmpClock<I> {
    /// Creates a clock protocol instance using the given channel.
    pub fn new(ipc: I) -> Self {
        Self { ipc }
    }

    fn request(&mut self, request: &[u8], response: &mut [u8]) -> Result<()> {
        self.ipc
            .communicate(MRQ_CLK, request, response)
            .map_err(|e: IpcError| {
                debug!("MRQ_CLK request failed: {e}");
                Error::from(e)
            })
    }

    /// Sends a request consisting only of the command word.
    fn simple_request(
        &mut self,
        subcommand: ClockSubcommand,
        clock_id: u32,
        response: &mut [u8],
    ) -> Result<()> {
        self.request(&command(subcommand, clock_id).to_le_bytes(), response)
    }

    fn full_request(
        &mut self,
        subcommand: ClockSubcommand,
        clock_id: u32,
        parent_id: u32,
        rate: u64,
        response: &mut [u8],
    ) -> Result<()> {
        let request = ClockRequest {
            command: U32::new(command(subcommand, clock_id)),
            parent_id: U32::new(parent_id),
            rate: I64::new(rate as i64),
        };
        self.request(request.as_bytes(), response)
    }

    fn all_info(&mut self, clock_id: u32) -> Result<GetAllInfoResponse> {
        let mut response = GetAllInfoResponse::new_zeroed();
        self.simple_request(
            ClockSubcommand::GetAllInfo,
            clock_id,
            response.as_mut_bytes(),
        )?;
        Ok(response)
    }

    /// Returns the protocol version.
    pub fn version(&self) -> u32 {
        CLOCK_PROTOCOL_VERSION
    }

    /// Returns how many clocks there are.
    pub fn total_clocks(&mut self) -> Result<u32> {
        let mut max_id = U32::ZERO;
        self.simple_request(ClockSubcommand::GetMaxClockId, 0, max_id.as_mut_bytes())?;
        Ok(max_id.get().saturating_add(1).min(NUM_CLOCKS_MASK))
    }

    /// Returns whether the clock is enabled, and its name.
    pub fn attributes(&mut self, clock_id: u32) -> Result<ClockAttributes> {
        check_clock_id(clock_id)?;
        let mut is_enabled = U32::ZERO;
        self.simple_request(
            ClockSubcommand::IsEnabled,
            clock_id,
            is_enabled.as_mut_bytes(),
        )?;

        let info = self.all_info(clock_id)?;
        let full_len = info
            .name
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(MAX_NAME_LEN);
        let mut name = ArrayString::new();
        for &byte in info.name[..full_len].iter().take(SCMI_MAX_STR_LEN - 1) {
            name.push(char::from(byte & 0x7f));
        }
        let truncated = full_len + 1 > SCMI_MAX_STR_LEN;
        if truncated {
            debug!("Clock {clock_id} name truncated to {name}");
        }
        Ok(ClockAttributes {
            enabled: is_enabled.get() != 0,
            name,
            truncated,
        })
    }

    /// Describing supported rates is not implemented by the BPMP.
    pub fn describe_rates(&mut self, _clock_id: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Returns the current rate of the clock in Hz.
    pub fn rate_get(&mut self, clock_id: u32) -> Result<u64> {
        check_clock_id(clock_id)?;
        let mut rate = U64::ZERO;
        self.simple_request(ClockSubcommand::GetRate, clock_id, rate.as_mut_bytes())?;
        Ok(rate.get())
    }

    /// Sets the rate of the clock in Hz.
    ///
    /// The BPMP may pick a different rate if the requested one is not achievable.
    pub fn rate_set(&mut self, clock_id: u32, rate: u64) -> Result<()> {
        check_clock_id(clock_id)?;
        let mut new_rate = U64::ZERO;
        self.full_request(
            ClockSubcommand::SetRate,
            clock_id,
            0,
            rate,
            new_rate.as_mut_bytes(),
        )?;
        if new_rate.get() != rate {
            info!(
                "Clock {clock_id}, attempt set to {rate}, was set to {}",
                new_rate.get()
            );
        }
        Ok(())
    }

    /// Enables or disables the clock.
    pub fn enable(&mut self, clock_id: u32, enable: bool) -> Result<()> {
        check_clock_id(clock_id)?;
        let subcommand = if enable {
            ClockSubcommand::Enable
        } else {
            ClockSubcommand::Disable
        };
        self.simple_request(subcommand, clock_id, &mut [])
    }

    /// Returns `Ok` if `parent_id` is one of the possible parents of the clock, or `NotFound`.
    pub fn is_parent(&mut self, clock_id: u32, parent_id: u32) -> Result<()> {
        if self.parents(clock_id)?.contains(&parent_id) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Selects the parent of the clock.
    pub fn set_parent(&mut self, clock_id: u32, parent_id: u32) -> Result<()> {
        check_clock_id(clock_id)?;
        self.full_request(ClockSubcommand::SetParent, clock_id, parent_id, 0, &mut [])
    }

    /// Returns the current parent of the clock.
    pub fn parent(&mut self, clock_id: u32) -> Result<u32> {
        check_clock_id(clock_id)?;
        let mut parent_id = U32::ZERO;
        self.full_request(
            ClockSubcommand::GetParent,
            clock_id,
            0,
            0,
            parent_id.as_mut_bytes(),
        )?;
        Ok(parent_id.get())
    }

    /// Returns all possible parents of the clock.
    pub fn parents(&mut self, clock_id: u32) -> Result<Vec<u32>> {
        check_clock_id(clock_id)?;
        let info = self.all_info(clock_id)?;
        let count = usize::from(info.num_parents).min(MAX_PARENTS);
        Ok(info.parents[..count].iter().map(|id| id.get()).collect())
    }
}

fn check_clock_id(clock_id: u32) -> Result<()> {
    if clock_id >= NUM_CLOCKS_MASK {
        Err(Error::InvalidParameter)
    } else {
        Ok(())
    }
}
