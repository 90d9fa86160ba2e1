// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! FF-A client for talking to the Standalone MM secure partition.

use crate::{
    board::MemoryRegion,
    error::{Error, Result},
    platform::{Platform, PlatformImpl, SmcConduitImpl},
    smccc::{SMC_ARGS, SMC_RESULTS, SmcConduit},
};
use arm_ffa::{
    Interface, Version,
    interface_args::{DirectMsgArgs, RxTxAddr, VersionFlags, VersionQueryType},
};
use log::{debug, error, info, warn};

/// The FF-A version used to encode calls.
const FFA_VERSION: Version = Version(1, 2);

/// `FFA_ERROR`.
pub const FFA_ERROR: u32 = 0x8400_0060;
/// `FFA_SUCCESS` with SMC32 results.
pub const FFA_SUCCESS_32: u32 = 0x8400_0061;
/// `FFA_SUCCESS` with SMC64 results.
pub const FFA_SUCCESS_64: u32 = 0xc400_0061;
/// `FFA_VERSION`.
pub const FFA_VERSION_ID: u32 = 0x8400_0063;
/// `FFA_PARTITION_INFO_GET`.
pub const FFA_PARTITION_INFO_GET: u32 = 0x8400_0068;
/// `FFA_MSG_SEND_DIRECT_REQ` with SMC64 arguments.
pub const FFA_MSG_SEND_DIRECT_REQ_64: u32 = 0xc400_006f;
/// `FFA_MSG_SEND_DIRECT_RESP` with SMC32 arguments.
pub const FFA_MSG_SEND_DIRECT_RESP_32: u32 = 0x8400_0070;
/// `FFA_MSG_SEND_DIRECT_RESP` with SMC64 arguments.
pub const FFA_MSG_SEND_DIRECT_RESP_64: u32 = 0xc400_0070;

/// The UUID of the Standalone MM partition, as the four words passed in x1 to x4.
const STMM_UUID: [u32; 4] = [0x8afb_129b, 0x64ca_4760, 0x8618_c888, 0x4caa_6c4a];

/// Endpoint ID meaning no partition has been found.
pub const INVALID_VM_ID: u16 = 0xffff;

/// The non-secure world's own endpoint ID.
const NS_ENDPOINT_ID: u16 = 0;

/// Buffers which the Standalone MM partition can describe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum StmmBuffer {
    /// The non-secure MM communication buffer.
    NsBuffer = 0xc027_0001,
    /// The uncached buffer used for the error record serialization table.
    ErstUncachedBuffer = 0xc027_0002,
}

/// How persistently a direct request is resent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// How many times to resend after the first attempt.
    pub max_retries: u32,
    /// Delay before each resend, in microseconds.
    pub backoff_usec: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: PlatformImpl::FFA_MAX_RETRIES,
            backoff_usec: PlatformImpl::FFA_BACKOFF_TIME_USEC,
        }
    }
}

/// The RX and TX buffers shared with the partition manager, for calls which return data in
/// memory.
pub trait RxTxBuffers {
    /// Physical address of the RX buffer.
    fn rx_address(&self) -> u64;
    /// Physical address of the TX buffer.
    fn tx_address(&self) -> u64;
    /// Size of each buffer in 4 KiB pages.
    fn page_count(&self) -> u32;
    /// Copies the start of the RX buffer into `data`.
    fn read_rx(&self, data: &mut [u8]);
}

/// Makes FF-A calls through an SMC conduit.
pub struct FfaClient<C: SmcConduit> {
    conduit: C,
    retry: RetryPolicy,
    stmm_id: u16,
}

impl<C: SmcConduit> FfaClient<C> {
    /// Creates a client which has not yet found the Standalone MM partition.
    pub fn new(conduit: C, retry: RetryPolicy) -> Self {
        Self {
            conduit,
            retry,
            stmm_id: INVALID_VM_ID,
        }
    }

    /// Returns the conduit, for calls outside FF-A.
    pub fn conduit(&mut self) -> &mut C {
        &mut self.conduit
    }

    /// Returns the endpoint ID of the Standalone MM partition, or [`INVALID_VM_ID`].
    pub fn stmm_id(&self) -> u16 {
        self.stmm_id
    }

    fn call_raw(&mut self, interface: &Interface) -> Result<[u64; SMC_RESULTS]> {
        let function_id = u32::from(interface.function_id().ok_or(Error::InvalidParameter)?);
        let mut regs = [0; SMC_RESULTS];
        interface.to_regs(FFA_VERSION, &mut regs);
        let mut args = [0; SMC_ARGS];
        args.copy_from_slice(&regs[1..]);
        Ok(self.conduit.smc64(function_id, args))
    }

    /// Calls `FFA_VERSION` with the caller's version, returning the raw result in w0.
    pub fn version(&mut self, input_version: Version) -> Result<u32> {
        let regs = self.call_raw(&Interface::Version {
            input_version,
            flags: VersionFlags {
                query_type: VersionQueryType::Negotiate,
            },
        })?;
        Ok(regs[0] as u32)
    }

    /// Finds the endpoint ID of the Standalone MM partition.
    ///
    /// The partition manager writes the partition information to the RX buffer, which is mapped
    /// for the duration of the call.
    pub fn discover_stmm(&mut self, buffers: &impl RxTxBuffers) -> Result<u16> {
        let map = Interface::RxTxMap {
            addr: RxTxAddr::Addr64 {
                rx: buffers.rx_address(),
                tx: buffers.tx_address(),
            },
            page_cnt: buffers.page_count(),
        };
        let regs = self.call_raw(&map)?;
        if regs[2] != 0 {
            error!("FFA_RXTX_MAP failed: {:#x}", regs[2]);
            return Err(Error::OutOfResources);
        }

        let mut args = [0; SMC_ARGS];
        for (arg, word) in args.iter_mut().zip(STMM_UUID) {
            *arg = u64::from(word);
        }
        let regs = self.conduit.smc64(FFA_PARTITION_INFO_GET, args);
        let result = if regs[2] == 1 {
            let mut vm_id = [0; 2];
            buffers.read_rx(&mut vm_id);
            self.stmm_id = u16::from_le_bytes(vm_id);
            info!("STMM VmId={:#x}", self.stmm_id);
            Ok(self.stmm_id)
        } else {
            // Exactly one partition should match the UUID.
            error!("FFA_PARTITION_INFO_GET failed: {:#x}", regs[2]);
            Err(Error::NotFound)
        };

        let regs = self.call_raw(&Interface::RxRelease {
            vm_id: NS_ENDPOINT_ID,
        })?;
        if regs[2] != 0 {
            warn!("FFA_RX_RELEASE failed: {:#x}", regs[2]);
        }
        let regs = self.call_raw(&Interface::RxTxUnmap { id: NS_ENDPOINT_ID })?;
        if regs[2] != 0 {
            warn!("FFA_RXTX_UNMAP failed: {:#x}", regs[2]);
        }
        result
    }

    /// Sends a direct request with 64-bit arguments to `destination`.
    ///
    /// If the response is not a 64-bit direct response, the request is sent again after a delay,
    /// up to the configured number of times.
    pub fn direct_request(
        &mut self,
        destination: u16,
        args: [u64; 5],
    ) -> Result<[u64; SMC_RESULTS]> {
        let mut request_args = [0; 15];
        request_args[..args.len()].copy_from_slice(&args);
        let request = Interface::MsgSendDirectReq {
            src_id: NS_ENDPOINT_ID,
            dst_id: destination,
            args: DirectMsgArgs::Args64(request_args),
        };
        let mut attempt = 0;
        loop {
            let regs = self.call_raw(&request)?;
            let function_id = regs[0] as u32;
            if function_id == FFA_MSG_SEND_DIRECT_RESP_64 {
                return Ok(regs);
            }
            if attempt >= self.retry.max_retries {
                error!(
                    "No direct response from {destination:#x} after {} attempts, last {function_id:#x}",
                    attempt + 1
                );
                return Err(Error::DeviceError);
            }
            attempt += 1;
            debug!("Direct request got {function_id:#x}, retry {attempt}");
            self.conduit.delay_us(self.retry.backoff_usec);
        }
    }

    /// Asks the Standalone MM partition where one of its buffers is.
    pub fn get_buffer_addr(&mut self, buffer: StmmBuffer) -> Result<MemoryRegion> {
        if self.stmm_id == INVALID_VM_ID {
            return Err(Error::InvalidParameter);
        }
        let regs = self.direct_request(self.stmm_id, [buffer as u64, 0, 0, 0, 0])?;
        let region = MemoryRegion::new(regs[5], regs[6]);
        info!(
            "{buffer:?} at {:#x} size {:#x}",
            region.base, region.length
        );
        Ok(region)
    }
}

impl FfaClient<SmcConduitImpl> {
    /// Creates a client using the platform's SMC conduit and retry policy.
    pub fn for_platform() -> Self {
        Self::new(PlatformImpl::smc_conduit(), RetryPolicy::default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloc::{vec, vec::Vec};

    /// Records calls, and answers them from a queue of canned results.
    #[derive(Default)]
    pub struct FakeConduit {
        pub(crate) calls: Vec<(u32, [u64; SMC_ARGS])>,
        pub(crate) results: Vec<[u64; SMC_RESULTS]>,
        pub(crate) delays: Vec<u64>,
    }

    impl FakeConduit {
        pub(crate) fn with_results(results: &[[u64; SMC_RESULTS]]) -> Self {
            Self {
                results: results.iter().rev().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl SmcConduit for FakeConduit {
        fn smc64(
            &mut self,
            function_id: u32,
            args: [u64; SMC_ARGS],
        ) -> [u64; SMC_RESULTS] {
            self.calls.push((function_id, args));
            self.results.pop().unwrap_or([0; SMC_RESULTS])
        }

        fn delay_us(&mut self, usecs: u64) {
            self.delays.push(usecs);
        }
    }

    pub(crate) fn regs(values: &[u64]) -> [u64; SMC_RESULTS] {
        let mut regs = [0; SMC_RESULTS];
        regs[..values.len()].copy_from_slice(values);
        regs
    }

    struct FakeBuffers;

    impl RxTxBuffers for FakeBuffers {
        fn rx_address(&self) -> u64 {
            0x8000_1000
        }

        fn tx_address(&self) -> u64 {
            0x8000_2000
        }

        fn page_count(&self) -> u32 {
            1
        }

        fn read_rx(&self, data: &mut [u8]) {
            data.copy_from_slice(&[0x03, 0x80][..data.len()]);
        }
    }

    const RETRY: RetryPolicy = RetryPolicy {
        max_retries: 3,
        backoff_usec: 100,
    };

    #[test]
    fn default_retry_policy() {
        assert_eq!(RetryPolicy::default(), RETRY);
    }

    #[test]
    fn platform_client() {
        let mut ffa = FfaClient::for_platform();
        assert_eq!(ffa.stmm_id(), INVALID_VM_ID);
        assert_eq!(ffa.get_buffer_addr(StmmBuffer::NsBuffer), Err(Error::InvalidParameter));
        assert!(ffa.conduit().calls.is_empty());
    }

    #[test]
    fn version() {
        let mut ffa = FfaClient::new(FakeConduit::with_results(&[regs(&[0x1_0002])]), RETRY);
        assert_eq!(ffa.version(Version(1, 0)), Ok(0x1_0002));
        let (function_id, args) = ffa.conduit.calls[0];
        assert_eq!(function_id, FFA_VERSION_ID);
        assert_eq!(args[0], 0x1_0000);
        // Negotiate query type.
        assert_eq!(args[1], 0);
    }

    #[test]
    fn discover_stmm() {
        let conduit = FakeConduit::with_results(&[
            regs(&[u64::from(FFA_SUCCESS_32)]),
            regs(&[u64::from(FFA_SUCCESS_32), 0, 1]),
            regs(&[u64::from(FFA_SUCCESS_32)]),
            regs(&[u64::from(FFA_SUCCESS_32)]),
        ]);
        let mut ffa = FfaClient::new(conduit, RETRY);
        assert_eq!(ffa.stmm_id(), INVALID_VM_ID);
        assert_eq!(ffa.discover_stmm(&FakeBuffers), Ok(0x8003));
        assert_eq!(ffa.stmm_id(), 0x8003);

        let calls = &ffa.conduit.calls;
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].0, 0xc400_0066);
        assert_eq!(calls[0].1[..3], [0x8000_2000, 0x8000_1000, 1]);
        assert_eq!(calls[1].0, FFA_PARTITION_INFO_GET);
        assert_eq!(
            calls[1].1[..5],
            [0x8afb_129b, 0x64ca_4760, 0x8618_c888, 0x4caa_6c4a, 0]
        );
        assert_eq!(calls[2].0, 0x8400_0065);
        assert_eq!(calls[3].0, 0x8400_0067);
    }

    #[test]
    fn stmm_not_found_still_unmaps() {
        let conduit = FakeConduit::with_results(&[
            regs(&[u64::from(FFA_SUCCESS_32)]),
            regs(&[u64::from(FFA_SUCCESS_32), 0, 0]),
        ]);
        let mut ffa = FfaClient::new(conduit, RETRY);
        assert_eq!(ffa.discover_stmm(&FakeBuffers), Err(Error::NotFound));
        assert_eq!(ffa.stmm_id(), INVALID_VM_ID);
        assert_eq!(ffa.conduit.calls.len(), 4);
    }

    #[test]
    fn rxtx_map_failure() {
        let conduit = FakeConduit::with_results(&[regs(&[u64::from(FFA_ERROR), 0, 5])]);
        let mut ffa = FfaClient::new(conduit, RETRY);
        assert_eq!(ffa.discover_stmm(&FakeBuffers), Err(Error::OutOfResources));
        assert_eq!(ffa.conduit.calls.len(), 1);
    }

    #[test]
    fn direct_request_encoding() {
        let response = regs(&[u64::from(FFA_MSG_SEND_DIRECT_RESP_64), 0, 0, 7]);
        let mut ffa = FfaClient::new(FakeConduit::with_results(&[response]), RETRY);
        assert_eq!(ffa.direct_request(0x8003, [1, 2, 3, 4, 5]), Ok(response));
        let (function_id, args) = ffa.conduit.calls[0];
        assert_eq!(function_id, FFA_MSG_SEND_DIRECT_REQ_64);
        assert_eq!(args[..7], [0x8003, 0, 1, 2, 3, 4, 5]);
        assert!(ffa.conduit.delays.is_empty());
    }

    #[test]
    fn direct_request_retries() {
        let busy = regs(&[u64::from(FFA_ERROR), 0, (-4i64) as u64]);
        let response = regs(&[u64::from(FFA_MSG_SEND_DIRECT_RESP_64)]);
        let conduit = FakeConduit::with_results(&[busy, busy, response]);
        let mut ffa = FfaClient::new(conduit, RETRY);
        assert_eq!(ffa.direct_request(1, [0; 5]), Ok(response));
        assert_eq!(ffa.conduit.calls.len(), 3);
        assert_eq!(ffa.conduit.delays, vec![100, 100]);
        // Every attempt sends the same arguments.
        assert_eq!(ffa.conduit.calls[0], ffa.conduit.calls[2]);
    }

    #[test]
    fn direct_request_gives_up() {
        let busy = regs(&[u64::from(FFA_ERROR)]);
        let conduit = FakeConduit::with_results(&[busy; 5]);
        let mut ffa = FfaClient::new(conduit, RETRY);
        assert_eq!(ffa.direct_request(1, [0; 5]), Err(Error::DeviceError));
        assert_eq!(ffa.conduit.calls.len(), 4);
        assert_eq!(ffa.conduit.delays.len(), 3);
    }

    #[test]
    fn buffer_addresses() {
        let mut ffa = FfaClient::new(FakeConduit::default(), RETRY);
        assert_eq!(
            ffa.get_buffer_addr(StmmBuffer::NsBuffer),
            Err(Error::InvalidParameter)
        );
        assert!(ffa.conduit.calls.is_empty());

        ffa.stmm_id = 0x8003;
        ffa.conduit = FakeConduit::with_results(&[regs(&[
            u64::from(FFA_MSG_SEND_DIRECT_RESP_64),
            0,
            0,
            0,
            0,
            0x8_0000_0000,
            0x20_0000,
        ])]);
        assert_eq!(
            ffa.get_buffer_addr(StmmBuffer::ErstUncachedBuffer),
            Ok(MemoryRegion::new(0x8_0000_0000, 0x20_0000))
        );
        assert_eq!(ffa.conduit.calls[0].1[..3], [0x8003, 0, 0xc027_0002]);
    }

    #[test]
    fn direct_request_retries_32_bit_response() {
        let mut ffa = FfaClient::new(FakeConduit::default(), RETRY);
        ffa.stmm_id = 0x8003;
        ffa.conduit = FakeConduit::with_results(&[
            regs(&[u64::from(FFA_MSG_SEND_DIRECT_RESP_32)]),
            regs(&[
                u64::from(FFA_MSG_SEND_DIRECT_RESP_64),
                0,
                0,
                0,
                0,
                0x8_4000_0000,
                0x10_0000,
            ]),
        ]);
        assert_eq!(
            ffa.get_buffer_addr(StmmBuffer::NsBuffer),
            Ok(MemoryRegion::new(0x8_4000_0000, 0x10_0000))
        );
        assert_eq!(ffa.conduit.calls.len(), 2);
        assert_eq!(ffa.conduit.delays, vec![100]);
    }
}
