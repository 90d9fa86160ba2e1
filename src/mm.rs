// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! MM communication with the Standalone MM partition in the secure world.
//!
//! Messages are copied to a non-secure buffer shared with the partition, which is then invoked
//! either with an FF-A direct request or with a plain `MM_COMMUNICATE` SMC.

use crate::{
    board::MemoryRegion,
    error::{Error, Result},
    ffa::{
        FFA_MSG_SEND_DIRECT_REQ_64, FFA_SUCCESS_64, FfaClient, RxTxBuffers, StmmBuffer,
    },
    platform::{Platform, PlatformImpl},
    smccc::{SMC_ARGS, SmcConduit},
};
use arm_ffa::Version;
use log::{debug, error, info};
use uuid::Uuid;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, little_endian::U64};

/// `MM_VERSION`, an SMC32 call.
pub const MM_VERSION: u32 = 0x8400_0040;
/// `MM_COMMUNICATE` with SMC64 arguments.
pub const MM_COMMUNICATE_64: u32 = 0xc400_0041;

const MM_CALLER_MAJOR_VERSION: u16 = 1;
const MM_CALLER_MINOR_VERSION: u16 = 0;

const MM_RET_SUCCESS: i32 = 0;
const MM_RET_INVALID_PARAMS: i32 = -2;
const MM_RET_DENIED: i32 = -3;
const MM_RET_NO_MEMORY: i32 = -5;

/// Size of the header in front of every message: the handler GUID and the message length.
pub const MM_HEADER_SIZE: usize = size_of::<MmCommunicateHeader>();

/// The header of an MM communication buffer.
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct MmCommunicateHeader {
    /// GUID of the handler the message is for, in EFI byte order.
    pub header_guid: [u8; 16],
    /// Length of the message following the header.
    pub message_length: U64,
}

/// The non-secure buffer shared with the secure partition.
pub trait NsBuffer {
    /// Physical address of the buffer, as passed to the secure world.
    fn physical_address(&self) -> u64;

    /// Size of the buffer in bytes.
    fn size(&self) -> usize;

    /// Copies `data` to the start of the buffer.
    fn write(&mut self, data: &[u8]);

    /// Fills `data` from the start of the buffer.
    fn read(&self, data: &mut [u8]);
}

/// Event groups whose signalling is forwarded to the secure partition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GuidedEvent {
    /// The end of the DXE phase.
    EndOfDxe,
    /// `ExitBootServices` was called.
    ExitBootServices,
    /// The boot manager is about to boot.
    ReadyToBoot,
}

impl GuidedEvent {
    /// All forwarded events.
    pub const ALL: [Self; 3] = [Self::EndOfDxe, Self::ExitBootServices, Self::ReadyToBoot];

    /// Returns the GUID of the event group.
    pub fn guid(self) -> Uuid {
        match self {
            Self::EndOfDxe => Uuid::from_u128(0x02ce_967a_dd7e_4ffc_9ee7_810c_f047_0880),
            Self::ExitBootServices => Uuid::from_u128(0x27ab_f055_b1b8_4c26_8048_748f_37ba_a2df),
            Self::ReadyToBoot => Uuid::from_u128(0x7ce8_8fb3_4bd7_4679_87a8_a8d8_dee5_0d2b),
        }
    }
}

/// Where the buffers shared with the secure partition are.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MmBuffers {
    /// The MM communication buffer, if the partition described it.
    pub ns_buffer: Option<MemoryRegion>,
    /// The ERST buffer, if the partition described it.
    pub erst_buffer: Option<MemoryRegion>,
}

/// Checks that the secure world implements a compatible MM version.
///
/// With FF-A the FF-A version is negotiated instead. Returns the major and minor version found.
pub fn check_compatibility<C: SmcConduit>(
    ffa: &mut FfaClient<C>,
    ffa_enabled: bool,
) -> Result<(u16, u16)> {
    let version = if ffa_enabled {
        ffa.version(Version(MM_CALLER_MAJOR_VERSION, MM_CALLER_MINOR_VERSION))?
    } else {
        ffa.conduit().smc64(MM_VERSION, [0; SMC_ARGS])[0] as u32
    };
    let major = ((version >> 16) & 0x7fff) as u16;
    let minor = version as u16;
    if major == MM_CALLER_MAJOR_VERSION && minor >= MM_CALLER_MINOR_VERSION {
        info!("MM Version: Major={major:#x}, Minor={minor:#x}");
        Ok((major, minor))
    } else {
        error!(
            "Incompatible MM Versions. Current Version: Major={major:#x}, Minor={minor:#x}. \
            Expected: Major={MM_CALLER_MAJOR_VERSION:#x}, Minor>={MM_CALLER_MINOR_VERSION:#x}."
        );
        Err(Error::Unsupported)
    }
}

/// Checks compatibility and, with FF-A, finds the partition and its buffers.
///
/// Failing to find the partition or a buffer is logged but is not an error; the corresponding
/// buffer is left as `None`.
pub fn initialize<C: SmcConduit>(
    ffa: &mut FfaClient<C>,
    ffa_enabled: bool,
    rx_tx: &impl RxTxBuffers,
) -> Result<MmBuffers> {
    check_compatibility(ffa, ffa_enabled)?;
    if !ffa_enabled {
        return Ok(MmBuffers::default());
    }

    if let Err(e) = ffa.discover_stmm(rx_tx) {
        error!("Failed to get Stmm Partition Info {e}");
    }
    let ns_buffer = ffa
        .get_buffer_addr(StmmBuffer::NsBuffer)
        .inspect_err(|e| error!("Failed to get NS Buffer Details. {e}"))
        .ok();
    let erst_buffer = ffa
        .get_buffer_addr(StmmBuffer::ErstUncachedBuffer)
        .inspect_err(|e| error!("Failed to get ERST Buffer Details. {e}"))
        .ok();
    Ok(MmBuffers {
        ns_buffer,
        erst_buffer,
    })
}

/// Sends messages to MM handlers in the secure partition.
pub struct MmCommunication<C: SmcConduit, B: NsBuffer> {
    ffa: FfaClient<C>,
    buffer: B,
    ffa_enabled: bool,
}

impl<C: SmcConduit, B: NsBuffer> MmCommunication<C, B> {
    /// Creates an MM communication channel using the given shared buffer.
    pub fn new(ffa: FfaClient<C>, buffer: B, ffa_enabled: bool) -> Self {
        Self {
            ffa,
            buffer,
            ffa_enabled,
        }
    }

    /// Creates an MM communication channel using FF-A if the platform enables it.
    pub fn with_platform_conduit(ffa: FfaClient<C>, buffer: B) -> Self {
        Self::new(ffa, buffer, PlatformImpl::FFA_ENABLED)
    }

    /// Sends the message in `comm_buffer` and replaces it with the handler's response.
    ///
    /// `comm_buffer` starts with an [`MmCommunicateHeader`]. If `comm_size` is given it is
    /// checked against the message, and set to the shared buffer size if it is zero or too big.
    /// If the message is empty or too big for the shared buffer, its length is set to the
    /// largest message which fits and `BadBufferSize` is returned.
    pub fn communicate(
        &mut self,
        comm_buffer: &mut [u8],
        comm_size: Option<&mut usize>,
    ) -> Result<()> {
        let region_length = self.buffer.size();
        let (header, _) =
            MmCommunicateHeader::mut_from_prefix(comm_buffer).map_err(|_| Error::InvalidParameter)?;
        let message_length = header.message_length.get();
        let buffer_size = usize::try_from(message_length)
            .ok()
            .and_then(|length| length.checked_add(MM_HEADER_SIZE))
            .unwrap_or(usize::MAX);

        let mut status = Ok(());
        if let Some(comm_size) = comm_size {
            if *comm_size == 0 || *comm_size > region_length {
                *comm_size = region_length;
                status = Err(Error::BadBufferSize);
            }
            if *comm_size < buffer_size {
                status = Err(Error::InvalidParameter);
            }
        }
        if message_length == 0 || buffer_size > region_length {
            header.message_length = U64::new(region_length.saturating_sub(MM_HEADER_SIZE) as u64);
            status = Err(Error::BadBufferSize);
        }
        status?;

        let request = comm_buffer
            .get(..buffer_size)
            .ok_or(Error::InvalidParameter)?;
        self.buffer.write(request);

        let physical_address = self.buffer.physical_address();
        let regs = if self.ffa_enabled {
            let mut args = [0; SMC_ARGS];
            args[0] = u64::from(self.ffa.stmm_id());
            args[2] = u64::from(MM_COMMUNICATE_64);
            args[4] = physical_address;
            self.ffa.conduit().smc64(FFA_MSG_SEND_DIRECT_REQ_64, args)
        } else {
            let mut args = [0; SMC_ARGS];
            args[1] = physical_address;
            self.ffa.conduit().smc64(MM_COMMUNICATE_64, args)
        };

        let ret = regs[0];
        let code = if (self.ffa_enabled && ret == u64::from(FFA_SUCCESS_64)) || ret == 0 {
            MM_RET_SUCCESS
        } else if self.ffa_enabled {
            regs[2] as i32
        } else {
            ret as i32
        };
        match code {
            MM_RET_SUCCESS => self.copy_response(comm_buffer, buffer_size),
            MM_RET_INVALID_PARAMS => Err(Error::InvalidParameter),
            MM_RET_DENIED => Err(Error::AccessDenied),
            MM_RET_NO_MEMORY => {
                error!("MM communicate out of memory");
                Err(Error::OutOfResources)
            }
            _ => {
                error!("Unexpected MM communicate status {ret:#x}");
                Err(Error::AccessDenied)
            }
        }
    }

    /// Copies the handler's response from the shared buffer back to the caller.
    fn copy_response(&mut self, comm_buffer: &mut [u8], request_size: usize) -> Result<()> {
        comm_buffer[..request_size].fill(0);
        let mut header = MmCommunicateHeader::new_zeroed();
        self.buffer.read(header.as_mut_bytes());
        let response_size = usize::try_from(header.message_length.get())
            .ok()
            .and_then(|length| length.checked_add(MM_HEADER_SIZE))
            .filter(|&size| size <= self.buffer.size())
            .ok_or(Error::DeviceError)?;
        let destination = comm_buffer
            .get_mut(..response_size)
            .ok_or(Error::BufferTooSmall)?;
        self.buffer.read(destination);
        debug!("MM response of {response_size} bytes");
        Ok(())
    }

    /// Tells the secure partition that an event group was signalled.
    pub fn notify(&mut self, event: GuidedEvent) -> Result<()> {
        let mut message = [0; MM_HEADER_SIZE + 8];
        let header = MmCommunicateHeader {
            header_guid: event.guid().to_bytes_le(),
            message_length: U64::new(1),
        };
        message[..MM_HEADER_SIZE].copy_from_slice(header.as_bytes());
        let mut size = message.len();
        self.communicate(&mut message, Some(&mut size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ffa::{
            FFA_MSG_SEND_DIRECT_RESP_64, RetryPolicy,
            tests::{FakeConduit, regs},
        },
        smccc::SMC_RESULTS,
    };
    use alloc::{rc::Rc, vec, vec::Vec};
    use core::cell::RefCell;

    const BUFFER_ADDRESS: u64 = 0x8_4000_0000;
    const BUFFER_SIZE: usize = 0x100;

    type SharedMemory = Rc<RefCell<Vec<u8>>>;

    struct FakeNsBuffer(SharedMemory);

    impl NsBuffer for FakeNsBuffer {
        fn physical_address(&self) -> u64 {
            BUFFER_ADDRESS
        }

        fn size(&self) -> usize {
            self.0.borrow().len()
        }

        fn write(&mut self, data: &[u8]) {
            self.0.borrow_mut()[..data.len()].copy_from_slice(data);
        }

        fn read(&self, data: &mut [u8]) {
            data.copy_from_slice(&self.0.borrow()[..data.len()]);
        }
    }

    /// A secure partition which writes a canned reply to the shared buffer when called.
    struct FakeHandler {
        conduit: FakeConduit,
        memory: SharedMemory,
        reply: Option<Vec<u8>>,
    }

    impl SmcConduit for FakeHandler {
        fn smc64(
            &mut self,
            function_id: u32,
            args: [u64; SMC_ARGS],
        ) -> [u64; SMC_RESULTS] {
            if let Some(reply) = &self.reply {
                self.memory.borrow_mut()[..reply.len()].copy_from_slice(reply);
            }
            self.conduit.smc64(function_id, args)
        }

        fn delay_us(&mut self, usecs: u64) {
            self.conduit.delay_us(usecs);
        }
    }

    fn message(length: u64, fill: u8) -> Vec<u8> {
        let mut message = vec![fill; MM_HEADER_SIZE + length as usize];
        message[..16].copy_from_slice(&[0xaa; 16]);
        message[16..24].copy_from_slice(&length.to_le_bytes());
        message
    }

    fn channel(
        results: &[[u64; SMC_RESULTS]],
        reply: Option<Vec<u8>>,
        ffa_enabled: bool,
    ) -> MmCommunication<FakeHandler, FakeNsBuffer> {
        let memory = Rc::new(RefCell::new(vec![0; BUFFER_SIZE]));
        let handler = FakeHandler {
            conduit: FakeConduit::with_results(results),
            memory: memory.clone(),
            reply,
        };
        let ffa = FfaClient::new(
            handler,
            RetryPolicy {
                max_retries: 3,
                backoff_usec: 100,
            },
        );
        MmCommunication::new(ffa, FakeNsBuffer(memory), ffa_enabled)
    }

    fn calls(
        mm: &mut MmCommunication<FakeHandler, FakeNsBuffer>,
    ) -> Vec<(u32, [u64; SMC_ARGS])> {
        mm.ffa.conduit().conduit.calls.clone()
    }

    #[test]
    fn header_size() {
        assert_eq!(MM_HEADER_SIZE, 24);
    }

    #[test]
    fn smc_round_trip() {
        let reply = message(16, 0x55);
        let mut mm = channel(&[regs(&[0])], Some(reply.clone()), false);
        let mut comm_buffer = message(4, 0x11);
        comm_buffer.resize(64, 0x77);
        let mut size = 64;
        assert_eq!(mm.communicate(&mut comm_buffer, Some(&mut size)), Ok(()));
        assert_eq!(size, 64);

        let calls = calls(&mut mm);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, MM_COMMUNICATE_64);
        assert_eq!(calls[0].1[..3], [0, BUFFER_ADDRESS, 0]);

        // The reply replaces the request.
        assert_eq!(comm_buffer[..40], reply[..]);
        assert!(comm_buffer[40..].iter().all(|&b| b == 0x77));
    }

    #[test]
    fn request_is_copied_to_shared_buffer() {
        let mut mm = channel(&[regs(&[u64::from(FFA_SUCCESS_64)])], None, true);
        let mut comm_buffer = message(8, 0x22);
        assert_eq!(mm.communicate(&mut comm_buffer, None), Ok(()));

        let calls = calls(&mut mm);
        assert_eq!(calls[0].0, FFA_MSG_SEND_DIRECT_REQ_64);
        // No partition has been found, so the invalid ID is used.
        assert_eq!(
            calls[0].1[..6],
            [0xffff, 0, u64::from(MM_COMMUNICATE_64), 0, BUFFER_ADDRESS, 0]
        );
        assert_eq!(mm.buffer.0.borrow()[..32], message(8, 0x22)[..]);
        assert_eq!(comm_buffer, message(8, 0x22));
    }

    #[test]
    fn size_negotiation() {
        let mut mm = channel(&[], None, false);

        let mut size = 0;
        let mut comm_buffer = message(8, 0);
        assert_eq!(
            mm.communicate(&mut comm_buffer, Some(&mut size)),
            Err(Error::BadBufferSize)
        );
        assert_eq!(size, BUFFER_SIZE);

        let mut size = 0x1000;
        assert_eq!(
            mm.communicate(&mut comm_buffer, Some(&mut size)),
            Err(Error::BadBufferSize)
        );
        assert_eq!(size, BUFFER_SIZE);

        let mut size = 16;
        assert_eq!(
            mm.communicate(&mut comm_buffer, Some(&mut size)),
            Err(Error::InvalidParameter)
        );

        let mut empty = message(0, 0);
        assert_eq!(mm.communicate(&mut empty, None), Err(Error::BadBufferSize));
        assert_eq!(empty[16..24], (BUFFER_SIZE as u64 - 24).to_le_bytes());

        let mut too_big = message(BUFFER_SIZE as u64, 0);
        assert_eq!(mm.communicate(&mut too_big, None), Err(Error::BadBufferSize));
        assert_eq!(too_big[16..24], (BUFFER_SIZE as u64 - 24).to_le_bytes());

        // Shorter than its own header.
        assert_eq!(
            mm.communicate(&mut [0; 8], None),
            Err(Error::InvalidParameter)
        );
        // Shorter than the message length claims.
        let mut truncated = message(32, 0);
        truncated.truncate(40);
        assert_eq!(
            mm.communicate(&mut truncated, None),
            Err(Error::InvalidParameter)
        );
        assert!(calls(&mut mm).is_empty());
    }

    #[test]
    fn status_mapping() {
        let cases = [
            ((-2i64) as u64, Err(Error::InvalidParameter)),
            ((-3i64) as u64, Err(Error::AccessDenied)),
            ((-5i64) as u64, Err(Error::OutOfResources)),
            ((-1i64) as u64, Err(Error::AccessDenied)),
        ];
        for (ret, expected) in cases {
            let mut mm = channel(&[regs(&[ret])], None, false);
            assert_eq!(mm.communicate(&mut message(1, 0), None), expected);

            // With FF-A the status is in x2.
            let response = regs(&[u64::from(FFA_MSG_SEND_DIRECT_RESP_64), 0, ret]);
            let mut mm = channel(&[response], None, true);
            assert_eq!(mm.communicate(&mut message(1, 0), None), expected);
        }

        let response = regs(&[u64::from(FFA_MSG_SEND_DIRECT_RESP_64), 0, 0]);
        let mut mm = channel(&[response], None, true);
        assert_eq!(mm.communicate(&mut message(1, 0), None), Ok(()));
    }

    #[test]
    fn reply_too_big_for_caller() {
        let mut mm = channel(&[regs(&[0])], Some(message(64, 0x55)), false);
        let mut comm_buffer = message(1, 0);
        assert_eq!(
            mm.communicate(&mut comm_buffer, None),
            Err(Error::BufferTooSmall)
        );

        let mut reply = message(0, 0);
        reply[16..24].copy_from_slice(&0x1000u64.to_le_bytes());
        let mut mm = channel(&[regs(&[0])], Some(reply), false);
        assert_eq!(
            mm.communicate(&mut message(1, 0), None),
            Err(Error::DeviceError)
        );
    }

    #[test]
    fn guided_event() {
        let mut mm = channel(&[regs(&[0])], None, false);
        assert_eq!(mm.notify(GuidedEvent::ReadyToBoot), Ok(()));
        let shared = mm.buffer.0.borrow();
        assert_eq!(
            shared[..16],
            [
                0xb3, 0x8f, 0xe8, 0x7c, 0xd7, 0x4b, 0x79, 0x46, 0x87, 0xa8, 0xa8, 0xd8, 0xde,
                0xe5, 0x0d, 0x2b
            ]
        );
        assert_eq!(shared[16..24], 1u64.to_le_bytes());
        assert_eq!(shared[24], 0);
    }

    #[test]
    fn compatibility() {
        let mut ffa = FfaClient::new(
            FakeConduit::with_results(&[regs(&[0x1_0002]), regs(&[0x2_0000])]),
            RetryPolicy::default(),
        );
        assert_eq!(check_compatibility(&mut ffa, true), Ok((1, 2)));
        assert_eq!(check_compatibility(&mut ffa, false), Err(Error::Unsupported));
        assert_eq!(ffa.conduit().calls[1].0, MM_VERSION);

        let mut ffa = FfaClient::new(
            FakeConduit::with_results(&[regs(&[0xffff_ffff])]),
            RetryPolicy::default(),
        );
        assert_eq!(check_compatibility(&mut ffa, true), Err(Error::Unsupported));
    }

    struct RxTx;

    impl RxTxBuffers for RxTx {
        fn rx_address(&self) -> u64 {
            0x1000
        }

        fn tx_address(&self) -> u64 {
            0x2000
        }

        fn page_count(&self) -> u32 {
            1
        }

        fn read_rx(&self, data: &mut [u8]) {
            data.copy_from_slice(&[0x01, 0x80]);
        }
    }

    #[test]
    fn initialize_finds_buffers() {
        let success = regs(&[u64::from(FFA_SUCCESS_64)]);
        let resp = u64::from(FFA_MSG_SEND_DIRECT_RESP_64);
        let mut ffa = FfaClient::new(
            FakeConduit::with_results(&[
                regs(&[0x1_0000]),
                success,
                regs(&[u64::from(FFA_SUCCESS_64), 0, 1]),
                success,
                success,
                regs(&[resp, 0, 0, 0, 0, 0x8_4000_0000, 0x1_0000]),
                regs(&[resp, 0, 0, 0, 0, 0x8_5000_0000, 0x2_0000]),
            ]),
            RetryPolicy::default(),
        );
        assert_eq!(
            initialize(&mut ffa, true, &RxTx),
            Ok(MmBuffers {
                ns_buffer: Some(MemoryRegion::new(0x8_4000_0000, 0x1_0000)),
                erst_buffer: Some(MemoryRegion::new(0x8_5000_0000, 0x2_0000)),
            })
        );
        assert_eq!(ffa.stmm_id(), 0x8001);
    }

    #[test]
    fn initialize_without_partition() {
        let mut ffa = FfaClient::new(
            FakeConduit::with_results(&[
                regs(&[0x1_0000]),
                regs(&[u64::from(FFA_SUCCESS_64)]),
                regs(&[u64::from(FFA_SUCCESS_64), 0, 0]),
            ]),
            RetryPolicy::default(),
        );
        // The partition was not found, so no buffer can be asked for.
        assert_eq!(initialize(&mut ffa, true, &RxTx), Ok(MmBuffers::default()));

        let mut ffa = FfaClient::new(
            FakeConduit::with_results(&[regs(&[0x1_0000])]),
            RetryPolicy::default(),
        );
        assert_eq!(initialize(&mut ffa, false, &RxTx), Ok(MmBuffers::default()));
        assert_eq!(ffa.conduit().calls[0].0, MM_VERSION);
    }
}
