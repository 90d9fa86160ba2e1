// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::Platform;
use crate::{
    acpi::AcpiOemInfo,
    logger::{self, LockedWriter},
    numa::{NORMALIZED_DISTANCE, NumaPerformanceTable, TransferPerformance},
    rtc::{PerformanceCounter, RtcConfig},
    smccc::{SMC_ARGS, SMC_RESULTS, SmcConduit},
};
use arm_pl011_uart::{PL011Registers, Uart, UniqueMmioPointer};
use core::{arch::asm, hint::spin_loop, ptr::NonNull};
use log::SetLoggerError;

const PL011_BASE_ADDRESS: *mut PL011Registers = 0x0c28_0000 as _;

/// Build time of the firmware, the initial time of the virtual RTC.
const BUILD_EPOCH: i64 = 1_704_067_200;

/// The NVIDIA Grace TH500 server SoC.
pub struct Th500;

impl Platform for Th500 {
    type LogSinkImpl = LockedWriter<Uart<'static>>;
    type SmcConduitImpl = Th500Conduit;
    type PerformanceCounterImpl = SystemCounter;

    const MAX_CM_ENTRIES: usize = 256;

    const ACPI_OEM: AcpiOemInfo = AcpiOemInfo {
        oem_id: *b"NVIDIA",
        oem_table_id: 0x2020_2030_3035_4854,
        oem_revision: 0x0000_0001,
        creator_id: 0x4149_564e,
        creator_revision: 0x0000_0001,
    };

    const NUMA_PERFORMANCE: NumaPerformanceTable = NumaPerformanceTable {
        cpu_to_local_memory: TransferPerformance::new(130, 130, 450, NORMALIZED_DISTANCE),
        cpu_to_remote_memory: TransferPerformance::new(410, 410, 100, 40),
        cpu_to_local_hbm: TransferPerformance::new(780, 780, 400, 80),
        cpu_to_remote_hbm: TransferPerformance::new(1000, 1000, 100, 255),
        gpu_to_local_memory: TransferPerformance::new(800, 800, 400, 80),
        gpu_to_remote_memory: TransferPerformance::new(1100, 1100, 100, 255),
        gpu_to_local_hbm: TransferPerformance::new(400, 400, 4000, NORMALIZED_DISTANCE),
        gpu_to_remote_hbm: TransferPerformance::new(1200, 1200, 100, 255),
    };

    const RTC: RtcConfig = RtcConfig {
        base_year: 2000,
        virtual_rtc: false,
        cpu_has_rtc_control: false,
        build_epoch: BUILD_EPOCH,
    };

    fn init() -> Result<(), SetLoggerError> {
        let Some(uart_base) = NonNull::new(PL011_BASE_ADDRESS) else {
            return Ok(());
        };
        // SAFETY: `PL011_BASE_ADDRESS` is the base address of a PL011 device, and nothing else
        // accesses that address range.
        let uart_pointer = unsafe { UniqueMmioPointer::new(uart_base) };
        logger::init(LockedWriter::new(Uart::new(uart_pointer)))
    }

    fn smc_conduit() -> Th500Conduit {
        Th500Conduit
    }

    fn performance_counter() -> SystemCounter {
        SystemCounter
    }

    fn delay_us(usecs: u64) {
        let counter = SystemCounter;
        let end = counter.nanoseconds().saturating_add(usecs.saturating_mul(1000));
        while counter.nanoseconds() < end {
            spin_loop();
        }
    }
}

/// The Arm generic timer's system counter.
pub struct SystemCounter;

impl SystemCounter {
    fn ticks() -> u64 {
        let value: u64;
        // SAFETY: This only reads a readable timer system register.
        unsafe {
            asm!("mrs {}, cntpct_el0", out(reg) value, options(nostack, nomem, preserves_flags));
        }
        value
    }

    fn frequency() -> u64 {
        let value: u64;
        // SAFETY: This only reads a readable timer system register.
        unsafe {
            asm!("mrs {}, cntfrq_el0", out(reg) value, options(nostack, nomem, preserves_flags));
        }
        value
    }
}

impl PerformanceCounter for SystemCounter {
    fn nanoseconds(&self) -> u64 {
        let frequency = Self::frequency().max(1);
        (u128::from(Self::ticks()) * 1_000_000_000 / u128::from(frequency)) as u64
    }
}

/// SMC calls from the normal world to the secure monitor.
pub struct Th500Conduit;

impl SmcConduit for Th500Conduit {
    fn smc64(&mut self, function_id: u32, args: [u64; SMC_ARGS]) -> [u64; SMC_RESULTS] {
        ::smccc::smc64(function_id, args)
    }

    fn delay_us(&mut self, usecs: u64) {
        Th500::delay_us(usecs);
    }
}
