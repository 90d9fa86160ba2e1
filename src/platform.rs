// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Compile-time selection of the platform and the constants and drivers it provides.

macro_rules! select_platform {
    (platform = $condition:literal, $mod:ident::$plat_impl:ident) => {
        #[cfg(all(not(test), platform = $condition))]
        mod $mod;

        #[cfg(all(not(test), platform = $condition))]
        pub use $mod::$plat_impl as PlatformImpl;
    };
    (default, $mod:ident::$plat_impl:ident) => {
        #[cfg(all(not(test), not(platform = "th500")))]
        mod $mod;

        #[cfg(all(not(test), not(platform = "th500")))]
        pub use $mod::$plat_impl as PlatformImpl;
    };
    (test, $mod:ident::$plat_impl:ident) => {
        #[cfg(test)]
        mod $mod;

        #[cfg(test)]
        pub use $mod::$plat_impl as PlatformImpl;
    };
}

select_platform!(platform = "th500", th500::Th500);
select_platform!(default, th500::Th500);
select_platform!(test, test::TestPlatform);

use crate::{
    acpi::AcpiOemInfo,
    logger::LogSink,
    numa::NumaPerformanceTable,
    rtc::{PerformanceCounter, RtcConfig},
    smccc::SmcConduit,
};
use log::SetLoggerError;

/// Type alias for convenience, to avoid having to use the complicated type name everywhere.
pub type LogSinkImpl = <PlatformImpl as Platform>::LogSinkImpl;
/// The platform's way of calling the secure world.
pub type SmcConduitImpl = <PlatformImpl as Platform>::SmcConduitImpl;
/// The platform's free-running counter.
pub type PerformanceCounterImpl = <PlatformImpl as Platform>::PerformanceCounterImpl;

/// The build-time configuration and hooks implemented by all platforms.
pub trait Platform {
    /// Platform dependent LogSink implementation type for Logger.
    type LogSinkImpl: LogSink;

    /// Conduit for SMC calls to the secure world.
    type SmcConduitImpl: SmcConduit;

    /// Counter used for delays and to refine the RTC time.
    type PerformanceCounterImpl: PerformanceCounter;

    /// Capacity of the configuration manager data repository.
    const MAX_CM_ENTRIES: usize;

    /// Identity written into the headers of generated ACPI tables.
    const ACPI_OEM: AcpiOemInfo;

    /// Latency, bandwidth and distance between NUMA domains, by transfer type.
    const NUMA_PERFORMANCE: NumaPerformanceTable;

    /// Whether secure-world communication goes through FF-A rather than plain SMCs.
    const FFA_ENABLED: bool = true;

    /// How many times an FF-A direct request is retried before giving up.
    const FFA_MAX_RETRIES: u32 = 3;

    /// Delay between FF-A direct request retries, in microseconds.
    const FFA_BACKOFF_TIME_USEC: u64 = 100;

    /// Configuration of the Nuvoton real-time clock.
    const RTC: RtcConfig;

    /// Initialises the logger and anything else the platform needs.
    ///
    /// Any logs sent before this is called will be ignored.
    fn init() -> Result<(), SetLoggerError>;

    /// Returns the conduit for SMC calls to the secure world.
    fn smc_conduit() -> Self::SmcConduitImpl;

    /// Returns the performance counter.
    fn performance_counter() -> Self::PerformanceCounterImpl;

    /// Busy-waits for at least the given number of microseconds.
    fn delay_us(usecs: u64);
}
