// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Driver for the Nuvoton NCT3018Y real-time clock.
//!
//! The RTC sits on an I2C bus shared with the BMC. The CPU may be on either of its two
//! interfaces; only the primary one can write the control and status registers, and the date and
//! time registers are writable by whichever side holds the write ownership.
//!
//! Reads are refined with the performance counter, which gives sub-second precision for as long
//! as it stays within a second of the RTC. Platforms without a usable RTC can instead keep a
//! virtual clock: an offset from the performance counter which the caller persists.

use crate::{
    error::{Error, Result},
    platform::{PerformanceCounterImpl, Platform, PlatformImpl},
};
use bitflags::bitflags;
use log::{error, info};

const RTC_TIME_ADDRESS: u8 = 0x00;
const RTC_CONTROL_ADDRESS: u8 = 0x0a;
const RTC_PRIMARY_ACCESS_ADDRESS: u8 = 0x20;

/// Size of the date and time registers, from seconds to year.
const RTC_TIME_REGISTERS: usize = 10;

const RTC_SECOND_MASK: u8 = 0x7f;
const RTC_MINUTE_MASK: u8 = 0x7f;
const RTC_HOUR_MASK: u8 = 0x3f;
const RTC_HOUR_12_MASK: u8 = 0x1f;
const RTC_DAY_MASK: u8 = 0x3f;
const RTC_MONTH_MASK: u8 = 0x1f;
const RTC_PM_BIT: u8 = 0x80;

/// Lets the firmware tell whether the BMC changed the time, as the weekday is otherwise unused.
const RTC_WDAY_OFFSET: u8 = 3;

const RTC_PRIMARY_ACCESS_I2CPA: u8 = 0x01;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// The time zone is not known, so the time is local time.
pub const EFI_UNSPECIFIED_TIMEZONE: i16 = 0x07ff;

/// Bit in the runtime services supported mask for `GetTime`.
pub const EFI_RT_SUPPORTED_GET_TIME: u32 = 1 << 0;
/// Bit in the runtime services supported mask for `SetTime`.
pub const EFI_RT_SUPPORTED_SET_TIME: u32 = 1 << 1;

bitflags! {
    /// The RTC control register.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    struct Control: u8 {
        /// The primary interface holds the write ownership of the time registers.
        const TWO = 1 << 0;
        const CIE = 1 << 1;
        const OFIE = 1 << 2;
        const AIE = 1 << 3;
        const DSM = 1 << 4;
        /// 24-hour rather than 12-hour mode.
        const HF = 1 << 5;
        /// Binary rather than BCD registers.
        const DM = 1 << 6;
        /// The oscillator is stopped.
        const ST = 1 << 7;
    }
}

bitflags! {
    /// Daylight saving flags of an [`EfiTime`].
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Daylight: u8 {
        /// The time should be adjusted for daylight saving time.
        const ADJUST_DAYLIGHT = 1 << 0;
        /// The time is in daylight saving time.
        const IN_DAYLIGHT = 1 << 1;
    }
}

/// Build-time configuration of the RTC driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RtcConfig {
    /// Year which a year register value of 0 stands for.
    pub base_year: u16,
    /// Keep time with the performance counter rather than the RTC.
    pub virtual_rtc: bool,
    /// The CPU is on the primary interface and may take the write ownership.
    pub cpu_has_rtc_control: bool,
    /// Seconds since the Unix epoch of the firmware build, the initial time of a virtual clock.
    pub build_epoch: i64,
}

/// A calendar time in the layout of a UEFI `EFI_TIME`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EfiTime {
    /// 1900 to 9999.
    pub year: u16,
    /// 1 to 12.
    pub month: u8,
    /// 1 to 31.
    pub day: u8,
    /// 0 to 23.
    pub hour: u8,
    /// 0 to 59.
    pub minute: u8,
    /// 0 to 59.
    pub second: u8,
    /// 0 to 999,999,999.
    pub nanosecond: u32,
    /// Offset of local time from UTC in minutes, or [`EFI_UNSPECIFIED_TIMEZONE`].
    pub time_zone: i16,
    /// Daylight saving time state.
    pub daylight: Daylight,
}

impl Default for EfiTime {
    fn default() -> Self {
        Self {
            year: 1970,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            nanosecond: 0,
            time_zone: EFI_UNSPECIFIED_TIMEZONE,
            daylight: Daylight::empty(),
        }
    }
}

impl EfiTime {
    /// Returns whether every field is within the range UEFI allows.
    pub fn is_valid(&self) -> bool {
        (1900..=9999).contains(&self.year)
            && (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
            && u64::from(self.nanosecond) < NANOS_PER_SECOND
            && (self.time_zone == EFI_UNSPECIFIED_TIMEZONE
                || (-1440..=1440).contains(&self.time_zone))
    }

    /// Returns the number of seconds since the Unix epoch, treating the time as UTC.
    pub fn to_epoch(&self) -> i64 {
        days_from_civil(
            i64::from(self.year),
            i64::from(self.month),
            i64::from(self.day),
        ) * SECONDS_PER_DAY
            + i64::from(self.hour) * SECONDS_PER_HOUR
            + i64::from(self.minute) * SECONDS_PER_MINUTE
            + i64::from(self.second)
    }

    /// Sets the date and time fields from seconds since the Unix epoch, leaving the nanoseconds,
    /// time zone and daylight flags unchanged.
    pub fn set_from_epoch(&mut self, epoch: i64) {
        let (year, month, day) = civil_from_days(epoch.div_euclid(SECONDS_PER_DAY));
        let seconds = epoch.rem_euclid(SECONDS_PER_DAY);
        self.year = year as u16;
        self.month = month as u8;
        self.day = day as u8;
        self.hour = (seconds / SECONDS_PER_HOUR) as u8;
        self.minute = (seconds % SECONDS_PER_HOUR / SECONDS_PER_MINUTE) as u8;
        self.second = (seconds % SECONDS_PER_MINUTE) as u8;
    }

    /// Returns the day of the week, with Sunday as 0.
    pub fn weekday(&self) -> u8 {
        (self.to_epoch().div_euclid(SECONDS_PER_DAY) + 4).rem_euclid(7) as u8
    }

    /// Seconds to add to UTC to get the local time this time is expressed in.
    fn local_offset(&self) -> i64 {
        if self.time_zone != EFI_UNSPECIFIED_TIMEZONE {
            i64::from(self.time_zone) * SECONDS_PER_MINUTE
        } else if self.daylight.contains(Daylight::IN_DAYLIGHT) {
            SECONDS_PER_HOUR
        } else {
            0
        }
    }
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 of a proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let day_of_year = (153 * (month + if month > 2 { -3 } else { 9 }) + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let days = days + 719_468;
    let era = days.div_euclid(146_097);
    let day_of_era = days - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 {
        shifted_month + 3
    } else {
        shifted_month - 9
    };
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn bcd_to_decimal(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0f)
}

fn decimal_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Capabilities of the real-time clock, as reported by `GetTime`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeCapabilities {
    /// Resolution in counts per second.
    pub resolution: u32,
    /// Accuracy in parts per million.
    pub accuracy: u32,
    /// Whether setting the time clears the sub-second part.
    pub sets_to_zero: bool,
}

/// Byte register access to the RTC over I2C.
pub trait RtcIo {
    /// Reads consecutive registers starting at `register`.
    fn read(&mut self, register: u8, data: &mut [u8]) -> Result<()>;

    /// Writes consecutive registers starting at `register`.
    fn write(&mut self, register: u8, data: &[u8]) -> Result<()>;
}

/// A free-running counter.
pub trait PerformanceCounter {
    /// Returns the time since the counter started, in nanoseconds.
    fn nanoseconds(&self) -> u64;
}

/// The Nuvoton RTC, or a virtual clock standing in for it.
pub struct NuvotonRtc<I: RtcIo, P: PerformanceCounter> {
    io: I,
    counter: P,
    config: RtcConfig,
    /// Nanoseconds to add to the counter to get the epoch time, once known.
    counter_offset: Option<i64>,
    /// Epoch seconds the virtual clock was last set to.
    rtc_offset: i64,
    /// Runtime services supported after `ExitBootServices`, or `None` before it.
    runtime_services_supported: Option<u32>,
}

impl<I: RtcIo, P: PerformanceCounter> NuvotonRtc<I, P> {
    /// Creates a driver with the given configuration.
    ///
    /// `stored_offset` is the virtual clock offset saved by a previous boot, if any.
    pub fn new(io: I, counter: P, config: RtcConfig, stored_offset: Option<i64>) -> Self {
        Self {
            io,
            counter,
            config,
            counter_offset: None,
            rtc_offset: stored_offset.unwrap_or(config.build_epoch),
            runtime_services_supported: None,
        }
    }

    /// Returns the epoch seconds the virtual clock was last set to, for the caller to persist.
    pub fn rtc_offset(&self) -> i64 {
        self.rtc_offset
    }

    /// Records which runtime services remain available after `ExitBootServices`.
    pub fn exit_boot_services(&mut self, runtime_services_supported: u32) {
        self.runtime_services_supported = Some(runtime_services_supported);
    }

    fn check_runtime(&self, service: u32) -> Result<()> {
        match self.runtime_services_supported {
            Some(supported) if supported & service == 0 => Err(Error::Unsupported),
            _ => Ok(()),
        }
    }

    /// Sets up the RTC once it has been found on the bus.
    ///
    /// If the CPU is on the primary interface, this selects 24-hour BCD mode, clears the status
    /// flags and grants the CPU access to the time registers. Failures are logged only.
    pub fn configure(&mut self) {
        if !self.config.cpu_has_rtc_control {
            return;
        }
        let control = Control::HF;
        if let Err(e) = self.io.write(RTC_CONTROL_ADDRESS, &[control.bits(), 0]) {
            error!("Failed to program RTC control register: {e}");
        }
        if let Err(e) = self
            .io
            .write(RTC_PRIMARY_ACCESS_ADDRESS, &[RTC_PRIMARY_ACCESS_I2CPA])
        {
            error!("Failed to program RTC primary access register: {e}");
        }
    }

    /// Returns the capabilities of the clock.
    pub fn capabilities(&self) -> TimeCapabilities {
        TimeCapabilities {
            resolution: 1,
            accuracy: 0,
            sets_to_zero: false,
        }
    }

    /// Returns the current time, converted to the local time described by `time_zone` and
    /// `daylight`.
    pub fn get_time(&mut self, time_zone: i16, daylight: Daylight) -> Result<EfiTime> {
        self.check_runtime(EFI_RT_SUPPORTED_GET_TIME)?;
        let counter_nanos = self.counter.nanoseconds() as i64;
        let counter_seconds = counter_nanos / NANOS_PER_SECOND as i64;

        let epoch = if self.config.virtual_rtc {
            match self.counter_offset {
                Some(offset) => (counter_nanos + offset) / NANOS_PER_SECOND as i64,
                None => {
                    self.counter_offset =
                        Some((self.rtc_offset - counter_seconds) * NANOS_PER_SECOND as i64);
                    self.rtc_offset
                }
            }
        } else {
            let rtc_epoch = self.read_rtc()?.to_epoch();
            // Use the counter for precision, unless it has drifted from the RTC.
            let counter_epoch = self
                .counter_offset
                .map(|offset| (counter_nanos + offset) / NANOS_PER_SECOND as i64);
            if counter_epoch == Some(rtc_epoch) || counter_epoch == Some(rtc_epoch + 1) {
                counter_epoch.unwrap_or(rtc_epoch)
            } else {
                self.counter_offset = Some((rtc_epoch - counter_seconds) * NANOS_PER_SECOND as i64);
                rtc_epoch
            }
        };

        let mut time = EfiTime {
            time_zone,
            daylight,
            ..Default::default()
        };
        time.set_from_epoch(epoch + time.local_offset());
        time.nanosecond = (counter_nanos % NANOS_PER_SECOND as i64) as u32;
        Ok(time)
    }

    /// Reads the time registers as UTC.
    fn read_rtc(&mut self) -> Result<EfiTime> {
        let mut registers = [0; RTC_TIME_REGISTERS + 1];
        self.io
            .read(RTC_TIME_ADDRESS, &mut registers)
            .map_err(|e| {
                error!("Failed to read time registers: {e}");
                Error::DeviceError
            })?;
        let control = Control::from_bits_retain(registers[RTC_TIME_REGISTERS]);
        if control.contains(Control::ST) {
            error!("RTC is stopped");
            return Err(Error::DeviceError);
        }

        let twenty_four_hour = control.contains(Control::HF);
        let hour_mask = if twenty_four_hour {
            RTC_HOUR_MASK
        } else {
            RTC_HOUR_12_MASK
        };
        let mut fields = [
            registers[0] & RTC_SECOND_MASK,
            registers[2] & RTC_MINUTE_MASK,
            registers[4] & hour_mask,
            registers[7] & RTC_DAY_MASK,
            registers[8] & RTC_MONTH_MASK,
            registers[9],
        ];
        if !control.contains(Control::DM) {
            for field in &mut fields {
                *field = bcd_to_decimal(*field);
            }
        }
        let [second, minute, mut hour, day, month, year] = fields;
        if !twenty_four_hour {
            hour %= 12;
            if registers[4] & RTC_PM_BIT != 0 {
                hour += 12;
            }
        }

        Ok(EfiTime {
            year: self.config.base_year + u16::from(year),
            month,
            day,
            hour,
            minute,
            second,
            ..Default::default()
        })
    }

    /// Sets the current time, given as the local time described by its time zone and daylight
    /// flags.
    pub fn set_time(&mut self, time: &EfiTime) -> Result<()> {
        if !time.is_valid() {
            return Err(Error::InvalidParameter);
        }
        self.check_runtime(EFI_RT_SUPPORTED_SET_TIME)?;

        let epoch = time.to_epoch() - time.local_offset();
        let counter_seconds = (self.counter.nanoseconds() / NANOS_PER_SECOND) as i64;

        if self.config.virtual_rtc {
            self.rtc_offset = epoch;
            info!("Virtual RTC set to {epoch}");
        } else {
            self.write_rtc(epoch)?;
        }
        self.counter_offset = Some((epoch - counter_seconds) * NANOS_PER_SECOND as i64);
        Ok(())
    }

    /// Writes the given epoch time to the time registers, in the format the RTC is set to.
    fn write_rtc(&mut self, epoch: i64) -> Result<()> {
        let mut control = [0];
        self.io
            .read(RTC_CONTROL_ADDRESS, &mut control)
            .map_err(|e| {
                error!("Failed to read control register: {e}");
                Error::DeviceError
            })?;
        let control = Control::from_bits_retain(control[0]);
        if control.contains(Control::ST) {
            error!("RTC is stopped");
            return Err(Error::DeviceError);
        }
        if !self.config.cpu_has_rtc_control && control.contains(Control::TWO) {
            error!("CPU does not hold the RTC write ownership");
            return Err(Error::DeviceError);
        }

        let mut utc = EfiTime::default();
        utc.set_from_epoch(epoch);
        let year = utc
            .year
            .checked_sub(self.config.base_year)
            .filter(|&year| year < 100)
            .ok_or(Error::InvalidParameter)? as u8;

        let twenty_four_hour = control.contains(Control::HF);
        let hour = if twenty_four_hour {
            utc.hour
        } else {
            (utc.hour + 11) % 12 + 1
        };
        let mut fields = [utc.second, utc.minute, hour, utc.day, utc.month, year];
        if !control.contains(Control::DM) {
            for field in &mut fields {
                *field = decimal_to_bcd(*field);
            }
        }
        let [second, minute, mut hour, day, month, year] = fields;
        if !twenty_four_hour && utc.hour >= 12 {
            hour |= RTC_PM_BIT;
        }
        let weekday = (utc.weekday() + RTC_WDAY_OFFSET) % 7;

        // The alarm registers in between are read-only to the CPU.
        let registers: [u8; RTC_TIME_REGISTERS] =
            [second, 0, minute, 0, hour, 0, weekday, day, month, year];
        self.io.write(RTC_TIME_ADDRESS, &registers).map_err(|e| {
            error!("Failed to store time: {e}");
            Error::DeviceError
        })
    }

    /// The wakeup alarm can only be set by the BMC.
    pub fn get_wakeup_time(&mut self) -> Result<(bool, bool, EfiTime)> {
        Err(Error::Unsupported)
    }

    /// The wakeup alarm can only be set by the BMC.
    pub fn set_wakeup_time(&mut self, _enabled: bool, _time: Option<&EfiTime>) -> Result<()> {
        Err(Error::Unsupported)
    }
}

impl<I: RtcIo> NuvotonRtc<I, PerformanceCounterImpl> {
    /// Creates a driver with the platform's counter and RTC configuration.
    pub fn with_platform_config(io: I, stored_offset: Option<i64>) -> Self {
        Self::new(
            io,
            PlatformImpl::performance_counter(),
            PlatformImpl::RTC,
            stored_offset,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const CONFIG: RtcConfig = RtcConfig {
        base_year: 2000,
        virtual_rtc: false,
        cpu_has_rtc_control: false,
        build_epoch: 1_700_000_000,
    };

    struct FakeRtc {
        registers: [u8; 0x40],
        writes: Vec<(u8, Vec<u8>)>,
        fail: bool,
    }

    impl Default for FakeRtc {
        fn default() -> Self {
            Self {
                registers: [0; 0x40],
                writes: Vec::new(),
                fail: false,
            }
        }
    }

    impl RtcIo for FakeRtc {
        fn read(&mut self, register: u8, data: &mut [u8]) -> Result<()> {
            if self.fail {
                return Err(Error::NotReady);
            }
            let start = usize::from(register);
            data.copy_from_slice(&self.registers[start..start + data.len()]);
            Ok(())
        }

        fn write(&mut self, register: u8, data: &[u8]) -> Result<()> {
            if self.fail {
                return Err(Error::NotReady);
            }
            let start = usize::from(register);
            self.registers[start..start + data.len()].copy_from_slice(data);
            self.writes.push((register, data.to_vec()));
            Ok(())
        }
    }

    struct FakeCounter(Cell<u64>);

    impl PerformanceCounter for FakeCounter {
        fn nanoseconds(&self) -> u64 {
            self.0.get()
        }
    }

    fn rtc(registers: &[u8], config: RtcConfig) -> NuvotonRtc<FakeRtc, FakeCounter> {
        let mut io = FakeRtc::default();
        io.registers[..registers.len()].copy_from_slice(registers);
        NuvotonRtc::new(io, FakeCounter(Cell::new(0x2_1004_1055)), config, None)
    }

    fn time(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> EfiTime {
        EfiTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
            ..Default::default()
        }
    }

    #[test]
    fn epoch_conversion() {
        assert_eq!(time(1970, 1, 1, 0, 0, 0).to_epoch(), 0);
        assert_eq!(time(2022, 9, 15, 14, 50, 23).to_epoch(), 1_663_253_423);
        assert_eq!(time(2024, 2, 29, 0, 0, 0).to_epoch(), 1_709_164_800);

        let mut converted = EfiTime::default();
        converted.set_from_epoch(1_700_000_000);
        assert_eq!(converted, time(2023, 11, 14, 22, 13, 20));
        converted.set_from_epoch(1_709_164_800);
        assert_eq!(converted, time(2024, 2, 29, 0, 0, 0));

        assert_eq!(time(2022, 9, 15, 0, 0, 0).weekday(), 4);
        assert_eq!(time(1970, 1, 4, 0, 0, 0).weekday(), 0);
    }

    #[test]
    fn validity() {
        assert!(time(2022, 9, 15, 14, 50, 23).is_valid());
        assert!(time(2024, 2, 29, 0, 0, 0).is_valid());
        assert!(!time(2023, 2, 29, 0, 0, 0).is_valid());
        assert!(!time(2022, 13, 1, 0, 0, 0).is_valid());
        assert!(!time(1899, 12, 31, 0, 0, 0).is_valid());
        assert!(!time(2022, 9, 15, 24, 0, 0).is_valid());
        let mut zoned = time(2022, 9, 15, 0, 0, 0);
        zoned.time_zone = -1441;
        assert!(!zoned.is_valid());
        zoned.time_zone = -420;
        assert!(zoned.is_valid());
    }

    #[test]
    fn bcd() {
        assert_eq!(bcd_to_decimal(0x59), 59);
        assert_eq!(decimal_to_bcd(59), 0x59);
        assert_eq!(decimal_to_bcd(0), 0);
    }

    #[test]
    fn get_time_bcd_24_hour() {
        let mut rtc = rtc(
            &[0x39, 0, 0x20, 0, 0x23, 0, 0, 0x15, 0x09, 0x22, 0x20],
            CONFIG,
        );
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(
            now,
            EfiTime {
                nanosecond: (0x2_1004_1055u64 % NANOS_PER_SECOND) as u32,
                ..time(2022, 9, 15, 23, 20, 39)
            }
        );
        assert_eq!(rtc.capabilities().resolution, 1);
    }

    #[test]
    fn get_time_12_hour() {
        // 12 PM is noon.
        let mut rtc = rtc(&[0, 0, 0, 0, 0x92, 0, 2, 0x13, 0x09, 0x22, 0], CONFIG);
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!((now.day, now.hour, now.minute), (13, 12, 0));

        // 12 AM is midnight.
        let mut rtc = self::rtc(&[0, 0, 0, 0, 0x12, 0, 2, 0x13, 0x09, 0x22, 0], CONFIG);
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!((now.day, now.hour), (13, 0));
    }

    #[test]
    fn get_time_binary() {
        let mut rtc = rtc(&[59, 0, 30, 0, 21, 0, 0, 28, 2, 24, 0x60], CONFIG);
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(
            (now.year, now.month, now.day, now.hour, now.minute, now.second),
            (2024, 2, 28, 21, 30, 59)
        );
    }

    #[test]
    fn get_time_local() {
        let registers = [0x23, 0, 0x50, 0, 0x14, 0, 0, 0x15, 0x09, 0x22, 0x20];
        let mut rtc = rtc(&registers, CONFIG);
        let now = rtc.get_time(-420, Daylight::empty()).unwrap();
        assert_eq!((now.hour, now.minute, now.time_zone), (7, 50, -420));

        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::IN_DAYLIGHT)
            .unwrap();
        assert_eq!(now.hour, 15);
    }

    #[test]
    fn stopped_rtc() {
        let mut rtc = rtc(&[0, 0, 0, 0, 0x12, 0, 2, 0x13, 0x09, 0x22, 0xa0], CONFIG);
        assert_eq!(
            rtc.get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty()),
            Err(Error::DeviceError)
        );
        rtc.io.registers[usize::from(RTC_CONTROL_ADDRESS)] = 0x80;
        assert_eq!(
            rtc.set_time(&time(2022, 9, 15, 14, 50, 23)),
            Err(Error::DeviceError)
        );
        assert!(rtc.io.writes.is_empty());
    }

    #[test]
    fn read_failure() {
        let mut rtc = rtc(&[], CONFIG);
        rtc.io.fail = true;
        assert_eq!(
            rtc.get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty()),
            Err(Error::DeviceError)
        );
    }

    #[test]
    fn counter_refines_time() {
        let registers = [0x39, 0, 0x20, 0, 0x23, 0, 0, 0x15, 0x09, 0x22, 0x20];
        let mut rtc = rtc(&registers, CONFIG);
        let first = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();

        // The RTC has not ticked yet, but the counter has crossed into the next second.
        rtc.counter.0.set(rtc.counter.0.get() + 500_000_000);
        let second = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(second.to_epoch(), first.to_epoch() + 1);

        // Too far from the RTC, so the counter is resynchronised.
        rtc.counter.0.set(rtc.counter.0.get() + 10 * NANOS_PER_SECOND);
        let third = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(third.to_epoch(), first.to_epoch());
    }

    #[test]
    fn set_time_12_hour_bcd() {
        let mut rtc = rtc(&[], CONFIG);
        assert_eq!(rtc.set_time(&time(2022, 9, 15, 14, 50, 23)), Ok(()));
        assert_eq!(
            rtc.io.writes,
            [(
                RTC_TIME_ADDRESS,
                vec![0x23, 0, 0x50, 0, 0x82, 0, 0, 0x15, 0x09, 0x22]
            )]
        );

        rtc.io.writes.clear();
        let mut local = time(2022, 2, 10, 7, 50, 23);
        local.time_zone = -420;
        assert_eq!(rtc.set_time(&local), Ok(()));
        assert_eq!(
            rtc.io.writes,
            [(
                RTC_TIME_ADDRESS,
                vec![0x23, 0, 0x50, 0, 0x82, 0, 0, 0x10, 0x02, 0x22]
            )]
        );
    }

    #[test]
    fn set_time_24_hour_binary() {
        let mut control = [0; 11];
        control[usize::from(RTC_CONTROL_ADDRESS)] = 0x60;
        let mut rtc = rtc(&control, CONFIG);
        assert_eq!(rtc.set_time(&time(2024, 2, 29, 0, 5, 9)), Ok(()));
        // Thursday.
        assert_eq!(
            rtc.io.writes,
            [(RTC_TIME_ADDRESS, vec![9, 0, 5, 0, 0, 0, 0, 29, 2, 24])]
        );
    }

    #[test]
    fn set_time_then_get() {
        let mut control = [0; 11];
        control[usize::from(RTC_CONTROL_ADDRESS)] = 0x20;
        let mut rtc = rtc(&control, CONFIG);
        let set = time(2022, 9, 15, 14, 50, 23);
        assert_eq!(rtc.set_time(&set), Ok(()));
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(now.to_epoch(), set.to_epoch());
    }

    #[test]
    fn write_ownership() {
        let mut control = [0; 11];
        control[usize::from(RTC_CONTROL_ADDRESS)] = 0x01;
        let mut rtc = rtc(&control, CONFIG);
        assert_eq!(
            rtc.set_time(&time(2022, 9, 15, 14, 50, 23)),
            Err(Error::DeviceError)
        );
        assert!(rtc.io.writes.is_empty());

        let mut rtc = self::rtc(
            &control,
            RtcConfig {
                cpu_has_rtc_control: true,
                ..CONFIG
            },
        );
        assert_eq!(rtc.set_time(&time(2022, 9, 15, 14, 50, 23)), Ok(()));
    }

    #[test]
    fn set_time_out_of_range() {
        let mut rtc = rtc(&[], CONFIG);
        assert_eq!(
            rtc.set_time(&time(2022, 2, 30, 0, 0, 0)),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            rtc.set_time(&time(1999, 12, 31, 0, 0, 0)),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            rtc.set_time(&time(2100, 1, 1, 0, 0, 0)),
            Err(Error::InvalidParameter)
        );
        assert!(rtc.io.writes.is_empty());
    }

    #[test]
    fn configure() {
        let mut rtc = rtc(&[], CONFIG);
        rtc.configure();
        assert!(rtc.io.writes.is_empty());

        let mut rtc = self::rtc(
            &[],
            RtcConfig {
                cpu_has_rtc_control: true,
                ..CONFIG
            },
        );
        rtc.configure();
        assert_eq!(
            rtc.io.writes,
            [
                (RTC_CONTROL_ADDRESS, vec![0x20, 0x00]),
                (RTC_PRIMARY_ACCESS_ADDRESS, vec![0x01]),
            ]
        );
    }

    #[test]
    fn virtual_rtc() {
        let config = RtcConfig {
            virtual_rtc: true,
            ..CONFIG
        };
        let mut rtc = rtc(&[], config);
        rtc.io.fail = true;
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(now.to_epoch(), CONFIG.build_epoch);

        rtc.counter.0.set(rtc.counter.0.get() + 100 * NANOS_PER_SECOND);
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(now.to_epoch(), CONFIG.build_epoch + 100);

        let mut local = EfiTime::default();
        local.set_from_epoch(now.to_epoch() - 600);
        assert_eq!(rtc.set_time(&local), Ok(()));
        assert_eq!(rtc.rtc_offset(), CONFIG.build_epoch + 100 - 600);

        rtc.counter.0.set(rtc.counter.0.get() + 500 * NANOS_PER_SECOND);
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(now.to_epoch(), CONFIG.build_epoch + 100 - 600 + 500);
    }

    #[test]
    fn stored_virtual_offset() {
        let config = RtcConfig {
            virtual_rtc: true,
            ..CONFIG
        };
        let mut rtc = NuvotonRtc::new(
            FakeRtc::default(),
            FakeCounter(Cell::new(0)),
            config,
            Some(1_663_253_423),
        );
        let now = rtc
            .get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
            .unwrap();
        assert_eq!(now, time(2022, 9, 15, 14, 50, 23));
    }

    #[test]
    fn runtime_services() {
        let registers = [0x39, 0, 0x20, 0, 0x23, 0, 0, 0x15, 0x09, 0x22, 0x20];
        let mut rtc = rtc(&registers, CONFIG);
        rtc.exit_boot_services(EFI_RT_SUPPORTED_GET_TIME);
        assert!(
            rtc.get_time(EFI_UNSPECIFIED_TIMEZONE, Daylight::empty())
                .is_ok()
        );
        assert_eq!(
            rtc.set_time(&time(2022, 9, 15, 14, 50, 23)),
            Err(Error::Unsupported)
        );
    }

    #[test]
    fn platform_config() {
        let rtc = NuvotonRtc::with_platform_config(FakeRtc::default(), None);
        assert_eq!(rtc.config, PlatformImpl::RTC);
        assert_eq!(rtc.rtc_offset(), PlatformImpl::RTC.build_epoch);
    }

    #[test]
    fn wakeup_is_unsupported() {
        let mut rtc = rtc(&[], CONFIG);
        assert_eq!(rtc.get_wakeup_time(), Err(Error::Unsupported));
        assert_eq!(rtc.set_wakeup_time(false, None), Err(Error::Unsupported));
    }
}
