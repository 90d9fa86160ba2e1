// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Platform firmware services for Tegra server SoCs.
//!
//! The centre of the crate is the configuration manager data repository in [`cm`], an
//! append-only, token-indexed store of hardware description objects which the ACPI parsers in
//! [`acpi`] populate for the table generators. Around it sit the leaf drivers: board EEPROM,
//! SCMI clocks over BPMP IPC, FF-A and MM communication with the secure world, GPIO and the
//! Nuvoton real-time clock.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod acpi;
pub mod board;
pub mod bpmp;
pub mod cm;
mod debug;
pub mod eeprom;
pub mod error;
pub mod ffa;
pub mod gpio;
pub mod logger;
pub mod mm;
pub mod numa;
pub mod platform;
pub mod rtc;
pub mod smccc;

pub use error::{Error, Result};
