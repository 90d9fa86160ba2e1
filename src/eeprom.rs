// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Board identification EEPROM.
//!
//! Each module carries a 256-byte EEPROM describing the board: its part number, serial number
//! and the MAC addresses assigned to it. The last byte is a CRC-8 over the rest.

use crate::{
    board::{ChipId, PlatformType},
    error::{Error, Result},
};
use arrayvec::ArrayString;
use log::{debug, error};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, little_endian::U16};

/// Size of the EEPROM image.
pub const EEPROM_DATA_SIZE: usize = 256;

/// Layout version of T194 EEPROMs.
pub const T194_EEPROM_VERSION: u16 = 1;

/// Layout version of T234 EEPROMs.
pub const T234_EEPROM_VERSION: u16 = 2;

const CUSTOMER_BLOCK_SIGNATURE: [u8; 4] = *b"NVCB";
const CUSTOMER_TYPE_SIGNATURE: [u8; 2] = *b"M1";

/// Polynomial of CRC-8/MAXIM, bit reversed.
const CRC8_MAXIM_POLYNOMIAL: u8 = 0x8c;

/// Length of a MAC address.
pub const MAC_ADDRESS_LEN: usize = 6;

/// Length of the board id within the part number.
pub const BOARD_ID_LEN: usize = 4;

/// Length of the part number.
pub const PRODUCT_ID_LEN: usize = 30;

/// Length of the serial number.
pub const SERIAL_NUMBER_LEN: usize = 15;

/// Access to an I2C device.
pub trait I2cIo {
    /// Writes `write` to the device then reads `read.len()` bytes back, as one transaction.
    fn write_read(&mut self, write: &[u8], read: &mut [u8]) -> Result<()>;
}

/// Computes the CRC-8/MAXIM of the given bytes.
pub fn crc8_maxim(data: &[u8]) -> u8 {
    data.iter().fold(0, |crc, &byte| {
        let mut crc = crc ^ byte;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC8_MAXIM_POLYNOMIAL
            } else {
                crc >> 1
            };
        }
        crc
    })
}

/// The product part number, e.g. `699-13668-0000-300 A.0`.
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct PartNumber {
    leading: [u8; 3],
    separator0: u8,
    class: u8,
    id: [u8; BOARD_ID_LEN],
    separator1: u8,
    sku: [u8; 4],
    separator2: u8,
    fab: [u8; 3],
    separator3: u8,
    revision: u8,
    separator4: u8,
    ending: u8,
    pad: [u8; 8],
}

/// Customer-programmable MAC addresses.
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
struct CustomerBlock {
    block_signature: [u8; 4],
    block_length: U16,
    type_signature: [u8; 2],
    version: U16,
    wifi_mac_address: [u8; MAC_ADDRESS_LEN],
    bt_mac_address: [u8; MAC_ADDRESS_LEN],
    ethernet_mac_address: [u8; MAC_ADDRESS_LEN],
}

impl CustomerBlock {
    fn is_valid(&self) -> bool {
        self.block_signature == CUSTOMER_BLOCK_SIGNATURE
            && self.type_signature == CUSTOMER_TYPE_SIGNATURE
    }
}

/// The fields shared by the T194 and T234 layouts, up to the customer block.
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
struct CommonHeader {
    version: U16,
    size: U16,
    board_number: U16,
    sku: U16,
    fab: u8,
    revision: u8,
    minor_revision: u8,
    memory_type: u8,
    power_config: u8,
    misc_config: u8,
    modem_config: u8,
    touch_config: u8,
    display_config: u8,
    rework_level: u8,
    reserved0: u8,
    /// Only meaningful on T234, reserved on T194.
    num_ethernet_macs: u8,
    part_number: PartNumber,
    wifi_mac_address: [u8; MAC_ADDRESS_LEN],
    bt_mac_address: [u8; MAC_ADDRESS_LEN],
    sec_wifi_mac_address: [u8; MAC_ADDRESS_LEN],
    ethernet_mac_address: [u8; MAC_ADDRESS_LEN],
    serial_number: [u8; SERIAL_NUMBER_LEN],
    reserved1: [u8; 61],
    customer: CustomerBlock,
}

/// Layout of a T194 EEPROM.
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
struct T194EepromData {
    common: CommonHeader,
    reserved2: [u8; 77],
    checksum: u8,
}

/// Layout of a T234 EEPROM.
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
struct T234EepromData {
    common: CommonHeader,
    customer_num_ethernet_macs: u8,
    reserved2: [u8; 76],
    checksum: u8,
}

/// Offset of `reserved2` in the T194 layout; the size field must cover everything before it.
const T194_MIN_SIZE: u16 = 178;
/// Offset of `reserved2` in the T234 layout.
const T234_MIN_SIZE: u16 = 179;

/// Checks the version, size and checksum of an EEPROM image for the given chip.
pub fn validate(data: &[u8; EEPROM_DATA_SIZE], chip_id: ChipId) -> Result<()> {
    let (version, min_size, checksum) = match chip_id {
        ChipId::T194 => {
            let eeprom = T194EepromData::ref_from_bytes(data).map_err(|_| Error::BadBufferSize)?;
            (T194_EEPROM_VERSION, T194_MIN_SIZE, eeprom.checksum)
        }
        ChipId::T234 => {
            let eeprom = T234EepromData::ref_from_bytes(data).map_err(|_| Error::BadBufferSize)?;
            (T234_EEPROM_VERSION, T234_MIN_SIZE, eeprom.checksum)
        }
        _ => return Err(Error::Unsupported),
    };
    let common = CommonHeader::ref_from_prefix(data)
        .map_err(|_| Error::BadBufferSize)?
        .0;
    if common.version.get() != version || common.size.get() <= min_size {
        error!(
            "Invalid size/version in eeprom {:#x} {:#x}",
            common.version.get(),
            common.size.get()
        );
        return Err(Error::DeviceError);
    }
    let expected = crc8_maxim(&data[..EEPROM_DATA_SIZE - 1]);
    if expected != checksum {
        error!("CRC mismatch, expected {expected:#04x} got {checksum:#04x}");
        return Err(Error::DeviceError);
    }
    Ok(())
}

/// Reads the EEPROM image over I2C.
///
/// On silicon the image is validated for the chip. Other platforms have no real EEPROM; the
/// device there provides generated data which is accepted as is.
pub fn read_eeprom(
    i2c: &mut impl I2cIo,
    chip_id: ChipId,
    platform_type: PlatformType,
) -> Result<[u8; EEPROM_DATA_SIZE]> {
    let mut data = [0; EEPROM_DATA_SIZE];
    i2c.write_read(&[0], &mut data).inspect_err(|e| {
        error!("Failed to read eeprom ({e})");
    })?;
    if platform_type == PlatformType::Silicon {
        validate(&data, chip_id).inspect_err(|e| {
            error!("Eeprom data validation failed ({e})");
        })?;
    } else {
        debug!("Using generated eeprom data on {platform_type:?}");
    }
    Ok(data)
}

/// Identification of a board, as read from its EEPROM.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BoardInfo {
    /// The board id, e.g. `3668`.
    pub board_id: ArrayString<BOARD_ID_LEN>,
    /// The full part number.
    pub product_id: ArrayString<PRODUCT_ID_LEN>,
    /// The serial number.
    pub serial_number: ArrayString<SERIAL_NUMBER_LEN>,
    /// The first ethernet MAC address.
    pub mac_address: [u8; MAC_ADDRESS_LEN],
    /// How many consecutive MAC addresses are assigned, starting with `mac_address`.
    pub num_macs: u8,
}

/// Converts a NUL padded string field, dropping any bytes which are not ASCII.
fn ascii_field<const N: usize>(bytes: &[u8]) -> ArrayString<N> {
    let mut field = ArrayString::new();
    for &byte in bytes.iter().take_while(|&&byte| byte != 0) {
        if byte.is_ascii() && field.try_push(char::from(byte)).is_err() {
            break;
        }
    }
    field
}

/// Extracts the board identification from an EEPROM image.
///
/// The MAC addresses in the customer block take precedence over the factory ones when the
/// customer block is present.
pub fn board_info(data: &[u8; EEPROM_DATA_SIZE], chip_id: ChipId) -> Result<BoardInfo> {
    let (common, customer_num_macs) = match chip_id {
        ChipId::T194 => {
            let eeprom = T194EepromData::ref_from_bytes(data).map_err(|_| Error::BadBufferSize)?;
            (&eeprom.common, 1)
        }
        ChipId::T234 => {
            let eeprom = T234EepromData::ref_from_bytes(data).map_err(|_| Error::BadBufferSize)?;
            (&eeprom.common, eeprom.customer_num_ethernet_macs)
        }
        _ => return Err(Error::Unsupported),
    };

    let (mac_address, num_macs) = if common.customer.is_valid() {
        (common.customer.ethernet_mac_address, customer_num_macs)
    } else if chip_id == ChipId::T194 {
        (common.ethernet_mac_address, 1)
    } else {
        (common.ethernet_mac_address, common.num_ethernet_macs)
    };

    Ok(BoardInfo {
        board_id: ascii_field(&common.part_number.id),
        product_id: ascii_field(common.part_number.as_bytes()),
        serial_number: ascii_field(&common.serial_number),
        mac_address,
        num_macs,
    })
}
