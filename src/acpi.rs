// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! ACPI table layouts and the parsers which describe ACPI tables to the configuration manager.

pub mod hmat;
pub mod srat;
pub mod table_list;

use crate::error::{Error, Result};
use core::fmt::{self, Debug, Formatter};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    little_endian::{U32, U64},
};

/// Offset of the checksum byte in a description header.
const CHECKSUM_OFFSET: usize = 9;

/// Offset of the OEM ID in a description header.
const OEM_ID_OFFSET: usize = 10;

/// Identity of the firmware vendor, written into every generated table header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AcpiOemInfo {
    /// OEM ID.
    pub oem_id: [u8; 6],
    /// OEM table ID.
    pub oem_table_id: u64,
    /// OEM revision.
    pub oem_revision: u32,
    /// Vendor ID of the utility that created the table.
    pub creator_id: u32,
    /// Revision of the utility that created the table.
    pub creator_revision: u32,
}

/// The header common to all ACPI description tables.
#[derive(Clone, Copy, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct AcpiDescriptionHeader {
    /// The table signature.
    pub signature: [u8; 4],
    /// Length of the whole table in bytes, including the header.
    pub length: U32,
    /// Table revision.
    pub revision: u8,
    /// Makes the sum of all bytes of the table zero.
    pub checksum: u8,
    /// OEM ID.
    pub oem_id: [u8; 6],
    /// OEM table ID.
    pub oem_table_id: U64,
    /// OEM revision.
    pub oem_revision: U32,
    /// Vendor ID of the utility that created the table.
    pub creator_id: U32,
    /// Revision of the utility that created the table.
    pub creator_revision: U32,
}

impl AcpiDescriptionHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = size_of::<Self>();

    /// Creates a header for an otherwise empty table, with a zero checksum.
    pub fn new(signature: [u8; 4], revision: u8, oem: &AcpiOemInfo) -> Self {
        Self {
            signature,
            length: U32::new(Self::SIZE as u32),
            revision,
            checksum: 0,
            oem_id: oem.oem_id,
            oem_table_id: U64::new(oem.oem_table_id),
            oem_revision: U32::new(oem.oem_revision),
            creator_id: U32::new(oem.creator_id),
            creator_revision: U32::new(oem.creator_revision),
        }
    }
}

impl Debug for AcpiDescriptionHeader {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("AcpiDescriptionHeader")
            .field("signature", &Signature(self.signature))
            .field("length", &self.length.get())
            .field("revision", &self.revision)
            .field("checksum", &self.checksum)
            .field("oem_id", &self.oem_id)
            .field("oem_table_id", &self.oem_table_id.get())
            .field("oem_revision", &self.oem_revision.get())
            .finish_non_exhaustive()
    }
}

/// A table signature, displayed as ASCII.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Signature(pub [u8; 4]);

impl Signature {
    /// Returns the signature in the little-endian u32 form used by the table list.
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for &byte in &self.0 {
            write!(f, "{}", char::from(byte))?;
        }
        Ok(())
    }
}

/// Returns the byte which, stored in the checksum field, makes `table` sum to zero.
///
/// The current value of the checksum field is ignored.
pub fn compute_checksum(table: &[u8]) -> u8 {
    let sum = table
        .iter()
        .enumerate()
        .filter(|&(index, _)| index != CHECKSUM_OFFSET)
        .fold(0u8, |sum, (_, &byte)| sum.wrapping_add(byte));
    sum.wrapping_neg()
}

/// Overwrites the OEM ID of a complete table and fixes up its checksum.
pub fn patch_oem_id(table: &mut [u8], oem_id: &[u8; 6]) -> Result<()> {
    if table.len() < AcpiDescriptionHeader::SIZE {
        return Err(Error::InvalidParameter);
    }
    table[OEM_ID_OFFSET..OEM_ID_OFFSET + oem_id.len()].copy_from_slice(oem_id);
    table[CHECKSUM_OFFSET] = compute_checksum(table);
    Ok(())
}

/// Builds AML for the SSDT which collects generated device descriptions.
pub trait AmlGenerator {
    /// Starts a new table with the given header.
    fn initialize_table(&mut self, header: &AcpiDescriptionHeader) -> Result<()>;

    /// Opens a new scope with the given name path.
    fn start_scope(&mut self, name: &str) -> Result<()>;
}

/// Identifies the generator which turns configuration manager objects into a table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct TableGeneratorId(pub u32);

impl TableGeneratorId {
    const TYPE_SHIFT: u32 = 16;
    const ACPI_TYPE: u32 = 1;

    /// Tables passed through unchanged.
    pub const RAW: Self = Self::std_acpi(1);
    /// Fixed ACPI description table.
    pub const FADT: Self = Self::std_acpi(2);
    /// Multiple APIC description table.
    pub const MADT: Self = Self::std_acpi(3);
    /// Generic timer description table.
    pub const GTDT: Self = Self::std_acpi(4);
    /// Debug port table 2.
    pub const DBG2: Self = Self::std_acpi(5);
    /// Serial port console redirection table.
    pub const SPCR: Self = Self::std_acpi(6);
    /// PCI memory-mapped configuration table.
    pub const MCFG: Self = Self::std_acpi(7);
    /// IO remapping table.
    pub const IORT: Self = Self::std_acpi(8);
    /// Processor properties topology table.
    pub const PPTT: Self = Self::std_acpi(9);
    /// System resource affinity table.
    pub const SRAT: Self = Self::std_acpi(10);
    /// SSDT describing the CPU topology.
    pub const SSDT_CPU_TOPOLOGY: Self = Self::std_acpi(13);
    /// Differentiated system description table, from a patched AML blob.
    pub const DSDT: Self = Self::std_acpi(17);
    /// Secondary system description table, from a patched AML blob.
    pub const SSDT: Self = Self::std_acpi(18);

    /// Creates the ID of a standard-namespace ACPI table generator.
    pub const fn std_acpi(id: u32) -> Self {
        Self((Self::ACPI_TYPE << Self::TYPE_SHIFT) | id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloc::{string::String, vec, vec::Vec};

    pub(crate) const TEST_OEM: AcpiOemInfo = AcpiOemInfo {
        oem_id: *b"NVIDIA",
        oem_table_id: 0x2020_2020_3030_3548,
        oem_revision: 0x0000_0001,
        creator_id: 0x4149_564e,
        creator_revision: 0x0100_0013,
    };

    #[derive(Default)]
    pub(crate) struct FakeAmlGenerator {
        pub header: Option<AcpiDescriptionHeader>,
        pub scopes: Vec<String>,
    }

    impl AmlGenerator for FakeAmlGenerator {
        fn initialize_table(&mut self, header: &AcpiDescriptionHeader) -> Result<()> {
            self.header = Some(*header);
            Ok(())
        }

        fn start_scope(&mut self, name: &str) -> Result<()> {
            self.scopes.push(name.into());
            Ok(())
        }
    }

    /// Returns a minimal table with the given signature and a valid checksum.
    pub(crate) fn empty_table(signature: [u8; 4]) -> Vec<u8> {
        let mut header = AcpiDescriptionHeader::new(signature, 2, &TEST_OEM);
        header.oem_id = *b"OLDOEM";
        let mut table = header.as_bytes().to_vec();
        table.extend_from_slice(&[0xa5, 0x10, 0x00, 0x5b]);
        let length = table.len() as u32;
        table[4..8].copy_from_slice(&length.to_le_bytes());
        table[CHECKSUM_OFFSET] = compute_checksum(&table);
        table
    }

    fn sum(table: &[u8]) -> u8 {
        table.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
    }

    #[test]
    fn header_layout() {
        let header = AcpiDescriptionHeader::new(*b"SSDT", 2, &TEST_OEM);
        let bytes = header.as_bytes();
        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[0..4], b"SSDT");
        assert_eq!(&bytes[4..8], &[36, 0, 0, 0]);
        assert_eq!(bytes[8], 2);
        assert_eq!(&bytes[10..16], b"NVIDIA");
        assert_eq!(&bytes[16..24], &TEST_OEM.oem_table_id.to_le_bytes());
        assert_eq!(&bytes[28..32], &TEST_OEM.creator_id.to_le_bytes());
    }

    #[test]
    fn checksum_makes_sum_zero() {
        let mut table = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 0x77, 11, 12];
        table[CHECKSUM_OFFSET] = compute_checksum(&table);
        assert_eq!(sum(&table), 0);
    }

    #[test]
    fn patch_oem_id_keeps_checksum_valid() {
        let mut table = empty_table(*b"DSDT");
        assert_eq!(sum(&table), 0);
        patch_oem_id(&mut table, b"NVIDIA").unwrap();
        assert_eq!(&table[10..16], b"NVIDIA");
        assert_eq!(sum(&table), 0);

        assert_eq!(
            patch_oem_id(&mut [0; 20], b"NVIDIA"),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn signature_forms() {
        assert_eq!(Signature(*b"FACP").as_u32(), 0x5043_4146);
        assert_eq!(alloc::format!("{:?}", Signature(*b"HMAT")), "HMAT");
        assert_eq!(TableGeneratorId::RAW.0, 0x0001_0001);
        assert_eq!(TableGeneratorId::SRAT.0, 0x0001_000a);
    }
}
