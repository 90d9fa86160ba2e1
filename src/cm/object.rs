// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Object identifiers, tokens and the fixed-layout objects stored in the repository.

use crate::error::{Error, Result};
use alloc::vec::Vec;
use bitflags::bitflags;
use core::{
    fmt::{self, Debug, Display, Formatter},
    mem::size_of,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

const NAMESPACE_SHIFT: u32 = 28;
const OBJECT_MASK: u32 = 0x0fff_ffff;

/// The namespace an object identifier belongs to.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum ObjectNamespace {
    /// Objects common to all architectures.
    Standard = 0,
    /// Arm architecture objects.
    Arm = 1,
    /// OEM-defined objects.
    Oem = 8,
}

/// A configuration manager object identifier: a namespace and an object number.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct CmObjectId(pub u32);

impl CmObjectId {
    /// Configuration manager revision and OEM identity.
    pub const STD_CFG_MGR_INFO: Self = Self::new(ObjectNamespace::Standard, 0);
    /// List of ACPI tables to install, as [`AcpiTableInfo`] elements.
    pub const STD_ACPI_TABLE_LIST: Self = Self::new(ObjectNamespace::Standard, 1);
    /// List of SMBIOS tables to install.
    pub const STD_SMBIOS_TABLE_LIST: Self = Self::new(ObjectNamespace::Standard, 2);

    /// Boot architecture flags.
    pub const ARM_BOOT_ARCH_INFO: Self = Self::new(ObjectNamespace::Arm, 1);
    /// GIC CPU interface information.
    pub const ARM_GICC_INFO: Self = Self::new(ObjectNamespace::Arm, 4);
    /// Serial console port information.
    pub const ARM_SERIAL_CONSOLE_PORT_INFO: Self = Self::new(ObjectNamespace::Arm, 9);
    /// Generic timer information.
    pub const ARM_GENERIC_TIMER_INFO: Self = Self::new(ObjectNamespace::Arm, 11);
    /// Processor hierarchy node.
    pub const ARM_PROC_HIERARCHY_INFO: Self = Self::new(ObjectNamespace::Arm, 27);
    /// Cache description.
    pub const ARM_CACHE_INFO: Self = Self::new(ObjectNamespace::Arm, 28);
    /// A list of tokens referring to other objects.
    pub const ARM_CM_REF: Self = Self::new(ObjectNamespace::Arm, 30);
    /// Memory affinity, as [`MemoryAffinityInfo`] elements.
    pub const ARM_MEMORY_AFFINITY_INFO: Self = Self::new(ObjectNamespace::Arm, 31);
    /// Memory range, as [`MemoryRangeDescriptor`] elements.
    pub const ARM_MEMORY_RANGE_DESCRIPTOR: Self = Self::new(ObjectNamespace::Arm, 41);
    /// Interrupt, as [`GenericInterrupt`] elements.
    pub const ARM_GENERIC_INTERRUPT: Self = Self::new(ObjectNamespace::Arm, 49);

    /// Raw ACPI table bytes referenced from an [`AcpiTableInfo`].
    pub const OEM_RAW_TABLE_DATA: Self = Self::new(ObjectNamespace::Oem, 1);

    /// Creates a new object identifier from its components.
    pub const fn new(namespace: ObjectNamespace, object: u32) -> Self {
        Self(((namespace as u32) << NAMESPACE_SHIFT) | (object & OBJECT_MASK))
    }

    /// Returns the namespace of the identifier, if it is a known one.
    pub fn namespace(self) -> Option<ObjectNamespace> {
        ObjectNamespace::try_from(self.0 >> NAMESPACE_SHIFT).ok()
    }

    /// Returns the object number within the namespace.
    pub const fn object(self) -> u32 {
        self.0 & OBJECT_MASK
    }
}

impl Display for CmObjectId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl Debug for CmObjectId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:#010x} ({:?} {})", self.0, self.namespace(), self.object())
    }
}

/// A handle to a repository entry or to one element of an entry.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct CmToken(pub u64);

impl CmToken {
    /// The token which refers to nothing. It is never allocated.
    pub const NULL: Self = Self(0);

    /// Returns whether this is the null token.
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }
}

impl Display for CmToken {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A borrowed view of an object or of a group of elements of the same object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CmObjectDescriptor<'a> {
    /// The identifier of the object.
    pub object_id: CmObjectId,
    /// The raw bytes of all elements.
    pub data: &'a [u8],
    /// The number of elements in `data`.
    pub count: u32,
}

impl<'a> CmObjectDescriptor<'a> {
    /// Creates a descriptor for `count` elements laid out back to back in `data`.
    pub fn new(object_id: CmObjectId, data: &'a [u8], count: u32) -> Self {
        Self {
            object_id,
            data,
            count,
        }
    }

    /// Returns the size in bytes of all elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Parses the data as an array of fixed-layout elements.
    pub fn elements<T: FromBytes>(&self) -> Result<Vec<T>> {
        read_objects(self.data)
    }
}

/// Parses `data` as a packed array of `T`.
///
/// Fails if the length of `data` is not a multiple of the size of `T`.
pub fn read_objects<T: FromBytes>(data: &[u8]) -> Result<Vec<T>> {
    let size = size_of::<T>();
    if size == 0 || data.len() % size != 0 {
        return Err(Error::InvalidParameter);
    }
    data.chunks_exact(size)
        .map(|chunk| T::read_from_bytes(chunk).map_err(|_| Error::InvalidParameter))
        .collect()
}

/// Serialises a token list the way a CmRef object stores it.
pub fn tokens_as_bytes(tokens: &[CmToken]) -> Vec<u8> {
    tokens.iter().flat_map(|token| token.0.to_le_bytes()).collect()
}

bitflags! {
    /// Flags of a memory affinity structure.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct MemoryAffinityFlags: u32 {
        /// The memory range is usable.
        const ENABLED = 1 << 0;
        /// The memory range may be hot-added.
        const HOT_PLUGGABLE = 1 << 1;
        /// The memory range is non-volatile.
        const NON_VOLATILE = 1 << 2;
    }
}

/// Memory affinity of a physical address range.
#[derive(Clone, Copy, Debug, Default, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct MemoryAffinityInfo {
    /// The proximity domain the range belongs to.
    pub proximity_domain: u32,
    /// Reserved, must be zero.
    pub reserved0: u32,
    /// Base physical address of the range.
    pub base_address: u64,
    /// Length of the range in bytes.
    pub length: u64,
    /// [`MemoryAffinityFlags`] bits.
    pub flags: u32,
    /// Reserved, must be zero.
    pub reserved1: u32,
}

impl MemoryAffinityInfo {
    /// Creates a memory affinity entry.
    pub const fn new(
        proximity_domain: u32,
        base_address: u64,
        length: u64,
        flags: MemoryAffinityFlags,
    ) -> Self {
        Self {
            proximity_domain,
            reserved0: 0,
            base_address,
            length,
            flags: flags.bits(),
            reserved1: 0,
        }
    }
}

/// A physical address range.
#[derive(Clone, Copy, Debug, Default, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct MemoryRangeDescriptor {
    /// Base physical address.
    pub base_address: u64,
    /// Length in bytes.
    pub length: u64,
}

/// An interrupt as described to ACPI.
#[derive(Clone, Copy, Debug, Default, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct GenericInterrupt {
    /// The global interrupt number.
    pub interrupt: u32,
    /// Bit 0 set for edge triggered, bit 1 set for active low.
    pub flags: u32,
}

/// One element of the ACPI table list.
///
/// Padding is explicit, so the layout matches the C structure with natural alignment.
#[derive(Clone, Copy, Debug, Default, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct AcpiTableInfo {
    /// The table signature, as a little-endian u32.
    pub signature: u32,
    /// The table revision.
    pub revision: u8,
    /// Reserved, must be zero.
    pub reserved0: [u8; 3],
    /// Identifier of the generator which builds the table.
    pub generator_id: u32,
    /// Reserved, must be zero.
    pub reserved1: u32,
    /// Token of an [`CmObjectId::OEM_RAW_TABLE_DATA`] entry holding the table bytes, or 0.
    pub table_data: u64,
    /// The OEM table ID to put in the header.
    pub oem_table_id: u64,
    /// The OEM revision to put in the header.
    pub oem_revision: u32,
    /// The table minor revision, for tables that have one.
    pub minor_revision: u8,
    /// Reserved, must be zero.
    pub reserved2: [u8; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_components() {
        assert_eq!(CmObjectId::STD_ACPI_TABLE_LIST.0, 0x0000_0001);
        assert_eq!(CmObjectId::ARM_CM_REF.0, 0x1000_001e);
        assert_eq!(CmObjectId::OEM_RAW_TABLE_DATA.0, 0x8000_0001);
        assert_eq!(
            CmObjectId::ARM_MEMORY_AFFINITY_INFO.namespace(),
            Some(ObjectNamespace::Arm)
        );
        assert_eq!(CmObjectId::ARM_MEMORY_AFFINITY_INFO.object(), 31);
        assert_eq!(CmObjectId(0x3000_0000).namespace(), None);
    }

    #[test]
    fn fixed_layouts() {
        assert_eq!(size_of::<MemoryAffinityInfo>(), 32);
        assert_eq!(size_of::<MemoryRangeDescriptor>(), 16);
        assert_eq!(size_of::<GenericInterrupt>(), 8);
        assert_eq!(size_of::<AcpiTableInfo>(), 40);
    }

    #[test]
    fn acpi_table_info_field_offsets() {
        let info = AcpiTableInfo {
            signature: u32::from_le_bytes(*b"HMAT"),
            revision: 2,
            generator_id: 0x1234,
            table_data: 0x55,
            oem_table_id: 0x0102_0304_0506_0708,
            oem_revision: 7,
            minor_revision: 1,
            ..Default::default()
        };
        let bytes = info.as_bytes();
        assert_eq!(bytes[0..4], *b"HMAT");
        assert_eq!(bytes[4], 2);
        assert_eq!(bytes[8..12], 0x1234u32.to_le_bytes());
        assert_eq!(bytes[16..24], 0x55u64.to_le_bytes());
        assert_eq!(bytes[24..32], 0x0102_0304_0506_0708u64.to_le_bytes());
        assert_eq!(bytes[32..36], 7u32.to_le_bytes());
        assert_eq!(bytes[36], 1);
    }

    #[test]
    fn read_packed_objects() {
        let ranges = [
            MemoryRangeDescriptor {
                base_address: 0x8000_0000,
                length: 0x1000,
            },
            MemoryRangeDescriptor {
                base_address: 0x9000_0000,
                length: 0x2000,
            },
        ];
        let bytes = ranges.as_bytes();
        // Deliberately misalign the input.
        let mut shifted = alloc::vec![0u8];
        shifted.extend_from_slice(bytes);
        assert_eq!(read_objects::<MemoryRangeDescriptor>(&shifted[1..]), Ok(ranges.to_vec()));
        assert_eq!(
            read_objects::<MemoryRangeDescriptor>(&bytes[1..]),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn token_bytes() {
        assert_eq!(
            tokens_as_bytes(&[CmToken(1), CmToken(0x0102)]),
            [1, 0, 0, 0, 0, 0, 0, 0, 2, 1, 0, 0, 0, 0, 0, 0]
        );
        assert!(CmToken::NULL.is_null());
        assert!(!CmToken(3).is_null());
    }
}
