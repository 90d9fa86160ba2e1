// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Creation of the memory range and interrupt objects which describe a device's resources.

use super::{
    desc::{add_multiple_cm_obj_get_tokens, create_cm_obj_desc},
    object::{CmObjectId, CmToken, GenericInterrupt, MemoryRangeDescriptor},
    repository::CmRepository,
};
use crate::{
    board::MemoryRegion,
    error::{Error, Result},
};
use alloc::vec::Vec;
use bitflags::bitflags;
use zerocopy::IntoBytes;

/// ACPI interrupt number of SPI 0.
const SPI_BASE: u32 = 32;
/// ACPI interrupt number of PPI 0.
const PPI_BASE: u32 = 16;

/// The kind of a GIC interrupt as described by the device tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterruptType {
    /// Shared peripheral interrupt.
    Spi,
    /// Private peripheral interrupt.
    Ppi,
}

/// Trigger of a device tree interrupt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterruptTrigger {
    /// Rising edge.
    LoToHiEdge,
    /// Falling edge.
    HiToLoEdge,
    /// Active high level.
    HiLevel,
    /// Active low level.
    LoLevel,
}

/// An interrupt as found in a device tree node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InterruptData {
    /// SPI or PPI.
    pub interrupt_type: InterruptType,
    /// Interrupt number relative to the first interrupt of its type.
    pub number: u32,
    /// How the interrupt is triggered.
    pub trigger: InterruptTrigger,
}

bitflags! {
    /// Flags of a [`GenericInterrupt`].
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct InterruptFlags: u32 {
        /// Edge triggered rather than level triggered.
        const EDGE = 1 << 0;
        /// Active low or falling edge.
        const ACTIVE_LOW = 1 << 1;
    }
}

impl TryFrom<&InterruptData> for GenericInterrupt {
    type Error = Error;

    fn try_from(data: &InterruptData) -> Result<Self> {
        let base = match data.interrupt_type {
            InterruptType::Spi => SPI_BASE,
            InterruptType::Ppi => PPI_BASE,
        };
        let mut flags = InterruptFlags::empty();
        if matches!(
            data.trigger,
            InterruptTrigger::LoToHiEdge | InterruptTrigger::HiToLoEdge
        ) {
            flags |= InterruptFlags::EDGE;
        }
        if matches!(
            data.trigger,
            InterruptTrigger::LoLevel | InterruptTrigger::HiToLoEdge
        ) {
            flags |= InterruptFlags::ACTIVE_LOW;
        }
        Ok(Self {
            interrupt: data.number.checked_add(base).ok_or(Error::InvalidParameter)?,
            flags: flags.bits(),
        })
    }
}

/// Memory ranges of a device, as added to the repository.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryRangesObject {
    /// The ranges.
    pub ranges: Vec<MemoryRangeDescriptor>,
    /// The token of the entry holding them.
    pub token: CmToken,
}

/// Interrupts of a device, as added to the repository.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InterruptsObject {
    /// The interrupts.
    pub interrupts: Vec<GenericInterrupt>,
    /// The token of the entry holding them.
    pub token: CmToken,
}

/// Adds a memory range object for the registers of a device.
///
/// At most `max` regions are used, unless `max` is 0.
pub fn create_memory_ranges_object(
    repository: &mut CmRepository,
    regions: &[MemoryRegion],
    max: usize,
) -> Result<MemoryRangesObject> {
    let count = if max == 0 {
        regions.len()
    } else {
        regions.len().min(max)
    };
    let ranges: Vec<MemoryRangeDescriptor> = regions[..count]
        .iter()
        .map(|region| MemoryRangeDescriptor {
            base_address: region.base,
            length: region.length,
        })
        .collect();
    let desc = create_cm_obj_desc(
        CmObjectId::ARM_MEMORY_RANGE_DESCRIPTOR,
        count as u32,
        ranges.as_bytes(),
    )?;
    let (_, token) = add_multiple_cm_obj_get_tokens(repository, &desc)?;
    Ok(MemoryRangesObject { ranges, token })
}

/// Adds an interrupt object for the interrupts of a device.
///
/// At most `max` interrupts are used, unless `max` is 0.
pub fn create_interrupts_object(
    repository: &mut CmRepository,
    interrupts: &[InterruptData],
    max: usize,
) -> Result<InterruptsObject> {
    let count = if max == 0 {
        interrupts.len()
    } else {
        interrupts.len().min(max)
    };
    let interrupts = interrupts[..count]
        .iter()
        .map(GenericInterrupt::try_from)
        .collect::<Result<Vec<_>>>()?;
    let desc = create_cm_obj_desc(
        CmObjectId::ARM_GENERIC_INTERRUPT,
        count as u32,
        interrupts.as_bytes(),
    )?;
    let (_, token) = add_multiple_cm_obj_get_tokens(repository, &desc)?;
    Ok(InterruptsObject { interrupts, token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cm::repository::tests::repository;
    use alloc::vec;

    #[test]
    fn memory_ranges_limited() {
        let mut repo = repository(4);
        let regions = [
            MemoryRegion::new(0x0310_0000, 0x1_0000),
            MemoryRegion::new(0x0320_0000, 0x1000),
            MemoryRegion::new(0x0330_0000, 0x1000),
        ];
        let object = create_memory_ranges_object(&mut repo, &regions, 2).unwrap();
        assert_eq!(object.ranges.len(), 2);
        assert_eq!(object.ranges[1].base_address, 0x0320_0000);
        let entry = repo
            .find_entry(CmObjectId::ARM_MEMORY_RANGE_DESCRIPTOR, object.token)
            .unwrap();
        assert_eq!(entry.count(), 2);

        let all = create_memory_ranges_object(&mut repo, &regions, 0).unwrap();
        assert_eq!(all.ranges.len(), 3);

        assert_eq!(
            create_memory_ranges_object(&mut repo, &[], 0).unwrap_err(),
            Error::InvalidParameter
        );
    }

    #[test]
    fn interrupt_numbers_and_flags() {
        let mut repo = repository(4);
        let interrupts = [
            InterruptData {
                interrupt_type: InterruptType::Spi,
                number: 10,
                trigger: InterruptTrigger::HiLevel,
            },
            InterruptData {
                interrupt_type: InterruptType::Ppi,
                number: 4,
                trigger: InterruptTrigger::LoToHiEdge,
            },
            InterruptData {
                interrupt_type: InterruptType::Spi,
                number: 0,
                trigger: InterruptTrigger::HiToLoEdge,
            },
            InterruptData {
                interrupt_type: InterruptType::Spi,
                number: 1,
                trigger: InterruptTrigger::LoLevel,
            },
        ];
        let object = create_interrupts_object(&mut repo, &interrupts, 0).unwrap();
        assert_eq!(
            object.interrupts,
            vec![
                GenericInterrupt {
                    interrupt: 42,
                    flags: 0
                },
                GenericInterrupt {
                    interrupt: 20,
                    flags: 1
                },
                GenericInterrupt {
                    interrupt: 32,
                    flags: 3
                },
                GenericInterrupt {
                    interrupt: 33,
                    flags: 2
                },
            ]
        );
        let entry = repo
            .find_entry(CmObjectId::ARM_GENERIC_INTERRUPT, object.token)
            .unwrap();
        assert_eq!(entry.data(), object.interrupts.as_bytes());
    }

    #[test]
    fn interrupt_number_overflow() {
        let mut repo = repository(4);
        let interrupts = [InterruptData {
            interrupt_type: InterruptType::Spi,
            number: u32::MAX,
            trigger: InterruptTrigger::HiLevel,
        }];
        assert_eq!(
            create_interrupts_object(&mut repo, &interrupts, 0).unwrap_err(),
            Error::InvalidParameter
        );
        assert!(repo.entries().is_empty());
    }
}
