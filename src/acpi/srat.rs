// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Memory affinity objects for the System Resource Affinity Table.

use super::{TableGeneratorId, table_list::table_info};
use crate::{
    board::{ResourceInfo, th500_socket_of_address},
    cm::{
        CmObjectId, CmToken,
        desc::{add_acpi_table_generator, add_multiple_cm_obj_get_tokens, create_cm_obj_desc},
        object::{MemoryAffinityFlags, MemoryAffinityInfo},
        parser::{HwInfoParser, ParserContext},
    },
    error::Result,
    numa::{GPU_MAX_NR_MEM_PARTITIONS, HV_EGM_PXM_DOMAIN_START, gpu_hbm_pxm_domain_start},
};
use alloc::vec::Vec;
use log::{debug, error};
use zerocopy::IntoBytes;

const SRAT_SIGNATURE: [u8; 4] = *b"SRAT";
const SRAT_REVISION: u8 = 3;

/// Adds the SRAT and the memory affinity of DRAM, EGM and GPU memory.
pub const PARSER: HwInfoParser = HwInfoParser {
    name: "SratParser",
    skip_name: Some("skip-srat-table"),
    parse: parse_srat,
};

/// Returns the memory affinity structures for the board.
///
/// DRAM regions are placed in the domain of the socket they belong to. In hypervisor mode each
/// enabled socket's EGM carve-out gets its own domain. Every socket with a GPU gets placeholder
/// entries for all the partitions its memory may be split into; the real ranges are described
/// in the DSDT.
pub fn memory_affinity(resources: &ResourceInfo) -> Vec<MemoryAffinityInfo> {
    let mut affinity: Vec<MemoryAffinityInfo> = resources
        .dram_regions
        .iter()
        .map(|region| {
            MemoryAffinityInfo::new(
                th500_socket_of_address(region.base),
                region.base,
                region.length,
                MemoryAffinityFlags::ENABLED,
            )
        })
        .collect();

    if resources.hypervisor_mode {
        for socket in resources.enabled_sockets() {
            let egm = resources
                .egm_regions
                .get(socket as usize)
                .copied()
                .unwrap_or_default();
            affinity.push(MemoryAffinityInfo::new(
                HV_EGM_PXM_DOMAIN_START + socket,
                egm.base,
                egm.length,
                MemoryAffinityFlags::ENABLED,
            ));
        }
    }

    for socket in resources.gpu_sockets() {
        let start = gpu_hbm_pxm_domain_start(resources.max_sockets, socket);
        affinity.extend((0..GPU_MAX_NR_MEM_PARTITIONS).map(|partition| {
            MemoryAffinityInfo::new(
                start + partition,
                0,
                0,
                MemoryAffinityFlags::ENABLED | MemoryAffinityFlags::HOT_PLUGGABLE,
            )
        }));
    }
    affinity
}

fn parse_srat(context: &mut ParserContext) -> Result<()> {
    let info = table_info(
        SRAT_SIGNATURE,
        SRAT_REVISION,
        TableGeneratorId::SRAT,
        context.oem,
        CmToken::NULL,
    );
    add_acpi_table_generator(context.repository, &info).inspect_err(|e| {
        error!("Got {e} trying to add the SRAT");
    })?;

    let affinity = memory_affinity(context.resources);
    debug!("Adding {} memory affinity structures", affinity.len());
    let desc = create_cm_obj_desc(
        CmObjectId::ARM_MEMORY_AFFINITY_INFO,
        affinity.len() as u32,
        affinity.as_bytes(),
    )?;
    add_multiple_cm_obj_get_tokens(context.repository, &desc)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        acpi::table_list::AmlTables,
        board::tests::th500_resources,
        cm::{
            object::AcpiTableInfo, parser::tests::with_context, repository::tests::repository,
        },
    };

    #[test]
    fn dram_and_gpu_placeholders() {
        let affinity = memory_affinity(&th500_resources(false));
        assert_eq!(affinity.len(), 2 + 8);
        assert_eq!(
            affinity[0],
            MemoryAffinityInfo::new(0, 0x8000_0000, 0x1_0000_0000, MemoryAffinityFlags::ENABLED)
        );
        assert_eq!(affinity[1].proximity_domain, 1);

        // The GPU is on socket 1: domains 4 + 4 + 8 onwards.
        let gpu: Vec<u32> = affinity[2..].iter().map(|a| a.proximity_domain).collect();
        assert_eq!(gpu, (16..24).collect::<Vec<_>>());
        for entry in &affinity[2..] {
            assert_eq!(entry.base_address, 0);
            assert_eq!(entry.length, 0);
            assert_eq!(entry.flags, 0b11);
        }
    }

    #[test]
    fn hypervisor_egm_domains() {
        let affinity = memory_affinity(&th500_resources(true));
        assert_eq!(affinity.len(), 2 + 2 + 8);
        assert_eq!(
            affinity[2],
            MemoryAffinityInfo::new(
                4,
                0x40_0000_0000,
                0x4000_0000,
                MemoryAffinityFlags::ENABLED
            )
        );
        assert_eq!(affinity[3].proximity_domain, 5);
        assert_eq!(affinity[3].base_address, 0x1040_0000_0000);
    }

    #[test]
    fn parser_adds_table_and_affinity() {
        let mut repo = repository(8);
        let result = with_context(
            &mut repo,
            &th500_resources(true),
            &AmlTables::default(),
            &[],
            |context| (PARSER.parse)(context),
        );
        assert_eq!(result, Ok(()));

        let list: Vec<AcpiTableInfo> = repo
            .find_entry(CmObjectId::STD_ACPI_TABLE_LIST, CmToken::NULL)
            .unwrap()
            .descriptor()
            .elements()
            .unwrap();
        assert_eq!(list[0].signature.to_le_bytes(), SRAT_SIGNATURE);
        assert_eq!(list[0].revision, 3);
        assert_eq!(list[0].table_data, 0);

        let affinity = repo
            .find_entry(CmObjectId::ARM_MEMORY_AFFINITY_INFO, CmToken::NULL)
            .unwrap();
        assert_eq!(affinity.count(), 12);
        assert_eq!(repo.sanity_check(), Ok(()));
    }
}
