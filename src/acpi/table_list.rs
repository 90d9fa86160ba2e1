// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The list of ACPI tables the table generators build for each chip.

use super::{AcpiOemInfo, Signature, TableGeneratorId, patch_oem_id};
use crate::{
    board::ChipId,
    cm::{
        CmObjectId, CmRepository, CmToken,
        desc::{add_acpi_table_generator, add_single_cm_obj},
        object::AcpiTableInfo,
        parser::{HwInfoParser, ParserContext},
    },
    error::{Error, Result},
};
use log::{debug, error};

/// Prebuilt AML tables for the chip, as compiled into the firmware.
#[derive(Clone, Copy, Debug, Default)]
pub struct AmlTables<'a> {
    /// The DSDT.
    pub dsdt: &'a [u8],
    /// SSDTs describing the devices of each secondary socket, starting with socket 1.
    pub socket_ssdts: &'a [&'a [u8]],
}

/// Tables listed for every chip: signature, revision and generator.
const COMMON_TABLES: [([u8; 4], u8, TableGeneratorId); 6] = [
    (*b"FACP", 6, TableGeneratorId::FADT),
    (*b"GTDT", 3, TableGeneratorId::GTDT),
    (*b"APIC", 6, TableGeneratorId::MADT),
    (*b"DSDT", 2, TableGeneratorId::DSDT),
    (*b"PPTT", 3, TableGeneratorId::PPTT),
    (*b"SSDT", 2, TableGeneratorId::SSDT_CPU_TOPOLOGY),
];

/// Revision of the per-socket SSDTs.
const SSDT_REVISION: u8 = 2;

/// Adds the ACPI table list for the chip.
pub const PARSER: HwInfoParser = HwInfoParser {
    name: "AcpiTableListParser",
    skip_name: None,
    parse: parse_table_list,
};

/// Builds the table list entry for a table.
pub fn table_info(
    signature: [u8; 4],
    revision: u8,
    generator_id: TableGeneratorId,
    oem: &AcpiOemInfo,
    table_data: CmToken,
) -> AcpiTableInfo {
    AcpiTableInfo {
        signature: Signature(signature).as_u32(),
        revision,
        generator_id: generator_id.0,
        table_data: table_data.0,
        oem_table_id: oem.oem_table_id,
        oem_revision: oem.oem_revision,
        minor_revision: 0,
        ..Default::default()
    }
}

/// Stores a copy of a complete table, with the OEM ID replaced, and returns its token.
pub fn add_raw_table(
    repository: &mut CmRepository,
    table: &[u8],
    oem: &AcpiOemInfo,
) -> Result<CmToken> {
    let mut table = table.to_vec();
    patch_oem_id(&mut table, &oem.oem_id)?;
    add_single_cm_obj(repository, CmObjectId::OEM_RAW_TABLE_DATA, &table)
}

fn parse_table_list(context: &mut ParserContext) -> Result<()> {
    let chip_id = context.resources.chip_id;
    if !matches!(chip_id, ChipId::T194 | ChipId::T234 | ChipId::Th500) {
        error!("Unknown chip {chip_id:?}");
        return Err(Error::NotFound);
    }

    let dsdt = add_raw_table(context.repository, context.aml_tables.dsdt, context.oem)?;
    for (signature, revision, generator_id) in COMMON_TABLES {
        let table_data = if generator_id == TableGeneratorId::DSDT {
            dsdt
        } else {
            CmToken::NULL
        };
        let info = table_info(signature, revision, generator_id, context.oem, table_data);
        add_acpi_table_generator(context.repository, &info).inspect_err(|e| {
            error!("Got {e} trying to add {:?} to the table list", Signature(signature));
        })?;
    }

    if chip_id == ChipId::Th500 {
        for socket in 1..context.resources.max_sockets {
            if !context.resources.is_socket_enabled(socket) {
                continue;
            }
            let Some(ssdt) = context.aml_tables.socket_ssdts.get(socket as usize - 1) else {
                error!("No SSDT for socket {socket}");
                return Err(Error::InvalidParameter);
            };
            debug!("Adding SSDT for socket {socket}");
            let token = add_raw_table(context.repository, ssdt, context.oem)?;
            let info = table_info(
                *b"SSDT",
                SSDT_REVISION,
                TableGeneratorId::SSDT,
                context.oem,
                token,
            );
            add_acpi_table_generator(context.repository, &info).inspect_err(|e| {
                error!("Got {e} trying to add the SSDT for socket {socket}");
            })?;
        }
    }
    Ok(())
}
