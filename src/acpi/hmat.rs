// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Heterogeneous Memory Attribute Table.
//!
//! The table holds one System Locality Latency and Bandwidth Information structure for each of
//! read latency, write latency and access bandwidth, each a matrix over all initiator and target
//! proximity domains.

use super::{
    AcpiDescriptionHeader, AcpiOemInfo, CHECKSUM_OFFSET, TableGeneratorId, compute_checksum,
    table_list::table_info,
};
use crate::{
    cm::{
        CmObjectId,
        desc::{add_acpi_table_generator, add_single_cm_obj},
        parser::{HwInfoParser, ParserContext},
    },
    error::{Error, Result},
    numa::{DistanceInfo, NumaInfo},
};
use alloc::vec::Vec;
use log::{error, info};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    little_endian::{U16, U32, U64},
};

const HMAT_SIGNATURE: [u8; 4] = *b"HMAT";
const HMAT_REVISION: u8 = 2;

/// Structure type of a System Locality Latency and Bandwidth Information structure.
const LATENCY_BANDWIDTH_INFO_TYPE: u16 = 1;

/// Latencies are given in nanoseconds and bandwidths in GB/s.
const ENTRY_BASE_UNIT: u64 = 1000;

/// The kinds of data described, in the order their structures appear.
const DATA_TYPES: [DataType; 3] = [
    DataType::ReadLatency,
    DataType::WriteLatency,
    DataType::AccessBandwidth,
];

/// Adds the HMAT, unless the board disables it.
pub const PARSER: HwInfoParser = HwInfoParser {
    name: "HmatParser",
    skip_name: Some("skip-hmat-table"),
    parse: parse_hmat,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
enum DataType {
    ReadLatency = 1,
    WriteLatency = 2,
    AccessBandwidth = 3,
}

impl DataType {
    fn value(self, distance: &DistanceInfo) -> u16 {
        match self {
            Self::ReadLatency => distance.read_latency,
            Self::WriteLatency => distance.write_latency,
            Self::AccessBandwidth => distance.bandwidth,
        }
    }
}

/// The HMAT header, after the common description header.
#[derive(Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
struct HmatHeader {
    header: AcpiDescriptionHeader,
    reserved: [u8; 4],
}

/// The fixed part of a System Locality Latency and Bandwidth Information structure.
#[derive(Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
struct LatencyBandwidthInfo {
    structure_type: U16,
    reserved: [u8; 2],
    length: U32,
    flags: u8,
    data_type: u8,
    min_transfer_size: u8,
    reserved1: u8,
    initiator_count: U32,
    target_count: U32,
    reserved2: [u8; 4],
    entry_base_unit: U64,
}

/// Returns the size of one latency and bandwidth structure over the given domains.
fn latency_bandwidth_info_size(initiators: usize, targets: usize) -> usize {
    size_of::<LatencyBandwidthInfo>()
        + size_of::<u32>() * initiators
        + size_of::<u32>() * targets
        + size_of::<u16>() * initiators * targets
}

/// Builds the complete HMAT for the given domains.
pub fn build_hmat(numa: &NumaInfo, oem: &AcpiOemInfo) -> Result<Vec<u8>> {
    let limits = numa.domain_limits().inspect_err(|e| {
        error!("Failed to get proximity domain limits: {e}");
    })?;

    let mut initiators = Vec::with_capacity(limits.initiators as usize);
    let mut targets = Vec::with_capacity(limits.targets as usize);
    for proximity_domain in 0..=limits.max_proximity_domain {
        let Ok(domain) = numa.domain_details(proximity_domain) else {
            continue;
        };
        if domain.initiator {
            initiators.push(proximity_domain);
        }
        if domain.target {
            targets.push(proximity_domain);
        }
    }

    let distances: Vec<DistanceInfo> = initiators
        .iter()
        .flat_map(|&initiator| {
            targets
                .iter()
                .map(move |&target| numa.distance_info(initiator, target))
        })
        .collect();

    let structure_size = latency_bandwidth_info_size(initiators.len(), targets.len());
    let table_size = size_of::<HmatHeader>() + DATA_TYPES.len() * structure_size;
    let length = u32::try_from(table_size).map_err(|_| Error::OutOfResources)?;

    let mut header = HmatHeader {
        header: AcpiDescriptionHeader::new(HMAT_SIGNATURE, HMAT_REVISION, oem),
        reserved: [0; 4],
    };
    header.header.length = U32::new(length);

    let mut table = Vec::with_capacity(table_size);
    table.extend_from_slice(header.as_bytes());
    for data_type in DATA_TYPES {
        let info = LatencyBandwidthInfo {
            structure_type: U16::new(LATENCY_BANDWIDTH_INFO_TYPE),
            reserved: [0; 2],
            length: U32::new(structure_size as u32),
            flags: 0,
            data_type: data_type as u8,
            min_transfer_size: 1,
            reserved1: 0,
            initiator_count: U32::new(initiators.len() as u32),
            target_count: U32::new(targets.len() as u32),
            reserved2: [0; 4],
            entry_base_unit: U64::new(ENTRY_BASE_UNIT),
        };
        table.extend_from_slice(info.as_bytes());
        for domain in initiators.iter().chain(&targets) {
            table.extend_from_slice(&domain.to_le_bytes());
        }
        for distance in &distances {
            table.extend_from_slice(&data_type.value(distance).to_le_bytes());
        }
    }

    let checksum = compute_checksum(&table);
    table[CHECKSUM_OFFSET] = checksum;
    info!(
        "Built HMAT for {} initiators and {} targets",
        initiators.len(),
        targets.len()
    );
    Ok(table)
}

fn parse_hmat(context: &mut ParserContext) -> Result<()> {
    let table = build_hmat(context.numa, context.oem)?;
    let token = add_single_cm_obj(context.repository, CmObjectId::OEM_RAW_TABLE_DATA, &table)?;
    let info = table_info(
        HMAT_SIGNATURE,
        HMAT_REVISION,
        TableGeneratorId::RAW,
        context.oem,
        token,
    );
    add_acpi_table_generator(context.repository, &info).inspect_err(|e| {
        error!("Got {e} trying to add the HMAT");
    })
}
