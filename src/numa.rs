// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! NUMA proximity domains and the performance of memory transfers between them.

use crate::{
    board::ResourceInfo,
    error::{Error, Result},
    platform::{Platform, PlatformImpl},
};
use alloc::vec::Vec;
use log::{debug, info};

/// First proximity domain of the EGM carve-outs, which get one domain per socket.
pub const HV_EGM_PXM_DOMAIN_START: u32 = 4;

/// First proximity domain used by GPUs.
pub const GPU_PXM_DOMAIN_START: u32 = 4;

/// Number of proximity domains the memory of one GPU can be partitioned into.
pub const GPU_MAX_NR_MEM_PARTITIONS: u32 = 8;

/// Latency or bandwidth of a pair of domains that can't reach each other.
pub const UNREACHABLE_LATENCY: u16 = 0xffff;
/// Bandwidth of a pair of domains that can't reach each other.
pub const UNREACHABLE_BANDWIDTH: u16 = 0xffff;
/// Normalised distance of a domain to itself.
pub const NORMALIZED_DISTANCE: u8 = 10;
/// Normalised distance of a pair of domains that can't reach each other.
pub const UNREACHABLE_DISTANCE: u8 = 0xff;

/// Returns the first proximity domain of the HBM of the GPU on the given socket.
pub const fn gpu_hbm_pxm_domain_start(max_sockets: u32, socket: u32) -> u32 {
    GPU_PXM_DOMAIN_START + max_sockets + socket * GPU_MAX_NR_MEM_PARTITIONS
}

/// What a proximity domain contains.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceType {
    /// CPU cores and their local DRAM.
    Cpu,
    /// GPU memory.
    Gpu,
    /// An EGM carve-out reserved for the hypervisor.
    Hv,
}

/// The PCI device behind a GPU domain.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PciDeviceHandle {
    /// PCI segment.
    pub segment: u16,
    /// Bus, device and function, byte-swapped as ACPI expects.
    pub bdf: u16,
}

/// One proximity domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DomainInfo {
    /// The proximity domain number.
    pub proximity_domain: u32,
    /// The socket the domain belongs to.
    pub socket_id: u32,
    /// What the domain contains.
    pub device_type: DeviceType,
    /// The PCI device, for GPU domains.
    pub device_handle: Option<PciDeviceHandle>,
    /// Whether memory accesses can be initiated from the domain.
    pub initiator: bool,
    /// Whether the domain contains memory.
    pub target: bool,
}

/// Kind of memory transfer between an initiator and a target domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferType {
    /// CPU to DRAM on the same socket.
    CpuToLocalMemory,
    /// CPU to DRAM on another socket.
    CpuToRemoteMemory,
    /// CPU to GPU memory on the same socket.
    CpuToLocalHbm,
    /// CPU to GPU memory on another socket.
    CpuToRemoteHbm,
    /// GPU to DRAM on the same socket.
    GpuToLocalMemory,
    /// GPU to DRAM on another socket.
    GpuToRemoteMemory,
    /// GPU to its own memory.
    GpuToLocalHbm,
    /// GPU to the memory of a GPU on another socket.
    GpuToRemoteHbm,
    /// GPU to the memory of another GPU on the same socket.
    GpuToRemoteHbmSameSocket,
}

impl TransferType {
    fn between(initiator: &DomainInfo, target: &DomainInfo) -> Self {
        let same_socket = initiator.socket_id == target.socket_id;
        let initiator_gpu = initiator.device_type == DeviceType::Gpu;
        let target_gpu = target.device_type == DeviceType::Gpu;
        match (initiator_gpu, target_gpu, same_socket) {
            (false, false, true) => Self::CpuToLocalMemory,
            (false, false, false) => Self::CpuToRemoteMemory,
            (false, true, true) => Self::CpuToLocalHbm,
            (false, true, false) => Self::CpuToRemoteHbm,
            (true, false, true) => Self::GpuToLocalMemory,
            (true, false, false) => Self::GpuToRemoteMemory,
            (true, true, false) => Self::GpuToRemoteHbm,
            (true, true, true) => {
                if initiator.device_handle == target.device_handle {
                    Self::GpuToLocalHbm
                } else {
                    Self::GpuToRemoteHbmSameSocket
                }
            }
        }
    }
}

/// Performance of one kind of memory transfer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TransferPerformance {
    /// Read latency in nanoseconds.
    pub read_latency: u16,
    /// Write latency in nanoseconds.
    pub write_latency: u16,
    /// Access bandwidth in GB/s.
    pub bandwidth: u16,
    /// Normalised distance, where [`NORMALIZED_DISTANCE`] means local.
    pub distance: u8,
}

impl TransferPerformance {
    /// Creates a new entry.
    pub const fn new(read_latency: u16, write_latency: u16, bandwidth: u16, distance: u8) -> Self {
        Self {
            read_latency,
            write_latency,
            bandwidth,
            distance,
        }
    }
}

/// Platform performance figures for every kind of memory transfer.
///
/// GPU accesses to another GPU on the same socket use the figures for GPUs on other sockets.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NumaPerformanceTable {
    /// CPU to DRAM on the same socket.
    pub cpu_to_local_memory: TransferPerformance,
    /// CPU to DRAM on another socket.
    pub cpu_to_remote_memory: TransferPerformance,
    /// CPU to GPU memory on the same socket.
    pub cpu_to_local_hbm: TransferPerformance,
    /// CPU to GPU memory on another socket.
    pub cpu_to_remote_hbm: TransferPerformance,
    /// GPU to DRAM on the same socket.
    pub gpu_to_local_memory: TransferPerformance,
    /// GPU to DRAM on another socket.
    pub gpu_to_remote_memory: TransferPerformance,
    /// GPU to its own memory.
    pub gpu_to_local_hbm: TransferPerformance,
    /// GPU to the memory of another GPU.
    pub gpu_to_remote_hbm: TransferPerformance,
}

impl NumaPerformanceTable {
    /// Returns the figures for the given kind of transfer.
    pub fn get(&self, transfer: TransferType) -> &TransferPerformance {
        match transfer {
            TransferType::CpuToLocalMemory => &self.cpu_to_local_memory,
            TransferType::CpuToRemoteMemory => &self.cpu_to_remote_memory,
            TransferType::CpuToLocalHbm => &self.cpu_to_local_hbm,
            TransferType::CpuToRemoteHbm => &self.cpu_to_remote_hbm,
            TransferType::GpuToLocalMemory => &self.gpu_to_local_memory,
            TransferType::GpuToRemoteMemory => &self.gpu_to_remote_memory,
            TransferType::GpuToLocalHbm => &self.gpu_to_local_hbm,
            TransferType::GpuToRemoteHbm | TransferType::GpuToRemoteHbmSameSocket => {
                &self.gpu_to_remote_hbm
            }
        }
    }
}

/// The extent of the proximity domains.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DomainLimits {
    /// The highest proximity domain number.
    pub max_proximity_domain: u32,
    /// How many domains are initiators.
    pub initiators: u32,
    /// How many domains are targets.
    pub targets: u32,
}

/// Latency, bandwidth and distance from an initiator to a target domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DistanceInfo {
    /// Read latency in nanoseconds.
    pub read_latency: u16,
    /// Write latency in nanoseconds.
    pub write_latency: u16,
    /// Access bandwidth in GB/s.
    pub bandwidth: u16,
    /// Normalised distance.
    pub distance: u8,
}

/// All proximity domains of the system.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NumaInfo {
    domains: Vec<DomainInfo>,
    performance: NumaPerformanceTable,
}

impl NumaInfo {
    /// Discovers the proximity domains of the board.
    ///
    /// Every enabled socket gets a CPU domain numbered after the socket. In hypervisor mode every
    /// enabled socket also gets an EGM domain. Each GPU adds the domains its memory is split into.
    pub fn new(resources: &ResourceInfo, performance: &NumaPerformanceTable) -> Self {
        let mut domains: Vec<DomainInfo> = resources
            .enabled_sockets()
            .map(|socket| DomainInfo {
                proximity_domain: socket,
                socket_id: socket,
                device_type: DeviceType::Cpu,
                device_handle: None,
                initiator: true,
                target: true,
            })
            .collect();

        if resources.hypervisor_mode {
            domains.extend(resources.enabled_sockets().map(|socket| DomainInfo {
                proximity_domain: HV_EGM_PXM_DOMAIN_START + socket,
                socket_id: socket,
                device_type: DeviceType::Hv,
                device_handle: None,
                initiator: false,
                target: true,
            }));
        }

        for gpu in &resources.gpus {
            let handle = PciDeviceHandle {
                segment: gpu.segment,
                bdf: gpu.bdf(),
            };
            domains.extend((0..gpu.num_proximity_domains).map(|index| DomainInfo {
                proximity_domain: gpu.proximity_domain_start + index,
                socket_id: gpu.socket,
                device_type: DeviceType::Gpu,
                device_handle: Some(handle),
                initiator: false,
                target: true,
            }));
        }

        for domain in &domains {
            info!(
                "Proximity domain {}: socket {}, {:?}, {:?}, initiator {}, target {}",
                domain.proximity_domain,
                domain.socket_id,
                domain.device_type,
                domain.device_handle,
                domain.initiator,
                domain.target
            );
        }
        debug!("NUMA performance: {performance:?}");

        Self {
            domains,
            performance: *performance,
        }
    }

    /// Discovers the proximity domains of the board, with the platform's performance figures.
    pub fn with_platform_performance(resources: &ResourceInfo) -> Self {
        Self::new(resources, &PlatformImpl::NUMA_PERFORMANCE)
    }

    /// Returns all domains, CPU domains first.
    pub fn domains(&self) -> &[DomainInfo] {
        &self.domains
    }

    /// Returns the highest domain number and the number of initiator and target domains.
    pub fn domain_limits(&self) -> Result<DomainLimits> {
        if self.domains.is_empty() {
            return Err(Error::NotFound);
        }
        let mut limits = DomainLimits {
            max_proximity_domain: 0,
            initiators: 0,
            targets: 0,
        };
        for domain in &self.domains {
            limits.max_proximity_domain = limits.max_proximity_domain.max(domain.proximity_domain);
            limits.initiators += u32::from(domain.initiator);
            limits.targets += u32::from(domain.target);
        }
        Ok(limits)
    }

    /// Returns the details of the given domain.
    pub fn domain_details(&self, proximity_domain: u32) -> Result<&DomainInfo> {
        self.domains
            .iter()
            .find(|domain| domain.proximity_domain == proximity_domain)
            .ok_or(Error::NotFound)
    }

    /// Returns the performance of accesses from `initiator` to memory in `target`.
    ///
    /// Pairs where either domain is missing, the initiator can't initiate or the target has no
    /// memory are reported as unreachable.
    pub fn distance_info(&self, initiator: u32, target: u32) -> DistanceInfo {
        let reachable = match (self.domain_details(initiator), self.domain_details(target)) {
            (Ok(initiator), Ok(target)) if initiator.initiator && target.target => {
                Some((initiator, target))
            }
            _ => None,
        };

        let Some((initiator_info, target_info)) = reachable else {
            return DistanceInfo {
                read_latency: UNREACHABLE_LATENCY,
                write_latency: UNREACHABLE_LATENCY,
                bandwidth: UNREACHABLE_BANDWIDTH,
                distance: if initiator == target {
                    NORMALIZED_DISTANCE
                } else {
                    UNREACHABLE_DISTANCE
                },
            };
        };

        let performance = self
            .performance
            .get(TransferType::between(initiator_info, target_info));
        let mut distance = performance.distance;
        // Only a domain is local to itself.
        if initiator != target && distance == NORMALIZED_DISTANCE {
            distance += 1;
        }
        DistanceInfo {
            read_latency: performance.read_latency,
            write_latency: performance.write_latency,
            bandwidth: performance.bandwidth,
            distance,
        }
    }
}
