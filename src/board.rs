// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Facts about the board discovered at boot, as handed over by the earlier boot stages.

use alloc::vec::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Socket field of a TH500 physical address.
const TH500_AMAP_SOCKET_MASK: u64 = 0x3000_0000_0000;
const TH500_AMAP_SOCKET_SHIFT: u32 = 44;

/// A Tegra SoC generation.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum ChipId {
    /// Tegra186.
    T186 = 0x18,
    /// Tegra194.
    T194 = 0x19,
    /// Tegra234.
    T234 = 0x23,
    /// TH500 server SoC.
    Th500 = 0x24,
}

/// What kind of system the firmware is running on.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PlatformType {
    /// Real silicon.
    #[default]
    Silicon,
    /// A simulator, emulator or FPGA.
    Presilicon,
}

/// A physical memory range.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemoryRegion {
    /// Base physical address.
    pub base: u64,
    /// Length in bytes.
    pub length: u64,
}

impl MemoryRegion {
    /// Creates a new region.
    pub const fn new(base: u64, length: u64) -> Self {
        Self { base, length }
    }
}

/// A GPU attached to a PCIe root bridge, and the proximity domains its memory is split into.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GpuInfo {
    /// The socket the GPU is attached to.
    pub socket: u32,
    /// PCI segment of the GPU.
    pub segment: u16,
    /// PCI bus number.
    pub bus: u8,
    /// PCI device number.
    pub device: u8,
    /// PCI function number.
    pub function: u8,
    /// First proximity domain used for the GPU memory.
    pub proximity_domain_start: u32,
    /// Number of proximity domains used for the GPU memory.
    pub num_proximity_domains: u32,
}

impl GpuInfo {
    /// Returns the bus/device/function in the byte order used by ACPI PCI device handles.
    pub fn bdf(&self) -> u16 {
        let bdf = (u16::from(self.bus) << 8)
            | (u16::from(self.device & 0x1f) << 3)
            | u16::from(self.function & 0x7);
        bdf.swap_bytes()
    }
}

/// Boot-time description of the board.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceInfo {
    /// The SoC generation.
    pub chip_id: ChipId,
    /// Whether this is real silicon.
    pub platform_type: PlatformType,
    /// Number of sockets the platform supports.
    pub max_sockets: u32,
    /// Bit `n` is set if socket `n` is present and enabled.
    pub socket_mask: u32,
    /// Bit `n` is set if socket `n` has a GPU.
    pub gpu_socket_mask: u32,
    /// Whether the firmware boots a hypervisor, which gets EGM carve-outs.
    pub hypervisor_mode: bool,
    /// DRAM regions usable by the OS.
    pub dram_regions: Vec<MemoryRegion>,
    /// EGM carve-out per socket, indexed by socket.
    pub egm_regions: Vec<MemoryRegion>,
    /// GPUs discovered on the PCIe root bridges.
    pub gpus: Vec<GpuInfo>,
}

impl ResourceInfo {
    /// Returns whether the given socket is enabled.
    pub fn is_socket_enabled(&self, socket: u32) -> bool {
        socket < self.max_sockets && socket < u32::BITS && self.socket_mask & (1 << socket) != 0
    }

    /// Returns whether the given socket has a GPU.
    pub fn is_gpu_enabled_on_socket(&self, socket: u32) -> bool {
        socket < self.max_sockets && socket < u32::BITS && self.gpu_socket_mask & (1 << socket) != 0
    }

    /// Returns the enabled sockets in increasing order.
    pub fn enabled_sockets(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.max_sockets).filter(|&socket| self.is_socket_enabled(socket))
    }

    /// Returns the sockets with a GPU in increasing order.
    pub fn gpu_sockets(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.max_sockets).filter(|&socket| self.is_gpu_enabled_on_socket(socket))
    }
}

/// Returns the socket which a TH500 physical address belongs to.
pub const fn th500_socket_of_address(address: u64) -> u32 {
    ((address & TH500_AMAP_SOCKET_MASK) >> TH500_AMAP_SOCKET_SHIFT) as u32
}
