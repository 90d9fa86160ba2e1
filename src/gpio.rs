// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Driver for the Tegra main GPIO controller.
//!
//! Pins are numbered 8 per port. Each port has a fixed register block within the controller's
//! MMIO region, and only the first few pins of some ports are implemented.

use crate::{
    board::ChipId,
    error::{Error, Result},
};
use log::debug;

const GPIO_PINS_PER_PORT: u32 = 8;
const GPIO_CONTROLLER_SPACING: u64 = 0x1000;
const GPIO_PORT_SPACING: u64 = 0x200;
const GPIO_REGISTER_SPACING: u64 = 0x20;

const GPIO_ENABLE_CONFIG_OFFSET: u64 = 0x00;
const GPIO_INPUT_VALUE_OFFSET: u64 = 0x08;
const GPIO_OUTPUT_CONTROL_OFFSET: u64 = 0x0c;
const GPIO_OUTPUT_VALUE_OFFSET: u64 = 0x10;

const GPIO_ENABLE_BIT: u32 = 1 << 0;
const GPIO_OUTPUT_BIT: u32 = 1 << 1;

/// 32-bit access to device registers.
pub trait Mmio {
    /// Reads the register at the given physical address.
    fn read32(&self, address: u64) -> u32;

    /// Writes the register at the given physical address.
    fn write32(&mut self, address: u64, value: u32);
}

/// A GPIO port: a group of up to 8 pins sharing a register block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GpioPort {
    /// Number of the port, which gives the number of its first pin.
    pub index: u32,
    /// Offset of the port's registers from the start of the GPIO region.
    pub register_offset: u64,
    /// Number of pins implemented in the port.
    pub pin_count: u32,
}

impl GpioPort {
    const fn new(index: u32, controller: u64, port: u64, pin_count: u32) -> Self {
        Self {
            index,
            register_offset: controller * GPIO_CONTROLLER_SPACING + port * GPIO_PORT_SPACING,
            pin_count,
        }
    }

    fn first_pin(&self) -> u32 {
        self.index * GPIO_PINS_PER_PORT
    }

    fn contains(&self, pin: u32) -> bool {
        (self.first_pin()..self.first_pin() + self.pin_count).contains(&pin)
    }
}

const T186_PORTS: [GpioPort; 23] = [
    GpioPort::new(0, 2, 0, 7),
    GpioPort::new(1, 3, 0, 7),
    GpioPort::new(2, 3, 1, 7),
    GpioPort::new(3, 3, 2, 6),
    GpioPort::new(4, 2, 1, 8),
    GpioPort::new(5, 2, 2, 6),
    GpioPort::new(6, 4, 1, 6),
    GpioPort::new(7, 1, 0, 7),
    GpioPort::new(8, 0, 4, 8),
    GpioPort::new(9, 5, 0, 8),
    GpioPort::new(10, 5, 1, 1),
    GpioPort::new(11, 1, 1, 8),
    GpioPort::new(12, 5, 3, 6),
    GpioPort::new(13, 0, 0, 7),
    GpioPort::new(14, 0, 1, 4),
    GpioPort::new(15, 4, 0, 7),
    GpioPort::new(16, 0, 2, 6),
    GpioPort::new(17, 0, 5, 6),
    GpioPort::new(18, 0, 3, 4),
    GpioPort::new(19, 1, 2, 8),
    GpioPort::new(20, 1, 3, 7),
    GpioPort::new(21, 2, 3, 2),
    GpioPort::new(22, 5, 2, 4),
];

const T194_PORTS: [GpioPort; 28] = [
    GpioPort::new(0, 1, 2, 8),
    GpioPort::new(1, 4, 7, 2),
    GpioPort::new(2, 4, 3, 8),
    GpioPort::new(3, 4, 4, 4),
    GpioPort::new(4, 4, 5, 8),
    GpioPort::new(5, 4, 6, 6),
    GpioPort::new(6, 4, 0, 8),
    GpioPort::new(7, 4, 1, 8),
    GpioPort::new(8, 4, 2, 5),
    GpioPort::new(9, 5, 1, 6),
    GpioPort::new(10, 3, 0, 8),
    GpioPort::new(11, 3, 1, 4),
    GpioPort::new(12, 2, 3, 8),
    GpioPort::new(13, 2, 4, 3),
    GpioPort::new(14, 5, 0, 6),
    GpioPort::new(15, 2, 5, 8),
    GpioPort::new(16, 2, 6, 8),
    GpioPort::new(17, 2, 7, 6),
    GpioPort::new(18, 3, 3, 8),
    GpioPort::new(19, 3, 4, 8),
    GpioPort::new(20, 3, 5, 1),
    GpioPort::new(21, 1, 0, 8),
    GpioPort::new(22, 1, 1, 2),
    GpioPort::new(23, 2, 0, 8),
    GpioPort::new(24, 2, 1, 8),
    GpioPort::new(25, 2, 2, 8),
    GpioPort::new(26, 3, 2, 2),
    GpioPort::new(27, 0, 0, 2),
];

const TH500_PORTS: [GpioPort; 11] = [
    GpioPort::new(0, 0, 0, 8),
    GpioPort::new(1, 0, 1, 8),
    GpioPort::new(2, 0, 2, 2),
    GpioPort::new(3, 0, 3, 6),
    GpioPort::new(4, 0, 4, 8),
    GpioPort::new(5, 1, 0, 8),
    GpioPort::new(6, 1, 1, 8),
    GpioPort::new(7, 1, 2, 8),
    GpioPort::new(8, 1, 3, 8),
    GpioPort::new(9, 1, 4, 4),
    GpioPort::new(10, 1, 5, 6),
];

/// Returns the port layout of the GPIO controller of the given chip.
pub fn ports(chip: ChipId) -> Result<&'static [GpioPort]> {
    match chip {
        ChipId::T186 => Ok(&T186_PORTS),
        ChipId::T194 => Ok(&T194_PORTS),
        ChipId::Th500 => Ok(&TH500_PORTS),
        ChipId::T234 => Err(Error::Unsupported),
    }
}

/// The mode of a GPIO pin.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GpioMode {
    /// Input.
    Input,
    /// Output driven low.
    Output0,
    /// Output driven high.
    Output1,
}

/// Pull resistor setting of a GPIO pin.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GpioPull {
    /// No pull resistor.
    None,
    /// Pull up.
    Up,
    /// Pull down.
    Down,
}

/// A GPIO controller mapped at some base address.
pub struct TegraGpio<M: Mmio> {
    mmio: M,
    base: u64,
    ports: &'static [GpioPort],
}

impl<M: Mmio> TegraGpio<M> {
    /// Creates a driver for the GPIO controller of `chip` whose registers start at `base`.
    pub fn new(mmio: M, chip: ChipId, base: u64) -> Result<Self> {
        Ok(Self {
            mmio,
            base,
            ports: ports(chip)?,
        })
    }

    /// Returns the total number of pins, including unimplemented ones.
    pub fn pin_count(&self) -> u32 {
        self.ports.len() as u32 * GPIO_PINS_PER_PORT
    }

    fn pin_address(&self, pin: u32) -> Result<u64> {
        let port = self
            .ports
            .iter()
            .find(|port| port.contains(pin))
            .ok_or(Error::NotFound)?;
        Ok(self.base
            + port.register_offset
            + u64::from(pin - port.first_pin()) * GPIO_REGISTER_SPACING)
    }

    /// Returns the level of the pin: the input value for an input, or the driven value for an
    /// output.
    pub fn get(&self, pin: u32) -> Result<u32> {
        let address = self.pin_address(pin)?;
        let config = self.mmio.read32(address + GPIO_ENABLE_CONFIG_OFFSET);
        if config & GPIO_OUTPUT_BIT == 0 {
            Ok(self.mmio.read32(address + GPIO_INPUT_VALUE_OFFSET))
        } else {
            Ok(self.mmio.read32(address + GPIO_OUTPUT_VALUE_OFFSET))
        }
    }

    /// Configures the pin as an input or as an output driven to the given level.
    pub fn set(&mut self, pin: u32, mode: GpioMode) -> Result<()> {
        let address = self.pin_address(pin)?;
        debug!("GPIO {pin} at {address:#x} to {mode:?}");
        let config_address = address + GPIO_ENABLE_CONFIG_OFFSET;
        let config = self.mmio.read32(config_address) & !(GPIO_ENABLE_BIT | GPIO_OUTPUT_BIT);
        match mode {
            GpioMode::Input => {
                self.mmio.write32(config_address, config | GPIO_ENABLE_BIT);
            }
            GpioMode::Output0 | GpioMode::Output1 => {
                let level = u32::from(mode == GpioMode::Output1);
                self.mmio.write32(address + GPIO_OUTPUT_VALUE_OFFSET, level);
                self.mmio.write32(address + GPIO_OUTPUT_CONTROL_OFFSET, 0);
                self.mmio
                    .write32(config_address, config | GPIO_ENABLE_BIT | GPIO_OUTPUT_BIT);
            }
        }
        Ok(())
    }

    /// Returns the current mode of the pin.
    pub fn mode(&self, pin: u32) -> Result<GpioMode> {
        let address = self.pin_address(pin)?;
        let config = self.mmio.read32(address + GPIO_ENABLE_CONFIG_OFFSET);
        Ok(if config & GPIO_OUTPUT_BIT == 0 {
            GpioMode::Input
        } else if self.mmio.read32(address + GPIO_OUTPUT_VALUE_OFFSET) == 0 {
            GpioMode::Output0
        } else {
            GpioMode::Output1
        })
    }

    /// Pull resistors are not controlled through this block.
    pub fn set_pull(&mut self, _pin: u32, _pull: GpioPull) -> Result<()> {
        Err(Error::Unsupported)
    }
}
