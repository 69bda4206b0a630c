// SPDX-License-Identifier: MIT OR Apache-2.0
//
//! Driver - BCM2835 GPIO controller.
//!
//! 54 pins, function-selected three bits at a time across six GPFSEL
//! registers, with set/clear/level register pairs below. Pad pulls are
//! programmed through the GPPUD two-step clock dance. Each register write
//! goes through the peripheral bus and acts as its own ordering point,
//! which is what the bit-banged SDIO link relies on.

use super::super::super::arch::time::system_timer;
use super::super::super::sync::{interface::Mutex, NullLock};
use super::common::{interface, MMIODerefWrapper};
use bitwave::platform::{PinMode, Pull};
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_structs,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_structs! {
    #[allow(non_snake_case)]
    pub RegisterBlock {
        /// Function select, 3 bits per pin, 10 pins per register
        (0x00 => GPFSEL: [ReadWrite<u32>; 6]),
        (0x18 => _reserved1),
        /// Pin output set, 1 bit per pin
        (0x1c => GPSET: [WriteOnly<u32>; 2]),
        (0x24 => _reserved2),
        /// Pin output clear
        (0x28 => GPCLR: [WriteOnly<u32>; 2]),
        (0x30 => _reserved3),
        /// Pin level
        (0x34 => GPLEV: [ReadOnly<u32>; 2]),
        (0x3c => _reserved4),
        /// Pull-up/down control
        (0x94 => GPPUD: ReadWrite<u32>),
        /// Pull-up/down clock
        (0x98 => GPPUDCLK: [ReadWrite<u32>; 2]),
        (0xa0 => @END),
    }
}

/// Abstraction for the associated MMIO registers.
type Registers = MMIODerefWrapper<RegisterBlock>;

fn fsel_bits(mode: PinMode) -> u32 {
    match mode {
        PinMode::Input => 0b000,
        PinMode::Output => 0b001,
        PinMode::Alt0 => 0b100,
        PinMode::Alt1 => 0b101,
        PinMode::Alt2 => 0b110,
        PinMode::Alt3 => 0b111,
        PinMode::Alt4 => 0b011,
        PinMode::Alt5 => 0b010,
    }
}

fn pull_bits(pull: Pull) -> u32 {
    match pull {
        Pull::None => 0,
        Pull::Down => 1,
        Pull::Up => 2,
    }
}

pub struct GPIOInner {
    registers: Registers,
}

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// The driver, shielded behind the board's pseudo-lock.
pub struct GPIO {
    inner: NullLock<GPIOInner>,
}

/// Unprotected instance for the panic path only.
pub use GPIOInner as PanicGPIO;

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl GPIOInner {
    /// Create an instance.
    ///
    /// **Safety**
    ///
    /// - The user must ensure to provide a correct MMIO start address.
    pub const unsafe fn new(mmio_start_addr: usize) -> Self {
        Self {
            registers: Registers::new(mmio_start_addr),
        }
    }

    pub fn set_mode(&mut self, pin: u32, mode: PinMode) {
        let reg = (pin / 10) as usize;
        let shift = (pin % 10) * 3;
        let val = self.registers.GPFSEL[reg].get();
        self.registers.GPFSEL[reg].set(val & !(0b111 << shift) | fsel_bits(mode) << shift);
    }

    /// The pad pull survives power-down, hence the dance: latch the pull
    /// code, clock it into the pin, release both.
    pub fn set_pull(&mut self, pin: u32, pull: Pull) {
        let reg = (pin / 32) as usize;
        self.registers.GPPUD.set(pull_bits(pull));
        system_timer().usdelay(2);
        self.registers.GPPUDCLK[reg].set(1 << (pin % 32));
        system_timer().usdelay(2);
        self.registers.GPPUD.set(0);
        self.registers.GPPUDCLK[reg].set(0);
    }

    pub fn write_pin(&mut self, pin: u32, level: bool) {
        let reg = (pin / 32) as usize;
        if level {
            self.registers.GPSET[reg].set(1 << (pin % 32));
        } else {
            self.registers.GPCLR[reg].set(1 << (pin % 32));
        }
    }

    pub fn read_pin(&self, pin: u32) -> bool {
        let reg = (pin / 32) as usize;
        self.registers.GPLEV[reg].get() >> (pin % 32) & 1 != 0
    }

    /// Drive `npins` contiguous pins in one set/clear pair. The pins must
    /// not straddle a 32-pin bank.
    pub fn write_field(&mut self, pin: u32, npins: u32, value: u32) {
        let reg = (pin / 32) as usize;
        let shift = pin % 32;
        let mask = (1 << npins) - 1;
        self.registers.GPSET[reg].set((value & mask) << shift);
        self.registers.GPCLR[reg].set((!value & mask) << shift);
    }

    pub fn read_field(&self, pin: u32, npins: u32) -> u32 {
        let reg = (pin / 32) as usize;
        self.registers.GPLEV[reg].get() >> (pin % 32) & ((1 << npins) - 1)
    }

    /// Route the PL011 onto pins 14/15.
    pub fn map_pl011_uart(&mut self) {
        self.set_mode(14, PinMode::Alt0);
        self.set_mode(15, PinMode::Alt0);
        self.set_pull(14, Pull::None);
        self.set_pull(15, Pull::None);
    }

    /// Route SPI0 onto pins 8..=11 for the external flash.
    pub fn map_spi0(&mut self) {
        self.set_mode(8, PinMode::Alt0); // CE0
        self.set_pull(8, Pull::None);
        self.set_mode(9, PinMode::Alt0); // MISO
        self.set_pull(9, Pull::Up);
        self.set_mode(10, PinMode::Alt0); // MOSI
        self.set_pull(10, Pull::None);
        self.set_mode(11, PinMode::Alt0); // SCLK
        self.set_pull(11, Pull::None);
    }
}

impl GPIO {
    /// Create an instance.
    ///
    /// **Safety**
    ///
    /// - The user must ensure to provide a correct MMIO start address.
    pub const unsafe fn new(mmio_start_addr: usize) -> Self {
        Self {
            inner: NullLock::new(GPIOInner::new(mmio_start_addr)),
        }
    }

    pub fn set_mode(&self, pin: u32, mode: PinMode) {
        self.inner.lock(|inner| inner.set_mode(pin, mode))
    }

    pub fn set_pull(&self, pin: u32, pull: Pull) {
        self.inner.lock(|inner| inner.set_pull(pin, pull))
    }

    pub fn write_pin(&self, pin: u32, level: bool) {
        self.inner.lock(|inner| inner.write_pin(pin, level))
    }

    pub fn read_pin(&self, pin: u32) -> bool {
        self.inner.lock(|inner| inner.read_pin(pin))
    }

    pub fn write_field(&self, pin: u32, npins: u32, value: u32) {
        self.inner.lock(|inner| inner.write_field(pin, npins, value))
    }

    pub fn read_field(&self, pin: u32, npins: u32) -> u32 {
        self.inner.lock(|inner| inner.read_field(pin, npins))
    }

    pub fn map_pl011_uart(&self) {
        self.inner.lock(|inner| inner.map_pl011_uart())
    }

    pub fn map_spi0(&self) {
        self.inner.lock(|inner| inner.map_spi0())
    }
}

//------------------------------------------------------------------------------
// OS Interface Code
//------------------------------------------------------------------------------

impl interface::DeviceDriver for GPIO {
    fn compatible(&self) -> &'static str {
        "BCM2835 GPIO"
    }
}
