// SPDX-License-Identifier: MIT OR Apache-2.0
//
//! Driver - SPI0 serial flash (EN25Q80-class).
//!
//! When the WLAN firmware is too big to embed in the boot image it lives
//! in a small SPI NOR part on SPI0. Only the plain `0x03` sequential read
//! is implemented; the part streams bytes for as long as CS stays low,
//! which maps directly onto the driver's sequential firmware source.

use super::super::super::sync::{interface::Mutex, NullLock};
use super::common::{interface, MMIODerefWrapper};
use tock_registers::{
    interfaces::{ReadWriteable, Readable, Writeable},
    register_bitfields, register_structs,
    registers::ReadWrite,
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

/// Core clock feeding the SPI divider.
const CORE_CLOCK_KHZ: u32 = 250_000;

register_bitfields! {
    u32,

    /// Control and status
    CS [
        /// RX FIFO holds data
        RXD OFFSET(17) NUMBITS(1) [],
        /// TX FIFO accepts data
        TXD OFFSET(18) NUMBITS(1) [],
        /// Transfer active (drives chip select)
        TA OFFSET(7) NUMBITS(1) [],
        /// FIFO clear
        CLEAR OFFSET(4) NUMBITS(2) [
            Both = 0b11
        ],
    ],
}

register_structs! {
    #[allow(non_snake_case)]
    pub RegisterBlock {
        (0x00 => CS: ReadWrite<u32, CS::Register>),
        (0x04 => FIFO: ReadWrite<u32>),
        (0x08 => CLK: ReadWrite<u32>),
        (0x0c => DLEN: ReadWrite<u32>),
        (0x10 => _reserved),
        (0x14 => DC: ReadWrite<u32>),
        (0x18 => @END),
    }
}

type Registers = MMIODerefWrapper<RegisterBlock>;

pub struct SpiFlashInner {
    registers: Registers,
}

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

pub struct SpiFlash {
    inner: NullLock<SpiFlashInner>,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl SpiFlashInner {
    const unsafe fn new(mmio_start_addr: usize) -> Self {
        Self {
            registers: Registers::new(mmio_start_addr),
        }
    }

    fn init(&mut self, khz: u32) {
        self.registers.CS.write(CS::CLEAR::Both);
        self.registers.CLK.set(CORE_CLOCK_KHZ / khz);
    }

    fn chip_select(&mut self, active: bool) {
        if active {
            self.registers.CS.modify(CS::TA::SET);
        } else {
            self.registers.CS.modify(CS::TA::CLEAR);
        }
    }

    fn transfer_byte(&mut self, tx: u8) -> u8 {
        self.registers.FIFO.set(tx as u32);
        while self.registers.CS.matches_all(CS::RXD::CLEAR) {}
        self.registers.FIFO.get() as u8
    }

    fn open(&mut self, offset: u32) {
        self.chip_select(true);
        for b in [0x03, (offset >> 16) as u8, (offset >> 8) as u8, offset as u8] {
            self.transfer_byte(b);
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.transfer_byte(0);
        }
    }

    fn close(&mut self) {
        self.chip_select(false);
    }
}

impl SpiFlash {
    /// Create an instance.
    ///
    /// **Safety**
    ///
    /// - The user must ensure to provide a correct MMIO start address.
    pub const unsafe fn new(mmio_start_addr: usize) -> Self {
        Self {
            inner: NullLock::new(SpiFlashInner::new(mmio_start_addr)),
        }
    }

    /// Program the clock divider and clear the FIFOs. The caller routes
    /// the SPI0 pins first (`GPIO::map_spi0`).
    pub fn init(&self, khz: u32) {
        self.inner.lock(|inner| inner.init(khz));
    }
}

//------------------------------------------------------------------------------
// OS Interface Code
//------------------------------------------------------------------------------

impl interface::DeviceDriver for SpiFlash {
    fn compatible(&self) -> &'static str {
        "BCM2835 SPI0 serial flash"
    }
}

impl bitwave::platform::FirmwareSource for &SpiFlash {
    fn open(&mut self, offset: u32) {
        self.inner.lock(|inner| inner.open(offset));
    }

    fn read(&mut self, buf: &mut [u8]) {
        self.inner.lock(|inner| inner.read(buf));
    }

    fn close(&mut self) {
        self.inner.lock(|inner| inner.close());
    }
}
