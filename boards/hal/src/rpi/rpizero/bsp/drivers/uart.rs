// SPDX-License-Identifier: MIT OR Apache-2.0
//
//! Driver - PL011 UART, the board's console.

use super::super::super::log::console;
use super::super::super::sync::{interface::Mutex, NullLock};
use super::common::{interface, MMIODerefWrapper};
use core::fmt;
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_bitfields! {
    u32,

    /// Flag Register
    FR [
        /// Transmit FIFO full
        TXFF OFFSET(5) NUMBITS(1) [],
        /// Receive FIFO empty
        RXFE OFFSET(4) NUMBITS(1) [],
        /// UART busy transmitting
        BUSY OFFSET(3) NUMBITS(1) [],
    ],

    /// Integer Baud Rate Divisor
    IBRD [
        BAUD_DIVINT OFFSET(0) NUMBITS(16) [],
    ],

    /// Fractional Baud Rate Divisor
    FBRD [
        BAUD_DIVFRAC OFFSET(0) NUMBITS(6) [],
    ],

    /// Line Control Register
    LCR_H [
        /// Word length
        WLEN OFFSET(5) NUMBITS(2) [
            FiveBit = 0b00,
            SixBit = 0b01,
            SevenBit = 0b10,
            EightBit = 0b11
        ],
        /// FIFO enable
        FEN OFFSET(4) NUMBITS(1) [],
    ],

    /// Control Register
    CR [
        /// Receive enable
        RXE OFFSET(9) NUMBITS(1) [],
        /// Transmit enable
        TXE OFFSET(8) NUMBITS(1) [],
        /// UART enable
        UARTEN OFFSET(0) NUMBITS(1) [],
    ],

    /// Interrupt Clear Register
    ICR [
        ALL OFFSET(0) NUMBITS(11) [],
    ],
}

register_structs! {
    #[allow(non_snake_case)]
    pub RegisterBlock {
        (0x00 => DR: ReadWrite<u32>),
        (0x04 => _reserved1),
        (0x18 => FR: ReadOnly<u32, FR::Register>),
        (0x1c => _reserved2),
        (0x24 => IBRD: WriteOnly<u32, IBRD::Register>),
        (0x28 => FBRD: WriteOnly<u32, FBRD::Register>),
        (0x2c => LCR_H: WriteOnly<u32, LCR_H::Register>),
        (0x30 => CR: WriteOnly<u32, CR::Register>),
        (0x34 => _reserved3),
        (0x44 => ICR: WriteOnly<u32, ICR::Register>),
        (0x48 => @END),
    }
}

type Registers = MMIODerefWrapper<RegisterBlock>;

pub struct PL011UartInner {
    registers: Registers,
    chars_written: usize,
    chars_read: usize,
}

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

pub struct PL011Uart {
    inner: NullLock<PL011UartInner>,
}

/// Unprotected instance for the panic path only.
pub type PanicUart = PL011UartInner;

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl PL011UartInner {
    /// Create an instance.
    ///
    /// **Safety**
    ///
    /// - The user must ensure to provide a correct MMIO start address.
    pub const unsafe fn new(mmio_start_addr: usize) -> Self {
        Self {
            registers: Registers::new(mmio_start_addr),
            chars_written: 0,
            chars_read: 0,
        }
    }

    /// 115200 8N1 from the 48 MHz UARTCLK the firmware sets up:
    /// 48e6 / (16 * 115200) = 26.042, fraction 0.042 * 64 + 0.5 = 3.
    pub fn init(&mut self) {
        self.flush_tx();
        self.registers.CR.set(0);
        self.registers.ICR.write(ICR::ALL::CLEAR);
        self.registers.IBRD.write(IBRD::BAUD_DIVINT.val(26));
        self.registers.FBRD.write(FBRD::BAUD_DIVFRAC.val(3));
        self.registers
            .LCR_H
            .write(LCR_H::WLEN::EightBit + LCR_H::FEN::SET);
        self.registers
            .CR
            .write(CR::UARTEN::SET + CR::TXE::SET + CR::RXE::SET);
    }

    fn flush_tx(&self) {
        while self.registers.FR.matches_all(FR::BUSY::SET) {}
    }

    fn write_char_blocking(&mut self, c: char) {
        while self.registers.FR.matches_all(FR::TXFF::SET) {}
        self.registers.DR.set(c as u32);
        self.chars_written += 1;
    }
}

/// `core::fmt::Write` hook so `format_args!` output can land here. The
/// carriage return keeps dumb terminal emulators happy.
impl fmt::Write for PL011UartInner {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if c == '\n' {
                self.write_char_blocking('\r');
            }
            self.write_char_blocking(c);
        }

        Ok(())
    }
}

impl PL011Uart {
    /// Create an instance.
    ///
    /// **Safety**
    ///
    /// - The user must ensure to provide a correct MMIO start address.
    pub const unsafe fn new(mmio_start_addr: usize) -> Self {
        Self {
            inner: NullLock::new(PL011UartInner::new(mmio_start_addr)),
        }
    }
}

//------------------------------------------------------------------------------
// OS Interface Code
//------------------------------------------------------------------------------

impl interface::DeviceDriver for PL011Uart {
    fn compatible(&self) -> &'static str {
        "BCM2835 PL011 UART"
    }

    unsafe fn init(&self) -> Result<(), &'static str> {
        self.inner.lock(|inner| inner.init());

        Ok(())
    }
}

impl console::Write for PL011Uart {
    fn write_char(&self, c: char) {
        self.inner.lock(|inner| inner.write_char_blocking(c));
    }

    fn write_fmt(&self, args: fmt::Arguments) -> fmt::Result {
        self.inner.lock(|inner| fmt::Write::write_fmt(inner, args))
    }

    fn flush(&self) {
        self.inner.lock(|inner| inner.flush_tx());
    }
}

impl console::Read for PL011Uart {
    fn read_char(&self) -> char {
        self.inner.lock(|inner| {
            while inner.registers.FR.matches_all(FR::RXFE::SET) {}
            let c = inner.registers.DR.get() as u8 as char;
            inner.chars_read += 1;
            c
        })
    }

    fn clear_rx(&self) {
        self.inner.lock(|inner| {
            while !inner.registers.FR.matches_all(FR::RXFE::SET) {
                inner.registers.DR.get();
            }
        })
    }
}

impl console::Statistics for PL011Uart {
    fn chars_written(&self) -> usize {
        self.inner.lock(|inner| inner.chars_written)
    }

    fn chars_read(&self) -> usize {
        self.inner.lock(|inner| inner.chars_read)
    }
}
