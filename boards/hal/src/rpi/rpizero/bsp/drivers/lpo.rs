// SPDX-License-Identifier: MIT OR Apache-2.0
//
//! Driver - GPCLK2 as the WLAN chip's 32.768 kHz sleep clock.
//!
//! The BCM43430 needs a low-power oscillator on its LPO input before it
//! will come out of reset cleanly. The board wires GPIO 43 (GPCLK2) to
//! that input, so the clock manager's GP2 generator is programmed to
//! divide the 19.2 MHz crystal down to 32.768 kHz with MASH-1 smoothing.

use super::common::{interface, MMIODerefWrapper};
use tock_registers::{
    interfaces::Writeable,
    register_structs,
    registers::ReadWrite,
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

/// Clock manager password, required in bits 31..24 of every write.
const CM_PASSWORD: u32 = 0x5A00_0000;

/// Oscillator source, MASH-1, enable.
const GP2CTL_VAL: u32 = CM_PASSWORD | 0x291;

/// 19.2 MHz / (585 + 3840/4096) = 32768.0 Hz.
const GP2DIV_VAL: u32 = CM_PASSWORD | 0x0024_9F00;

register_structs! {
    #[allow(non_snake_case)]
    pub RegisterBlock {
        (0x00 => GP2CTL: ReadWrite<u32>),
        (0x04 => GP2DIV: ReadWrite<u32>),
        (0x08 => @END),
    }
}

type Registers = MMIODerefWrapper<RegisterBlock>;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// The GP2 clock generator.
pub struct Lpo {
    registers: Registers,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Lpo {
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

    /// Start the 32.768 kHz output. The caller muxes GPIO 43 to Alt0
    /// afterwards to put it on the pin.
    pub fn start(&self) {
        self.registers.GP2DIV.set(GP2DIV_VAL);
        self.registers.GP2CTL.set(GP2CTL_VAL);
    }
}

//------------------------------------------------------------------------------
// OS Interface Code
//------------------------------------------------------------------------------

impl interface::DeviceDriver for Lpo {
    fn compatible(&self) -> &'static str {
        "BCM2835 GPCLK2 (WLAN LPO)"
    }
}
