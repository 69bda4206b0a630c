// SPDX-License-Identifier: MIT OR Apache-2.0
//
//! Architectural timer primitives.
//!
//! The BCM2835 system timer is a free-running 1 MHz counter; its low word
//! is all the driver's timing needs: a microsecond tick, a busy delay and
//! a non-blocking timeout check, all wrap-safe.

use super::super::bsp::drivers::common::MMIODerefWrapper;
use super::super::bsp::memory_map;
use tock_registers::{
    interfaces::Readable,
    register_structs,
    registers::{ReadOnly, ReadWrite},
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_structs! {
    #[allow(non_snake_case)]
    pub RegisterBlock {
        /// Match status, one bit per compare channel
        (0x00 => CS: ReadWrite<u32>),
        /// Free-running counter, low 32 bits, 1 MHz
        (0x04 => CLO: ReadOnly<u32>),
        /// Free-running counter, high 32 bits
        (0x08 => CHI: ReadOnly<u32>),
        (0x0c => _reserved),
        (0x1c => @END),
    }
}

type Registers = MMIODerefWrapper<RegisterBlock>;

/// The free-running microsecond counter.
pub struct SystemTimer {
    registers: Registers,
}

//--------------------------------------------------------------------------------------------------
// Global instances
//--------------------------------------------------------------------------------------------------

static SYSTEM_TIMER: SystemTimer =
    unsafe { SystemTimer::new(memory_map::map::mmio::SYSTMR_START) };

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Return a reference to the system timer.
pub fn system_timer() -> &'static SystemTimer {
    &SYSTEM_TIMER
}

impl SystemTimer {
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

    /// Current microsecond tick, wrapping every ~71.6 minutes.
    pub fn ustime(&self) -> u32 {
        self.registers.CLO.get()
    }

    /// Busy-wait for `usec`.
    pub fn usdelay(&self, usec: u32) {
        let mut tick = 0;
        self.ustimeout(&mut tick, 0);
        while !self.ustimeout(&mut tick, usec) {}
    }

    /// Non-blocking timeout. With `usec == 0` the reference tick restarts
    /// and the call reports expiry; otherwise it reports whether `usec`
    /// has elapsed since `tick`, restarting the reference when it has.
    pub fn ustimeout(&self, tick: &mut u32, usec: u32) -> bool {
        let t = self.registers.CLO.get();
        if usec == 0 || t.wrapping_sub(*tick) >= usec {
            *tick = t;
            return true;
        }
        false
    }
}
