// SPDX-License-Identifier: MIT OR Apache-2.0
//
//! The board as seen by the core driver.
//!
//! [`Board`] routes the driver's GPIO and timer traits onto the global BSP
//! instances, and the pin assignment for the on-board BCM43430 lives here.

use super::arch::time::system_timer;
use super::bsp::global::{GPIO, LPO};
use bitwave::platform::{Gpio, PinMode, Pull, SdioPins, Timer};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// On-board WLAN wiring.
pub const SDIO_PINS: SdioPins = SdioPins {
    clk: 34,
    cmd: 35,
    d0: 36,
};
pub const WL_REG_ON_PIN: u32 = 41;
pub const LPO_PIN: u32 = 43;
pub const LED_PIN: u32 = 47;

/// Handle tying the driver's platform traits to this board.
#[derive(Clone, Copy)]
pub struct Board;

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Feed the chip its 32.768 kHz sleep clock.
pub fn start_lpo() {
    LPO.start();
    GPIO.set_mode(LPO_PIN, PinMode::Alt0);
    GPIO.set_pull(LPO_PIN, Pull::None);
}

/// Drive WL_REG_ON.
pub fn wlan_power(on: bool) {
    GPIO.set_mode(WL_REG_ON_PIN, PinMode::Output);
    GPIO.write_pin(WL_REG_ON_PIN, on);
}

/// The activity LED.
pub fn led(on: bool) {
    GPIO.set_mode(LED_PIN, PinMode::Output);
    GPIO.write_pin(LED_PIN, on);
}

//------------------------------------------------------------------------------
// OS Interface Code
//------------------------------------------------------------------------------

impl Gpio for Board {
    fn set_mode(&mut self, pin: u32, mode: PinMode) {
        GPIO.set_mode(pin, mode);
    }

    fn set_pull(&mut self, pin: u32, pull: Pull) {
        GPIO.set_pull(pin, pull);
    }

    fn write_pin(&mut self, pin: u32, level: bool) {
        GPIO.write_pin(pin, level);
    }

    fn read_pin(&mut self, pin: u32) -> bool {
        GPIO.read_pin(pin)
    }

    fn write_field(&mut self, pin: u32, npins: u32, value: u32) {
        GPIO.write_field(pin, npins, value);
    }

    fn read_field(&mut self, pin: u32, npins: u32) -> u32 {
        GPIO.read_field(pin, npins)
    }
}

impl Timer for Board {
    fn now(&self) -> u32 {
        system_timer().ustime()
    }

    fn delay_us(&self, usec: u32) {
        system_timer().usdelay(usec);
    }

    fn timeout(&self, tick: &mut u32, usec: u32) -> bool {
        system_timer().ustimeout(tick, usec)
    }
}
