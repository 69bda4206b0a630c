// SPDX-License-Identifier: MIT OR Apache-2.0
//
//! Global driver instances.

use super::drivers::{gpio, lpo, spi_flash, uart};
use super::memory_map::map::mmio;

//--------------------------------------------------------------------------------------------------
// Global instances
//--------------------------------------------------------------------------------------------------

pub static GPIO: gpio::GPIO = unsafe { gpio::GPIO::new(mmio::GPIO_START) };

pub static PL011_UART: uart::PL011Uart = unsafe { uart::PL011Uart::new(mmio::PL011_UART_START) };

pub static SPI_FLASH: spi_flash::SpiFlash = unsafe { spi_flash::SpiFlash::new(mmio::SPI0_START) };

pub static LPO: lpo::Lpo = unsafe { lpo::Lpo::new(mmio::CM_GP2_START) };

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Board identification.
pub fn board_name() -> &'static str {
    "Raspberry Pi Zero W"
}
