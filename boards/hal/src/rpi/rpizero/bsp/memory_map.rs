// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2018-2021 Andre Richter <andre.o.richter@gmail.com>

//! BSP Memory Map.

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// The board's physical memory map.
#[rustfmt::skip]
pub mod map {
    pub const SYSTMR_OFFSET: usize = 0x0000_3000;
    pub const CM_GP2_OFFSET: usize = 0x0010_1080;
    pub const GPIO_OFFSET:   usize = 0x0020_0000;
    pub const UART_OFFSET:   usize = 0x0020_1000;
    pub const SPI0_OFFSET:   usize = 0x0020_4000;

    pub mod mmio {
        use super::*;

        /// BCM2835 peripheral window as seen by the ARM
        pub const START:            usize =         0x2000_0000;
        pub const SYSTMR_START:     usize = START + SYSTMR_OFFSET;
        pub const CM_GP2_START:     usize = START + CM_GP2_OFFSET;
        pub const GPIO_START:       usize = START + GPIO_OFFSET;
        pub const PL011_UART_START: usize = START + UART_OFFSET;
        pub const SPI0_START:       usize = START + SPI0_OFFSET;
    }
}
