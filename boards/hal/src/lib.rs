#![no_std]
#![allow(warnings)]

//! Board support for the bitwave driver.
//!
//! Each board lives behind a cargo feature; the crate compiles to nothing
//! with the default (empty) feature set. The only board wired up today is
//! the Raspberry Pi Zero W, whose BCM43430 sits on GPIO 34..39 with
//! WL_REG_ON on 41 and the 32.768 kHz sleep clock on 43.

#[cfg(feature = "rpi")]
pub mod rpi;
