// SPDX-License-Identifier: MIT OR Apache-2.0
//
//! Printing over the system console.

use super::console;
use core::fmt;

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use console::Write;

    console::console().write_fmt(args).unwrap();
}

#[doc(hidden)]
pub fn _print_line(args: fmt::Arguments) {
    use console::Write;

    let con = console::console();
    con.write_fmt(args).unwrap();
    con.write_char('\n');
}

/// Prints without a newline.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::rpi::rpizero::log::print::_print(format_args!($($arg)*)));
}

/// Prints with a newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ({
        $crate::rpi::rpizero::log::print::_print_line(format_args!($($arg)*));
    })
}

/// Prints an info line.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => ({
        $crate::rpi::rpizero::log::print::_print_line(format_args!($($arg)*));
    })
}

/// Prints a warning line.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        $crate::rpi::rpizero::log::print::_print(format_args!("warning: "));
        $crate::rpi::rpizero::log::print::_print_line(format_args!($($arg)*));
    })
}
