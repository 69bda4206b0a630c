//! Host-side driver for the Broadcom BCM43430 WLAN chip over a bit-banged
//! four-bit SDIO bus.
//!
//! The crate is layered bottom-up:
//!
//! - [`platform`]: the thin GPIO/timer surface a board must provide,
//! - [`crc`]: CRC7 (command) and four-lane reversed CRC16 (data) engines,
//! - [`link`]: the software-clocked SDIO command/data link,
//! - [`backplane`]: 32-bit chip addresses through the paged 32 KiB window,
//! - [`sdpcm`]: SDPCM/CDC framed control requests and event reads,
//! - [`chip`]: the driver context, bring-up sequencer and firmware loader,
//! - [`wlan`]: thin scan/join clients on top of the IOCTL layer.
//!
//! Nothing here allocates; all buffers are fixed-size and owned by the
//! single [`chip::Bcm43430`] context. There is no interrupt handling: the
//! event path is polled by the caller.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod macros;

pub mod backplane;
pub mod bringup;
pub mod chip;
pub mod constants;
pub mod crc;
pub mod event;
pub mod frame;
pub mod link;
pub mod nvram;
pub mod platform;
pub mod sdpcm;
pub mod trace;
pub mod wlan;

/// Driver error classes.
///
/// Wire-level anomalies that the protocol tolerates (a bad CRC16 on a read
/// block, a late response) are *not* errors; they are reported through the
/// trace ring and the log facade and the transfer result stands. `Error` is
/// reserved for conditions the caller must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No response start bit within the response window.
    NoResponse,
    /// A chip readback during bring-up did not match its documented value.
    /// The chip will not execute firmware; the payload names the check.
    Bringup(&'static str),
    /// The chip flagged the IOCTL request as failed (`flags` bit 0).
    IoctlFailed,
    /// The IOCTL poll window closed without a matching response.
    IoctlTimeout,
    /// A received frame failed structural validation and was discarded.
    BadFrame,
    /// A caller-supplied buffer or length does not fit the wire format.
    InvalidParam,
}

pub type Result<T> = core::result::Result<T, Error>;
