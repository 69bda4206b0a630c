//! The driver context.
//!
//! [`Bcm43430`] owns everything mutable: the bus, the window cache, the
//! IOCTL engine and the firmware staging buffer. One instance per chip,
//! passed around by exclusive reference; there is no process-wide state.

use crate::backplane::Backplane;
use crate::constants::*;
use crate::event::{Event, EventMask};
use crate::link::SdioBus;
use crate::sdpcm::Sdpcm;
use crate::Result;

pub struct Bcm43430<B> {
    pub bus: B,
    pub(crate) bak: Backplane,
    pub(crate) ioctl: Sdpcm,
    pub(crate) txbuf: [u8; TXBUF_LEN],
}

impl<B: SdioBus> Bcm43430<B> {
    pub const fn new(bus: B) -> Self {
        Bcm43430 {
            bus,
            bak: Backplane::new(),
            ioctl: Sdpcm::new(),
            txbuf: [0; TXBUF_LEN],
        }
    }

    // ---- backplane -------------------------------------------------------

    pub fn read32(&mut self, addr: u32) -> Result<u32> {
        self.bak.read32(&mut self.bus, addr)
    }

    pub fn write32(&mut self, addr: u32, val: u32) -> Result<()> {
        self.bak.write32(&mut self.bus, addr, val)
    }

    pub fn set_window(&mut self, addr: u32) -> Result<()> {
        self.bak.set_window(&mut self.bus, addr)
    }

    // ---- control requests ------------------------------------------------

    pub fn get_var(&mut self, name: &str, out: &mut [u8], wait_msec: i32) -> Result<usize> {
        self.ioctl.get_var(&mut self.bus, &mut self.bak, name, out, wait_msec)
    }

    pub fn set_var(&mut self, name: &str, value: &[u8], wait_msec: i32) -> Result<usize> {
        self.ioctl.set_var(&mut self.bus, &mut self.bak, name, value, wait_msec)
    }

    pub fn set_var_u32(&mut self, name: &str, value: u32, wait_msec: i32) -> Result<usize> {
        self.ioctl.set_var_u32(&mut self.bus, &mut self.bak, name, value, wait_msec)
    }

    /// Set a per-bsscfg variable: index and value travel as a pair.
    pub fn set_var_u32x2(&mut self, name: &str, a: u32, b: u32, wait_msec: i32) -> Result<usize> {
        self.ioctl.set_var_u32x2(&mut self.bus, &mut self.bak, name, a, b, wait_msec)
    }

    pub fn cmd_u32(&mut self, cmd: u32, value: u32, wait_msec: i32) -> Result<usize> {
        self.ioctl.cmd_u32(&mut self.bus, &mut self.bak, cmd, value, wait_msec)
    }

    pub fn cmd_data(&mut self, cmd: u32, data: &[u8], wait_msec: i32) -> Result<usize> {
        self.ioctl.cmd_data(&mut self.bus, &mut self.bak, cmd, data, wait_msec)
    }

    pub fn get_data(&mut self, cmd: u32, out: &mut [u8], wait_msec: i32) -> Result<usize> {
        self.ioctl.get(&mut self.bus, &mut self.bak, cmd, None, out, wait_msec)
    }

    // ---- events ----------------------------------------------------------

    /// Rewrite the chip's event subscription mask. Always installed whole.
    pub fn enable_events(&mut self, events: &[Event]) -> Result<usize> {
        let mask = EventMask::of(events);
        self.set_var("event_msgs", mask.bytes(), 100)
    }

    /// Poll for an event frame; see [`Sdpcm::read_event`].
    pub fn read_event(&mut self, out: &mut [u8]) -> Result<usize> {
        self.ioctl.read_event(&mut self.bus, out)
    }

    /// One idle clock half-toggle, to be called from polling loops.
    pub fn idle_clock(&mut self) {
        self.bus.idle_clock();
    }

    // ---- identity --------------------------------------------------------

    /// The station MAC address, once firmware is running.
    pub fn mac_address(&mut self) -> Result<[u8; 6]> {
        let mut mac = [0u8; 6];
        self.get_var("cur_etheraddr", &mut mac, 100)?;
        Ok(mac)
    }

    /// NUL-terminated firmware version string.
    pub fn firmware_version(&mut self, out: &mut [u8]) -> Result<usize> {
        self.get_var("ver", out, 100)
    }
}
