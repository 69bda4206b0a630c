//! The software-clocked SDIO link.
//!
//! One CLK line, one CMD line, four DATA lines, all plain GPIO. Every
//! half-bit-time is a busy microsecond delay, which puts the link around
//! 400 kHz. Slow, but bit-exact SDIO 2.0. Command bits change on the
//! falling edge and are sampled by the chip on the rising edge; responses
//! and read data are sampled here right after driving the rising edge.
//!
//! The upper layers reach the link through [`SdioBus`], which is also the
//! seam the host-side tests mock.

use crate::constants::*;
use crate::crc::QuadCrc16;
use crate::frame::{Frame, FRAME_BITS, FRAME_BYTES};
use crate::platform::{Gpio, PinMode, Pull, SdioPins, Timer, SD_DATA_PINS};
use crate::trace::TraceRing;
use crate::{Error, Result};

/// Bus operations the layers above the physical link are written against.
///
/// The multi-byte CMD52 helpers have default implementations in terms of
/// the single-byte primitive, so mocks only supply the primitives.
pub trait SdioBus {
    /// Generic command (CMD0/3/5/8) with a 32-bit argument.
    fn cmd(&mut self, num: u8, arg: u32) -> Result<Frame>;

    /// CMD7 card select.
    fn select_card(&mut self, rca: u16) -> Result<Frame>;

    /// CMD52 single-byte access.
    fn cmd52(&mut self, func: u32, addr: u32, data: u8, wr: bool, raw: bool) -> Result<Frame>;

    /// CMD53 byte-mode write; returns bytes put on the wire.
    fn cmd53_write(&mut self, func: u32, addr: u32, buf: &[u8]) -> Result<usize>;

    /// CMD53 byte-mode read of `nbytes`. With `buf == None` the bytes are
    /// clocked in and discarded, keeping the chip's pointer aligned.
    /// Returns payload bytes received (never the CRC trailer).
    fn cmd53_read(&mut self, func: u32, addr: u32, buf: Option<&mut [u8]>, nbytes: usize)
        -> Result<usize>;

    /// CMD53 block-mode write of `buf.len() / 64` backplane blocks;
    /// returns blocks acknowledged on the wire.
    fn write_blocks(&mut self, func: u32, addr: u32, buf: &[u8]) -> Result<usize>;

    /// Write a little-endian value to 1..=4 successive registers.
    fn cmd52_writes(&mut self, func: u32, addr: u32, value: u32, nbytes: usize) -> Result<()> {
        let mut value = value;
        for i in 0..nbytes as u32 {
            self.cmd52(func, addr + i, value as u8, true, false)?;
            value >>= 8;
        }
        Ok(())
    }

    /// Read 1..=4 successive registers into a little-endian value.
    fn cmd52_reads(&mut self, func: u32, addr: u32, nbytes: usize) -> Result<u32> {
        let mut value = 0u32;
        for i in 0..nbytes as u32 {
            let rsp = self.cmd52(func, addr + i, 0, false, false)?;
            value |= (rsp.data_byte() as u32) << (i * 8);
        }
        Ok(value)
    }

    /// One idle half-toggle of the clock, used by polling loops to keep the
    /// chip's state machine fed between transactions.
    fn idle_clock(&mut self) {}

    /// Poll the control-response readiness hint (D1 held low) for up to
    /// `usec`. Purely advisory.
    fn wait_ready(&mut self, _usec: u32) -> bool {
        true
    }

    /// Busy-delay between polls.
    fn delay_us(&mut self, _usec: u32) {}

    /// Drain the bus trace ring through the log facade, if there is one.
    fn dump_trace(&mut self) {}
}

/// The GPIO bit-bang implementation of [`SdioBus`].
pub struct SdioLink<P> {
    plat: P,
    pins: SdioPins,
    clk_high: bool,
    pub trace: TraceRing,
}

impl<P: Gpio + Timer> SdioLink<P> {
    pub const fn new(plat: P, pins: SdioPins) -> Self {
        SdioLink {
            plat,
            pins,
            clk_high: false,
            trace: TraceRing::new(),
        }
    }

    pub fn platform(&mut self) -> &mut P {
        &mut self.plat
    }

    /// Claim the pins: clock driven low, CMD and data released with
    /// pull-ups, ready for the first transaction.
    pub fn configure_pins(&mut self) {
        self.plat.set(self.pins.clk, PinMode::Output, Pull::None);
        self.plat.set(self.pins.cmd, PinMode::Input, Pull::Up);
        for i in 0..SD_DATA_PINS {
            self.plat.set(self.pins.d0 + i, PinMode::Input, Pull::Up);
        }
        self.plat.write_pin(self.pins.clk, false);
        self.clk_high = false;
    }

    #[inline]
    fn half_delay(&self) {
        self.plat.delay_us(CLK_HALF_PERIOD_USEC);
    }

    /// Run `cycles` full clock periods and leave the line low.
    fn clk0(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.half_delay();
            self.clk_high = !self.clk_high;
            self.plat.write_pin(self.pins.clk, self.clk_high);
            self.half_delay();
            self.clk_high = !self.clk_high;
            self.plat.write_pin(self.pins.clk, self.clk_high);
        }
        if self.clk_high {
            self.half_delay();
            self.clk_high = false;
            self.plat.write_pin(self.pins.clk, false);
        }
    }

    /// Serialize a frame MSB-first on CMD, one bit per rising edge.
    fn cmd_write(&mut self, data: &[u8; FRAME_BYTES]) {
        self.plat.set_mode(self.pins.cmd, PinMode::Output);
        let mut b = 0u8;
        for n in 0..FRAME_BITS {
            if n % 8 == 0 {
                b = data[(n / 8) as usize];
            }
            self.plat.write_pin(self.pins.cmd, b & 0x80 != 0);
            b <<= 1;
            self.half_delay();
            self.plat.write_pin(self.pins.clk, true);
            self.half_delay();
            self.plat.write_pin(self.pins.clk, false);
        }
        self.plat.set_mode(self.pins.cmd, PinMode::Input);
    }

    /// Wait for a start bit on `pin`, then clock in `nbits`. `None` when no
    /// start bit shows within the response window.
    fn rsp_read(&mut self, nbits: u32, pin: u32) -> Option<[u8; FRAME_BYTES]> {
        let mut rsp = [0u8; FRAME_BYTES];
        let mut high = true;
        let mut wt = RSP_WAIT_CLOCKS;
        while wt > 0 && high {
            self.half_delay();
            self.plat.write_pin(self.pins.clk, true);
            high = self.plat.read_pin(pin);
            self.half_delay();
            self.plat.write_pin(self.pins.clk, false);
            wt -= 1;
        }
        if high {
            return None;
        }
        // The start bit already occupies bit position 0 of the frame.
        for n in 1..nbits {
            self.half_delay();
            self.plat.write_pin(self.pins.clk, true);
            let byte = (n / 8) as usize;
            rsp[byte] = rsp[byte] << 1 | self.plat.read_pin(pin) as u8;
            self.half_delay();
            self.plat.write_pin(self.pins.clk, false);
        }
        Some(rsp)
    }

    fn data_mode(&mut self, mode: PinMode) {
        for i in 0..SD_DATA_PINS {
            self.plat.set_mode(self.pins.d0 + i, mode);
        }
    }

    /// Push one block onto the data lines: start nibble, payload nibbles
    /// MSB-first, 16 CRC nibbles, stop. The nibble clocks run unthrottled;
    /// only the framing clocks carry the half-bit delay.
    fn block_out(&mut self, data: &[u8]) {
        let mut qcrc = QuadCrc16::new();
        self.clk0(1);
        self.plat.write_field(self.pins.d0, SD_DATA_PINS, 0);
        self.clk0(1);
        let mut dbits = 0;
        while dbits < data.len() * 8 {
            let byte = data[dbits / 8];
            let d = if dbits % 8 == 0 { byte >> 4 } else { byte & 0xF };
            self.plat.write_field(self.pins.d0, SD_DATA_PINS, d as u32);
            self.plat.write_pin(self.pins.clk, true);
            qcrc.update(d);
            dbits += 4;
            self.plat.write_pin(self.pins.clk, false);
        }
        let mut crc = qcrc.value();
        for _ in 0..16 {
            self.plat
                .write_field(self.pins.d0, SD_DATA_PINS, crc as u32 & 0xF);
            self.plat.write_pin(self.pins.clk, true);
            crc >>= 4;
            self.plat.write_pin(self.pins.clk, false);
        }
        self.plat.write_field(self.pins.d0, SD_DATA_PINS, 0xF);
        self.clk0(1);
    }

    /// Clock the response and the data block of a CMD53 read in one pass:
    /// response bits come off CMD while the data start nibble is scanned
    /// for on D0..D3. Returns the response (if any), payload bytes
    /// received, and the CRC register after the trailer (zero means clean).
    fn rsp_block_read(
        &mut self,
        mut dst: Option<&mut [u8]>,
        nbytes: usize,
    ) -> (Option<[u8; FRAME_BYTES]>, usize, QuadCrc16) {
        let mut qcrc = QuadCrc16::new();
        let mut high = true;
        let mut wt = RSP_WAIT_CLOCKS;
        while wt > 0 && high {
            self.half_delay();
            self.plat.write_pin(self.pins.clk, true);
            high = self.plat.read_pin(self.pins.cmd);
            self.half_delay();
            self.plat.write_pin(self.pins.clk, false);
            wt -= 1;
        }
        if high {
            return (None, 0, qcrc);
        }
        let mut rsp = [0u8; FRAME_BYTES];
        let mut rbits = 1u32;
        let mut dbits = 0usize;
        let mut din = false;
        while rbits < FRAME_BITS || din {
            self.half_delay();
            self.plat.write_pin(self.pins.clk, true);
            if rbits < FRAME_BITS {
                let byte = (rbits / 8) as usize;
                rsp[byte] = rsp[byte] << 1 | self.plat.read_pin(self.pins.cmd) as u8;
                rbits += 1;
            }
            if !din && self.plat.read_field(self.pins.d0, SD_DATA_PINS) == 0 {
                din = true;
            } else if din {
                let d = self.plat.read_field(self.pins.d0, SD_DATA_PINS) as u8;
                if let Some(buf) = dst.as_deref_mut() {
                    let idx = dbits / 8;
                    if idx < nbytes && idx < buf.len() {
                        buf[idx] = if dbits % 8 == 0 { d << 4 } else { buf[idx] | d };
                    }
                }
                qcrc.update(d);
                dbits += 4;
                // Keep clocking through the 2 * SD_DATA_PINS CRC bytes.
                if dbits / 8 >= nbytes + (SD_DATA_PINS as usize) * 2 {
                    din = false;
                }
            }
            self.half_delay();
            self.plat.write_pin(self.pins.clk, false);
        }
        let payload = dbits.saturating_sub((SD_DATA_PINS as usize) * 2 * 8) / 8;
        (Some(rsp), payload, qcrc)
    }

    /// Command/response exchange shared by CMD0/3/5/7/8/52.
    fn exchange(&mut self, f: Frame) -> Result<Frame> {
        self.clk0(2);
        self.trace.frame(&f);
        self.cmd_write(f.bytes());
        match self.rsp_read(FRAME_BITS, self.pins.cmd) {
            Some(bytes) => {
                let rsp = Frame(bytes);
                self.trace.frame(&rsp);
                // R3/R4 responses carry a reserved all-ones CRC field.
                if !rsp.crc_ok() && rsp.number() != 0x3F {
                    warn!("sdio: response crc7 mismatch on cmd {}", f.number());
                }
                Ok(rsp)
            }
            None => {
                self.trace.frame(&Frame::empty());
                Err(Error::NoResponse)
            }
        }
    }
}

impl<P: Gpio + Timer> SdioBus for SdioLink<P> {
    fn cmd(&mut self, num: u8, arg: u32) -> Result<Frame> {
        self.exchange(Frame::command(num, arg))
    }

    fn select_card(&mut self, rca: u16) -> Result<Frame> {
        self.exchange(Frame::select_card(rca))
    }

    fn cmd52(&mut self, func: u32, addr: u32, data: u8, wr: bool, raw: bool) -> Result<Frame> {
        self.exchange(Frame::io_rw_direct(func, addr, data, wr, raw))
    }

    fn cmd53_write(&mut self, func: u32, addr: u32, buf: &[u8]) -> Result<usize> {
        let f = Frame::io_rw_extended(func, addr, true, false, true, buf.len() as u16);
        self.clk0(2);
        self.trace.frame(&f);
        self.cmd_write(f.bytes());
        let rsp = self.rsp_read(FRAME_BITS, self.pins.cmd);
        let n = match rsp {
            Some(bytes) => {
                self.trace.frame(&Frame(bytes));
                self.clk0(1);
                self.plat.write_field(self.pins.d0, SD_DATA_PINS, 0xF);
                self.data_mode(PinMode::Output);
                self.block_out(buf);
                self.data_mode(PinMode::Input);
                buf.len()
            }
            None => {
                self.trace.frame(&Frame::empty());
                0
            }
        };
        self.clk0(1);
        self.clk0(16);
        self.trace.data(buf, n, true);
        if n == 0 {
            return Err(Error::NoResponse);
        }
        Ok(n)
    }

    fn cmd53_read(
        &mut self,
        func: u32,
        addr: u32,
        buf: Option<&mut [u8]>,
        nbytes: usize,
    ) -> Result<usize> {
        let f = Frame::io_rw_extended(func, addr, false, false, true, nbytes as u16);
        self.clk0(2);
        self.trace.frame(&f);
        self.cmd_write(f.bytes());
        let mut buf = buf;
        let (rsp, n, qcrc) = self.rsp_block_read(buf.as_deref_mut(), nbytes);
        self.clk0(1);
        match rsp {
            Some(bytes) => {
                self.trace.frame(&Frame(bytes));
                if !qcrc.is_clean() {
                    warn!("sdio: data crc16 mismatch on {} byte read", nbytes);
                }
                let preview = buf.as_deref().unwrap_or(&[]);
                self.trace.data(&preview[..n.min(preview.len())], n, qcrc.is_clean());
                Ok(n)
            }
            None => {
                self.trace.frame(&Frame::empty());
                Err(Error::NoResponse)
            }
        }
    }

    fn write_blocks(&mut self, func: u32, addr: u32, buf: &[u8]) -> Result<usize> {
        let nblocks = buf.len() / BAK_BLOCK_BYTES;
        let f = Frame::io_rw_extended(func, addr, true, true, true, nblocks as u16);
        self.clk0(1);
        self.trace.frame(&f);
        self.cmd_write(f.bytes());
        let mut n = 0;
        match self.rsp_read(FRAME_BITS, self.pins.cmd) {
            Some(bytes) => {
                self.trace.frame(&Frame(bytes));
                self.plat.write_field(self.pins.d0, SD_DATA_PINS, 0xF);
                self.data_mode(PinMode::Output);
                while n < nblocks {
                    let block = &buf[n * BAK_BLOCK_BYTES..(n + 1) * BAK_BLOCK_BYTES];
                    self.block_out(block);
                    self.trace.data(block, BAK_BLOCK_BYTES, true);
                    if let Some(ack) = self.rsp_read(crate::frame::BLOCK_ACK_BITS, self.pins.d0) {
                        self.trace.data_ack(ack[0]);
                        // Data-response token: 010 in the status bits.
                        if (ack[0] >> 4) & 0x7 != 0b010 {
                            warn!("sdio: block {} write token {:02x}", n, ack[0]);
                        }
                    }
                    n += 1;
                    self.clk0(2);
                }
                self.data_mode(PinMode::Input);
            }
            None => {
                self.trace.frame(&Frame::empty());
            }
        }
        self.clk0(1);
        if n == 0 {
            return Err(Error::NoResponse);
        }
        Ok(n)
    }

    fn idle_clock(&mut self) {
        self.half_delay();
        self.clk_high = !self.clk_high;
        self.plat.write_pin(self.pins.clk, self.clk_high);
    }

    fn wait_ready(&mut self, usec: u32) -> bool {
        let mut tick = 0;
        self.plat.timeout(&mut tick, 0);
        let mut ready = false;
        while !ready && !self.plat.timeout(&mut tick, usec) {
            ready = !self.plat.read_pin(self.pins.d1());
        }
        ready
    }

    fn delay_us(&mut self, usec: u32) {
        self.plat.delay_us(usec);
    }

    fn dump_trace(&mut self) {
        self.trace.dump();
    }
}
