//! The 48-bit SDIO command/response frame.
//!
//! One byte-aligned container covers every message the link exchanges; the
//! six-bit number in byte 0 tags which field layout applies. All packing is
//! explicit shift arithmetic. The wire is big-endian; bit 7 of byte 0 goes
//! out first.
//!
//! Layouts (bit 7 left):
//!
//! ```text
//! byte 0    s c n5..n0            start, direction, command number
//! generic   arg[31:24] .. arg[7:0]                       bytes 1-4
//! CMD7      rca[15:8] rca[7:0] 0 0                       bytes 1-4
//! CMD52     w f2..f0 r 0 a16 a15 | a14..a7 | a6..a0 0 | data
//! CMD53     w f2..f0 b i a16 a15 | a14..a7 | a6..a0 l8 | l7..l0
//! byte 5    crc6..crc0 1          CRC7, stop
//! ```

use crate::crc::crc7;
use byteorder::{BigEndian, ByteOrder};

pub const FRAME_BYTES: usize = 6;
pub const FRAME_BITS: u32 = 48;
pub const BLOCK_ACK_BITS: u32 = 8;

/// A sealed command or a received response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame(pub [u8; FRAME_BYTES]);

impl Frame {
    pub const fn empty() -> Self {
        Frame([0; FRAME_BYTES])
    }

    /// Generic command with a big-endian 32-bit argument (CMD0/3/5/8).
    pub fn command(num: u8, arg: u32) -> Self {
        let mut f = Frame::empty();
        f.0[0] = 0x40 | (num & 0x3F);
        BigEndian::write_u32(&mut f.0[1..5], arg);
        f.seal()
    }

    /// CMD7, select the card addressed by `rca`.
    pub fn select_card(rca: u16) -> Self {
        let mut f = Frame::empty();
        f.0[0] = 0x40 | 7;
        BigEndian::write_u16(&mut f.0[1..3], rca);
        f.seal()
    }

    /// CMD52, single-byte register access.
    pub fn io_rw_direct(func: u32, addr: u32, data: u8, wr: bool, raw: bool) -> Self {
        let mut f = Frame::empty();
        f.0[0] = 0x40 | 52;
        f.0[1] = (wr as u8) << 7
            | ((func as u8) & 7) << 4
            | (raw as u8) << 3
            | ((addr >> 15) & 3) as u8;
        f.0[2] = (addr >> 7) as u8;
        f.0[3] = ((addr & 0x7F) as u8) << 1;
        f.0[4] = data;
        f.seal()
    }

    /// CMD53, multi-byte access. `count` is bytes (byte mode) or blocks
    /// (block mode), 9 bits on the wire; an encoded zero means 512.
    pub fn io_rw_extended(func: u32, addr: u32, wr: bool, block: bool, inc: bool, count: u16) -> Self {
        let mut f = Frame::empty();
        f.0[0] = 0x40 | 53;
        f.0[1] = (wr as u8) << 7
            | ((func as u8) & 7) << 4
            | (block as u8) << 3
            | (inc as u8) << 2
            | ((addr >> 15) & 3) as u8;
        f.0[2] = (addr >> 7) as u8;
        f.0[3] = ((addr & 0x7F) as u8) << 1 | ((count >> 8) & 1) as u8;
        f.0[4] = count as u8;
        f.seal()
    }

    /// Compute CRC7 over bytes 0..5 and store it with the stop bit.
    pub fn seal(mut self) -> Self {
        self.0[5] = crc7(&self.0[..FRAME_BYTES - 1]);
        self
    }

    pub fn bytes(&self) -> &[u8; FRAME_BYTES] {
        &self.0
    }

    // ---- decode ----------------------------------------------------------

    /// Direction bit: set for host-to-card commands.
    pub fn is_command(&self) -> bool {
        self.0[0] & 0x40 != 0
    }

    pub fn number(&self) -> u8 {
        self.0[0] & 0x3F
    }

    pub fn arg(&self) -> u32 {
        BigEndian::read_u32(&self.0[1..5])
    }

    /// CRC7 check over the received frame. Advisory: R3/R4 responses carry
    /// all-ones in the CRC field and legitimately fail this.
    pub fn crc_ok(&self) -> bool {
        crc7(&self.0[..FRAME_BYTES - 1]) == self.0[5]
    }

    /// R3 response: the RCA published by CMD3.
    pub fn rca(&self) -> u16 {
        BigEndian::read_u16(&self.0[1..3])
    }

    /// The 17-bit register address of a CMD52/CMD53.
    pub fn reg_addr(&self) -> u32 {
        (self.0[3] >> 1) as u32 | (self.0[2] as u32) << 7 | (self.0[1] as u32 & 3) << 15
    }

    pub fn is_write(&self) -> bool {
        self.0[1] & 0x80 != 0
    }

    pub fn func(&self) -> u32 {
        ((self.0[1] >> 4) & 7) as u32
    }

    /// CMD52 RAW (read-after-write) flag.
    pub fn raw(&self) -> bool {
        self.0[1] & 0x08 != 0
    }

    /// CMD52 data byte (command and response alike).
    pub fn data_byte(&self) -> u8 {
        self.0[4]
    }

    /// R5/R52 response flags.
    pub fn rsp_flags(&self) -> u8 {
        self.0[3]
    }

    /// CMD53 block-mode flag.
    pub fn block_mode(&self) -> bool {
        self.0[1] & 0x08 != 0
    }

    /// CMD53 incrementing-address flag.
    pub fn incrementing(&self) -> bool {
        self.0[1] & 0x04 != 0
    }

    /// CMD53 9-bit count field (0 encodes 512).
    pub fn count(&self) -> u16 {
        (self.0[3] as u16 & 1) << 8 | self.0[4] as u16
    }
}
