//! The 32 KiB backplane window.
//!
//! Function 1 exposes the chip's 32-bit address space one page at a time:
//! a three-byte register picks which 32 KiB page appears at SDIO addresses
//! `0x8000..=0xFFFF`. Every 32-bit access programs the page
//! (`addr & !0x7FFF`) and then touches `0x8000 | (addr & 0x7FFF)`. The last
//! programmed page is cached so back-to-back accesses inside one page cost
//! a single window write.

use crate::constants::*;
use crate::link::SdioBus;
use crate::Result;
use byteorder::{ByteOrder, LittleEndian};

pub struct Backplane {
    window: u32,
}

impl Backplane {
    pub const fn new() -> Self {
        // The cache starts at the reset value of the window register;
        // bring-up programs a known page before the first access anyway.
        Backplane { window: 0 }
    }

    /// Select the page containing `addr`, skipping the write when the page
    /// is already mapped.
    pub fn set_window<B: SdioBus>(&mut self, bus: &mut B, addr: u32) -> Result<()> {
        let page = addr & WIN_MASK;
        if page != self.window {
            bus.cmd52_writes(FUNC_BAK, BAK_WINDOW_REG, page >> 8, 3)?;
            self.window = page;
        }
        Ok(())
    }

    /// Select the page containing `addr` and return the in-page offset.
    pub fn window_offset<B: SdioBus>(&mut self, bus: &mut B, addr: u32) -> Result<u32> {
        self.set_window(bus, addr)?;
        Ok(addr & WIN_ADDR_MASK)
    }

    /// Read a 32-bit chip register through the window.
    pub fn read32<B: SdioBus>(&mut self, bus: &mut B, addr: u32) -> Result<u32> {
        self.set_window(bus, addr)?;
        let mut bytes = [0u8; 4];
        bus.cmd53_read(FUNC_BAK, addr | WIN_BASE, Some(&mut bytes), 4)?;
        Ok(LittleEndian::read_u32(&bytes))
    }

    /// Write a 32-bit chip register through the window.
    pub fn write32<B: SdioBus>(&mut self, bus: &mut B, addr: u32, val: u32) -> Result<()> {
        self.set_window(bus, addr)?;
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, val);
        bus.cmd53_write(FUNC_BAK, addr | WIN_BASE, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::frame::Frame;
    use std::collections::VecDeque;

    /// Transaction-level bus recorder shared by the upper-layer tests.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Op {
        Cmd(u8, u32),
        Select(u16),
        Cmd52 { func: u32, addr: u32, data: u8, wr: bool },
        Write53 { func: u32, addr: u32, data: Vec<u8> },
        Read53 { func: u32, addr: u32, nbytes: usize, discarded: bool },
        Blocks { func: u32, addr: u32, nblocks: usize },
    }

    #[derive(Default)]
    pub struct MockBus {
        pub ops: Vec<Op>,
        /// Byte queues replayed into CMD52 reads and CMD53 reads.
        pub rsp52: VecDeque<u8>,
        pub rsp53: VecDeque<Vec<u8>>,
        /// Keyed fallbacks consulted when the queues run dry: register
        /// values by `(func, addr)` for CMD52 reads and by chip address
        /// for 4-byte window reads. Each key replays in order, then zero.
        pub reg8: std::collections::HashMap<(u32, u32), VecDeque<u8>>,
        pub reg32: std::collections::HashMap<u32, VecDeque<u32>>,
        /// Acknowledge every control request with a success response that
        /// echoes its request id, so multi-step clients run through.
        pub auto_ack: bool,
        pub last_ioctl_flags: u32,
    }

    impl SdioBus for MockBus {
        fn cmd(&mut self, num: u8, arg: u32) -> crate::Result<Frame> {
            self.ops.push(Op::Cmd(num, arg));
            Ok(Frame::command(num & 0x3F, arg))
        }

        fn select_card(&mut self, rca: u16) -> crate::Result<Frame> {
            self.ops.push(Op::Select(rca));
            Ok(Frame::empty())
        }

        fn cmd52(&mut self, func: u32, addr: u32, data: u8, wr: bool, _raw: bool) -> crate::Result<Frame> {
            self.ops.push(Op::Cmd52 { func, addr, data, wr });
            let mut rsp = Frame::empty();
            if !wr {
                rsp.0[4] = self.rsp52.pop_front().unwrap_or_else(|| {
                    self.reg8
                        .get_mut(&(func, addr))
                        .and_then(|q| q.pop_front())
                        .unwrap_or(0)
                });
            }
            Ok(rsp)
        }

        fn cmd53_write(&mut self, func: u32, addr: u32, buf: &[u8]) -> crate::Result<usize> {
            let flags_at = crate::sdpcm::CDC_OFF + 8;
            if func == FUNC_RAD && buf.len() >= flags_at + 4 {
                self.last_ioctl_flags = u32::from_le_bytes([
                    buf[flags_at],
                    buf[flags_at + 1],
                    buf[flags_at + 2],
                    buf[flags_at + 3],
                ]);
            }
            self.ops.push(Op::Write53 {
                func,
                addr,
                data: buf.to_vec(),
            });
            Ok(buf.len())
        }

        fn cmd53_read(
            &mut self,
            func: u32,
            addr: u32,
            buf: Option<&mut [u8]>,
            nbytes: usize,
        ) -> crate::Result<usize> {
            self.ops.push(Op::Read53 {
                func,
                addr,
                nbytes,
                discarded: buf.is_none(),
            });
            let auto_ack = self.auto_ack;
            let ioctl_flags = self.last_ioctl_flags;
            let data = self.rsp53.pop_front().unwrap_or_else(|| {
                if auto_ack && nbytes == 4 && addr & !WIN_BASE == SB_INT_STATUS_REG {
                    vec![0x01, 0, 0, 0]
                } else if auto_ack && func == FUNC_RAD && nbytes >= crate::sdpcm::DATA_OFF {
                    let mut rsp = vec![0u8; nbytes];
                    let flags = ioctl_flags & 0xFFFF_0000;
                    let at = crate::sdpcm::CDC_OFF + 8;
                    rsp[at..at + 4].copy_from_slice(&flags.to_le_bytes());
                    rsp
                } else if nbytes == 4 {
                    self.reg32
                        .get_mut(&(addr & !WIN_BASE))
                        .and_then(|q| q.pop_front())
                        .map(|v| v.to_le_bytes().to_vec())
                        .unwrap_or_default()
                } else {
                    Vec::new()
                }
            });
            if let Some(buf) = buf {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
            }
            Ok(nbytes)
        }

        fn write_blocks(&mut self, func: u32, addr: u32, buf: &[u8]) -> crate::Result<usize> {
            let nblocks = buf.len() / crate::constants::BAK_BLOCK_BYTES;
            self.ops.push(Op::Blocks { func, addr, nblocks });
            Ok(nblocks)
        }
    }

    impl MockBus {
        pub fn window_writes(&self) -> usize {
            self.ops
                .iter()
                .filter(|op| {
                    matches!(op, Op::Cmd52 { addr, wr: true, .. }
                        if (BAK_WINDOW_REG..BAK_WINDOW_REG + 3).contains(addr))
                })
                .count()
        }
    }

    #[test]
    fn window_cache_suppresses_same_page() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        bak.set_window(&mut bus, 0x18000508).unwrap();
        bak.set_window(&mut bus, 0x18004000).unwrap(); // same 32 KiB page
        assert_eq!(bus.window_writes(), 3); // one 3-byte programming only

        bak.set_window(&mut bus, 0x18008000).unwrap(); // page changes
        assert_eq!(bus.window_writes(), 6);
    }

    #[test]
    fn window_bytes_program_bits_8_and_up() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        bak.set_window(&mut bus, 0x18000000).unwrap();
        let writes: Vec<(u32, u8)> = bus
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Cmd52 { addr, data, wr: true, .. } => Some((*addr, *data)),
                _ => None,
            })
            .collect();
        assert_eq!(
            writes,
            vec![
                (BAK_WINDOW_REG, 0x00),
                (BAK_WINDOW_REG + 1, 0x00),
                (BAK_WINDOW_REG + 2, 0x18)
            ]
        );
    }

    #[test]
    fn read32_goes_through_the_window() {
        let mut bus = MockBus::default();
        bus.rsp53.push_back(vec![0xE2, 0xA9, 0x06, 0x00]);
        let mut bak = Backplane::new();
        let val = bak.read32(&mut bus, 0x18000000).unwrap();
        assert_eq!(val, 0x0006A9E2);
        // The access itself lands inside the mapped page.
        assert!(bus
            .ops
            .iter()
            .any(|op| matches!(op, Op::Read53 { func, addr, nbytes: 4, .. }
                if *func == FUNC_BAK && *addr == (0x18000000 | WIN_BASE))));
    }

    #[test]
    fn write32_is_little_endian_in_window() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        bak.write32(&mut bus, 0x18103408, 0x03).unwrap();
        let w = bus.ops.iter().find_map(|op| match op {
            Op::Write53 { func, addr, data } => Some((*func, *addr, data.clone())),
            _ => None,
        });
        assert_eq!(w, Some((FUNC_BAK, 0x18103408 | WIN_BASE, vec![3, 0, 0, 0])));
    }
}
