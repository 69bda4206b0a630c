//! Cold-start sequencing.
//!
//! The order below is load-bearing: it reproduces, poke for poke, the one
//! register script this silicon accepts between power-on and a running ARM.
//! Reordering the core resets or the clock transitions leaves a chip that
//! enumerates but never executes firmware. Interleaved readbacks that look
//! redundant are part of the script; they keep the chip's internal state
//! machine in lockstep with the host.
//!
//! Every check compares a readback against its documented value and fails
//! the whole bring-up if it differs. There is no partial recovery from a
//! mis-sequenced chip, only power-cycle and retry.

use crate::chip::Bcm43430;
use crate::constants::*;
use crate::link::SdioBus;
use crate::platform::FirmwareSource;
use crate::{Error, Result};

impl<B: SdioBus> Bcm43430<B> {
    /// Take the chip from power-on to a running ARM: card init, clocks,
    /// core resets, firmware and configuration upload, ARM release.
    /// Returns the card's RCA.
    ///
    /// The caller has already driven WL_REG_ON high and let the regulators
    /// settle; the firmware image and a validated configuration blob come
    /// from outside.
    pub fn bring_up<F: FirmwareSource>(
        &mut self,
        firmware: &mut F,
        firmware_len: usize,
        config: &[u8],
    ) -> Result<u16> {
        // Bus reset and card identification. CMD0 and the early CMD5 get
        // no response by design.
        self.bus.cmd52_writes(FUNC_BUS, CCCR_IOABORT, 0, 1).ok();
        self.bus.delay_us(20_000);
        self.bus.cmd52_writes(FUNC_BUS, CCCR_IOABORT, 8, 1).ok();
        self.bus.delay_us(20_000);
        self.bus.cmd(0, 0).ok();
        self.bus.cmd(8, 0x1AA).ok();
        self.bus.cmd(5, 0).ok();
        self.bus.cmd(5, 0x20_0000).ok();
        let rca = self.bus.cmd(3, 0)?.rca();
        self.bus.select_card(rca)?;
        debug!("bringup: card up, rca {:04x}", rca);

        // Bus interface: high speed, 4-bit, block sizes, function 1 on.
        self.bus.cmd52_writes(FUNC_BUS, CCCR_SPEED, 0x03, 1)?;
        self.bus.cmd52_writes(FUNC_BUS, CCCR_BICTRL, 0x42, 1)?;
        self.bus
            .cmd52_writes(FUNC_BUS, CCCR_F1_BLKSIZE, BAK_BLOCK_BYTES as u32, 2)?;
        self.bus
            .cmd52_writes(FUNC_BUS, CCCR_F2_BLKSIZE, RAD_BLOCK_BYTES as u32, 2)?;
        self.bus.cmd52_writes(FUNC_BUS, CCCR_IOEN, 1 << FUNC_BAK, 1)?;
        self.check_cccr(CCCR_IORDY, 0xFF, 1 << FUNC_BAK, "function 1 ready")?;

        // Map the chipcommon page and read the chip id.
        self.set_window(CHIPCOMMON_BASE)?;
        let chip_id = self.read32(CHIPCOMMON_BASE)?;
        debug!("bringup: chip id {:08x}", chip_id);

        // ALP clock request, then drop the pullups.
        self.bus.cmd52_writes(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 0x28, 1)?;
        self.bus.cmd52_reads(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 1)?;
        self.bus.cmd52_writes(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 0x21, 1)?;
        self.bus.cmd52_writes(FUNC_BAK, BAK_PULLUP_REG, 0, 1)?;
        self.read32(CHIPCOMMON_BASE)?;
        self.read32(CHIPCOMMON_BASE + 0xFC)?;

        // Core resets: ARM held, MAC cycled, SOCSRAM released.
        self.write32(ARM_IOCTRL_REG, 0x03)?;
        self.write32(MAC_IOCTRL_REG, 0x07)?;
        self.write32(MAC_RESETCTRL_REG, 0x00)?;
        self.write32(MAC_IOCTRL_REG, 0x05)?;
        self.write32(SRAM_IOCTRL_REG, 0x03)?;
        self.write32(SRAM_RESETCTRL_REG, 0x00)?;
        self.write32(SRAM_IOCTRL_REG, 0x01)?;
        self.check_reg8(SRAM_IOCTRL_REG, 0x01, "socram ioctrl")?;

        // SRAM banks: zero the PDA on banks 0..=3.
        self.write32(SRAM_BANKX_IDX_REG, 0x03)?;
        self.write32(SRAM_BANKX_PDA_REG, 0x00)?;
        self.check_reg8(SRAM_IOCTRL_REG, 0x01, "socram ioctrl")?;
        self.check_reg8(SRAM_RESETCTRL_REG, 0x00, "socram in reset")?;
        self.read32(SOCSRAM_BASE)?;
        for bank in 0..3 {
            self.write32(SRAM_BANKX_IDX_REG, bank)?;
            self.read32(SRAM_PROBE_REG)?;
        }
        self.write32(SRAM_BANKX_IDX_REG, 3)?;

        // Interrupt pacing on function 0, and the 0x8600 strap bit.
        self.check_cccr(CCCR_SEP_INT_CTL, 0xFF, 1, "sep int ctl")?;
        self.bus.cmd52_writes(FUNC_BUS, CCCR_SEP_INT_CTL, 3, 1)?;
        let mut strap = [0u8; 4];
        self.bus.cmd53_read(FUNC_BAK, 0x8600, Some(&mut strap), 4)?;
        strap[1] |= 0x40;
        self.bus.cmd53_write(FUNC_BAK, 0x8600, &strap)?;

        // Cycle the chip clock and wait for ALP to report.
        self.bus.cmd52_writes(FUNC_BUS, CCCR_IOEN, 1 << FUNC_BAK, 1)?;
        self.bus.cmd52_writes(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 0, 1)?;
        self.bus.delay_us(45_000);
        self.bus.cmd52_writes(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 8, 1)?;
        self.check_bak(BAK_CHIP_CLOCK_CSR, 0xFF, 0x48, "alp clock")?;

        // Firmware into chip RAM, then a spot read of the tail.
        let loaded = self.load_firmware(firmware, firmware_len)?;
        debug!("bringup: firmware {} bytes", loaded);
        self.set_window(0x58000)?;
        let mut tail = [0u8; 4];
        self.bus.cmd53_read(FUNC_BAK, 0xEE80, Some(&mut tail), 4)?;

        // Configuration records, then a spot read of that tail too.
        let nvlen = self.load_nvram(config)?;
        debug!("bringup: nvram {} bytes", nvlen);
        let mut nvtail = [0u8; 44];
        self.bus.cmd53_read(FUNC_BAK, 0xFFD4, Some(&mut nvtail), 44)?;

        // Release the ARM.
        self.read32(SRAM_IOCTRL_REG)?;
        self.read32(SRAM_RESETCTRL_REG)?;
        self.write32(SB_INT_STATUS_REG, 0xFFFF_FFFF)?;
        self.write32(ARM_IOCTRL_REG, 0x03)?;
        self.write32(ARM_RESETCTRL_REG, 0x00)?;
        self.write32(ARM_IOCTRL_REG, 0x01)?;
        self.read32(ARM_IOCTRL_REG)?;

        // HT clock up.
        self.set_window(CHIPCOMMON_BASE)?;
        self.bus.cmd52_writes(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 0, 1)?;
        self.bus.cmd52_writes(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 0x10, 1)?;
        self.bus.cmd52_reads(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 1)?;
        self.bus.delay_us(50_000);
        self.check_bak(BAK_CHIP_CLOCK_CSR, 0xFF, 0xD0, "ht clock")?;
        self.bus.cmd52_writes(FUNC_BAK, BAK_CHIP_CLOCK_CSR, 0xD2, 1)?;

        // Mailbox the firmware, enable the radio function.
        self.write32(SB_TO_SB_MBOX_DATA_REG, 0x40000)?;
        self.bus
            .cmd52_writes(FUNC_BUS, CCCR_IOEN, 1 << FUNC_BAK | 1 << FUNC_RAD, 1)?;
        self.bus.cmd52_reads(FUNC_BUS, CCCR_IORDY, 1)?;
        self.bus.delay_us(100_000);
        self.check_cccr(CCCR_IORDY, 0xFF, 0x06, "function 2 ready")?;
        self.write32(SB_INT_HOST_MASK_REG, 0x2000_00F0)?;
        self.read32(SR_CONTROL1_REG)?;

        // Wakeup, card capabilities, interrupts on.
        self.set_window(CHIPCOMMON_BASE)?;
        self.bus.cmd52_writes(FUNC_BAK, BAK_WAKEUP_REG, 2, 1)?;
        self.bus.cmd52_writes(FUNC_BUS, CCCR_BRCM_CARDCAP, 6, 1)?;
        self.bus.cmd52_writes(FUNC_BUS, CCCR_INTEN, 0x07, 1)?;
        self.bus.cmd52_reads(FUNC_BUS, CCCR_INTPEND, 1)?;

        // Acknowledge the boot interrupts and drain the mailboxes.
        self.read32(SB_INT_STATUS_REG)?;
        self.write32(SB_INT_STATUS_REG, 0x2000_00C0)?;
        self.read32(SB_TO_HOST_MBOX_DATA_REG)?;
        self.write32(SB_TO_SB_MBOX_REG, 0x02)?;
        self.read32(SR_CONTROL1_REG)?;
        self.read32(0x68000 | 0x7FFC)?;
        self.set_window(0x38000)?;
        let mut shared = [0u8; 64];
        self.bus.cmd53_read(FUNC_BAK, 0x70D4, Some(&mut shared), 64)?;
        self.read32(SB_INT_STATUS_REG)?;
        self.write32(SB_INT_STATUS_REG, 0x80)?;

        // First drain of the radio function; the chip is alive.
        let mut drain = [0u8; 64];
        self.bus
            .cmd53_read(FUNC_RAD, WIN_BASE, Some(&mut drain), 64)?;
        debug!("bringup: complete");
        Ok(rca)
    }

    /// Stream the firmware image into chip RAM at address 0.
    ///
    /// The image advances in staging-buffer stripes; each stripe goes out
    /// as whole 64-byte blocks in one block-mode CMD53, with any residue
    /// finishing in byte mode. The window follows the cursor across 32 KiB
    /// pages.
    pub fn load_firmware<F: FirmwareSource>(&mut self, src: &mut F, len: usize) -> Result<usize> {
        src.open(0);
        let mut nbytes = 0usize;
        while nbytes < len {
            let offset = self.bak.window_offset(&mut self.bus, nbytes as u32)?;
            let stripe = TXBUF_LEN.min(len - nbytes);
            let whole = stripe / BAK_BLOCK_BYTES * BAK_BLOCK_BYTES;
            src.read(&mut self.txbuf[..stripe]);
            if whole > 0 {
                let n = self
                    .bus
                    .write_blocks(FUNC_BAK, WIN_BASE + offset, &self.txbuf[..whole])?;
                if n * BAK_BLOCK_BYTES < whole {
                    src.close();
                    return Err(Error::Bringup("firmware block write short"));
                }
            }
            if stripe > whole {
                self.bus.cmd53_write(
                    FUNC_BAK,
                    WIN_BASE + offset + whole as u32,
                    &self.txbuf[whole..stripe],
                )?;
            }
            nbytes += stripe;
        }
        src.close();
        Ok(nbytes)
    }

    /// Write the configuration blob to its fixed region near the top of
    /// chip RAM, in backplane-block-sized slices.
    pub fn load_nvram(&mut self, config: &[u8]) -> Result<usize> {
        self.set_window(NVRAM_WINDOW)?;
        let mut nbytes = 0usize;
        while nbytes < config.len() {
            let len = (config.len() - nbytes).min(BAK_BLOCK_BYTES);
            self.bus.cmd53_write(
                FUNC_BAK,
                NVRAM_DEST + nbytes as u32,
                &config[nbytes..nbytes + len],
            )?;
            nbytes += len;
        }
        Ok(nbytes)
    }

    fn check_cccr(&mut self, addr: u32, mask: u32, want: u32, what: &'static str) -> Result<()> {
        let got = self.bus.cmd52_reads(FUNC_BUS, addr, 1)?;
        if got & mask != want {
            error!("bringup: {} (cccr {:#x} read {:#x})", what, addr, got);
            self.bus.dump_trace();
            return Err(Error::Bringup(what));
        }
        Ok(())
    }

    fn check_bak(&mut self, addr: u32, mask: u32, want: u32, what: &'static str) -> Result<()> {
        let got = self.bus.cmd52_reads(FUNC_BAK, addr, 1)?;
        if got & mask != want {
            error!("bringup: {} (bak {:#x} read {:#x})", what, addr, got);
            self.bus.dump_trace();
            return Err(Error::Bringup(what));
        }
        Ok(())
    }

    fn check_reg8(&mut self, addr: u32, want: u32, what: &'static str) -> Result<()> {
        let got = self.read32(addr)?;
        if got & 0xFF != want {
            error!("bringup: {} (reg {:#010x} read {:#x})", what, addr, got);
            self.bus.dump_trace();
            return Err(Error::Bringup(what));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backplane::tests::{MockBus, Op};
    use crate::platform::SliceSource;
    use std::collections::VecDeque;

    fn chip_with_healthy_regs() -> Bcm43430<MockBus> {
        let mut bus = MockBus::default();
        // CCCR readbacks, in the order the script consumes them per key.
        bus.reg8
            .insert((FUNC_BUS, CCCR_IORDY), VecDeque::from([0x02, 0x06, 0x06]));
        bus.reg8
            .insert((FUNC_BUS, CCCR_SEP_INT_CTL), VecDeque::from([0x01]));
        bus.reg8.insert(
            (FUNC_BAK, BAK_CHIP_CLOCK_CSR),
            VecDeque::from([0x28, 0x48, 0xD0, 0xD0]),
        );
        // Backplane readbacks for the SOCSRAM checks.
        bus.reg32
            .insert(SRAM_IOCTRL_REG, VecDeque::from([0x01, 0x01]));
        Bcm43430::new(bus)
    }

    #[test]
    fn full_bring_up_succeeds_and_orders_core_resets() {
        let _ = env_logger::builder().is_test(true).try_init();
        let image = vec![0x5Au8; 3 * BAK_BLOCK_BYTES + 7];
        let mut src = SliceSource::new(&image);
        let mut chip = chip_with_healthy_regs();
        let rca = chip
            .bring_up(&mut src, image.len(), crate::nvram::STOCK_CONFIG)
            .unwrap();
        // The mock echoes a zero argument back through CMD3.
        assert_eq!(rca, 0);

        // ARM is held in reset before the MAC cycle, and released last.
        let writes32: Vec<(u32, u32)> = chip
            .bus
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Write53 { func: FUNC_BAK, addr, data } if data.len() == 4 => Some((
                    *addr & !WIN_BASE,
                    u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
                )),
                _ => None,
            })
            .collect();
        let pos = |a: u32, v: u32| writes32.iter().position(|w| *w == (a, v)).unwrap();
        assert!(pos(ARM_IOCTRL_REG, 3) < pos(MAC_IOCTRL_REG, 7));
        assert!(pos(MAC_RESETCTRL_REG, 0) < pos(MAC_IOCTRL_REG, 5));
        assert!(pos(SRAM_IOCTRL_REG, 3) < pos(SRAM_IOCTRL_REG, 1));
        assert!(pos(ARM_RESETCTRL_REG, 0) > pos(SRAM_IOCTRL_REG, 1));
        assert!(pos(ARM_IOCTRL_REG, 1) > pos(ARM_RESETCTRL_REG, 0));
        // The run mailbox is posted after the ARM release.
        assert!(pos(SB_TO_SB_MBOX_DATA_REG, 0x40000) > pos(ARM_IOCTRL_REG, 1));
    }

    #[test]
    fn bring_up_fails_fast_on_bad_iordy() {
        let mut bus = MockBus::default();
        bus.reg8
            .insert((FUNC_BUS, CCCR_IORDY), VecDeque::from([0x00]));
        let mut chip = Bcm43430::new(bus);
        let image = [0u8; 64];
        let mut src = SliceSource::new(&image);
        let err = chip
            .bring_up(&mut src, image.len(), crate::nvram::STOCK_CONFIG)
            .unwrap_err();
        assert_eq!(err, Error::Bringup("function 1 ready"));
        // Nothing was uploaded.
        assert!(chip.bus.ops.iter().all(|op| !matches!(op, Op::Blocks { .. })));
    }

    #[test]
    fn firmware_striping_matches_the_image_size() {
        // The full-size image: 23 full stripes and one 0x2E84-byte tail.
        let image = vec![0u8; FIRMWARE_LEN];
        let mut src = SliceSource::new(&image);
        let mut chip = Bcm43430::new(MockBus::default());
        let n = chip.load_firmware(&mut src, FIRMWARE_LEN).unwrap();
        assert_eq!(n, FIRMWARE_LEN);

        let blocks: Vec<usize> = chip
            .bus
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Blocks { nblocks, .. } => Some(*nblocks),
                _ => None,
            })
            .collect();
        // ceil(0x5EE84 / 0x4000) = 24 stripes
        assert_eq!(blocks.len(), 24);
        assert!(blocks[..23].iter().all(|&n| n == TXBUF_LEN / BAK_BLOCK_BYTES));
        assert_eq!(*blocks.last().unwrap(), 0x2E84 / BAK_BLOCK_BYTES);

        // The 4-byte residue goes out in byte mode, right past the blocks.
        let tail = chip
            .bus
            .ops
            .iter()
            .find_map(|op| match op {
                Op::Write53 { func: FUNC_BAK, addr, data } if data.len() == 4 => Some(*addr),
                _ => None,
            })
            .unwrap();
        assert_eq!(tail, WIN_BASE + 0x6E80);
    }

    #[test]
    fn firmware_window_follows_the_cursor() {
        let image = vec![0u8; 3 * 0x8000]; // three pages exactly
        let mut src = SliceSource::new(&image);
        let mut chip = Bcm43430::new(MockBus::default());
        // Leave the window where bring-up leaves it before upload.
        chip.set_window(CHIPCOMMON_BASE).unwrap();
        chip.load_firmware(&mut src, image.len()).unwrap();
        // One 3-byte programming up front, then one per 32 KiB page.
        assert_eq!(chip.bus.window_writes(), 3 + 3 * 3);
        // Every block write lands inside the window range.
        for op in &chip.bus.ops {
            if let Op::Blocks { addr, .. } = op {
                assert!(*addr >= WIN_BASE && *addr < WIN_BASE + 0x8000);
            }
        }
    }

    #[test]
    fn nvram_lands_at_its_fixed_region() {
        let mut chip = Bcm43430::new(MockBus::default());
        let n = chip.load_nvram(crate::nvram::STOCK_CONFIG).unwrap();
        assert_eq!(n, crate::nvram::STOCK_CONFIG.len());
        let writes: Vec<(u32, usize)> = chip
            .bus
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Write53 { func: FUNC_BAK, addr, data } => Some((*addr, data.len())),
                _ => None,
            })
            .collect();
        assert_eq!(writes[0].0, NVRAM_DEST);
        assert!(writes[..writes.len() - 1].iter().all(|w| w.1 == BAK_BLOCK_BYTES));
        // Contiguous, ascending addresses.
        for pair in writes.windows(2) {
            assert_eq!(pair[1].0, pair[0].0 + pair[0].1 as u32);
        }
    }
}
