//! SDPCM/CDC control framing on the radio function.
//!
//! Requests go out as one CMD53 write to function 2 at `0x8000`: a
//! length/not-length frame tag, the SDPCM software header, the CDC command
//! header, then `name\0value` (named variables) or the raw value (numbered
//! commands). Responses come back the same way once the SDIO core raises a
//! bit in the low byte of its interrupt status; a 16-bit request id carried
//! in the CDC flags pairs them up. Event frames share the wire and are read
//! with [`Sdpcm::read_event`].
//!
//! Layout (little-endian, offsets for the non-glom build):
//!
//! ```text
//!  0  len      u16      4  seq    u8     12  cmd     u32
//!  2  notlen   u16      5  chan   u8     16  outlen  u16
//!                       6  nextlen u8    18  inlen   u16
//!                       7  hdrlen u8     20  flags   u32
//!                       8  flow   u8     24  status  u32
//!                       9  credit u8     28  data
//! ```

use crate::backplane::Backplane;
use crate::constants::*;
use crate::link::SdioBus;
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Glom prefix length; the glom path is compiled in but never enabled on
/// this chip, the frames always run bare.
#[cfg(feature = "glom")]
const GLOM_LEN: usize = 8;
#[cfg(not(feature = "glom"))]
const GLOM_LEN: usize = 0;

pub(crate) const SW_OFF: usize = 4 + GLOM_LEN;
pub(crate) const CDC_OFF: usize = SW_OFF + 8;
pub(crate) const DATA_OFF: usize = CDC_OFF + 16;

/// SDPCM header length as carried in the software header.
pub(crate) const SDPCM_HDRLEN: u8 = 12 + GLOM_LEN as u8;

/// Frame tag plus software header, the fixed prefix of every event frame.
pub const EVENT_HDR_BYTES: usize = 12;

const BUF_LEN: usize = DATA_OFF + CDC_MAX_DATA;

/// Largest value/variable payload of a single request.
pub const CDC_MAX_DATA: usize = 256;

pub struct Sdpcm {
    /// SDPCM tx sequence, host-incremented, informational only.
    seq: u8,
    /// CDC request id; responses must echo it.
    reqid: u16,
    txbuf: [u8; BUF_LEN],
    rxbuf: [u8; BUF_LEN],
}

impl Sdpcm {
    pub const fn new() -> Self {
        Sdpcm {
            seq: 1,
            reqid: 0,
            txbuf: [0; BUF_LEN],
            rxbuf: [0; BUF_LEN],
        }
    }

    /// Issue a set-style request (value travels to the chip).
    pub fn set<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        cmd: u32,
        name: Option<&str>,
        value: &[u8],
        wait_msec: i32,
    ) -> Result<usize> {
        self.transact(bus, bak, true, cmd, name, value, None, wait_msec)
    }

    /// Issue a get-style request and copy the response payload into `out`.
    pub fn get<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        cmd: u32,
        name: Option<&str>,
        out: &mut [u8],
        wait_msec: i32,
    ) -> Result<usize> {
        self.transact(bus, bak, false, cmd, name, &[], Some(out), wait_msec)
    }

    /// Named variable read.
    pub fn get_var<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        name: &str,
        out: &mut [u8],
        wait_msec: i32,
    ) -> Result<usize> {
        self.get(bus, bak, WLC_GET_VAR, Some(name), out, wait_msec)
    }

    /// Named variable write.
    pub fn set_var<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        name: &str,
        value: &[u8],
        wait_msec: i32,
    ) -> Result<usize> {
        self.set(bus, bak, WLC_SET_VAR, Some(name), value, wait_msec)
    }

    /// Named 32-bit variable write.
    pub fn set_var_u32<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        name: &str,
        value: u32,
        wait_msec: i32,
    ) -> Result<usize> {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.set_var(bus, bak, name, &bytes, wait_msec)
    }

    /// Named write of a `(bsscfg index, value)` pair.
    pub fn set_var_u32x2<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        name: &str,
        a: u32,
        b: u32,
        wait_msec: i32,
    ) -> Result<usize> {
        let mut bytes = [0u8; 8];
        LittleEndian::write_u32(&mut bytes[..4], a);
        LittleEndian::write_u32(&mut bytes[4..], b);
        self.set_var(bus, bak, name, &bytes, wait_msec)
    }

    /// Numbered command with a 32-bit argument.
    pub fn cmd_u32<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        cmd: u32,
        value: u32,
        wait_msec: i32,
    ) -> Result<usize> {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.set(bus, bak, cmd, None, &bytes, wait_msec)
    }

    /// Numbered command with a data payload.
    pub fn cmd_data<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        cmd: u32,
        data: &[u8],
        wait_msec: i32,
    ) -> Result<usize> {
        self.set(bus, bak, cmd, None, data, wait_msec)
    }

    /// The request/response cycle.
    ///
    /// After the wire write the request walks the ack states: poll the SDIO
    /// core's interrupt status every `IOCTL_POLL_MSEC` until the low byte
    /// lights up, read the frame back, and accept it only when it echoes
    /// our request id; a stale id means a response to a request we gave up
    /// on, which is discarded without charging the timeout. `wait_msec < 0`
    /// is fire-and-forget.
    fn transact<B: SdioBus>(
        &mut self,
        bus: &mut B,
        bak: &mut Backplane,
        wr: bool,
        cmd: u32,
        name: Option<&str>,
        value: &[u8],
        mut out: Option<&mut [u8]>,
        wait_msec: i32,
    ) -> Result<usize> {
        let namelen = name.map_or(0, |n| n.len() + 1);
        let outlen = out.as_deref().map_or(0, |o| o.len());
        let txdlen = if wr {
            namelen + value.len()
        } else {
            namelen.max(outlen)
        };
        if DATA_OFF + txdlen > BUF_LEN {
            return Err(Error::InvalidParam);
        }
        let len = DATA_OFF + txdlen;
        let txlen = (len + 3) & !3;

        self.txbuf[..txlen].fill(0);
        LittleEndian::write_u16(&mut self.txbuf[0..2], len as u16);
        LittleEndian::write_u16(&mut self.txbuf[2..4], !(len as u16));
        #[cfg(feature = "glom")]
        {
            LittleEndian::write_u16(&mut self.txbuf[4..6], (len - 4) as u16);
            self.txbuf[7] = 1; // last frame of the glom
        }
        self.txbuf[SW_OFF] = self.seq;
        self.seq = self.seq.wrapping_add(1);
        self.txbuf[SW_OFF + 3] = SDPCM_HDRLEN;
        LittleEndian::write_u32(&mut self.txbuf[CDC_OFF..], cmd);
        LittleEndian::write_u16(&mut self.txbuf[CDC_OFF + 4..], txdlen as u16);
        self.reqid = self.reqid.wrapping_add(1);
        let flags = (self.reqid as u32) << 16 | if wr { 2 } else { 0 };
        LittleEndian::write_u32(&mut self.txbuf[CDC_OFF + 8..], flags);
        if let Some(name) = name {
            self.txbuf[DATA_OFF..DATA_OFF + name.len()].copy_from_slice(name.as_bytes());
            // the NUL after the name is already there from the fill
        }
        if wr {
            self.txbuf[DATA_OFF + namelen..DATA_OFF + namelen + value.len()].copy_from_slice(value);
        }

        trace!("ioctl: cmd {} reqid {} txlen {}", cmd, self.reqid, txlen);
        bus.cmd53_write(FUNC_RAD, WIN_BASE, &self.txbuf[..txlen])?;

        if wait_msec < 0 {
            return Ok(0);
        }
        bus.wait_ready(IOCTL_WAIT_USEC);

        let mut remaining = wait_msec;
        loop {
            let status = bak.read32(bus, SB_INT_STATUS_REG)?;
            if status & 0xFF != 0 {
                bak.write32(bus, SB_INT_STATUS_REG, status)?;
                let n = bus.cmd53_read(FUNC_RAD, WIN_BASE, Some(&mut self.rxbuf[..txlen]), txlen)?;
                let rflags = LittleEndian::read_u32(&self.rxbuf[CDC_OFF + 8..]);
                if (rflags >> 16) as u16 != self.reqid {
                    // Late response to an abandoned request; keep polling.
                    trace!("ioctl: stale reqid {:04x}, retrying", rflags >> 16);
                    continue;
                }
                if rflags & 1 != 0 {
                    let cdc_status = LittleEndian::read_u32(&self.rxbuf[CDC_OFF + 12..]);
                    warn!("ioctl: cmd {} failed, status {}", cmd, cdc_status as i32);
                    return Err(Error::IoctlFailed);
                }
                if let Some(out) = out.take() {
                    let dlen = out.len().min(CDC_MAX_DATA);
                    out[..dlen].copy_from_slice(&self.rxbuf[DATA_OFF..DATA_OFF + dlen]);
                }
                return Ok(n);
            }
            if remaining <= 0 {
                return Err(Error::IoctlTimeout);
            }
            bus.delay_us(IOCTL_POLL_MSEC as u32 * 1000);
            remaining -= IOCTL_POLL_MSEC;
        }
    }

    /// Poll for an asynchronous frame on the radio function.
    ///
    /// Reads the 12-byte prefix; a frame is accepted only when the tag
    /// validates (`len > 12`, `len == !notlen`). The remainder streams in
    /// `IOCTL_MAX_BLKLEN` chunks, filling `out` and draining any excess off
    /// the wire. Returns the frame length past the prefix, 0 when nothing
    /// (valid) is pending.
    pub fn read_event<B: SdioBus>(&mut self, bus: &mut B, out: &mut [u8]) -> Result<usize> {
        let mut hdr = [0u8; EVENT_HDR_BYTES];
        bus.cmd53_read(FUNC_RAD, WIN_BASE, Some(&mut hdr), EVENT_HDR_BYTES)?;
        let len = LittleEndian::read_u16(&hdr[0..2]) as usize;
        let notlen = LittleEndian::read_u16(&hdr[2..4]);
        if len <= EVENT_HDR_BYTES || notlen == 0 || len != (!notlen) as usize {
            return Ok(0);
        }
        let total = len - EVENT_HDR_BYTES;
        let mut n = 0;
        while n < total && n < out.len() {
            let dlen = (total - n).min(out.len() - n).min(IOCTL_MAX_BLKLEN);
            bus.cmd53_read(FUNC_RAD, WIN_BASE, Some(&mut out[n..n + dlen]), dlen)?;
            n += dlen;
        }
        while n < total {
            let dlen = (total - n).min(IOCTL_MAX_BLKLEN);
            bus.cmd53_read(FUNC_RAD, WIN_BASE, None, dlen)?;
            n += dlen;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backplane::tests::{MockBus, Op};

    fn int_status(val: u32) -> Vec<u8> {
        let mut b = vec![0; 4];
        LittleEndian::write_u32(&mut b, val);
        b
    }

    fn cdc_response(reqid: u16, error: bool, data: &[u8]) -> Vec<u8> {
        let mut rsp = vec![0u8; DATA_OFF + data.len()];
        let flags = (reqid as u32) << 16 | error as u32;
        LittleEndian::write_u32(&mut rsp[CDC_OFF + 8..], flags);
        rsp[DATA_OFF..].copy_from_slice(data);
        rsp
    }

    fn tx_frames(bus: &MockBus) -> Vec<Vec<u8>> {
        bus.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write53 { func, data, .. } if *func == FUNC_RAD => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn frame_tag_and_headers() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        let mut io = Sdpcm::new();
        // fire-and-forget so no response scripting is needed
        io.set_var_u32(&mut bus, &mut bak, "mpc", 0, -1).unwrap();

        let f = &tx_frames(&bus)[0];
        let len = LittleEndian::read_u16(&f[0..2]);
        let notlen = LittleEndian::read_u16(&f[2..4]);
        assert_eq!(notlen, !len);
        // "mpc\0" + u32 after the 28-byte header
        assert_eq!(len as usize, DATA_OFF + 4 + 4);
        assert_eq!(f.len() % 4, 0);
        assert_eq!(f[SW_OFF], 1); // first sequence number
        assert_eq!(f[SW_OFF + 3], SDPCM_HDRLEN); // sdpcm header length
        assert_eq!(LittleEndian::read_u32(&f[CDC_OFF..]), WLC_SET_VAR);
        assert_eq!(LittleEndian::read_u16(&f[CDC_OFF + 4..]), 8);
        let flags = LittleEndian::read_u32(&f[CDC_OFF + 8..]);
        assert_eq!(flags & 2, 2); // set direction
        assert_eq!(&f[DATA_OFF..DATA_OFF + 4], b"mpc\0");
    }

    #[test]
    fn reqid_is_strictly_monotonic() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        let mut io = Sdpcm::new();
        for _ in 0..5 {
            io.cmd_u32(&mut bus, &mut bak, WLC_UP, 0, -1).unwrap();
        }
        let ids: Vec<u16> = tx_frames(&bus)
            .iter()
            .map(|f| (LittleEndian::read_u32(&f[CDC_OFF + 8..]) >> 16) as u16)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        let seqs: Vec<u8> = tx_frames(&bus).iter().map(|f| f[SW_OFF]).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn response_payload_copies_out() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        let mut io = Sdpcm::new();
        bus.rsp53.push_back(int_status(0x40)); // SB int status read
        bus.rsp53.push_back(cdc_response(1, false, b"7.45.41.46\0\0"));
        let mut ver = [0u8; 12];
        let n = io
            .get_var(&mut bus, &mut bak, "ver", &mut ver, 100)
            .unwrap();
        assert!(n > 0);
        assert_eq!(&ver[..10], b"7.45.41.46");
        // The status write-back to clear must have happened.
        assert!(bus.ops.iter().any(|op| matches!(op,
            Op::Write53 { func: FUNC_BAK, addr, .. } if *addr == (SB_INT_STATUS_REG | WIN_BASE))));
    }

    #[test]
    fn stale_reqid_is_discarded_and_polling_continues() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        let mut io = Sdpcm::new();
        bus.rsp53.push_back(int_status(0x01));
        bus.rsp53.push_back(cdc_response(0x7777, false, &[])); // stale
        bus.rsp53.push_back(int_status(0x01));
        bus.rsp53.push_back(cdc_response(1, false, &[0xAB, 0, 0, 0]));
        let mut out = [0u8; 4];
        io.get(&mut bus, &mut bak, WLC_UP, None, &mut out, 10).unwrap();
        assert_eq!(out[0], 0xAB);
    }

    #[test]
    fn chip_error_flag_fails_the_request() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        let mut io = Sdpcm::new();
        bus.rsp53.push_back(int_status(0x01));
        bus.rsp53.push_back(cdc_response(1, true, &[]));
        let err = io.cmd_u32(&mut bus, &mut bak, WLC_UP, 0, 10).unwrap_err();
        assert_eq!(err, crate::Error::IoctlFailed);
    }

    #[test]
    fn timeout_without_status() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        let mut io = Sdpcm::new();
        // int status reads keep coming back zero
        let err = io.cmd_u32(&mut bus, &mut bak, WLC_UP, 0, 6).unwrap_err();
        assert_eq!(err, crate::Error::IoctlTimeout);
    }

    #[test]
    fn fire_and_forget_never_reads() {
        let mut bus = MockBus::default();
        let mut bak = Backplane::new();
        let mut io = Sdpcm::new();
        io.cmd_u32(&mut bus, &mut bak, WLC_UP, 1, -1).unwrap();
        assert!(bus.ops.iter().all(|op| !matches!(op, Op::Read53 { .. })));
    }

    #[test]
    fn event_frame_tag_validation() {
        let mut bus = MockBus::default();
        let mut io = Sdpcm::new();

        // Valid: len 0x80, notlen 0xFF7F
        let mut hdr = vec![0u8; EVENT_HDR_BYTES];
        LittleEndian::write_u16(&mut hdr[0..2], 0x0080);
        LittleEndian::write_u16(&mut hdr[2..4], 0xFF7F);
        bus.rsp53.push_back(hdr);
        bus.rsp53.push_back(vec![0xEE; 0x80 - EVENT_HDR_BYTES]);
        let mut buf = [0u8; 256];
        let n = io.read_event(&mut bus, &mut buf).unwrap();
        assert_eq!(n, 0x80 - EVENT_HDR_BYTES);
        assert_eq!(buf[0], 0xEE);

        // Invalid notlen: discarded
        let mut hdr = vec![0u8; EVENT_HDR_BYTES];
        LittleEndian::write_u16(&mut hdr[0..2], 0x0080);
        LittleEndian::write_u16(&mut hdr[2..4], 0x0000);
        bus.rsp53.push_back(hdr);
        assert_eq!(io.read_event(&mut bus, &mut buf).unwrap(), 0);
    }

    #[test]
    fn oversize_event_drains_the_tail() {
        let mut bus = MockBus::default();
        let mut io = Sdpcm::new();
        let total = 600usize; // larger than the 64-byte destination
        let mut hdr = vec![0u8; EVENT_HDR_BYTES];
        let len = (total + EVENT_HDR_BYTES) as u16;
        LittleEndian::write_u16(&mut hdr[0..2], len);
        LittleEndian::write_u16(&mut hdr[2..4], !len);
        bus.rsp53.push_back(hdr);
        let mut buf = [0u8; 64];
        let n = io.read_event(&mut bus, &mut buf).unwrap();
        assert_eq!(n, total);
        // One header read, one copying read, then discarded chunks of <=256.
        let reads: Vec<(usize, bool)> = bus
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Read53 { nbytes, discarded, .. } => Some((*nbytes, *discarded)),
                _ => None,
            })
            .collect();
        assert_eq!(
            reads,
            vec![
                (EVENT_HDR_BYTES, false),
                (64, false),
                (256, true),
                (256, true),
                (24, true)
            ]
        );
    }
}
