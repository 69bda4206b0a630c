//! Thin WLAN clients: escan and WPA/WPA2 join.
//!
//! Nothing here is clever: these marshal the dongle's little-endian
//! parameter blocks, subscribe to the right events and fire the IOCTLs in
//! the order the firmware expects. Progress and results arrive on the
//! event path; the caller polls [`crate::chip::Bcm43430::read_event`] and
//! decodes with [`crate::event::BrcmEvent`] and [`EscanResult`].

use crate::chip::Bcm43430;
use crate::constants::*;
use crate::event::{JOIN_EVENTS, NO_EVENTS, SCAN_EVENTS};
use crate::link::SdioBus;
use crate::Result;
use byteorder::{ByteOrder, LittleEndian};

pub const SSID_MAX: usize = 32;
pub const PASSPHRASE_MAX: usize = 64;

/// Dwell time per scanned channel.
pub const SCAN_CHANNEL_TIME_MS: u32 = 40;

const SCANTYPE_PASSIVE: u8 = 1;
const WSEC_TKIP: u32 = 2;
const WSEC_AES: u32 = 4;
const WPA_AUTH_PSK: u32 = 4;
const WPA2_AUTH_PSK: u32 = 0x80;
const PMK_FLAG_PASSPHRASE: u16 = 1;

pub const ESCAN_PARAMS_BYTES: usize = 132;

/// Link security for [`Bcm43430::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Open,
    WpaTkip,
    Wpa2Psk,
}

pub struct JoinParams<'a> {
    pub ssid: &'a str,
    pub passphrase: &'a [u8],
    pub security: Security,
}

/// `wlc_ssid_t`: length-prefixed, zero-padded.
pub fn ssid_bytes(ssid: &str) -> [u8; 36] {
    let mut buf = [0u8; 36];
    let n = ssid.len().min(SSID_MAX);
    LittleEndian::write_u32(&mut buf[0..4], n as u32);
    buf[4..4 + n].copy_from_slice(&ssid.as_bytes()[..n]);
    buf
}

/// `wl_country_t`: abbreviation, revision, country code.
pub fn country_bytes(country: &str, rev: i32) -> [u8; 12] {
    let mut buf = [0u8; 12];
    let n = country.len().min(3);
    buf[..n].copy_from_slice(&country.as_bytes()[..n]);
    LittleEndian::write_i32(&mut buf[4..8], rev);
    buf[8..8 + n].copy_from_slice(&country.as_bytes()[..n]);
    buf
}

/// `wsec_pmk_t` holding a passphrase for the on-chip supplicant.
pub fn passphrase_bytes(passphrase: &[u8]) -> [u8; 68] {
    let mut buf = [0u8; 68];
    let n = passphrase.len().min(PASSPHRASE_MAX);
    LittleEndian::write_u16(&mut buf[0..2], n as u16);
    LittleEndian::write_u16(&mut buf[2..4], PMK_FLAG_PASSPHRASE);
    buf[4..4 + n].copy_from_slice(&passphrase[..n]);
    buf
}

/// The escan parameter block: start action, wildcard ssid/bssid, passive
/// dwell, and either one channel or the full 2.4 GHz set.
pub fn escan_params(channel: Option<u8>, sync_id: u16) -> [u8; ESCAN_PARAMS_BYTES] {
    let mut p = [0u8; ESCAN_PARAMS_BYTES];
    LittleEndian::write_u32(&mut p[0..4], 1); // version
    LittleEndian::write_u16(&mut p[4..6], 1); // action: start
    LittleEndian::write_u16(&mut p[6..8], sync_id);
    // ssid_len stays 0: wildcard
    p[44..50].fill(0xFF); // bssid: broadcast
    p[50] = 2; // bss_type: any
    p[51] = SCANTYPE_PASSIVE;
    for word in [52usize, 56, 60, 64] {
        LittleEndian::write_u32(&mut p[word..word + 4], !0); // firmware defaults
    }
    let chans: &[u8] = match channel {
        Some(ch) => {
            LittleEndian::write_u16(&mut p[68..70], 1);
            &[ch]
        }
        None => {
            LittleEndian::write_u16(&mut p[68..70], 14);
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
        }
    };
    // nssids stays 0
    for (i, &ch) in chans.iter().enumerate() {
        p[72 + 2 * i] = ch;
        p[72 + 2 * i + 1] = 0x2B; // 2.4 GHz, 20 MHz chanspec flags
    }
    p
}

impl<B: SdioBus> Bcm43430<B> {
    /// Install the regulatory country.
    pub fn set_country(&mut self, country: &str, rev: i32) -> Result<()> {
        self.set_var("country", &country_bytes(country, rev), 100)?;
        Ok(())
    }

    /// Bring the interface up; the generous wait covers firmware settling.
    pub fn up(&mut self) -> Result<()> {
        self.cmd_u32(WLC_UP, 0, 200)?;
        Ok(())
    }

    /// Kick off an escan. Results arrive as `ESCAN_RESULT` events.
    pub fn start_scan(&mut self, channel: Option<u8>, sync_id: u16) -> Result<()> {
        self.cmd_u32(WLC_SET_SCAN_CHANNEL_TIME, SCAN_CHANNEL_TIME_MS, 0)?;
        self.up()?;
        self.write32(SB_INT_STATUS_REG, 0)?;
        let mut drain = [0u8; 64];
        self.bus
            .cmd53_read(FUNC_RAD, WIN_BASE, Some(&mut drain), 64)?;
        self.enable_events(SCAN_EVENTS)?;
        self.set_var("escan", &escan_params(channel, sync_id), 0)?;
        Ok(())
    }

    /// Associate (and for WPA/WPA2, let the on-chip supplicant run the
    /// handshake). Progress arrives as `SET_SSID`/`AUTH`/`LINK`/`PSK_SUP`
    /// events; this returns once the join request is accepted.
    pub fn join(&mut self, params: &JoinParams<'_>) -> Result<()> {
        self.enable_events(NO_EVENTS)?;
        self.cmd_u32(WLC_SET_INFRA, 1, 50)?;
        self.cmd_u32(WLC_SET_AUTH, 0, 0)?;
        match params.security {
            Security::Open => {
                self.cmd_u32(WLC_SET_WSEC, 0, 0)?;
                self.cmd_u32(WLC_SET_WPA_AUTH, 0, 0)?;
            }
            sec => {
                let (wsec, wpa_auth) = match sec {
                    Security::Wpa2Psk => (WSEC_TKIP | WSEC_AES, WPA2_AUTH_PSK),
                    _ => (WSEC_TKIP, WPA_AUTH_PSK),
                };
                self.cmd_u32(WLC_SET_WSEC, wsec, 0)?;
                self.set_var_u32x2("bsscfg:sup_wpa", 0, 1, 0)?;
                self.set_var_u32x2("bsscfg:sup_wpa2_eapver", 0, !0, 0)?;
                self.set_var_u32x2("bsscfg:sup_wpa_tmo", 0, SUP_WPA_TIMEOUT_MSEC, 0)?;
                self.cmd_data(WLC_SET_WSEC_PMK, &passphrase_bytes(params.passphrase), 0)?;
                self.cmd_u32(WLC_SET_WPA_AUTH, wpa_auth, 0)?;
            }
        }
        self.enable_events(JOIN_EVENTS)?;
        self.cmd_data(WLC_SET_SSID, &ssid_bytes(params.ssid), 100)?;
        Ok(())
    }
}

/// One BSS out of an `ESCAN_RESULT` event payload.
#[derive(Debug, PartialEq, Eq)]
pub struct EscanResult<'a> {
    pub sync_id: u16,
    pub bssid: [u8; 6],
    pub ssid: &'a [u8],
    pub chanspec: u16,
}

impl<'a> EscanResult<'a> {
    /// Decode the first BSS record of an escan result event's data.
    pub fn decode(data: &'a [u8]) -> Option<EscanResult<'a>> {
        // wl_escan_result header, then one wl_bss_info record
        const BSS_OFF: usize = 12;
        if data.len() < BSS_OFF + 73 {
            return None;
        }
        let bss = &data[BSS_OFF..];
        let mut bssid = [0u8; 6];
        bssid.copy_from_slice(&bss[8..14]);
        let ssid_len = (bss[18] as usize).min(SSID_MAX);
        Some(EscanResult {
            sync_id: LittleEndian::read_u16(&data[8..10]),
            bssid,
            ssid: &bss[19..19 + ssid_len],
            chanspec: LittleEndian::read_u16(&bss[71..73]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backplane::tests::{MockBus, Op};

    /// CDC command numbers of every control frame put on the wire, with
    /// the frame tag invariant checked along the way.
    fn sent_cmds(bus: &MockBus) -> Vec<u32> {
        bus.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write53 { func: FUNC_RAD, data, .. } => {
                    let len = LittleEndian::read_u16(&data[0..2]);
                    let notlen = LittleEndian::read_u16(&data[2..4]);
                    assert_eq!(notlen, len ^ 0xFFFF);
                    Some(LittleEndian::read_u32(&data[crate::sdpcm::CDC_OFF..]))
                }
                _ => None,
            })
            .collect()
    }

    fn payload_of(bus: &MockBus, idx: usize) -> Vec<u8> {
        bus.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write53 { func: FUNC_RAD, data, .. } => Some(data[crate::sdpcm::DATA_OFF..].to_vec()),
                _ => None,
            })
            .nth(idx)
            .unwrap()
    }

    #[test]
    fn escan_params_layout() {
        let p = escan_params(Some(1), 0x1234);
        assert_eq!(LittleEndian::read_u32(&p[0..4]), 1);
        assert_eq!(LittleEndian::read_u16(&p[4..6]), 1);
        assert_eq!(LittleEndian::read_u16(&p[6..8]), 0x1234);
        assert_eq!(&p[44..50], &[0xFF; 6]);
        assert_eq!(p[50], 2);
        assert_eq!(p[51], SCANTYPE_PASSIVE);
        assert_eq!(LittleEndian::read_u32(&p[52..56]), !0);
        assert_eq!(LittleEndian::read_u16(&p[68..70]), 1);
        assert_eq!(&p[72..74], &[1, 0x2B]);
        // single-channel scan leaves the rest of the channel table empty
        assert!(p[74..100].iter().all(|&b| b == 0));
    }

    #[test]
    fn escan_all_channels() {
        let p = escan_params(None, 0);
        assert_eq!(LittleEndian::read_u16(&p[68..70]), 14);
        assert_eq!(&p[98..100], &[14, 0x2B]);
    }

    #[test]
    fn ssid_and_pmk_marshalling() {
        let s = ssid_bytes("testnet");
        assert_eq!(LittleEndian::read_u32(&s[0..4]), 7);
        assert_eq!(&s[4..11], b"testnet");
        assert!(s[11..].iter().all(|&b| b == 0));

        let k = passphrase_bytes(b"testpass");
        assert_eq!(LittleEndian::read_u16(&k[0..2]), 8);
        assert_eq!(LittleEndian::read_u16(&k[2..4]), PMK_FLAG_PASSPHRASE);
        assert_eq!(&k[4..12], b"testpass");

        let c = country_bytes("GB", -1);
        assert_eq!(&c[0..2], b"GB");
        assert_eq!(LittleEndian::read_i32(&c[4..8]), -1);
        assert_eq!(&c[8..10], b"GB");
    }

    #[test]
    fn scan_fires_the_expected_sequence() {
        let mut chip = Bcm43430::new(MockBus {
            auto_ack: true,
            ..Default::default()
        });
        chip.start_scan(Some(1), 0x1234).unwrap();
        assert_eq!(
            sent_cmds(&chip.bus),
            vec![
                WLC_SET_SCAN_CHANNEL_TIME,
                WLC_UP,
                WLC_SET_VAR, // event_msgs
                WLC_SET_VAR, // escan
            ]
        );
        let escan = payload_of(&chip.bus, 3);
        assert_eq!(&escan[..6], b"escan\0");
        // name, then the whole parameter block (plus round-up padding)
        assert!(escan[6..].len() >= ESCAN_PARAMS_BYTES);
        assert_eq!(LittleEndian::read_u32(&escan[6..10]), 1);
        assert_eq!(LittleEndian::read_u16(&escan[6 + 6..6 + 8]), 0x1234);
    }

    #[test]
    fn wpa2_join_runs_the_supplicant_setup() {
        let mut chip = Bcm43430::new(MockBus {
            auto_ack: true,
            ..Default::default()
        });
        chip.join(&JoinParams {
            ssid: "testnet",
            passphrase: b"testpass",
            security: Security::Wpa2Psk,
        })
        .unwrap();
        assert_eq!(
            sent_cmds(&chip.bus),
            vec![
                WLC_SET_VAR, // event_msgs off
                WLC_SET_INFRA,
                WLC_SET_AUTH,
                WLC_SET_WSEC,
                WLC_SET_VAR, // bsscfg:sup_wpa
                WLC_SET_VAR, // bsscfg:sup_wpa2_eapver
                WLC_SET_VAR, // bsscfg:sup_wpa_tmo
                WLC_SET_WSEC_PMK,
                WLC_SET_WPA_AUTH,
                WLC_SET_VAR, // event_msgs join set
                WLC_SET_SSID,
            ]
        );
        // sup_wpa rides as (bsscfg index, value)
        let sup = payload_of(&chip.bus, 4);
        assert_eq!(&sup[..16], b"bsscfg:sup_wpa\0\0");
        assert_eq!(LittleEndian::read_u32(&sup[15..19]), 0);
        assert_eq!(LittleEndian::read_u32(&sup[19..23]), 1);
        // the ssid rides as wlc_ssid_t
        let ssid = payload_of(&chip.bus, 10);
        assert_eq!(LittleEndian::read_u32(&ssid[0..4]), 7);
        assert_eq!(&ssid[4..11], b"testnet");
    }

    #[test]
    fn open_join_skips_the_supplicant() {
        let mut chip = Bcm43430::new(MockBus {
            auto_ack: true,
            ..Default::default()
        });
        chip.join(&JoinParams {
            ssid: "cafe",
            passphrase: b"",
            security: Security::Open,
        })
        .unwrap();
        let cmds = sent_cmds(&chip.bus);
        assert!(!cmds.contains(&WLC_SET_WSEC_PMK));
        assert_eq!(cmds[3], WLC_SET_WSEC);
        assert_eq!(cmds[4], WLC_SET_WPA_AUTH);
    }

    #[test]
    fn escan_result_decoding() {
        let mut data = vec![0u8; 12 + 80];
        LittleEndian::write_u16(&mut data[8..10], 0x1234); // sync id
        LittleEndian::write_u16(&mut data[10..12], 1); // bss count
        let bss = &mut data[12..];
        bss[8..14].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        bss[18] = 7;
        bss[19..26].copy_from_slice(b"testnet");
        LittleEndian::write_u16(&mut bss[71..73], 0x2B01);
        let r = EscanResult::decode(&data).unwrap();
        assert_eq!(r.sync_id, 0x1234);
        assert_eq!(r.bssid, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(r.ssid, b"testnet");
        assert_eq!(r.chanspec & 0xFF, 1);

        // Too short to hold a BSS record
        assert!(EscanResult::decode(&data[..40]).is_none());
    }
}
