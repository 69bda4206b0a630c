//! Asynchronous event decoding and subscription masks.
//!
//! Event frames arrive on the radio function as Ethernet frames with the
//! Broadcom ethertype `0x886C`: a vendor header, then a fixed event message
//! whose multi-byte fields are big-endian and need swapping on this
//! little-endian host. Which events the chip raises at all is governed by a
//! 26-byte bitmap installed through the `event_msgs` variable; the mask is
//! always rewritten whole, never patched.

use byteorder::{BigEndian, ByteOrder};

/// Broadcom event ethertype.
pub const ETHERTYPE_BRCM: u16 = 0x886C;

/// Highest event number carried in the subscription bitmap.
pub const EVENT_MAX: u16 = 207;

pub const EVENT_MASK_BYTES: usize = 26;

/// Offset of the Ethernet header inside an event payload (the BDC header
/// and its padding precede it).
const ETH_OFF: usize = 10;
const ETHERTYPE_OFF: usize = ETH_OFF + 12;
const VENDOR_HDR_OFF: usize = ETH_OFF + 14;
const MSG_OFF: usize = VENDOR_HDR_OFF + 10;
const DATA_OFF: usize = MSG_OFF + 48;

/// Dongle event numbers (the subset this driver subscribes to or names).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Event {
    SetSsid = 0,
    Join = 1,
    Start = 2,
    Auth = 3,
    AuthInd = 4,
    Deauth = 5,
    DeauthInd = 6,
    Assoc = 7,
    AssocInd = 8,
    Reassoc = 9,
    ReassocInd = 10,
    Disassoc = 11,
    DisassocInd = 12,
    Link = 16,
    MicError = 17,
    EapolMsg = 26,
    ScanComplete = 27,
    PskSup = 46,
    EscanResult = 69,
}

impl Event {
    pub fn from_number(num: u32) -> Option<Event> {
        use Event::*;
        Some(match num {
            0 => SetSsid,
            1 => Join,
            2 => Start,
            3 => Auth,
            4 => AuthInd,
            5 => Deauth,
            6 => DeauthInd,
            7 => Assoc,
            8 => AssocInd,
            9 => Reassoc,
            10 => ReassocInd,
            11 => Disassoc,
            12 => DisassocInd,
            16 => Link,
            17 => MicError,
            26 => EapolMsg,
            27 => ScanComplete,
            46 => PskSup,
            69 => EscanResult,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        use Event::*;
        match self {
            SetSsid => "SET_SSID",
            Join => "JOIN",
            Start => "START",
            Auth => "AUTH",
            AuthInd => "AUTH_IND",
            Deauth => "DEAUTH",
            DeauthInd => "DEAUTH_IND",
            Assoc => "ASSOC",
            AssocInd => "ASSOC_IND",
            Reassoc => "REASSOC",
            ReassocInd => "REASSOC_IND",
            Disassoc => "DISASSOC",
            DisassocInd => "DISASSOC_IND",
            Link => "LINK",
            MicError => "MIC_ERROR",
            EapolMsg => "EAPOL_MSG",
            ScanComplete => "SCAN_COMPLETE",
            PskSup => "PSK_SUP",
            EscanResult => "ESCAN_RESULT",
        }
    }
}

/// Event status field values.
pub fn status_name(status: u32) -> &'static str {
    match status {
        0 => "SUCCESS",
        1 => "FAIL",
        2 => "TIMEOUT",
        3 => "NO_NETWORKS",
        4 => "ABORT",
        5 => "NO_ACK",
        6 => "UNSOLICITED",
        7 => "ATTEMPT",
        8 => "PARTIAL",
        9 => "NEWSCAN",
        10 => "NEWASSOC",
        _ => "?",
    }
}

/// Event sets the two clients subscribe to.
pub const SCAN_EVENTS: &[Event] = &[Event::EscanResult];
pub const JOIN_EVENTS: &[Event] = &[
    Event::SetSsid,
    Event::Auth,
    Event::DeauthInd,
    Event::DisassocInd,
    Event::Link,
    Event::PskSup,
];
pub const NO_EVENTS: &[Event] = &[];

/// The `event_msgs` bitmap, one bit per event number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask([u8; EVENT_MASK_BYTES]);

impl EventMask {
    pub const fn new() -> Self {
        EventMask([0; EVENT_MASK_BYTES])
    }

    pub fn of(events: &[Event]) -> Self {
        let mut mask = EventMask::new();
        for &ev in events {
            mask.set(ev);
        }
        mask
    }

    pub fn set(&mut self, ev: Event) {
        let num = ev as u16;
        self.0[(num / 8) as usize] |= 1 << (num % 8);
    }

    pub fn bytes(&self) -> &[u8; EVENT_MASK_BYTES] {
        &self.0
    }
}

/// A decoded event message, borrowed out of the caller's frame buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct BrcmEvent<'a> {
    pub flags: u16,
    pub event_type: u32,
    pub status: u32,
    pub reason: u32,
    pub auth_type: u32,
    pub addr: [u8; 6],
    pub data: &'a [u8],
}

impl<'a> BrcmEvent<'a> {
    /// Decode an event payload as returned by the event read path (the
    /// 12-byte frame prefix already stripped). `None` when the payload is
    /// short or the ethertype is not Broadcom's; such frames pass through
    /// to the caller as raw bytes.
    pub fn decode(buf: &'a [u8]) -> Option<BrcmEvent<'a>> {
        if buf.len() < DATA_OFF {
            return None;
        }
        if BigEndian::read_u16(&buf[ETHERTYPE_OFF..]) != ETHERTYPE_BRCM {
            return None;
        }
        let msg = &buf[MSG_OFF..];
        let datalen = BigEndian::read_u32(&msg[20..24]) as usize;
        let mut addr = [0u8; 6];
        addr.copy_from_slice(&msg[24..30]);
        let avail = buf.len() - DATA_OFF;
        Some(BrcmEvent {
            flags: BigEndian::read_u16(&msg[2..4]),
            event_type: BigEndian::read_u32(&msg[4..8]),
            status: BigEndian::read_u32(&msg[8..12]),
            reason: BigEndian::read_u32(&msg[12..16]),
            auth_type: BigEndian::read_u32(&msg[16..20]),
            addr,
            data: &buf[DATA_OFF..DATA_OFF + datalen.min(avail)],
        })
    }

    pub fn event(&self) -> Option<Event> {
        Event::from_number(self.event_type)
    }
}
