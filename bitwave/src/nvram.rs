//! Chip configuration ("NVRAM") records.
//!
//! The BCM43430 takes its board parameters as a blob of NUL-terminated
//! `key=value` records, closed by four NUL bytes and the magic trailer
//! `AA 00 55 FF`, uploaded to a fixed region of chip RAM during bring-up.
//! The stock blob for the module this driver targets ships here;
//! [`validate`] and [`records`] let callers check a substitute blob before
//! it goes anywhere near the chip.

use nom::{
    bytes::complete::{tag, take_till, take_till1},
    sequence::terminated,
    IResult,
};

/// The four bytes that close every configuration blob.
pub const CONFIG_TRAILER: [u8; 4] = [0xAA, 0x00, 0x55, 0xFF];

/// Board configuration for the stock BCM43430 SDIO module.
#[rustfmt::skip]
pub static STOCK_CONFIG: &[u8] =
    b"manfid=0x2d0\0prodid=0x0726\0vendid=0x14e4\0devid=0x43e2\0\
      boardtype=0x0726\0boardrev=0x1202\0boardnum=22\0macaddr=00:90:4c:c5:12:38\0\
      sromrev=11\0boardflags=0x00404201\0boardflags3=0x08000000\0xtalfreq=37400\0\
      nocrc=1\0ag0=255\0aa2g=1\0ccode=ALL\0pa0itssit=0x20\0extpagain2g=0\0\
      pa2ga0=-168,7161,-820\0AvVmid_c0=0x0,0xc8\0cckpwroffset0=5\0maxp2ga0=84\0\
      txpwrbckof=6\0cckbw202gpo=0\0legofdmbw202gpo=0x66111111\0\
      mcsbw202gpo=0x77711111\0propbw202gpo=0xdd\0ofdmdigfilttype=18\0\
      ofdmdigfilttypebe=18\0papdmode=1\0papdvalidtest=1\0pacalidx2g=32\0\
      papdepsoffset=-36\0papdendidx=61\0il0macaddr=00:90:4c:c5:12:38\0\
      wl0id=0x431b\0deadman_to=0xffffffff\0muxenab=0x1\0spurconfig=0x3 \0\
      btc_mode=1\0btc_params8=0x4e20\0btc_params1=0x7530\0\
      \0\0\0\0\xaa\x00\x55\xff";

/// One `key=value\0` record.
fn record(i: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    let (i, key) = take_till1(|b| b == b'=' || b == 0)(i)?;
    let (i, _) = tag(b"=")(i)?;
    let (i, value) = terminated(take_till(|b| b == 0), tag(b"\0"))(i)?;
    Ok((i, (key, value)))
}

/// The end marker: four NULs then the magic trailer.
fn trailer(i: &[u8]) -> IResult<&[u8], ()> {
    let (i, _) = tag(b"\0\0\0\0")(i)?;
    let (i, _) = tag(&CONFIG_TRAILER[..])(i)?;
    Ok((i, ()))
}

/// Iterate the records of a blob. Stops at the first byte that does not
/// open a record; [`validate`] is the strict form.
pub fn records(blob: &[u8]) -> Records<'_> {
    Records { rest: blob }
}

pub struct Records<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Records<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        match record(self.rest) {
            Ok((rest, kv)) => {
                self.rest = rest;
                Some(kv)
            }
            Err(_) => None,
        }
    }
}

/// Strictly parse a whole blob: records, end marker, nothing after.
/// Returns the record count.
pub fn validate(blob: &[u8]) -> Result<usize, ()> {
    let mut rest = blob;
    let mut count = 0;
    loop {
        if let Ok((after, ())) = trailer(rest) {
            if after.is_empty() {
                return Ok(count);
            }
            return Err(());
        }
        match record(rest) {
            Ok((after, _)) => {
                rest = after;
                count += 1;
            }
            Err(_) => return Err(()),
        }
    }
}

/// Find a record's value by key.
pub fn lookup<'a>(blob: &'a [u8], key: &str) -> Option<&'a [u8]> {
    records(blob)
        .find(|(k, _)| *k == key.as_bytes())
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_blob_validates() {
        assert_eq!(validate(STOCK_CONFIG), Ok(42));
    }

    #[test]
    fn stock_blob_carries_the_trailer() {
        let n = STOCK_CONFIG.len();
        assert_eq!(&STOCK_CONFIG[n - 4..], &CONFIG_TRAILER);
        assert_eq!(&STOCK_CONFIG[n - 8..n - 4], &[0, 0, 0, 0]);
    }

    #[test]
    fn record_iteration() {
        let mut it = records(STOCK_CONFIG);
        assert_eq!(it.next(), Some((&b"manfid"[..], &b"0x2d0"[..])));
        assert_eq!(it.next(), Some((&b"prodid"[..], &b"0x0726"[..])));
        assert_eq!(it.last(), Some((&b"btc_params1"[..], &b"0x7530"[..])));
    }

    #[test]
    fn lookup_by_key() {
        assert_eq!(lookup(STOCK_CONFIG, "macaddr"), Some(&b"00:90:4c:c5:12:38"[..]));
        assert_eq!(lookup(STOCK_CONFIG, "xtalfreq"), Some(&b"37400"[..]));
        // This one keeps its trailing space; the chip's parser wants it.
        assert_eq!(lookup(STOCK_CONFIG, "spurconfig"), Some(&b"0x3 "[..]));
        assert_eq!(lookup(STOCK_CONFIG, "nope"), None);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let cut = &STOCK_CONFIG[..STOCK_CONFIG.len() - 5];
        assert_eq!(validate(cut), Err(()));
    }

    #[test]
    fn keyless_garbage_is_rejected() {
        assert_eq!(validate(b"=value\0\0\0\0\0\xaa\x00\x55\xff"), Err(()));
    }

    #[test]
    fn minimal_blob() {
        let blob = b"k=v\0\0\0\0\0\xaa\x00\x55\xff";
        assert_eq!(validate(blob), Ok(1));
    }
}
