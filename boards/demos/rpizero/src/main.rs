#![no_std]
#![no_main]

//! Scan-and-join demonstration on the Pi Zero W's on-board BCM43430.
//!
//! Brings the chip up from cold (firmware streamed from the SPI flash),
//! runs a passive scan on channel 1, then joins the configured WPA2
//! network and echoes link events. The SSID and passphrase below are
//! placeholders for bench testing.

mod boot;
mod logger;

use bitwave::chip::Bcm43430;
use bitwave::constants::FIRMWARE_LEN;
use bitwave::event::{BrcmEvent, status_name, Event};
use bitwave::link::{SdioBus, SdioLink};
use bitwave::nvram;
use bitwave::platform::Timer;
use bitwave::trace::TraceLevel;
use bitwave::wlan::{EscanResult, JoinParams, Security};
use bitwave_hal::info;
use bitwave_hal::rpi::rpizero::bsp::drivers::common::interface::DriverManager;
use bitwave_hal::rpi::rpizero::bsp::drivers::driver_manager::driver_manager;
use bitwave_hal::rpi::rpizero::bsp::global;
use bitwave_hal::rpi::rpizero::platform::{self, Board};
use zeroize::Zeroize;

const SSID: &str = "testnet";
const PASSPHRASE: &[u8] = b"testpass";
const SCAN_CHANNEL: u8 = 1;

/// Early init code.
///
/// # Safety
///
/// - Only a single core must be active and running this function.
/// - The init calls in this function must appear in the correct order.
unsafe fn kernel_init() -> ! {
    for i in driver_manager().all_device_drivers().iter() {
        if let Err(x) = i.init() {
            panic!("Error loading driver: {}: {}", i.compatible(), x);
        }
    }
    driver_manager().post_device_driver_init();
    // println! is usable from here on.

    // Transition from unsafe to safe.
    kernel_main()
}

/// The main function running after the early init.
fn kernel_main() -> ! {
    info!(
        "{} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    info!("Booting on: {}", global::board_name());
    logger::init().ok();

    // Sleep clock and power to the radio, firmware source on SPI0.
    platform::start_lpo();
    global::GPIO.map_spi0();
    global::SPI_FLASH.init(10_000);
    platform::wlan_power(true);
    Board.delay_us(10_000);

    let mut link = SdioLink::new(Board, platform::SDIO_PINS);
    link.configure_pins();
    link.trace.set_level(TraceLevel::All);

    let mut chip = Bcm43430::new(link);
    let mut firmware = &global::SPI_FLASH;
    let rca = match chip.bring_up(&mut firmware, FIRMWARE_LEN, nvram::STOCK_CONFIG) {
        Ok(rca) => rca,
        Err(e) => {
            chip.bus.dump_trace();
            panic!("WLAN bring-up failed: {:?}", e);
        }
    };
    info!("WLAN chip alive, rca {:04x}", rca);

    match chip.mac_address() {
        Ok(m) => info!(
            "MAC address {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        ),
        Err(_) => info!("MAC address unavailable"),
    }
    let mut ver = [0u8; 128];
    if chip.firmware_version(&mut ver).is_ok() {
        let end = ver.iter().position(|&b| b == 0).unwrap_or(ver.len());
        info!(
            "Firmware {}",
            core::str::from_utf8(&ver[..end]).unwrap_or("not responding")
        );
    }

    scan_networks(&mut chip);

    let mut passphrase = [0u8; 64];
    passphrase[..PASSPHRASE.len()].copy_from_slice(PASSPHRASE);
    let joined = chip.join(&JoinParams {
        ssid: SSID,
        passphrase: &passphrase[..PASSPHRASE.len()],
        security: Security::Wpa2Psk,
    });
    passphrase.zeroize();
    match joined {
        Ok(()) => info!("join request for '{}' accepted", SSID),
        Err(e) => info!("join request failed: {:?}", e),
    }

    // Echo link events forever.
    let mut tick = 0u32;
    let mut ledon = false;
    let mut events = [0u8; 1600];
    loop {
        chip.idle_clock();
        if Board.timeout(&mut tick, 20_000) {
            platform::led(ledon);
            ledon = !ledon;
            if let Ok(n) = chip.read_event(&mut events) {
                if n > 0 {
                    report_event(&events[..n]);
                }
            }
        }
    }
}

/// Passive scan with results streamed back as escan events.
fn scan_networks<B: SdioBus>(chip: &mut Bcm43430<B>) {
    if let Err(e) = chip.start_scan(Some(SCAN_CHANNEL), 0x1234) {
        info!("scan start failed: {:?}", e);
        return;
    }
    info!("scanning channel {}...", SCAN_CHANNEL);

    let mut tick = 0u32;
    let mut polls = 80; // ~8 s of 100 ms polls
    let mut events = [0u8; 1600];
    while polls > 0 {
        chip.idle_clock();
        if Board.timeout(&mut tick, 100_000) {
            polls -= 1;
            let n = chip.read_event(&mut events).unwrap_or(0);
            if n == 0 {
                continue;
            }
            match BrcmEvent::decode(&events[..n]) {
                Some(ev) if ev.event() == Some(Event::EscanResult) => {
                    if let Some(bss) = EscanResult::decode(ev.data) {
                        info!(
                            "  {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X} ch {:2} '{}'",
                            bss.bssid[0],
                            bss.bssid[1],
                            bss.bssid[2],
                            bss.bssid[3],
                            bss.bssid[4],
                            bss.bssid[5],
                            bss.chanspec & 0xFF,
                            core::str::from_utf8(bss.ssid).unwrap_or("<hidden>")
                        );
                    }
                }
                Some(ev) if ev.event() == Some(Event::ScanComplete) => break,
                _ => {}
            }
        }
    }
}

fn report_event(frame: &[u8]) {
    match BrcmEvent::decode(frame) {
        Some(ev) => info!(
            "event {} status {} reason {} from {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            ev.event().map(|e| e.name()).unwrap_or("?"),
            status_name(ev.status),
            ev.reason,
            ev.addr[0],
            ev.addr[1],
            ev.addr[2],
            ev.addr[3],
            ev.addr[4],
            ev.addr[5]
        ),
        None => info!("raw frame, {} bytes", frame.len()),
    }
}
