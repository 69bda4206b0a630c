//! Chip register map, SDIO function numbers and fixed protocol constants.
//!
//! The backplane addresses are those of the BCM43430 silicon: a common
//! AMBA interconnect base with one core per 0x1000 slot and an AI wrapper
//! block for each core 0x100000 above it.

// SDIO function numbers
pub const FUNC_BUS: u32 = 0;
pub const FUNC_BAK: u32 = 1;
pub const FUNC_RAD: u32 = 2;

// Function 0 (CCCR) registers
pub const CCCR_IOEN: u32 = 0x002;
pub const CCCR_IORDY: u32 = 0x003;
pub const CCCR_INTEN: u32 = 0x004;
pub const CCCR_INTPEND: u32 = 0x005;
pub const CCCR_IOABORT: u32 = 0x006;
pub const CCCR_BICTRL: u32 = 0x007;
pub const CCCR_SPEED: u32 = 0x013;
pub const CCCR_BRCM_CARDCAP: u32 = 0x0F0;
pub const CCCR_SEP_INT_CTL: u32 = 0x0F1;
pub const CCCR_F1_BLKSIZE: u32 = 0x110;
pub const CCCR_F2_BLKSIZE: u32 = 0x210;

// Function 1 backplane config registers
pub const BAK_WINDOW_REG: u32 = 0x1000A;
pub const BAK_CHIP_CLOCK_CSR: u32 = 0x1000E;
pub const BAK_PULLUP_REG: u32 = 0x1000F;
pub const BAK_WAKEUP_REG: u32 = 0x1001E;

// The 32 KiB backplane window as seen from function 1
pub const WIN_BASE: u32 = 0x8000;
pub const WIN_ADDR_MASK: u32 = 0x7FFF;
pub const WIN_MASK: u32 = !WIN_ADDR_MASK;

// Silicon backplane cores
pub const CHIPCOMMON_BASE: u32 = 0x1800_0000;
pub const DOT11MAC_BASE: u32 = CHIPCOMMON_BASE + 0x1000;
pub const SDIOD_CORE_BASE: u32 = CHIPCOMMON_BASE + 0x2000;
pub const ARMCM3_BASE: u32 = CHIPCOMMON_BASE + 0x3000;
pub const SOCSRAM_BASE: u32 = CHIPCOMMON_BASE + 0x4000;

// AI wrapper blocks, one per core
pub const AI_WRAP: u32 = 0x10_0000;
pub const AI_IOCTRL: u32 = 0x408;
pub const AI_RESETCTRL: u32 = 0x800;
pub const AI_RESETSTATUS: u32 = 0x804;

pub const MAC_IOCTRL_REG: u32 = DOT11MAC_BASE + AI_WRAP + AI_IOCTRL;
pub const MAC_RESETCTRL_REG: u32 = DOT11MAC_BASE + AI_WRAP + AI_RESETCTRL;
pub const ARM_IOCTRL_REG: u32 = ARMCM3_BASE + AI_WRAP + AI_IOCTRL;
pub const ARM_RESETCTRL_REG: u32 = ARMCM3_BASE + AI_WRAP + AI_RESETCTRL;
pub const SRAM_IOCTRL_REG: u32 = SOCSRAM_BASE + AI_WRAP + AI_IOCTRL;
pub const SRAM_RESETCTRL_REG: u32 = SOCSRAM_BASE + AI_WRAP + AI_RESETCTRL;

// SOCSRAM bank control
pub const SRAM_BANKX_IDX_REG: u32 = SOCSRAM_BASE + 0x10;
pub const SRAM_PROBE_REG: u32 = SOCSRAM_BASE + 0x40;
pub const SRAM_BANKX_PDA_REG: u32 = SOCSRAM_BASE + 0x44;

// SDIO device core registers
pub const SB_INT_STATUS_REG: u32 = SDIOD_CORE_BASE + 0x20;
pub const SB_INT_HOST_MASK_REG: u32 = SDIOD_CORE_BASE + 0x24;
pub const SB_FUNC_INT_MASK_REG: u32 = SDIOD_CORE_BASE + 0x34;
pub const SB_TO_SB_MBOX_REG: u32 = SDIOD_CORE_BASE + 0x40;
pub const SB_TO_SB_MBOX_DATA_REG: u32 = SDIOD_CORE_BASE + 0x48;
pub const SB_TO_HOST_MBOX_DATA_REG: u32 = SDIOD_CORE_BASE + 0x4C;

// Chipcommon save-restore
pub const SR_CONTROL1_REG: u32 = CHIPCOMMON_BASE + 0x508;

// Transfer block sizes per function
pub const BAK_BLOCK_BYTES: usize = 64;
pub const RAD_BLOCK_BYTES: usize = 512;

// Link timing. The response window is empirical for the ~400 kHz
// software-clocked link; a faster clock needs it recalibrated.
pub const CLK_HALF_PERIOD_USEC: u32 = 1;
pub const RSP_WAIT_CLOCKS: u32 = 20;

// IOCTL polling cadence
pub const IOCTL_WAIT_USEC: u32 = 2000;
pub const IOCTL_POLL_MSEC: i32 = 2;
pub const IOCTL_MAX_BLKLEN: usize = 256;

// Firmware image and upload staging
pub const FIRMWARE_LEN: usize = 0x5EE84;
pub const TXBUF_LEN: usize = 0x4000;

// NVRAM upload destination: window page and in-window address
pub const NVRAM_WINDOW: u32 = 0x78000;
pub const NVRAM_DEST: u32 = 0xFD54;

// IOCTL command numbers (dongle "wlc" interface)
pub const WLC_UP: u32 = 2;
pub const WLC_SET_INFRA: u32 = 20;
pub const WLC_SET_AUTH: u32 = 22;
pub const WLC_SET_SSID: u32 = 26;
pub const WLC_SET_WSEC: u32 = 134;
pub const WLC_SET_WPA_AUTH: u32 = 165;
pub const WLC_SET_SCAN_CHANNEL_TIME: u32 = 185;
pub const WLC_GET_VAR: u32 = 262;
pub const WLC_SET_VAR: u32 = 263;
pub const WLC_SET_WSEC_PMK: u32 = 268;

// Supplicant tuning, carried over verbatim from the vendor values
pub const SUP_WPA_TIMEOUT_MSEC: u32 = 2500;
