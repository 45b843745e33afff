pub mod codec;
pub mod header;
pub mod registers;

use std::time::Duration;

pub const VENDOR_ID: u16 = 0x08ca;
pub const PRODUCT_ID: u16 = 0x2137;

/// Command responses come back here.
pub const EP_CMD_IN: u8 = 0x81;
/// Image header and frame payload go out here.
pub const EP_IMG_OUT: u8 = 0x02;
/// Commands go out here.
pub const EP_CMD_OUT: u8 = 0x03;

pub const TIMEOUT_MS: u32 = 100;
pub const TIMEOUT: Duration = Duration::from_millis(TIMEOUT_MS as u64);

pub const FRAME_WIDTH: u16 = 640;
pub const FRAME_HEIGHT: u16 = 480;
pub const BYTES_PER_PIXEL: usize = 3;

/// One raw BGR frame.
pub const FRAME_SIZE: usize = FRAME_WIDTH as usize * FRAME_HEIGHT as usize * BYTES_PER_PIXEL;

pub const SECTOR_SIZE: usize = 512;

pub mod opcode {
    pub const WRITE_REG: u8 = 0x02;
    pub const WRITE_SEQ: u8 = 0x04;
    pub const READ_REG: u8 = 0x05;
    pub const ZERO_768: u8 = 0x0a;
    pub const IMAGE: u8 = 0x11;
    pub const WRITE_REG_SEQ: u8 = 0x22;
    pub const READ_SECTOR: u8 = 0x25;
}
