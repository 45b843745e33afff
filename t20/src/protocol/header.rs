//! Image header sent on the image endpoint ahead of every frame payload.
//!
//! ```text
//! off  size  field
//!   0     1  opcode 0x11
//!   1     4  offset              u32 LE, always 0
//!   5     4  src width, height   u16 LE each
//!   9     4  dest width, height  u16 LE each
//!  13     4  unknown pair        u16 LE each, 0x4000
//!  17     1  flag
//!  18     3  payload length      u24 LE
//! ```
//!
//! Flag and length share one 32 bit word on the wire. They are written as
//! four explicit bytes so the layout does not depend on host byte order.

use bytes::{Buf, BufMut};

use super::{opcode, BYTES_PER_PIXEL, FRAME_HEIGHT, FRAME_WIDTH};
use crate::error::EncodingError;

pub const IMAGE_HEADER_SIZE: usize = 21;

pub const MAX_PAYLOAD_LENGTH: u32 = 0x00ff_ffff;

const UNKNOWN_DIMENSION: u16 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    offset: u32,
    src: Dimensions,
    dest: Dimensions,
    unknown: Dimensions,
    flag: u8,
    length: u32,
}

impl ImageHeader {
    /// Header for an unscaled `width` x `height` BGR frame.
    pub fn new(width: u16, height: u16) -> Result<Self, EncodingError> {
        let length = width as u64 * height as u64 * BYTES_PER_PIXEL as u64;
        if length > MAX_PAYLOAD_LENGTH as u64 {
            return Err(EncodingError::PayloadTooLarge { length });
        }

        let size = Dimensions { width, height };
        Ok(Self {
            offset: 0,
            src: size,
            dest: size,
            unknown: Dimensions {
                width: UNKNOWN_DIMENSION,
                height: UNKNOWN_DIMENSION,
            },
            flag: 0,
            length: length as u32,
        })
    }

    /// The 640x480 frame the projector displays.
    pub fn full_frame() -> Self {
        Self {
            offset: 0,
            src: Dimensions {
                width: FRAME_WIDTH,
                height: FRAME_HEIGHT,
            },
            dest: Dimensions {
                width: FRAME_WIDTH,
                height: FRAME_HEIGHT,
            },
            unknown: Dimensions {
                width: UNKNOWN_DIMENSION,
                height: UNKNOWN_DIMENSION,
            },
            flag: 0,
            length: (FRAME_WIDTH as u32) * (FRAME_HEIGHT as u32) * BYTES_PER_PIXEL as u32,
        }
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn src(&self) -> Dimensions {
        self.src
    }

    pub fn dest(&self) -> Dimensions {
        self.dest
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn encode(&self) -> [u8; IMAGE_HEADER_SIZE] {
        let mut out = [0u8; IMAGE_HEADER_SIZE];
        let mut buf = &mut out[..];

        buf.put_u8(opcode::IMAGE);
        buf.put_u32_le(self.offset);
        for dim in [self.src, self.dest, self.unknown] {
            buf.put_u16_le(dim.width);
            buf.put_u16_le(dim.height);
        }
        buf.put_u8(self.flag);
        buf.put_uint_le((self.length & MAX_PAYLOAD_LENGTH) as u64, 3);

        out
    }

    /// Parse a header back out of its wire form.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != IMAGE_HEADER_SIZE || bytes[0] != opcode::IMAGE {
            return None;
        }

        let mut buf = &bytes[1..];
        let offset = buf.get_u32_le();
        let mut dims = [Dimensions {
            width: 0,
            height: 0,
        }; 3];
        for dim in dims.iter_mut() {
            dim.width = buf.get_u16_le();
            dim.height = buf.get_u16_le();
        }
        let flag = buf.get_u8();
        let length = buf.get_uint_le(3) as u32;

        Some(Self {
            offset,
            src: dims[0],
            dest: dims[1],
            unknown: dims[2],
            flag,
            length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FRAME_SIZE;

    #[test]
    fn full_frame_length_is_921600() {
        let header = ImageHeader::full_frame();
        assert_eq!(header.length(), 921_600);
        assert_eq!(header.length() as usize, FRAME_SIZE);
        assert!(header.length() <= MAX_PAYLOAD_LENGTH);
        assert_eq!(ImageHeader::new(640, 480), Ok(header));
    }

    #[test]
    fn full_frame_wire_bytes() {
        let bytes = ImageHeader::full_frame().encode();
        assert_eq!(
            bytes,
            [
                0x11, // opcode
                0x00, 0x00, 0x00, 0x00, // offset
                0x80, 0x02, 0xe0, 0x01, // src 640x480
                0x80, 0x02, 0xe0, 0x01, // dest 640x480
                0x00, 0x40, 0x00, 0x40, // unknown
                0x00, // flag
                0x00, 0x10, 0x0e, // 921600 = 0x0e1000
            ]
        );
    }

    #[test]
    fn decode_reads_back_encoded_header() {
        let header = ImageHeader::new(320, 240).unwrap();
        let decoded = ImageHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.src(), Dimensions { width: 320, height: 240 });
        assert_eq!(decoded.dest(), decoded.src());
        assert_eq!(decoded.flag(), 0);
    }

    #[test]
    fn decode_rejects_wrong_opcode_or_size() {
        let mut bytes = ImageHeader::full_frame().encode();
        assert!(ImageHeader::decode(&bytes[..20]).is_none());
        bytes[0] = 0x12;
        assert!(ImageHeader::decode(&bytes).is_none());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert_eq!(
            ImageHeader::new(4096, 4096),
            Err(EncodingError::PayloadTooLarge {
                length: 4096 * 4096 * 3
            })
        );
    }
}
