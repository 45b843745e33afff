//! Command packets for the command-out endpoint.
//!
//! Every packet starts with a one byte opcode. Field byte order differs per
//! command and is spelled out on each encoder:
//!
//! ```text
//! 0x02 WriteReg     op | len:u16 BE (=1) | reg:u16 BE | value
//! 0x04 WriteSeq     op | len:u16 LE      | bytes...
//! 0x05 ReadReg      op | reg:u16 LE
//! 0x22 WriteRegSeq  op | count:u8        | (reg:u16 BE, value)...
//! 0x25 ReadSector   op | offset | 0xff | 0x00
//! 0x0a Zero768      op | 768 x 0x00
//! ```

use bytes::{BufMut, BytesMut};

use super::opcode;
use crate::error::EncodingError;

pub const ZERO_PAYLOAD_LEN: usize = 768;

/// Longest `WriteSeq` payload, bounded by its 16 bit length field.
pub const MAX_SEQ_LEN: usize = u16::MAX as usize;

/// Most entries a `WriteRegSeq` can carry, bounded by its 8 bit count.
pub const MAX_REG_SEQ_LEN: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegValue {
    pub reg: u16,
    pub value: u8,
}

impl RegValue {
    pub const fn new(reg: u16, value: u8) -> Self {
        Self { reg, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    WriteReg { reg: u16, value: u8 },
    ReadReg { reg: u16 },
    WriteSeq(&'a [u8]),
    WriteRegSeq(&'a [RegValue]),
    ReadSector { offset: u8 },
    Zero768,
}

impl Command<'_> {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::WriteReg { .. } => opcode::WRITE_REG,
            Command::ReadReg { .. } => opcode::READ_REG,
            Command::WriteSeq(_) => opcode::WRITE_SEQ,
            Command::WriteRegSeq(_) => opcode::WRITE_REG_SEQ,
            Command::ReadSector { .. } => opcode::READ_SECTOR,
            Command::Zero768 => opcode::ZERO_768,
        }
    }

    /// Serialize the whole packet. Nothing is emitted on error.
    pub fn encode(&self) -> Result<BytesMut, EncodingError> {
        match *self {
            Command::WriteReg { reg, value } => Ok(write_reg(reg, value)),
            Command::ReadReg { reg } => Ok(read_reg(reg)),
            Command::WriteSeq(data) => write_seq(data),
            Command::WriteRegSeq(entries) => write_reg_seq(entries),
            Command::ReadSector { offset } => Ok(read_sector(offset)),
            Command::Zero768 => Ok(zero_768()),
        }
    }
}

/// The only big endian command, length and register alike.
pub fn write_reg(reg: u16, value: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(6);
    buf.put_u8(opcode::WRITE_REG);
    buf.put_u16(1);
    buf.put_u16(reg);
    buf.put_u8(value);
    buf
}

pub fn read_reg(reg: u16) -> BytesMut {
    let mut buf = BytesMut::with_capacity(3);
    buf.put_u8(opcode::READ_REG);
    buf.put_u16_le(reg);
    buf
}

pub fn write_seq(data: &[u8]) -> Result<BytesMut, EncodingError> {
    let len = u16::try_from(data.len()).map_err(|_| EncodingError::SequenceTooLong {
        opcode: opcode::WRITE_SEQ,
        len: data.len(),
        max: MAX_SEQ_LEN,
    })?;

    let mut buf = BytesMut::with_capacity(3 + data.len());
    buf.put_u8(opcode::WRITE_SEQ);
    buf.put_u16_le(len);
    buf.put_slice(data);
    Ok(buf)
}

/// Register addresses inside the sequence are big endian, like `WriteReg`.
pub fn write_reg_seq(entries: &[RegValue]) -> Result<BytesMut, EncodingError> {
    let count = u8::try_from(entries.len()).map_err(|_| EncodingError::SequenceTooLong {
        opcode: opcode::WRITE_REG_SEQ,
        len: entries.len(),
        max: MAX_REG_SEQ_LEN,
    })?;

    let mut buf = BytesMut::with_capacity(2 + entries.len() * 3);
    buf.put_u8(opcode::WRITE_REG_SEQ);
    buf.put_u8(count);
    for entry in entries {
        buf.put_u16(entry.reg);
        buf.put_u8(entry.value);
    }
    Ok(buf)
}

pub fn read_sector(offset: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_u8(opcode::READ_SECTOR);
    buf.put_u8(offset);
    buf.put_u8(0xff);
    buf.put_u8(0x00);
    buf
}

pub fn zero_768() -> BytesMut {
    let mut buf = BytesMut::with_capacity(1 + ZERO_PAYLOAD_LEN);
    buf.put_u8(opcode::ZERO_768);
    buf.put_bytes(0, ZERO_PAYLOAD_LEN);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn write_reg_layout() {
        assert_eq!(&write_reg(0xfc6c, 0x30)[..], &[0x02, 0x00, 0x01, 0xfc, 0x6c, 0x30]);
    }

    #[test]
    fn read_reg_is_little_endian() {
        assert_eq!(&read_reg(0xfc01)[..], &[0x05, 0x01, 0xfc]);
    }

    #[test]
    fn write_seq_prefixes_little_endian_length() {
        let data = [0x6a, 0x00, 0x6b, 0x0a];
        assert_eq!(
            &write_seq(&data).unwrap()[..],
            &[0x04, 0x04, 0x00, 0x6a, 0x00, 0x6b, 0x0a]
        );
        assert_eq!(&write_seq(&[]).unwrap()[..], &[0x04, 0x00, 0x00]);
    }

    #[test]
    fn write_seq_rejects_oversized_payload() {
        let data = vec![0u8; MAX_SEQ_LEN + 1];
        assert_eq!(
            write_seq(&data),
            Err(EncodingError::SequenceTooLong {
                opcode: opcode::WRITE_SEQ,
                len: MAX_SEQ_LEN + 1,
                max: MAX_SEQ_LEN,
            })
        );
        assert_eq!(write_seq(&data[1..]).unwrap().len(), 3 + MAX_SEQ_LEN);
    }

    #[test]
    fn write_reg_seq_rejects_256_entries() {
        let entries = vec![RegValue::new(0xfb65, 0x01); 256];
        assert!(matches!(
            write_reg_seq(&entries),
            Err(EncodingError::SequenceTooLong { len: 256, max: 255, .. })
        ));
        assert!(Command::WriteRegSeq(&entries).encode().is_err());
    }

    #[test]
    fn read_sector_is_fixed_four_bytes() {
        assert_eq!(&read_sector(0x01)[..], &[0x25, 0x01, 0xff, 0x00]);
    }

    #[test]
    fn zero_768_is_opcode_and_zeroes() {
        let buf = zero_768();
        assert_eq!(buf.len(), 769);
        assert_eq!(buf[0], 0x0a);
        assert!(buf[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn command_dispatch_matches_free_functions() {
        let entries = [RegValue::new(0xfb62, 0x00)];
        let cases: [(Command, BytesMut); 6] = [
            (Command::WriteReg { reg: 1, value: 2 }, write_reg(1, 2)),
            (Command::ReadReg { reg: 3 }, read_reg(3)),
            (Command::WriteSeq(&[9, 9]), write_seq(&[9, 9]).unwrap()),
            (Command::WriteRegSeq(&entries), write_reg_seq(&entries).unwrap()),
            (Command::ReadSector { offset: 4 }, read_sector(4)),
            (Command::Zero768, zero_768()),
        ];
        for (command, expected) in cases {
            let encoded = command.encode().unwrap();
            assert_eq!(encoded, expected);
            assert_eq!(encoded[0], command.opcode());
        }
    }

    proptest! {
        #[test]
        fn prop_write_reg_fields(reg in any::<u16>(), value in any::<u8>()) {
            let buf = write_reg(reg, value);
            prop_assert_eq!(buf.len(), 6);
            prop_assert_eq!(buf[0], 0x02);
            prop_assert_eq!(u16::from_be_bytes([buf[1], buf[2]]), 1);
            prop_assert_eq!(u16::from_be_bytes([buf[3], buf[4]]), reg);
            prop_assert_eq!(buf[5], value);
        }

        #[test]
        fn prop_write_reg_seq_count_and_order(
            entries in proptest::collection::vec((any::<u16>(), any::<u8>()), 0..=255)
        ) {
            let entries: Vec<RegValue> =
                entries.into_iter().map(|(reg, value)| RegValue::new(reg, value)).collect();
            let buf = write_reg_seq(&entries).unwrap();
            prop_assert_eq!(buf[0], 0x22);
            prop_assert_eq!(buf[1] as usize, entries.len());
            prop_assert_eq!(buf.len(), 2 + entries.len() * 3);
            for (chunk, entry) in buf[2..].chunks(3).zip(&entries) {
                prop_assert_eq!(u16::from_be_bytes([chunk[0], chunk[1]]), entry.reg);
                prop_assert_eq!(chunk[2], entry.value);
            }
        }

        #[test]
        fn prop_write_seq_length_matches_payload(
            data in proptest::collection::vec(any::<u8>(), 0..2048)
        ) {
            let buf = write_seq(&data).unwrap();
            prop_assert_eq!(u16::from_le_bytes([buf[1], buf[2]]) as usize, data.len());
            prop_assert_eq!(&buf[3..], &data[..]);
        }
    }
}
