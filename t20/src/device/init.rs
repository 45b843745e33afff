//! Setup sequence that brings a freshly claimed T20 into image mode.
//!
//! The register values were captured from the vendor driver. Their meaning
//! is mostly unknown; only the order matters.

use log::{debug, info};

use crate::dump::hex_dump;
use crate::error::{EncodingError, Result};
use crate::protocol::codec::RegValue;
use crate::protocol::registers::{BulkPort, Registers};

const SEQ0: &str = "6a006b0a6a016b0a6a026b0a6a036b0a6a046b0a\
                    6a056b0a6a066b0a6a076b0a6a086b0a6a096b0a";

const SEQ1: &str = "f004f130f201f305f407f601f703f500a3604b0f";

const SEQ2: &str = "a437a361a36028012800320059015900\
                    3400c47fc502c632c734ce1fcf03c8df\
                    c901ca0ecb0ecc0ccd02";

const SEQ3: &str = "40004140420043403680370238e03901340e";

const SEQ4: [RegValue; 8] = [
    RegValue::new(0xfb65, 0x01),
    RegValue::new(0xfb62, 0x00),
    RegValue::new(0xfb63, 0x08),
    RegValue::new(0xfb64, 0x07),
    RegValue::new(0xfb65, 0x02),
    RegValue::new(0xfb62, 0x00),
    RegValue::new(0xfb63, 0x10),
    RegValue::new(0xfb64, 0x0e),
];

const SETUP_PREFIX: [(u16, u8); 8] = [
    (0xfc28, 0x01),
    (0xfc59, 0x01),
    (0xfc32, 0x00),
    (0xfc34, 0x00),
    (0xfcb0, 0x00),
    (0xfcb0, 0x20),
    (0xfc4b, 0x00),
    (0xfbff, 0x81),
];

const SETUP_SUFFIX: [(u16, u8); 10] = [
    (0xfcb4, 0x01),
    (0xfcb1, 0x00),
    (0xfcb2, 0x00),
    (0xfcb3, 0x00),
    (0xfb65, 0x11),
    (0xfb60, 0x00),
    (0xfcb5, 0x03),
    (0xfcb4, 0x10),
    (0xfb96, 0x11),
    (0xfcb0, 0x09),
];

/// 16 bit status word split across two registers.
const STATUS_HI: u16 = 0xfc6c;
const STATUS_LO: u16 = 0xfc6d;

const SECTOR_SELECT: u16 = 0xfc6f;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Read and dump the first two sectors. The projector works without it.
    pub read_test: bool,
}

pub fn run<P: BulkPort>(regs: &mut Registers<P>, options: &InitOptions) -> Result<()> {
    regs.write_sequence(&table(SEQ0)?)?;

    info!("0xfc01: {:02x}", regs.read_register(0xfc01)?);

    regs.write_register(SECTOR_SELECT, 0x00)?;
    regs.write_zero_768()?;

    update_status(regs, 0x1001)?;
    update_status(regs, 0x3021)?;

    write_registers(regs, &[(0xfce0, 0x3f), (0xfce1, 0x00), (0xfce2, 0x80)])?;

    if options.read_test {
        read_test(regs)?;
    }

    setup_scan(regs, true)?;
    update_status(regs, 0x3032)?;

    write_registers(regs, &[(0xfcb0, 0x20), (0xfc4b, 0x1c)])?;
    update_status(regs, 0x3022)?;

    setup_scan(regs, false)?;
    update_status(regs, 0x3032)?;

    debug!("init done");
    Ok(())
}

/// The vendor driver sends this block twice; the second time the `0xfc32`
/// write comes before the register sequence instead of after it.
fn setup_scan<P: BulkPort>(regs: &mut Registers<P>, reg_seq_first: bool) -> Result<()> {
    write_registers(regs, &SETUP_PREFIX)?;

    regs.write_sequence(&table(SEQ1)?)?;
    regs.write_sequence(&table(SEQ2)?)?;
    regs.write_sequence(&table(SEQ3)?)?;

    if reg_seq_first {
        regs.write_register_sequence(&SEQ4)?;
        regs.write_register(0xfc32, 0x00)?;
    } else {
        regs.write_register(0xfc32, 0x00)?;
        regs.write_register_sequence(&SEQ4)?;
    }

    write_registers(regs, &SETUP_SUFFIX)
}

/// Log the current status word, then write `val` high byte first.
fn update_status<P: BulkPort>(regs: &mut Registers<P>, val: u16) -> Result<()> {
    let hi = regs.read_register(STATUS_HI)?;
    let lo = regs.read_register(STATUS_LO)?;
    info!("0xfc6c.w: {:04x}", u16::from_be_bytes([hi, lo]));

    let [hi, lo] = val.to_be_bytes();
    regs.write_register(STATUS_HI, hi)?;
    regs.write_register(STATUS_LO, lo)?;
    Ok(())
}

fn read_test<P: BulkPort>(regs: &mut Registers<P>) -> Result<()> {
    for sector in 0..2 {
        info!("0xfc6f: {:02x}", regs.read_register(SECTOR_SELECT)?);
        regs.write_register(SECTOR_SELECT, 0x04)?;
        let data = regs.read_sector(sector)?;
        info!("sector {}:\n{}", sector, hex_dump(&data));
        regs.write_register(SECTOR_SELECT, 0x00)?;
    }
    Ok(())
}

fn write_registers<P: BulkPort>(regs: &mut Registers<P>, values: &[(u16, u8)]) -> Result<()> {
    for &(reg, value) in values {
        regs.write_register(reg, value)?;
    }
    Ok(())
}

fn table(hex: &str) -> Result<Vec<u8>> {
    hex::decode(hex).map_err(|e| EncodingError::InvalidTable(e.to_string()).into())
}
