use std::time::Duration;

use itertools::Itertools;
use log::{trace, warn};
use rusb::{DeviceHandle, UsbContext};

use super::codec::{self, RegValue};
use super::{EP_CMD_IN, EP_CMD_OUT, SECTOR_SIZE, TIMEOUT};
use crate::error::{Result, TransportError};

/// Blocking bulk access to the command endpoints.
pub trait BulkPort {
    fn send(&mut self, endpoint: u8, data: &[u8], timeout: Duration)
        -> std::result::Result<usize, TransportError>;

    fn receive(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError>;
}

impl<T: UsbContext> BulkPort for DeviceHandle<T> {
    fn send(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError> {
        Ok(self.write_bulk(endpoint, data, timeout)?)
    }

    fn receive(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError> {
        Ok(self.read_bulk(endpoint, buf, timeout)?)
    }
}

impl<P: BulkPort + ?Sized> BulkPort for &mut P {
    fn send(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError> {
        (**self).send(endpoint, data, timeout)
    }

    fn receive(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError> {
        (**self).receive(endpoint, buf, timeout)
    }
}

/// Synchronous register and command access, used during device setup.
///
/// Each call is one or two blocking transfers with the fixed protocol
/// timeout. Nothing is retried; the first error aborts the call.
pub struct Registers<P> {
    port: P,
}

impl<P: BulkPort> Registers<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    pub fn write_register(&mut self, reg: u16, value: u8) -> std::result::Result<(), TransportError> {
        self.command(&codec::write_reg(reg, value))
    }

    pub fn read_register(&mut self, reg: u16) -> std::result::Result<u8, TransportError> {
        self.command(&codec::read_reg(reg))?;

        let mut val = [0u8; 1];
        self.response(&mut val)?;
        Ok(val[0])
    }

    pub fn write_sequence(&mut self, bytes: &[u8]) -> Result<()> {
        let packet = codec::write_seq(bytes)?;
        Ok(self.command(&packet)?)
    }

    pub fn write_register_sequence(&mut self, entries: &[RegValue]) -> Result<()> {
        let packet = codec::write_reg_seq(entries)?;
        Ok(self.command(&packet)?)
    }

    pub fn read_sector(&mut self, offset: u8) -> std::result::Result<[u8; SECTOR_SIZE], TransportError> {
        self.command(&codec::read_sector(offset))?;

        let mut sector = [0u8; SECTOR_SIZE];
        self.response(&mut sector)?;
        Ok(sector)
    }

    pub fn write_zero_768(&mut self) -> std::result::Result<(), TransportError> {
        self.command(&codec::zero_768())
    }

    fn command(&mut self, packet: &[u8]) -> std::result::Result<(), TransportError> {
        trace!("cmd -> {:02x}", packet.iter().format(" "));

        let written = self
            .port
            .send(EP_CMD_OUT, packet, TIMEOUT)
            .map_err(|e| log_failure("command write", e))?;
        if written != packet.len() {
            return Err(log_failure(
                "command write",
                TransportError::Short {
                    endpoint: EP_CMD_OUT,
                    expected: packet.len(),
                    actual: written,
                },
            ));
        }
        Ok(())
    }

    fn response(&mut self, buf: &mut [u8]) -> std::result::Result<(), TransportError> {
        let read = self
            .port
            .receive(EP_CMD_IN, buf, TIMEOUT)
            .map_err(|e| log_failure("response read", e))?;
        if read != buf.len() {
            return Err(log_failure(
                "response read",
                TransportError::Short {
                    endpoint: EP_CMD_IN,
                    expected: buf.len(),
                    actual: read,
                },
            ));
        }
        trace!("rsp <- {:02x}", buf.iter().format(" "));
        Ok(())
    }
}

fn log_failure(what: &str, e: TransportError) -> TransportError {
    warn!("{} failed: {}", what, e);
    e
}
