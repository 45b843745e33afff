//! In-memory stand-ins for the USB transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use crate::error::{CompletionStatus, TransportError};
use crate::protocol::header::ImageHeader;
use crate::protocol::registers::BulkPort;
use crate::protocol::FRAME_SIZE;
use crate::session::DeviceSession;
use crate::transfer::{EventPump, FrameLink, FrameTransfer, TransferEvent, TransferKind};

/// Records command writes and replays queued responses.
#[derive(Default)]
pub struct ScriptedPort {
    pub writes: Vec<(u8, Vec<u8>)>,
    pub reads: Vec<(u8, usize)>,
    pub responses: VecDeque<Vec<u8>>,
    pub short_writes: bool,
    pub fail_writes: bool,
}

impl ScriptedPort {
    pub fn respond(&mut self, data: &[u8]) {
        self.responses.push_back(data.to_vec());
    }
}

impl BulkPort for ScriptedPort {
    fn send(&mut self, endpoint: u8, data: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        if self.fail_writes {
            return Err(TransportError::Usb(rusb::Error::NoDevice));
        }
        self.writes.push((endpoint, data.to_vec()));
        if self.short_writes {
            return Ok(data.len().saturating_sub(1));
        }
        Ok(data.len())
    }

    fn receive(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.reads.push((endpoint, buf.len()));
        let data = self
            .responses
            .pop_front()
            .ok_or(TransportError::Usb(rusb::Error::Timeout))?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

struct Pending {
    device: usize,
    kind: TransferKind,
    data: Vec<u8>,
    events: Sender<TransferEvent>,
}

#[derive(Default)]
struct BusState {
    queued: Vec<Pending>,
    delivered: Vec<(usize, Vec<u8>)>,
    pumps: usize,
    fail_submit: Option<TransferKind>,
    fail_completion: Option<(TransferKind, CompletionStatus)>,
    fail_pump: bool,
}

/// A transport shared by several simulated devices. Submissions queue up
/// and a single pump completes every queued transfer, whichever device it
/// belongs to.
#[derive(Clone, Default)]
pub struct Bus {
    state: Rc<RefCell<BusState>>,
}

impl Bus {
    pub fn link(&self, device: usize) -> (SimLink, mpsc::Receiver<TransferEvent>) {
        let (tx, rx) = mpsc::channel();
        let link = SimLink {
            device,
            bus: self.clone(),
            header: ImageHeader::full_frame().encode().to_vec(),
            frame: vec![0u8; FRAME_SIZE],
            events: tx,
        };
        (link, rx)
    }

    pub fn transfer(&self, device: usize) -> FrameTransfer<SimLink> {
        let (link, rx) = self.link(device);
        FrameTransfer::new(link, rx)
    }

    pub fn session(&self, device: usize) -> DeviceSession<SimLink, Bus> {
        let (link, rx) = self.link(device);
        DeviceSession::new(format!("sim#{}", device), link, rx, self.clone())
    }

    pub fn pumps(&self) -> usize {
        self.state.borrow().pumps
    }

    pub fn queued(&self) -> Vec<(usize, TransferKind)> {
        self.state
            .borrow()
            .queued
            .iter()
            .map(|p| (p.device, p.kind))
            .collect()
    }

    pub fn queued_bytes(&self, device: usize) -> Vec<Vec<u8>> {
        self.state
            .borrow()
            .queued
            .iter()
            .filter(|p| p.device == device)
            .map(|p| p.data.clone())
            .collect()
    }

    /// Payloads a device has received so far, oldest first.
    pub fn delivered(&self, device: usize) -> Vec<Vec<u8>> {
        self.state
            .borrow()
            .delivered
            .iter()
            .filter(|(d, _)| *d == device)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn fail_next_submit(&self, kind: TransferKind) {
        self.state.borrow_mut().fail_submit = Some(kind);
    }

    pub fn fail_next_completion(&self, kind: TransferKind, status: CompletionStatus) {
        self.state.borrow_mut().fail_completion = Some((kind, status));
    }

    pub fn fail_next_pump(&self) {
        self.state.borrow_mut().fail_pump = true;
    }

    /// Complete everything queued.
    pub fn pump_all(&self) {
        let queued = std::mem::take(&mut self.state.borrow_mut().queued);
        for pending in queued {
            let outcome = {
                let mut state = self.state.borrow_mut();
                match state.fail_completion {
                    Some((kind, status)) if kind == pending.kind => {
                        state.fail_completion = None;
                        Err(TransportError::Completion {
                            transfer: kind,
                            status,
                        })
                    }
                    _ => {
                        if pending.kind == TransferKind::Payload {
                            state.delivered.push((pending.device, pending.data));
                        }
                        Ok(())
                    }
                }
            };
            let _ = pending.events.send(TransferEvent {
                kind: pending.kind,
                outcome,
            });
        }
    }

    fn submit(
        &self,
        device: usize,
        kind: TransferKind,
        data: &[u8],
        events: &Sender<TransferEvent>,
    ) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.fail_submit == Some(kind) {
            state.fail_submit = None;
            return Err(TransportError::Submit {
                transfer: kind,
                code: -1,
            });
        }
        // libusb refuses a transfer that is still pending with LIBUSB_ERROR_BUSY
        if state.queued.iter().any(|p| p.device == device && p.kind == kind) {
            return Err(TransportError::Submit {
                transfer: kind,
                code: -6,
            });
        }
        state.queued.push(Pending {
            device,
            kind,
            data: data.to_vec(),
            events: events.clone(),
        });
        Ok(())
    }
}

impl EventPump for Bus {
    fn pump(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.borrow_mut();
            state.pumps += 1;
            if state.fail_pump {
                state.fail_pump = false;
                return Err(TransportError::EventLoop(-1));
            }
        }
        self.pump_all();
        Ok(())
    }
}

pub struct SimLink {
    device: usize,
    bus: Bus,
    header: Vec<u8>,
    frame: Vec<u8>,
    events: Sender<TransferEvent>,
}

impl FrameLink for SimLink {
    fn frame_mut(&mut self) -> &mut [u8] {
        &mut self.frame
    }

    fn submit_header(&mut self) -> Result<(), TransportError> {
        self.bus
            .submit(self.device, TransferKind::Header, &self.header, &self.events)
    }

    fn submit_payload(&mut self) -> Result<(), TransportError> {
        self.bus
            .submit(self.device, TransferKind::Payload, &self.frame, &self.events)
    }
}
