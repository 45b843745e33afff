use std::sync::mpsc::Receiver;

use log::{debug, warn};

use crate::error::Result;
use crate::frame::Frame;
use crate::transfer::{EventPump, FrameLink, FrameTransfer, TransferEvent, TransferState};

/// One projector: its transfer link (handle, buffers, descriptors), the
/// upload state machine, and a handle on the shared event loop.
///
/// Dropping a session without [`shutdown`](Self::shutdown) still drains any
/// in-flight transfer before the link is released.
pub struct DeviceSession<L: FrameLink, P: EventPump> {
    label: String,
    transfer: FrameTransfer<L>,
    events: P,
    closed: bool,
}

impl<L: FrameLink, P: EventPump> DeviceSession<L, P> {
    pub fn new(
        label: impl Into<String>,
        link: L,
        completions: Receiver<TransferEvent>,
        events: P,
    ) -> Self {
        Self {
            label: label.into(),
            transfer: FrameTransfer::new(link, completions),
            events,
            closed: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> TransferState {
        self.transfer.state()
    }

    pub fn is_idle(&self) -> bool {
        self.transfer.state() == TransferState::Idle
    }

    /// Wait for the previous frame of this device, then submit `frame`.
    pub fn upload_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.transfer.wait_until_idle(&self.events)?;
        self.transfer.upload(frame)
    }

    pub fn upload_blank(&mut self) -> Result<()> {
        self.transfer.wait_until_idle(&self.events)?;
        self.transfer.upload_blank()
    }

    pub fn upload(&mut self, frame: Frame<'_>) -> Result<()> {
        match frame {
            Frame::Image(bytes) => self.upload_frame(bytes),
            Frame::Blank => self.upload_blank(),
        }
    }

    pub fn wait_until_idle(&mut self) -> Result<()> {
        self.transfer.wait_until_idle(&self.events)
    }

    /// Drain, then release descriptors, buffer and handle.
    pub fn shutdown(mut self) -> Result<()> {
        debug!("{}: shutting down", self.label);
        self.closed = true;
        self.transfer.drain(&self.events)
    }
}

impl<L: FrameLink, P: EventPump> Drop for DeviceSession<L, P> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.transfer.drain(&self.events) {
            warn!("{}: error while draining on drop: {}", self.label, e);
        }
    }
}
