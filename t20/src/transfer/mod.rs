//! The per-device frame upload state machine.
//!
//! A frame goes out as two back-to-back bulk transfers on the image endpoint:
//! the image header, then the payload. The payload completion returns the
//! machine to [`TransferState::Idle`]; if the payload could not be submitted,
//! the header completion does. At most one frame is ever in flight. Completions arrive as [`TransferEvent`] messages over a channel
//! and are applied when the owner drains it, either directly or while it
//! drives the shared event loop in [`FrameTransfer::wait_until_idle`].

pub mod usb;

use std::fmt;
use std::sync::mpsc::Receiver;

use log::{trace, warn};

use crate::error::{EncodingError, PreconditionViolation, Result, TransportError};
use crate::protocol::FRAME_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Header,
    Payload,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Header => write!(f, "header"),
            TransferKind::Payload => write!(f, "payload"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    HeaderSubmitted,
    PayloadSubmitted,
}

/// Completion notice for one submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub kind: TransferKind,
    pub outcome: std::result::Result<(), TransportError>,
}

/// The two image endpoint transfers of one device and the buffers they read.
///
/// Submissions return as soon as the transport accepts them. The link reports
/// each completion as a [`TransferEvent`] on the channel it was built with.
pub trait FrameLink {
    fn frame_mut(&mut self) -> &mut [u8];

    fn submit_header(&mut self) -> std::result::Result<(), TransportError>;

    fn submit_payload(&mut self) -> std::result::Result<(), TransportError>;
}

/// The shared "process pending events" call. One pass may complete
/// transfers belonging to any device on the same transport.
pub trait EventPump {
    fn pump(&self) -> std::result::Result<(), TransportError>;
}

pub struct FrameTransfer<L> {
    link: L,
    state: TransferState,
    header_in_flight: bool,
    completions: Receiver<TransferEvent>,
    failure: Option<TransportError>,
}

impl<L: FrameLink> FrameTransfer<L> {
    pub fn new(link: L, completions: Receiver<TransferEvent>) -> Self {
        Self {
            link,
            state: TransferState::Idle,
            header_in_flight: false,
            completions,
            failure: None,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Frames submitted but not yet completed, 0 or 1.
    pub fn in_flight(&self) -> usize {
        match self.state {
            TransferState::Idle => 0,
            _ => 1,
        }
    }

    /// Copy `frame` into the device buffer and submit header and payload.
    ///
    /// Returns once both submissions are accepted; completion is observed
    /// later through [`wait_until_idle`](Self::wait_until_idle). The machine
    /// must be idle. A failure left behind by the previous frame is
    /// returned here instead of uploading.
    pub fn upload(&mut self, frame: &[u8]) -> Result<()> {
        self.ready()?;
        if frame.len() != FRAME_SIZE {
            return Err(EncodingError::FrameSize {
                expected: FRAME_SIZE,
                actual: frame.len(),
            }
            .into());
        }

        self.link.frame_mut().copy_from_slice(frame);
        self.submit()
    }

    /// Upload an all black frame.
    pub fn upload_blank(&mut self) -> Result<()> {
        self.ready()?;

        self.link.frame_mut().fill(0);
        self.submit()
    }

    fn ready(&mut self) -> Result<()> {
        self.poll();

        if self.state != TransferState::Idle {
            return Err(PreconditionViolation::NotIdle(self.state).into());
        }
        if let Some(e) = self.failure.take() {
            return Err(e.into());
        }
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        self.link.submit_header()?;
        self.header_in_flight = true;
        self.state = TransferState::HeaderSubmitted;

        // on failure the header is still out; stay put until it completes
        self.link.submit_payload()?;
        self.state = TransferState::PayloadSubmitted;
        trace!("frame submitted");
        Ok(())
    }

    /// Apply one completion notice.
    pub fn on_complete(&mut self, event: TransferEvent) {
        match event.kind {
            TransferKind::Header => {
                self.header_in_flight = false;
                // no payload went out behind this header
                if self.state == TransferState::HeaderSubmitted {
                    self.state = TransferState::Idle;
                }
            }
            TransferKind::Payload => self.state = TransferState::Idle,
        }

        if let Err(e) = event.outcome {
            warn!("{}", e);
            // keep the first failure, later ones are usually fallout
            if self.failure.is_none() {
                self.failure = Some(e);
            }
        }
    }

    /// Apply the payload completion.
    pub fn on_payload_complete(&mut self, outcome: std::result::Result<(), TransportError>) {
        self.on_complete(TransferEvent {
            kind: TransferKind::Payload,
            outcome,
        });
    }

    /// Apply every completion already delivered, without touching the
    /// event loop.
    pub fn poll(&mut self) {
        while let Ok(event) = self.completions.try_recv() {
            self.on_complete(event);
        }
    }

    /// Drive `events` until this machine is idle.
    ///
    /// Returns immediately if it already is. A failed transfer surfaces here
    /// once, after the machine has returned to idle.
    pub fn wait_until_idle<P: EventPump + ?Sized>(&mut self, events: &P) -> Result<()> {
        self.poll();
        while self.state != TransferState::Idle {
            events.pump()?;
            self.poll();
        }

        match self.failure.take() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Wait for the payload and the header transfer to finish, so that the
    /// buffers and descriptors can be released.
    pub fn drain<P: EventPump + ?Sized>(&mut self, events: &P) -> Result<()> {
        let idle = self.wait_until_idle(events);

        while self.header_in_flight {
            events.pump()?;
            self.poll();
        }

        idle?;
        match self.failure.take() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
