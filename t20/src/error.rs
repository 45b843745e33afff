use std::fmt;

use crate::transfer::{TransferKind, TransferState};

/// A command or header could not be built from the given arguments.
///
/// These are programming errors on the caller's side and are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// A sequence does not fit the width of the frame's length field.
    SequenceTooLong { opcode: u8, len: usize, max: usize },
    /// A frame payload is not exactly one frame buffer long.
    FrameSize { expected: usize, actual: usize },
    /// The image payload length does not fit the 24 bit header field.
    PayloadTooLarge { length: u64 },
    /// A stored command table is not valid hex.
    InvalidTable(String),
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::SequenceTooLong { opcode, len, max } => write!(
                f,
                "command 0x{:02x}: sequence of {} exceeds limit of {}",
                opcode, len, max
            ),
            EncodingError::FrameSize { expected, actual } => {
                write!(f, "frame is {} bytes, expected {}", actual, expected)
            }
            EncodingError::PayloadTooLarge { length } => {
                write!(f, "image payload of {} bytes does not fit 24 bits", length)
            }
            EncodingError::InvalidTable(reason) => write!(f, "bad command table: {}", reason),
        }
    }
}

impl std::error::Error for EncodingError {}

/// Final status of an asynchronous transfer that did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Error,
    TimedOut,
    Cancelled,
    Stall,
    NoDevice,
    Overflow,
    Unknown(i32),
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStatus::Error => write!(f, "transfer failed"),
            CompletionStatus::TimedOut => write!(f, "timed out"),
            CompletionStatus::Cancelled => write!(f, "cancelled"),
            CompletionStatus::Stall => write!(f, "endpoint stalled"),
            CompletionStatus::NoDevice => write!(f, "device disconnected"),
            CompletionStatus::Overflow => write!(f, "overflow"),
            CompletionStatus::Unknown(code) => write!(f, "unknown status {}", code),
        }
    }
}

/// Anything that went wrong while talking to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Synchronous bulk transfer failed.
    Usb(rusb::Error),
    /// Fewer bytes than requested were moved.
    Short {
        endpoint: u8,
        expected: usize,
        actual: usize,
    },
    /// libusb could not allocate a transfer descriptor.
    Alloc,
    /// The transport rejected an asynchronous submission.
    Submit { transfer: TransferKind, code: i32 },
    /// A submitted transfer finished with an error.
    Completion {
        transfer: TransferKind,
        status: CompletionStatus,
    },
    /// The shared event processing call failed.
    EventLoop(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Usb(e) => write!(f, "USB error: {}", e),
            TransportError::Short {
                endpoint,
                expected,
                actual,
            } => write!(
                f,
                "short transfer on endpoint 0x{:02x}: {} of {} bytes",
                endpoint, actual, expected
            ),
            TransportError::Alloc => write!(f, "could not allocate transfer"),
            TransportError::Submit { transfer, code } => {
                write!(f, "{} transfer rejected by libusb ({})", transfer, code)
            }
            TransportError::Completion { transfer, status } => {
                write!(f, "{} transfer: {}", transfer, status)
            }
            TransportError::EventLoop(code) => write!(f, "event handling failed ({})", code),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<rusb::Error> for TransportError {
    fn from(e: rusb::Error) -> Self {
        TransportError::Usb(e)
    }
}

/// The caller broke the one frame in flight rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionViolation {
    NotIdle(TransferState),
}

impl fmt::Display for PreconditionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionViolation::NotIdle(state) => {
                write!(f, "upload while transfer is {:?}", state)
            }
        }
    }
}

impl std::error::Error for PreconditionViolation {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Encoding(EncodingError),
    Transport(TransportError),
    Precondition(PreconditionViolation),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Encoding(e) => write!(f, "encoding error: {}", e),
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Precondition(e) => write!(f, "precondition violated: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Encoding(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Precondition(e) => Some(e),
        }
    }
}

impl From<EncodingError> for Error {
    fn from(e: EncodingError) -> Self {
        Error::Encoding(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<PreconditionViolation> for Error {
    fn from(e: PreconditionViolation) -> Self {
        Error::Precondition(e)
    }
}

impl From<rusb::Error> for Error {
    fn from(e: rusb::Error) -> Self {
        Error::Transport(TransportError::Usb(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
