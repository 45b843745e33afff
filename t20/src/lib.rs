mod coordinator;
pub mod device;
pub mod dump;
pub mod error;
pub mod frame;
pub mod protocol;
mod session;
pub mod transfer;

#[cfg(test)]
mod sim;

use rusb::Context;
use simple_error::SimpleError;

pub use coordinator::Coordinator;
pub use device::{InitOptions, UsbSession};
pub use error::{EncodingError, Error, PreconditionViolation, Result, TransportError};
pub use frame::{Frame, FrameSource, RawFile};
pub use protocol::{FRAME_HEIGHT, FRAME_SIZE, FRAME_WIDTH};
pub use session::DeviceSession;
pub use transfer::usb::{UsbEvents, UsbFrameLink};
pub use transfer::{EventPump, FrameLink, TransferState};

/// Every T20 on the bus, initialized and ready to stream.
pub struct Projectors {
    coordinator: Coordinator<UsbFrameLink<Context>, UsbEvents<Context>>,
}

impl Projectors {
    pub fn connect(options: &InitOptions) -> std::result::Result<Self, SimpleError> {
        let context =
            Context::new().map_err(|e| SimpleError::with("could not initialize libusb", e))?;

        let sessions = device::connect_all(&context, options)?;

        Ok(Self {
            coordinator: Coordinator::new(sessions),
        })
    }

    pub fn len(&self) -> usize {
        self.coordinator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinator.is_empty()
    }

    /// Device labels, matching the order of every returned result list.
    pub fn labels(&self) -> Vec<String> {
        self.coordinator.labels()
    }

    /// Queue the next frame on every projector, see [`Coordinator::upload_round`].
    pub fn upload_round<S: FrameSource>(&mut self, sources: &mut [S]) -> Vec<Result<()>> {
        self.coordinator.upload_round(sources)
    }

    pub fn wait_all(&mut self) -> Vec<Result<()>> {
        self.coordinator.wait_all()
    }

    pub fn shutdown(self) -> Vec<Result<()>> {
        self.coordinator.shutdown()
    }
}
