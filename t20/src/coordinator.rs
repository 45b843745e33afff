use log::warn;

use crate::error::Result;
use crate::frame::{Frame, FrameSource};
use crate::session::DeviceSession;
use crate::transfer::{EventPump, FrameLink};

/// Streams to several projectors from one thread.
///
/// Each session only ever waits on its own previous frame. The event pump
/// it drives while waiting is shared, so it completes transfers of the
/// other sessions too and all devices stay busy at once.
pub struct Coordinator<L: FrameLink, P: EventPump> {
    sessions: Vec<DeviceSession<L, P>>,
}

impl<L: FrameLink, P: EventPump> Coordinator<L, P> {
    pub fn new(sessions: Vec<DeviceSession<L, P>>) -> Self {
        Self { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[DeviceSession<L, P>] {
        &self.sessions
    }

    /// Session labels, in the order results are returned.
    pub fn labels(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.label().to_string()).collect()
    }

    /// Hand one frame to every session. Session `i` takes its frame from
    /// `sources[i]`, or a blank one if there is no such source.
    ///
    /// Returns one result per session; a failing device does not keep the
    /// others from being served.
    pub fn upload_round<S: FrameSource>(&mut self, sources: &mut [S]) -> Vec<Result<()>> {
        let mut sources = sources.iter_mut();

        self.sessions
            .iter_mut()
            .map(|session| {
                let frame = match sources.next() {
                    Some(source) => source.frame(),
                    None => Frame::Blank,
                };
                let result = session.upload(frame);
                if let Err(e) = &result {
                    warn!("{}: upload failed: {}", session.label(), e);
                }
                result
            })
            .collect()
    }

    pub fn wait_all(&mut self) -> Vec<Result<()>> {
        self.sessions
            .iter_mut()
            .map(|session| session.wait_until_idle())
            .collect()
    }

    /// Drain and close every session.
    pub fn shutdown(self) -> Vec<Result<()>> {
        self.sessions
            .into_iter()
            .map(|session| session.shutdown())
            .collect()
    }
}
