use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;

use crate::protocol::FRAME_SIZE;

/// What a source hands out for the next upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Exactly [`FRAME_SIZE`] bytes of raw BGR.
    Image(&'a [u8]),
    /// All black.
    Blank,
}

pub trait FrameSource {
    fn frame(&mut self) -> Frame<'_>;
}

impl FrameSource for Vec<u8> {
    fn frame(&mut self) -> Frame<'_> {
        Frame::Image(self)
    }
}

/// A raw 640x480 BGR image file, read once and replayed on every frame.
#[derive(Debug, Clone)]
pub struct RawFile {
    path: Option<PathBuf>,
    data: Option<Vec<u8>>,
}

impl RawFile {
    /// Files shorter than a frame are padded with black, longer ones cut.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let mut data = fs::read(path)?;

        if data.len() != FRAME_SIZE {
            warn!(
                "{}: {} bytes, expected {}",
                path.display(),
                data.len(),
                FRAME_SIZE
            );
            data.resize(FRAME_SIZE, 0);
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            data: Some(data),
        })
    }

    /// A source with no image behind it.
    pub fn blank() -> Self {
        Self {
            path: None,
            data: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl FrameSource for RawFile {
    fn frame(&mut self) -> Frame<'_> {
        match &self.data {
            Some(data) => Frame::Image(data),
            None => Frame::Blank,
        }
    }
}
