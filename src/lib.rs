//! Ingest GROMACS molecular dynamics data: a `.gro` topology that establishes atom identities,
//! followed by one or more `.xtc` trajectories that provide a position snapshot per frame.
//!
//! The [`XtcReader`] decodes frames from any [`Read`]er, the [`topology`] module parses the
//! fixed-column topology format, and [`Dynamics`] keeps a molecule and its ligands in lock-step
//! as frames are ingested.
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use glam::{Mat3, Vec3};

use crate::reader::{
    read_boxvec, read_compressed_positions, read_f32, read_f32s, read_i32, read_i32_or_end, skip,
    skip_opaque,
};

pub use crate::dynamics::{Dynamics, LoadOptions, TrajectoryReport};
pub use crate::error::{Error, Result};
pub use crate::model::{Atom, DrugModel, Model, MoleculeModel};
pub use crate::selection::{FrameSelection, Range};
pub use crate::topology::Topology;

pub mod bits;
pub mod codec;
pub mod dynamics;
pub mod error;
pub mod model;
pub mod reader;
pub mod selection;
pub mod topology;

pub type BoxVec = Mat3;

/// Frames with this many atoms or fewer store their positions uncompressed.
pub const MAX_UNCOMPRESSED_ATOMS: usize = 9;

#[derive(Debug, Default, Clone)]
pub struct Frame {
    pub step: u32,
    /// Time in picoseconds.
    pub time: f32,
    pub boxvec: BoxVec,
    /// Zero for uncompressed frames.
    pub precision: f32,
    /// Flat positions in nanometers, three values per atom.
    pub positions: Vec<f32>,
}

impl Frame {
    pub fn natoms(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn coords(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.positions.chunks_exact(3).map(Vec3::from_slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub magic: i32,
    pub natoms: usize,
    pub step: u32,
    pub time: f32,
    pub boxvec: BoxVec,
}

impl Header {
    /// The size of the header on the stream, including the repeated atom count that follows the
    /// box vectors.
    pub const SIZE: usize = 4 * 4 + 9 * 4 + 4;
}

#[derive(Debug, Clone)]
pub struct XtcReader<R> {
    pub file: R,
    frames_read: usize,
    /// Holds the compressed bytes of the frame that is being decoded.
    scratch: Vec<u8>,
}

impl XtcReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> XtcReader<R> {
    pub const MAGIC: i32 = 1995;

    pub fn new(reader: R) -> Self {
        Self {
            file: reader,
            frames_read: 0,
            scratch: Vec::new(),
        }
    }

    /// The number of frames that have been read or skipped so far.
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    /// Reads the header of the next frame.
    ///
    /// Returns `None` if the stream ends cleanly at a frame boundary.
    pub fn read_header(&mut self) -> Result<Option<Header>> {
        let file = &mut self.file;

        let Some(magic) = read_i32_or_end(file)? else {
            return Ok(None);
        };
        if magic != Self::MAGIC {
            log::warn!(
                "found unexpected magic number '{magic}' ({magic:#0x}) at frame {}",
                self.frames_read
            );
        }
        let natoms = read_i32(file)?;
        let natoms = usize::try_from(natoms)
            .map_err(|_| Error::corrupt(format!("negative atom count {natoms}")))?;
        let step = read_i32(file)?;
        let step =
            u32::try_from(step).map_err(|_| Error::corrupt(format!("negative step {step}")))?;
        let time = read_f32(file)?;
        let boxvec = read_boxvec(file)?;

        let natoms_repeated = read_i32(file)?;
        if usize::try_from(natoms_repeated).ok() != Some(natoms) {
            return Err(Error::corrupt(format!(
                "header announces {natoms} atoms, but the coordinate array holds {natoms_repeated}"
            )));
        }

        Ok(Some(Header {
            magic,
            natoms,
            step,
            time,
            boxvec,
        }))
    }

    /// Reads the next [`Frame`] and advances one step.
    ///
    /// Returns `false` if there are no frames left.
    pub fn read_frame(&mut self, frame: &mut Frame) -> Result<bool> {
        let Some(header) = self.read_header()? else {
            return Ok(false);
        };
        self.read_frame_body(&header, frame)?;
        Ok(true)
    }

    /// Reads the positions that follow `header`, which must have just been read with
    /// [`XtcReader::read_header`], and advances one step.
    ///
    /// This allows a caller to reject a frame by its header before any positions are decoded.
    pub fn read_frame_body(&mut self, header: &Header, frame: &mut Frame) -> Result<()> {
        self.read_positions(header.natoms, frame)?;
        self.frames_read += 1;

        frame.step = header.step;
        frame.time = header.time;
        frame.boxvec = header.boxvec;

        Ok(())
    }

    fn read_positions(&mut self, natoms: usize, frame: &mut Frame) -> Result<()> {
        if natoms <= MAX_UNCOMPRESSED_ATOMS {
            // In case the number of atoms is very small, their positions are not compressed.
            frame.positions.clear();
            frame.positions.resize(natoms * 3, 0.0);
            read_f32s(&mut self.file, &mut frame.positions)?;
            frame.precision = 0.0;
        } else {
            frame.precision = read_f32(&mut self.file)?;
            let nbytes = read_compressed_positions(
                &mut self.file,
                natoms,
                &mut frame.positions,
                frame.precision,
                &mut self.scratch,
            )?;
            log::trace!("decoded {natoms} positions from {nbytes} bytes");
            self.scratch.clear();
        }

        Ok(())
    }

    /// Moves past the next frame without decoding its positions.
    ///
    /// Returns `false` if there are no frames left.
    pub fn skip_frame(&mut self) -> Result<bool> {
        let Some(header) = self.read_header()? else {
            return Ok(false);
        };
        let natoms = header.natoms;
        if natoms <= MAX_UNCOMPRESSED_ATOMS {
            skip(&mut self.file, (natoms * 3 * 4) as u64)?;
        } else {
            // The precision and the prelude, followed by the compressed bytes.
            skip(&mut self.file, (4 + codec::Prelude::SIZE) as u64)?;
            skip_opaque(&mut self.file)?;
        }
        self.frames_read += 1;
        Ok(true)
    }

    /// A convenience function to read all frames in a trajectory.
    ///
    /// It is likely more efficient to use [`XtcReader::read_frame`] if you are only interested in
    /// the values of a single frame at a time.
    pub fn read_all_frames(&mut self) -> Result<Box<[Frame]>> {
        let mut frames = Vec::new();
        loop {
            let mut frame = Frame::default();
            if !self.read_frame(&mut frame)? {
                break;
            }
            frames.push(frame);
        }
        Ok(frames.into_boxed_slice())
    }
}

impl<R: Read + Seek> XtcReader<R> {
    /// Returns the offsets of the starts of the frames in this [`XtcReader<R>`], for at most
    /// `until` frames.
    ///
    /// The stream is returned to its current position afterwards.
    pub fn determine_offsets(&mut self, until: Option<usize>) -> Result<Box<[u64]>> {
        // Remember where we start so we can return to it later.
        let start_pos = self.file.stream_position()?;
        let frames_read = self.frames_read;

        let mut offsets = Vec::new();
        while until.map_or(true, |until| offsets.len() < until) {
            let offset = self.file.stream_position()?;
            if !self.skip_frame()? {
                break;
            }
            offsets.push(offset);
        }

        self.file.seek(SeekFrom::Start(start_pos))?;
        self.frames_read = frames_read;

        Ok(offsets.into_boxed_slice())
    }

    /// Seeks to `offset`, then reads a [`Frame`].
    pub fn read_frame_at_offset(&mut self, frame: &mut Frame, offset: u64) -> Result<bool> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.read_frame(frame)
    }

    /// Returns to the start of the trajectory.
    pub fn home(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.frames_read = 0;
        Ok(())
    }
}
