use std::io::{self, Read};

use glam::Mat3;

use crate::codec::{decode_positions, Prelude, MIN_BITS_PER_ATOM};
use crate::error::{Error, Result};
use crate::BoxVec;

/// Reads the compressed positions of `natoms` atoms into `positions`, with the reader positioned
/// right after the `precision`.
///
/// The compressed bytes are read into `scratch`, which is cleared first. Afterwards, it holds the
/// compressed bytes of this frame and can be reused for the next one. `positions` is only sized
/// once the compressed bytes are known to be able to hold `natoms` atoms.
///
/// If successful, returns the number of compressed bytes.
pub fn read_compressed_positions<R: Read>(
    file: &mut R,
    natoms: usize,
    positions: &mut Vec<f32>,
    precision: f32,
    scratch: &mut Vec<u8>,
) -> Result<usize> {
    let prelude = read_prelude(file)?;
    read_opaque(file, scratch)?;
    let capacity = max_atoms(scratch.len());
    if natoms > capacity {
        return Err(Error::corrupt(format!(
            "{natoms} atoms cannot be stored in {} compressed bytes (at most {capacity})",
            scratch.len()
        )));
    }

    positions.clear();
    positions.resize(natoms * 3, 0.0);
    decode_positions(scratch, &prelude, precision, positions)?;
    Ok(scratch.len())
}

/// The largest number of atoms that `nbytes` compressed bytes can describe.
pub const fn max_atoms(nbytes: usize) -> usize {
    nbytes.saturating_mul(8) / MIN_BITS_PER_ATOM
}

pub fn read_prelude<R: Read>(file: &mut R) -> Result<Prelude> {
    let minint = [read_i32(file)?, read_i32(file)?, read_i32(file)?];
    let maxint = [read_i32(file)?, read_i32(file)?, read_i32(file)?];
    let smallidx = read_i32(file)?;
    Ok(Prelude {
        minint,
        maxint,
        smallidx,
    })
}

/// Returns the number of xdr padding bytes that follow `count` bytes of opaque data.
pub const fn padding(count: usize) -> usize {
    (4 - (count % 4)) % 4
}

/// Reads a byte count followed by that many bytes into `data`, and skips the padding after them.
pub fn read_opaque<R: Read>(file: &mut R, data: &mut Vec<u8>) -> Result<()> {
    let count = read_count(file)?;
    data.clear();
    // Grow along with the bytes that actually arrive, rather than trusting `count` up front.
    file.by_ref().take(count as u64).read_to_end(data)?;
    if data.len() < count {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    let mut pad = [0u8; 3];
    file.read_exact(&mut pad[..padding(count)])?;
    Ok(())
}

/// Skips over a byte count and the (padded) bytes it announces. Returns the number of bytes.
pub fn skip_opaque<R: Read>(file: &mut R) -> Result<usize> {
    let count = read_count(file)?;
    skip(file, (count + padding(count)) as u64)?;
    Ok(count)
}

pub(crate) fn skip<R: Read>(file: &mut R, nbytes: u64) -> Result<()> {
    let skipped = io::copy(&mut file.by_ref().take(nbytes), &mut io::sink())?;
    if skipped < nbytes {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

fn read_count<R: Read>(file: &mut R) -> Result<usize> {
    let count = read_i32(file)?;
    usize::try_from(count).map_err(|_| Error::corrupt(format!("negative byte count {count}")))
}

pub fn read_boxvec<R: Read>(file: &mut R) -> Result<BoxVec> {
    let mut boxvec = [0.0; 9];
    read_f32s(file, &mut boxvec)?;
    let cols = [
        [boxvec[0], boxvec[1], boxvec[2]],
        [boxvec[3], boxvec[4], boxvec[5]],
        [boxvec[6], boxvec[7], boxvec[8]],
    ];
    Ok(Mat3::from_cols_array_2d(&cols))
}

pub fn read_f32s<R: Read>(file: &mut R, buf: &mut [f32]) -> Result<()> {
    for value in buf {
        *value = read_f32(file)?
    }
    Ok(())
}

pub fn read_f32<R: Read>(file: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(f32::from_be_bytes(buf))
}

pub fn read_i32<R: Read>(file: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

/// Reads an `i32`, or returns `None` if the stream ended cleanly before its first byte.
///
/// A stream that ends partway through the value is reported as an [`io::ErrorKind::UnexpectedEof`].
pub fn read_i32_or_end<R: Read>(file: &mut R) -> io::Result<Option<i32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(Some(i32::from_be_bytes(buf)))
}
