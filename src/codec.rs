//! The xtc position decompression algorithm.
//!
//! Positions are stored as integers (the real coordinates multiplied by the frame's precision)
//! relative to the frame-wide minimum. Every atom starts with a "base" triplet that is either
//! packed with three independent bit widths, or with a single mixed-radix integer when the box is
//! small enough. Atoms that lie close to their predecessor are stored in runs of small deltas,
//! whose bit budget adapts as decoding progresses.

use crate::bits::BitReader;
use crate::error::{Error, Result};

/// Twice the half-width of the delta bucket for each compression index.
#[rustfmt::skip]
pub const MAGICINTS: [u32; 73] = [
    0,        0,        0,       0,       0,       0,       0,       0,       0,       8,
    10,       12,       16,      20,      25,      32,      40,      50,      64,      80,
    101,      128,      161,     203,     256,     322,     406,     512,     645,     812,
    1024,     1290,     1625,    2048,    2580,    3250,    4096,    5060,    6501,    8192,
    10321,    13003,    16384,   20642,   26007,   32768,   41285,   52015,   65536,   82570,
    104031,   131072,   165140,  208063,  262144,  330280,  416127,  524287,  660561,  832255,
    1048576,  1321122,  1664510, 2097152, 2642245, 3329021, 4194304, 5284491, 6658042, 8388607,
    10568983, 13316085, 16777216
];
/// The smallest index that is ever used for a delta bucket. Note that `MAGICINTS[FIRSTIDX - 1] == 0`.
pub const FIRSTIDX: usize = 9;

/// Every atom takes at least one bit for its base triplet and one for its run flag.
pub const MIN_BITS_PER_ATOM: usize = 2;

/// Sizes above this value cannot be packed together into one mixed-radix integer.
const MAX_JOINT_SIZE: u32 = 0xffffff;

/// Look up the magic integer for some compression index.
pub fn magic_int(index: usize) -> Option<u32> {
    MAGICINTS.get(index).copied()
}

/// Returns the minimal number of bits needed to represent any value in `0..=size`.
///
/// This is the smallest `n` for which `2^n > size`.
pub const fn bitwidth_of(size: u32) -> u32 {
    let mut n: u64 = 1;
    let mut nbits = 0;
    while size as u64 >= n && nbits < 32 {
        nbits += 1;
        n <<= 1;
    }
    nbits
}

/// Returns the number of bits needed to store one mixed-radix integer composed of three values
/// bounded by `sizes`.
///
/// The product of the sizes is computed over a little-endian byte array, exactly as the encoder
/// does it, such that the resulting width matches the encoder's for any set of sizes.
pub fn bitwidth_of_joint(sizes: [u32; 3]) -> u32 {
    let mut bytes = [0u8; 32];
    bytes[0] = 1;
    let mut nbytes = 1;

    for size in sizes {
        let mut carry: u64 = 0;
        let mut idx = 0;
        while idx < nbytes {
            carry += bytes[idx] as u64 * size as u64;
            bytes[idx] = (carry & 0xff) as u8;
            carry >>= 8;
            idx += 1;
        }
        while carry != 0 {
            // Three u32 factors never need more than 12 bytes.
            assert!(idx < bytes.len(), "joint size overflows the byte buffer");
            bytes[idx] = (carry & 0xff) as u8;
            carry >>= 8;
            idx += 1;
        }
        nbytes = idx;
    }

    let top = nbytes - 1;
    let mut nbits = 0;
    let mut num: u32 = 1;
    while bytes[top] as u32 >= num {
        nbits += 1;
        num <<= 1;
    }

    top as u32 * 8 + nbits
}

/// How the base triplet of each atom is laid out in the bit stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widths {
    /// At least one of the sizes is too large to be multiplied, so each axis has its own width.
    Large([u32; 3]),
    /// All three axes are packed into a single mixed-radix integer of this many bits.
    Joint(u32),
}

/// The integer prelude that precedes the compressed bytes of a frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Prelude {
    pub minint: [i32; 3],
    pub maxint: [i32; 3],
    pub smallidx: i32,
}

impl Prelude {
    /// The number of bytes that together form the prelude of `minint`, `maxint`, and `smallidx`.
    pub const SIZE: usize = 7 * 4;

    /// Returns the per-axis sizes and the layout of the base triplets.
    pub fn sizes(&self) -> Result<([u32; 3], Widths)> {
        let mut sizeint = [0u32; 3];
        for (size, (&min, &max)) in sizeint.iter_mut().zip(self.minint.iter().zip(&self.maxint)) {
            *size = (max as u32).wrapping_sub(min as u32).wrapping_add(1);
        }
        if sizeint.contains(&0) {
            return Err(Error::corrupt(format!(
                "invalid coordinate range (minint {:?}, maxint {:?})",
                self.minint, self.maxint
            )));
        }

        if (sizeint[0] | sizeint[1] | sizeint[2]) > MAX_JOINT_SIZE {
            Ok((sizeint, Widths::Large(sizeint.map(bitwidth_of))))
        } else {
            Ok((sizeint, Widths::Joint(bitwidth_of_joint(sizeint))))
        }
    }
}

/// The adaptive bucket used for run-length compressed deltas.
#[derive(Debug, Clone, Copy)]
struct SmallBucket {
    index: usize,
    small: i32,
    smaller: i32,
}

impl SmallBucket {
    fn new(smallidx: i32) -> Result<Self> {
        let index = usize::try_from(smallidx)
            .ok()
            .filter(|idx| (FIRSTIDX..MAGICINTS.len()).contains(idx))
            .ok_or_else(|| Error::corrupt(format!("invalid compression index {smallidx}")))?;
        let smaller_index = usize::max(FIRSTIDX, index - 1);
        Ok(Self {
            index,
            small: (MAGICINTS[index] / 2) as i32,
            smaller: (MAGICINTS[smaller_index] / 2) as i32,
        })
    }

    fn size(&self) -> u32 {
        MAGICINTS[self.index]
    }

    fn adjust(&mut self, is_smaller: i32) -> Result<()> {
        match is_smaller.cmp(&0) {
            std::cmp::Ordering::Less => {
                if self.index <= FIRSTIDX {
                    return Err(Error::corrupt("compression index dropped below the first bucket"));
                }
                self.index -= 1;
                self.small = self.smaller;
                self.smaller = if self.index > FIRSTIDX {
                    (MAGICINTS[self.index - 1] / 2) as i32
                } else {
                    0
                };
            }
            std::cmp::Ordering::Greater => {
                if self.index + 1 >= MAGICINTS.len() {
                    return Err(Error::corrupt("compression index rose beyond the last bucket"));
                }
                self.index += 1;
                self.smaller = self.small;
                self.small = (MAGICINTS[self.index] / 2) as i32;
            }
            std::cmp::Ordering::Equal => {}
        }
        Ok(())
    }
}

/// Read a mixed-radix integer of `nbits` bits and split it into three values bounded by `sizes`.
///
/// The integer is stored as little-endian bytes, with the first value being the most significant
/// digit: `packed = (x * sizes[1] + y) * sizes[2] + z`.
pub(crate) fn decode_ints(reader: &mut BitReader, nbits: u32, sizes: [u32; 3]) -> Result<[i32; 3]> {
    if sizes[1] == 0 || sizes[2] == 0 {
        return Err(Error::corrupt("zero-sized radix in packed integer"));
    }
    if nbits <= 64 {
        return unpack_from_u64(reader, nbits, sizes);
    }

    let mut bytes = [0u8; 32];
    let mut nbytes: usize = 0;
    let mut nbits = nbits;
    assert!(nbits as usize <= bytes.len() * 8, "packed integer of {nbits} bits is too wide");
    while nbits >= 8 {
        bytes[nbytes] = reader.read_byte()?;
        nbytes += 1;
        nbits -= 8;
    }
    if nbits > 0 {
        bytes[nbytes] = reader.read_bits(nbits)? as u8;
        nbytes += 1;
    }

    let mut nums = [0i32; 3];
    for i in (1..3).rev() {
        let size = sizes[i] as u64;
        let mut num: u64 = 0;
        for byte in bytes[..nbytes].iter_mut().rev() {
            num = (num << 8) | *byte as u64;
            let p = num / size;
            *byte = p as u8;
            num -= p * size;
        }
        nums[i] = num as i32;
    }
    nums[0] = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

    Ok(nums)
}

fn unpack_from_u64(reader: &mut BitReader, mut nbits: u32, sizes: [u32; 3]) -> Result<[i32; 3]> {
    let mut v: u64 = 0;
    let mut shift = 0;
    while nbits >= 8 {
        v |= (reader.read_byte()? as u64) << shift;
        shift += 8;
        nbits -= 8;
    }
    if nbits > 0 {
        v |= (reader.read_bits(nbits)? as u64) << shift;
    }

    let sz = sizes[2] as u64;
    let sy = sizes[1] as u64;
    let szy = sz * sy;
    let x = v / szy;
    let q = v - x * szy;
    let y = q / sz;
    let z = q - y * sz;

    Ok([x as i32, y as i32, z as i32])
}

#[inline]
fn emit(positions: &mut [f32], emitted: &mut usize, coord: [i32; 3], invprecision: f32) -> Result<()> {
    let start = *emitted * 3;
    let Some(position) = positions.get_mut(start..start + 3) else {
        return Err(Error::corrupt(format!(
            "decoded more positions than the {} atoms in this frame",
            positions.len() / 3
        )));
    };
    for (p, &c) in position.iter_mut().zip(&coord) {
        *p = c as f32 * invprecision;
    }
    *emitted += 1;
    Ok(())
}

/// Decode the compressed `bytes` of one frame into `positions`.
///
/// The number of atoms is taken to be `positions.len() / 3`, and every one of them is written.
pub fn decode_positions(
    bytes: &[u8],
    prelude: &Prelude,
    precision: f32,
    positions: &mut [f32],
) -> Result<()> {
    assert_eq!(positions.len() % 3, 0, "the length of `positions` must be divisible by 3");
    let natoms = positions.len() / 3;
    let invprecision = precision.recip();
    let minint = prelude.minint;

    let (sizeint, widths) = prelude.sizes()?;
    let mut bucket = SmallBucket::new(prelude.smallidx)?;
    let mut reader = BitReader::new(bytes);

    // A run length carries over to subsequent atoms until a new one is flagged.
    let mut run: u32 = 0;
    let mut emitted = 0;
    while emitted < natoms {
        let mut coord = match widths {
            Widths::Large(bitsizeint) => [
                reader.read_bits(bitsizeint[0])? as i32,
                reader.read_bits(bitsizeint[1])? as i32,
                reader.read_bits(bitsizeint[2])? as i32,
            ],
            Widths::Joint(bitsize) => decode_ints(&mut reader, bitsize, sizeint)?,
        };
        for (c, &min) in coord.iter_mut().zip(&minint) {
            *c = c.wrapping_add(min);
        }
        let mut prevcoord = coord;

        let mut is_smaller = 0;
        if reader.read_flag()? {
            let value = reader.read_bits(5)?;
            is_smaller = (value % 3) as i32 - 1;
            run = value - value % 3;
        }

        if run > 0 {
            let natoms_run = run as usize / 3;
            if emitted + natoms_run + 1 > natoms {
                return Err(Error::corrupt(format!(
                    "run of {natoms_run} atoms after atom {emitted} overshoots the {natoms} atoms in this frame"
                )));
            }

            let sizesmall = [bucket.size(); 3];
            for k in 0..natoms_run {
                let delta = decode_ints(&mut reader, bucket.index as u32, sizesmall)?;
                let mut coord = [0i32; 3];
                for i in 0..3 {
                    coord[i] = delta[i]
                        .wrapping_add(prevcoord[i])
                        .wrapping_sub(bucket.small);
                }
                if k == 0 {
                    // The encoder interchanges the first two atoms of a run, since this compresses
                    // water (stored as OHH) better. Undo that here.
                    std::mem::swap(&mut coord, &mut prevcoord);
                    emit(positions, &mut emitted, prevcoord, invprecision)?;
                } else {
                    prevcoord = coord;
                }
                emit(positions, &mut emitted, coord, invprecision)?;
            }
        } else {
            emit(positions, &mut emitted, coord, invprecision)?;
        }

        bucket.adjust(is_smaller)?;
    }

    Ok(())
}
