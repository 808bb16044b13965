//! A minimal xtc writer for tests and benchmarks.
//!
//! Frames produced by [`compress`] store every atom as a base triplet without any runs. That is a
//! valid (if poorly compressed) stream. Hand-crafted payloads can be assembled with [`BitWriter`].
#![allow(dead_code)]

use grotraj::codec::{bitwidth_of, bitwidth_of_joint, Prelude, FIRSTIDX};

/// Writes MSB-first bit fields.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bits(&mut self, nbits: u32, value: u32) {
        assert!(nbits <= 32);
        for i in (0..nbits).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
    }

    pub fn write_flag(&mut self, flag: bool) {
        self.bits.push(flag);
    }

    /// Writes three values as one mixed-radix integer of `nbits` bits, in the layout the decoder
    /// expects: little-endian bytes, with any trailing partial byte written last.
    pub fn write_ints(&mut self, nbits: u32, sizes: [u32; 3], nums: [u32; 3]) {
        for (n, s) in nums.iter().zip(&sizes) {
            assert!(n < s, "{n} does not fit in radix {s}");
        }
        let packed = (nums[0] as u128 * sizes[1] as u128 + nums[1] as u128) * sizes[2] as u128
            + nums[2] as u128;
        assert!(nbits >= 128 || packed >> nbits == 0, "{packed} does not fit in {nbits} bits");

        let bytes = packed.to_le_bytes();
        let full = nbits / 8;
        for &byte in &bytes[..full as usize] {
            self.write_bits(8, byte as u32);
        }
        if nbits % 8 > 0 {
            self.write_bits(nbits % 8, bytes[full as usize] as u32);
        }
    }

    /// Returns the written bytes, with the last one padded by zeros.
    pub fn finish(self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &bit)| byte | ((bit as u8) << (7 - i)))
            })
            .collect()
    }
}

/// Compresses `coords` (in nm) without runs.
pub fn compress(coords: &[[f32; 3]], precision: f32) -> (Prelude, Vec<u8>) {
    let ints: Vec<[i32; 3]> = coords
        .iter()
        .map(|c| c.map(|v| (v * precision).round() as i32))
        .collect();
    let mut minint = [i32::MAX; 3];
    let mut maxint = [i32::MIN; 3];
    for int in &ints {
        for i in 0..3 {
            minint[i] = minint[i].min(int[i]);
            maxint[i] = maxint[i].max(int[i]);
        }
    }
    let prelude = Prelude {
        minint,
        maxint,
        smallidx: FIRSTIDX as i32,
    };
    let sizes = [0, 1, 2].map(|i| (maxint[i] as i64 - minint[i] as i64 + 1) as u32);

    let mut writer = BitWriter::new();
    let large = sizes.iter().any(|&size| size > 0xffffff);
    for int in &ints {
        let nums = [0, 1, 2].map(|i| (int[i] as i64 - minint[i] as i64) as u32);
        if large {
            for i in 0..3 {
                writer.write_bits(bitwidth_of(sizes[i]), nums[i]);
            }
        } else {
            writer.write_ints(bitwidth_of_joint(sizes), sizes, nums);
        }
        // No run.
        writer.write_flag(false);
    }

    (prelude, writer.finish())
}

/// The header and position payload of one frame.
#[derive(Debug, Clone)]
pub struct FrameSpec {
    pub step: i32,
    pub time: f32,
    pub boxvec: [f32; 9],
    pub natoms: usize,
    pub payload: Payload,
}

#[derive(Debug, Clone)]
pub enum Payload {
    /// Uncompressed positions, for frames of at most 9 atoms.
    Raw(Vec<f32>),
    Compressed {
        precision: f32,
        prelude: Prelude,
        bytes: Vec<u8>,
    },
}

impl FrameSpec {
    /// A frame that holds `coords` (in nm), compressed if there are more than 9 of them.
    pub fn new(step: i32, coords: &[[f32; 3]], precision: f32) -> Self {
        let payload = if coords.len() <= 9 {
            Payload::Raw(coords.iter().flatten().copied().collect())
        } else {
            let (prelude, bytes) = compress(coords, precision);
            Payload::Compressed {
                precision,
                prelude,
                bytes,
            }
        };
        Self {
            step,
            time: step as f32 * 0.5,
            boxvec: [5.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 5.0],
            natoms: coords.len(),
            payload,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        fn i32s(out: &mut Vec<u8>, values: &[i32]) {
            out.extend(values.iter().flat_map(|v| v.to_be_bytes()));
        }
        fn f32s(out: &mut Vec<u8>, values: &[f32]) {
            out.extend(values.iter().flat_map(|v| v.to_be_bytes()));
        }

        let mut out = Vec::new();
        i32s(&mut out, &[1995, self.natoms as i32, self.step]);
        f32s(&mut out, &[self.time]);
        f32s(&mut out, &self.boxvec);
        i32s(&mut out, &[self.natoms as i32]);
        match &self.payload {
            Payload::Raw(positions) => f32s(&mut out, positions),
            Payload::Compressed {
                precision,
                prelude,
                bytes,
            } => {
                f32s(&mut out, &[*precision]);
                i32s(&mut out, &prelude.minint);
                i32s(&mut out, &prelude.maxint);
                i32s(&mut out, &[prelude.smallidx, bytes.len() as i32]);
                out.extend(bytes);
                out.resize(out.len() + (4 - bytes.len() % 4) % 4, 0);
            }
        }
        out
    }
}

/// Writes `frames` back to back into one trajectory.
pub fn trajectory(frames: &[FrameSpec]) -> Vec<u8> {
    frames.iter().flat_map(FrameSpec::to_bytes).collect()
}

/// Deterministic pseudo-random coordinates inside a 5 nm box.
pub fn coords(natoms: usize, seed: u32) -> Vec<[f32; 3]> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state % 5000) as f32 / 1000.0
    };
    (0..natoms).map(|_| [next(), next(), next()]).collect()
}

/// A gro topology of `natoms` atoms with coordinates from `coords`. Atoms in `drugs` get the
/// residue name `DRG` and residue number 900, atoms from `solvent_from` onwards are water.
pub fn gro(coords: &[[f32; 3]], drugs: std::ops::Range<usize>, solvent_from: usize) -> String {
    let mut out = format!("generated\n{:5}\n", coords.len());
    for (idx, [x, y, z]) in coords.iter().enumerate() {
        let (resid, resname, name) = if drugs.contains(&idx) {
            (900, "DRG", "C1")
        } else if idx >= solvent_from {
            (1000 + idx, "SOL", "OW")
        } else {
            (1 + idx / 4, "ALA", ["N", "CA", "C", "O"][idx % 4])
        };
        out += &format!(
            "{:>5}{:<5}{:>5}{:>5}{:8.3}{:8.3}{:8.3}\n",
            resid % 100_000,
            resname,
            name,
            (idx + 1) % 100_000,
            x,
            y,
            z
        );
    }
    out += "   5.00000   5.00000   5.00000\n";
    out
}
