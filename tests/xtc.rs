use std::io::Cursor;

use grotraj::codec::{bitwidth_of_joint, decode_positions, Prelude, Widths, FIRSTIDX};
use grotraj::{Error, Frame, XtcReader};

mod common;
use common::{BitWriter, FrameSpec, Payload};

/// The value the decoder should produce for `v` stored at `precision`.
fn quantized(v: f32, precision: f32) -> f32 {
    (v * precision).round() as i32 as f32 * precision.recip()
}

fn read_single(spec: &FrameSpec) -> grotraj::Result<Frame> {
    let mut reader = XtcReader::new(Cursor::new(spec.to_bytes()));
    let mut frame = Frame::default();
    assert!(reader.read_frame(&mut frame)?, "should read one frame");
    assert!(!reader.read_frame(&mut frame)?, "reader should be done by now");
    Ok(frame)
}

fn assert_reproduced(coords: &[[f32; 3]], precision: f32) -> grotraj::Result<()> {
    let spec = FrameSpec::new(7, coords, precision);
    let frame = read_single(&spec)?;
    assert_eq!(frame.natoms(), coords.len());
    assert_eq!(frame.step, 7);
    assert_eq!(frame.time, 3.5);
    assert_eq!(frame.precision, precision);
    for (i, (decoded, original)) in frame.coords().zip(coords).enumerate() {
        let expected = original.map(|v| quantized(v, precision));
        assert_eq!(decoded.to_array(), expected, "position {i} does not match");
        for (d, o) in decoded.to_array().iter().zip(original) {
            let tolerance = precision.recip() + 4.0 * f32::EPSILON * o.abs();
            assert!((d - o).abs() <= tolerance, "position {i} is off");
        }
    }
    Ok(())
}

fn layout(spec: &FrameSpec) -> Widths {
    let Payload::Compressed { prelude, .. } = &spec.payload else {
        panic!("frame is not compressed");
    };
    prelude.sizes().unwrap().1
}

mod reference {
    use super::*;

    #[test]
    fn compact() -> grotraj::Result<()> {
        let coords = common::coords(40, 1);
        let spec = FrameSpec::new(0, &coords, 1000.0);
        assert!(matches!(layout(&spec), Widths::Joint(nbits) if nbits <= 64));
        assert_reproduced(&coords, 1000.0)
    }

    #[test]
    fn large() -> grotraj::Result<()> {
        // A range of 20 nm at this precision does not fit in 24 bits.
        let mut coords = common::coords(25, 2);
        coords.push([20.0, 0.5, 0.5]);
        let spec = FrameSpec::new(0, &coords, 1_000_000.0);
        assert!(matches!(layout(&spec), Widths::Large(_)));
        assert_reproduced(&coords, 1_000_000.0)
    }

    #[test]
    fn wide_joint() -> grotraj::Result<()> {
        // Just below the large threshold on every axis, which makes for a 72-bit integer.
        let mut coords = common::coords(25, 3);
        coords.push([16000.0, 16000.0, 16000.0]);
        let spec = FrameSpec::new(0, &coords, 1000.0);
        assert!(matches!(layout(&spec), Widths::Joint(nbits) if nbits > 64));
        assert_reproduced(&coords, 1000.0)
    }

    #[test]
    fn uncompressed() -> grotraj::Result<()> {
        let coords = common::coords(9, 4);
        let frame = read_single(&FrameSpec::new(1, &coords, 1000.0))?;
        assert_eq!(frame.precision, 0.0);
        let decoded: Vec<_> = frame.coords().map(|c| c.to_array()).collect();
        assert_eq!(decoded, coords);
        Ok(())
    }
}

mod runs {
    use super::*;

    const SIZES: [u32; 3] = [16; 3];
    /// `MAGICINTS[FIRSTIDX] / 2`
    const SMALL: i32 = 4;

    fn prelude() -> Prelude {
        Prelude {
            minint: [0; 3],
            maxint: [15; 3],
            smallidx: FIRSTIDX as i32,
        }
    }

    fn write_base(writer: &mut BitWriter, coord: [i32; 3]) {
        writer.write_ints(bitwidth_of_joint(SIZES), SIZES, coord.map(|c| c as u32));
    }

    fn write_delta(writer: &mut BitWriter, coord: [i32; 3], prev: [i32; 3]) {
        let delta = [0, 1, 2].map(|i| (coord[i] - prev[i] + SMALL) as u32);
        writer.write_ints(FIRSTIDX as u32, [8; 3], delta);
    }

    fn decode(bytes: &[u8], natoms: usize) -> grotraj::Result<Vec<[i32; 3]>> {
        let mut positions = vec![0.0; natoms * 3];
        decode_positions(bytes, &prelude(), 1.0, &mut positions)?;
        Ok(positions
            .chunks_exact(3)
            .map(|p| [p[0] as i32, p[1] as i32, p[2] as i32])
            .collect())
    }

    #[test]
    fn first_two_are_interchanged() -> grotraj::Result<()> {
        let p0 = [4, 6, 5];
        let p1 = [5, 5, 5];
        let p2 = [6, 5, 7];

        // The base is the second atom. A run of two deltas follows: first the atom that is
        // emitted before the base, then one relative to that.
        let mut writer = BitWriter::new();
        write_base(&mut writer, p1);
        writer.write_flag(true);
        writer.write_bits(5, 7);
        write_delta(&mut writer, p0, p1);
        write_delta(&mut writer, p2, p0);

        assert_eq!(decode(&writer.finish(), 3)?, [p0, p1, p2]);
        Ok(())
    }

    #[test]
    fn run_length_persists() -> grotraj::Result<()> {
        let atoms = [[4, 6, 5], [5, 5, 5], [6, 5, 7], [10, 10, 10], [11, 11, 11], [12, 12, 12]];

        let mut writer = BitWriter::new();
        write_base(&mut writer, atoms[1]);
        writer.write_flag(true);
        writer.write_bits(5, 7);
        write_delta(&mut writer, atoms[0], atoms[1]);
        write_delta(&mut writer, atoms[2], atoms[0]);
        // No flag, so the previous run of two deltas applies again.
        write_base(&mut writer, atoms[4]);
        writer.write_flag(false);
        write_delta(&mut writer, atoms[3], atoms[4]);
        write_delta(&mut writer, atoms[5], atoms[3]);

        assert_eq!(decode(&writer.finish(), 6)?, atoms);
        Ok(())
    }

    #[test]
    fn overshooting_run_is_corrupt() {
        let mut writer = BitWriter::new();
        write_base(&mut writer, [5, 5, 5]);
        writer.write_flag(true);
        writer.write_bits(5, 7);
        write_delta(&mut writer, [4, 4, 4], [5, 5, 5]);
        write_delta(&mut writer, [4, 4, 4], [4, 4, 4]);

        let result = decode(&writer.finish(), 2);
        assert!(matches!(result, Err(Error::CorruptFrame { .. })));
    }

    #[test]
    fn truncated_run_is_corrupt() {
        let mut writer = BitWriter::new();
        write_base(&mut writer, [5, 5, 5]);
        writer.write_flag(true);
        writer.write_bits(5, 7);
        let bytes = writer.finish();

        let result = decode(&bytes, 3);
        assert!(matches!(result, Err(Error::CorruptFrame { .. })));
    }

    #[test]
    fn bucket_cannot_shrink_below_first() {
        let mut writer = BitWriter::new();
        write_base(&mut writer, [5, 5, 5]);
        writer.write_flag(true);
        // A run of zero with `is_smaller == -1`.
        writer.write_bits(5, 0);
        write_base(&mut writer, [5, 5, 5]);
        writer.write_flag(false);

        let result = decode(&writer.finish(), 2);
        assert!(matches!(result, Err(Error::CorruptFrame { .. })));
    }
}

mod malformed {
    use super::*;

    #[test]
    fn truncated_payload() {
        let coords = common::coords(30, 5);
        let mut spec = FrameSpec::new(0, &coords, 1000.0);
        if let Payload::Compressed { bytes, .. } = &mut spec.payload {
            bytes.truncate(bytes.len() / 2);
        }
        let result = read_single(&spec);
        assert!(matches!(result, Err(Error::CorruptFrame { .. })));
    }

    #[test]
    fn atom_count_beyond_payload() {
        let coords = common::coords(30, 5);
        let mut spec = FrameSpec::new(0, &coords, 1000.0);
        spec.natoms = i32::MAX as usize;
        let result = read_single(&spec);
        assert!(matches!(result, Err(Error::CorruptFrame { .. })));
    }

    #[test]
    fn truncated_stream() {
        let coords = common::coords(30, 6);
        let mut bytes = FrameSpec::new(0, &coords, 1000.0).to_bytes();
        bytes.truncate(bytes.len() - 5);

        let mut reader = XtcReader::new(Cursor::new(bytes));
        let err = reader.read_frame(&mut Frame::default()).unwrap_err();
        assert!(err.is_eof(), "{err}");
    }

    #[test]
    fn header_only_partially_present() {
        let mut reader = XtcReader::new(Cursor::new(vec![0, 0, 7, 203, 0, 0]));
        let err = reader.read_frame(&mut Frame::default()).unwrap_err();
        assert!(err.is_eof(), "{err}");
    }

    #[test]
    fn atom_counts_disagree() {
        let coords = common::coords(30, 7);
        let mut bytes = FrameSpec::new(0, &coords, 1000.0).to_bytes();
        // The repeated atom count sits right after the magic number, the atom count, the step,
        // the time, and the box.
        let offset = 4 * 13;
        bytes[offset..offset + 4].copy_from_slice(&31i32.to_be_bytes());

        let mut reader = XtcReader::new(Cursor::new(bytes));
        let result = reader.read_frame(&mut Frame::default());
        assert!(matches!(result, Err(Error::CorruptFrame { .. })));
    }

    #[test]
    fn negative_atom_count() {
        let coords = common::coords(30, 8);
        let mut bytes = FrameSpec::new(0, &coords, 1000.0).to_bytes();
        bytes[4..8].copy_from_slice(&(-30i32).to_be_bytes());

        let mut reader = XtcReader::new(Cursor::new(bytes));
        let result = reader.read_frame(&mut Frame::default());
        assert!(matches!(result, Err(Error::CorruptFrame { .. })));
    }

    #[test]
    fn bad_magic_is_tolerated() -> grotraj::Result<()> {
        let coords = common::coords(12, 9);
        let mut bytes = FrameSpec::new(0, &coords, 1000.0).to_bytes();
        bytes[..4].copy_from_slice(&1996i32.to_be_bytes());

        let mut reader = XtcReader::new(Cursor::new(bytes));
        let header = reader.read_header()?.unwrap();
        assert_eq!(header.magic, 1996);
        assert_eq!(header.natoms, 12);
        Ok(())
    }

    #[test]
    fn empty_stream() -> grotraj::Result<()> {
        let mut reader = XtcReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_header()?.is_none());
        assert!(!reader.skip_frame()?);
        Ok(())
    }
}

mod navigation {
    use super::*;

    fn frames() -> Vec<FrameSpec> {
        vec![
            FrameSpec::new(0, &common::coords(20, 10), 1000.0),
            FrameSpec::new(1, &common::coords(5, 11), 1000.0),
            FrameSpec::new(2, &common::coords(20, 12), 100.0),
            FrameSpec::new(3, &common::coords(20, 13), 1000.0),
        ]
    }

    #[test]
    fn skip_and_read() -> grotraj::Result<()> {
        let mut reader = XtcReader::new(Cursor::new(common::trajectory(&frames())));
        let mut frame = Frame::default();

        assert!(reader.skip_frame()?);
        assert!(reader.skip_frame()?);
        assert!(reader.read_frame(&mut frame)?);
        assert_eq!(frame.step, 2);
        assert_eq!(frame.precision, 100.0);
        assert_eq!(reader.frames_read(), 3);
        assert!(reader.skip_frame()?);
        assert!(!reader.skip_frame()?);
        assert_eq!(reader.frames_read(), 4);
        Ok(())
    }

    #[test]
    fn read_all() -> grotraj::Result<()> {
        let mut reader = XtcReader::new(Cursor::new(common::trajectory(&frames())));
        let frames = reader.read_all_frames()?;
        let natoms: Vec<_> = frames.iter().map(Frame::natoms).collect();
        assert_eq!(natoms, [20, 5, 20, 20]);
        Ok(())
    }

    #[test]
    fn offsets() -> grotraj::Result<()> {
        let specs = frames();
        let mut reader = XtcReader::new(Cursor::new(common::trajectory(&specs)));

        let offsets = reader.determine_offsets(None)?;
        let mut expected = Vec::new();
        let mut offset = 0;
        for spec in &specs {
            expected.push(offset as u64);
            offset += spec.to_bytes().len();
        }
        assert_eq!(&offsets[..], expected);
        assert_eq!(reader.frames_read(), 0);

        let first_two = reader.determine_offsets(Some(2))?;
        assert_eq!(&first_two[..], &expected[..2]);

        let mut frame = Frame::default();
        assert!(reader.read_frame_at_offset(&mut frame, offsets[3])?);
        assert_eq!(frame.step, 3);
        assert!(!reader.read_frame(&mut frame)?);
        Ok(())
    }

    #[test]
    fn home() -> grotraj::Result<()> {
        let mut reader = XtcReader::new(Cursor::new(common::trajectory(&frames())));
        let mut frame = Frame::default();

        let mut n1 = 0;
        while reader.read_frame(&mut frame)? {
            n1 += 1;
        }

        // "Move along home!"
        reader.home()?;
        assert_eq!(reader.frames_read(), 0);

        let mut n2 = 0;
        while reader.read_frame(&mut frame)? {
            n2 += 1;
        }
        assert_eq!(n1, 4);
        assert_eq!(n1, n2, "the number of frames that were read should match");
        Ok(())
    }
}

mod bitwidths {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn joint_matches_wide_product() {
        let mut rng = StdRng::seed_from_u64(1995);
        for _ in 0..10_000 {
            let sizes: [u32; 3] = std::array::from_fn(|_| {
                let nbits: u32 = rng.random_range(1..=32);
                rng.random_range(1..=u32::MAX >> (32 - nbits))
            });
            let product: u128 = sizes.iter().map(|&s| s as u128).product();
            let expected = 128 - product.leading_zeros();
            assert_eq!(bitwidth_of_joint(sizes), expected, "sizes {sizes:?}");
        }
    }
}

mod gromacs {
    use xdrfile::{Trajectory, XTCTrajectory};

    use super::*;

    /// Water-like clusters, which make the compressor emit runs of small deltas.
    fn waters(nmolecules: usize, seed: u32) -> Vec<[f32; 3]> {
        common::coords(nmolecules, seed)
            .into_iter()
            .flat_map(|o| {
                [
                    o,
                    [o[0] + 0.0957, o[1], o[2]],
                    [o[0] - 0.024, o[1] + 0.0927, o[2]],
                ]
            })
            .collect()
    }

    #[test]
    fn reproduce_xdrfile() -> grotraj::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("waters.xtc");

        let nframes = 5;
        let natoms = 3 * 200;
        let trajectory: Vec<_> = (0..nframes).map(|fi| waters(200, fi as u32)).collect();
        {
            let mut writer = XTCTrajectory::open_write(&path).expect("couldn't open file using xdrfile");
            for (fi, coords) in trajectory.iter().enumerate() {
                let mut frame = xdrfile::Frame::new();
                frame.step = fi;
                frame.time = fi as f32;
                frame.box_vector = [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]];
                frame.coords.extend_from_slice(coords);
                writer.write(&frame).expect("couldn't write xdrfile frame");
            }
            writer.flush().expect("couldn't flush xdrfile trajectory");
        }

        let mut xdr_reader = XTCTrajectory::open_read(&path).expect("couldn't open file using xdrfile");
        let mut xdr_frame = xdrfile::Frame::with_len(natoms);
        let mut reader = XtcReader::open(&path)?;
        let mut frame = Frame::default();

        for (fi, coords) in trajectory.iter().enumerate() {
            assert!(reader.read_frame(&mut frame)?, "frame {fi} should be present");
            xdr_reader
                .read(&mut xdr_frame)
                .expect("couldn't read xdrfile frame");

            assert_eq!(frame.step as usize, fi);
            assert_eq!(frame.natoms(), natoms);
            let tolerance = frame.precision.recip();
            for (i, decoded) in frame.coords().enumerate() {
                let decoded = decoded.to_array();
                assert_eq!(decoded, xdr_frame.coords[i], "position {i} for grotraj and xdrfile does not match");
                for (d, o) in decoded.iter().zip(&coords[i]) {
                    assert!((d - o).abs() <= tolerance, "position {i} of frame {fi} is off");
                }
            }
        }
        assert!(!reader.read_frame(&mut frame)?, "reader should be done by now");

        Ok(())
    }
}
