use std::collections::BTreeSet;
use std::num::{NonZeroU64, ParseIntError};
use std::str::FromStr;

/// A selection of trajectory frames to ingest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum FrameSelection {
    /// Include all frames that are in a trajectory.
    #[default]
    All,
    /// Include frames that lie within a certain [`Range`].
    Range(Range),
    /// Include frames that match the indices in this set.
    FrameList(BTreeSet<usize>),
}

impl FrameSelection {
    /// Determine whether some index `idx` is included in this [`FrameSelection`].
    ///
    /// Will return [`None`] once the index is beyond the scope of this `FrameSelection`.
    pub fn is_included(&self, idx: usize) -> Option<bool> {
        match self {
            FrameSelection::All => Some(true),
            FrameSelection::Range(range) => range.is_included(idx as u64),
            FrameSelection::FrameList(indices) => {
                if *indices.last()? < idx {
                    None
                } else {
                    Some(indices.contains(&idx))
                }
            }
        }
    }
}

/// A range of frame indices.
///
/// The `start` of a [`Range`] is always bounded, and is zero by default.
/// The `end` may be bounded or unbounded. In case the end is unbounded ([`None`]), all frames up to
/// and including the last frame of a trajectory are in range. If it is bounded by [`Some`] value,
/// it is an exclusive bound.
/// The `step` describes the number of frames that passed in each stride.
/// The number of skipped frames is equal to `step` - 1.
/// For instance, given a `step` of four, one frame is read and the following three are skipped.
///
/// # Note
///
/// An instance where `start` > `end` is a valid `Range`, but it will not make much sense,
/// since it will be understood to produce zero frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: u64,
    pub end: Option<u64>,
    pub step: NonZeroU64,
}

impl Range {
    pub fn new(start: Option<u64>, end: Option<u64>, step: Option<NonZeroU64>) -> Self {
        let mut sel = Self {
            end,
            ..Self::default()
        };
        if let Some(start) = start {
            sel.start = start;
        }
        if let Some(step) = step {
            sel.step = step;
        }
        sel
    }

    fn is_included(&self, idx: u64) -> Option<bool> {
        if let Some(end) = self.end {
            // Determine whether `idx` is already beyond the defined range.
            if end <= idx {
                return None;
            }
        }
        let in_range = self.start <= idx;
        let in_step = in_range && (idx - self.start) % self.step == 0;
        Some(in_step)
    }
}

impl Default for Range {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            step: NonZeroU64::MIN,
        }
    }
}

/// Parses a range in the format `start:stop:step`, where each of the components is optional.
///
/// - `:100` selects the first 100 frames.
/// - `3:14` selects the 4th up to and including the 14th frame, 11 frames in total.
/// - `:100:2` selects every second frame from the first 100 frames, 50 in total.
/// - `7` selects everything from the 8th frame onwards.
impl FromStr for Range {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn component<T: FromStr>(s: Option<&str>) -> Result<Option<T>, T::Err> {
            s.filter(|s| !s.is_empty()).map(str::parse).transpose()
        }

        let mut components = s.split(':');
        let start: Option<u64> = component(components.next())?;
        let end: Option<u64> = component(components.next())?;
        let step: Option<NonZeroU64> = component(components.next())?;
        Ok(Self::new(start, end, step))
    }
}
