use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::{DrugModel, MoleculeModel};
use crate::selection::FrameSelection;
use crate::topology::{Topology, NM_TO_ANGSTROM};
use crate::{BoxVec, Frame, XtcReader, MAX_UNCOMPRESSED_ATOMS};

/// Options that determine which trajectory frames are ingested.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// The frames to take from each trajectory. Frame indices start at zero for every file.
    pub frames: FrameSelection,
    /// Stop once the models hold this many snapshots, counting the one taken from the topology.
    pub max_snapshots: Option<usize>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(mut self, frames: FrameSelection) -> Self {
        self.frames = frames;
        self
    }

    pub fn max_snapshots(mut self, max_snapshots: usize) -> Self {
        self.max_snapshots = Some(max_snapshots);
        self
    }

    fn is_full(&self, snapshots: usize) -> bool {
        self.max_snapshots.is_some_and(|max| snapshots >= max)
    }
}

/// The outcome of loading a single trajectory file.
#[derive(Debug)]
pub struct TrajectoryReport {
    pub path: PathBuf,
    /// The number of frames that were ingested from this file, including those ingested before an
    /// error occurred.
    pub frames: usize,
    pub error: Option<Error>,
}

impl TrajectoryReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A molecule and its ligands, moving through time together.
///
/// Every model starts out with the snapshot described by the topology. Each ingested frame adds
/// one snapshot to all of them, so their snapshot counts are always equal.
#[derive(Debug, Clone)]
pub struct Dynamics {
    molecule: MoleculeModel,
    drugs: BTreeMap<u32, DrugModel>,
    /// The number of atoms every frame must hold, including solvent and ions.
    total_atoms: usize,
    boxvec: Option<BoxVec>,
}

impl Dynamics {
    pub fn from_topology(topology: Topology) -> Self {
        let drugs = topology
            .drugs
            .into_iter()
            .map(|(residue_id, atoms)| (residue_id, DrugModel::with_atoms(atoms)))
            .collect();
        Self {
            molecule: MoleculeModel::with_atoms(topology.atoms),
            drugs,
            total_atoms: topology.total_atoms,
            boxvec: topology.boxvec,
        }
    }

    /// Reads the topology at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_topology(Topology::open(path)?))
    }

    pub fn molecule(&self) -> &MoleculeModel {
        &self.molecule
    }

    pub fn drugs(&self) -> &BTreeMap<u32, DrugModel> {
        &self.drugs
    }

    /// Returns the ligand with residue sequence number `residue_id`.
    pub fn drug(&self, residue_id: u32) -> Option<&DrugModel> {
        self.drugs.get(&residue_id)
    }

    pub fn snapshot_count(&self) -> usize {
        self.molecule.snapshot_count()
    }

    pub fn total_atoms(&self) -> usize {
        self.total_atoms
    }

    /// The box vectors of the most recent snapshot, in Ångström.
    pub fn boxvec(&self) -> Option<BoxVec> {
        self.boxvec
    }

    /// Appends the positions in `frame` to every model.
    ///
    /// The snapshots for all models are assembled before any of them is modified, so a failing
    /// frame leaves the models untouched.
    pub fn ingest_frame(&mut self, frame: &Frame) -> Result<()> {
        self.check_natoms(frame.natoms())?;

        let molecule = self.molecule.gather(&frame.positions, NM_TO_ANGSTROM)?;
        let drugs = self
            .drugs
            .values()
            .map(|drug| drug.gather(&frame.positions, NM_TO_ANGSTROM))
            .collect::<Result<Vec<_>>>()?;

        self.molecule.push_checked(molecule);
        for (drug, positions) in self.drugs.values_mut().zip(drugs) {
            drug.push_checked(positions);
        }
        self.boxvec = Some(frame.boxvec * NM_TO_ANGSTROM);

        Ok(())
    }

    /// Checks whether a frame of `natoms` atoms can be attached to the models.
    pub fn check_natoms(&self, natoms: usize) -> Result<()> {
        if natoms <= MAX_UNCOMPRESSED_ATOMS {
            return Err(Error::UnsupportedFrameSize { natoms });
        }
        if natoms != self.total_atoms {
            return Err(Error::AtomCountMismatch {
                expected: self.total_atoms,
                found: natoms,
            });
        }
        Ok(())
    }

    /// Ingests the frames selected by `options` from `reader`.
    ///
    /// Returns the number of frames that were ingested. On error, the frames ingested up to that
    /// point remain in the models. A frame whose header announces the wrong number of atoms is
    /// rejected before its positions are decoded.
    pub fn ingest_trajectory<R: Read>(
        &mut self,
        reader: &mut XtcReader<R>,
        options: &LoadOptions,
    ) -> Result<usize> {
        let mut frame = Frame::default();
        let mut ingested = 0;
        while !options.is_full(self.snapshot_count()) {
            let idx = reader.frames_read();
            match options.frames.is_included(idx) {
                None => break,
                Some(false) => {
                    if !reader.skip_frame()? {
                        break;
                    }
                }
                Some(true) => {
                    let Some(header) = reader.read_header()? else {
                        break;
                    };
                    self.check_natoms(header.natoms)?;
                    reader.read_frame_body(&header, &mut frame)?;
                    self.ingest_frame(&frame)?;
                    ingested += 1;
                }
            }
        }

        log::debug!(
            "ingested {ingested} of {} frames read",
            reader.frames_read()
        );
        Ok(ingested)
    }

    /// Loads the trajectories at `paths` in order.
    ///
    /// A trajectory that fails is reported and logged, after which loading continues with the next
    /// file. Snapshots that were ingested before the failure are kept.
    pub fn load_trajectories<I, P>(&mut self, paths: I, options: &LoadOptions) -> Vec<TrajectoryReport>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut reports = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let before = self.snapshot_count();
            let result = XtcReader::open(path)
                .and_then(|mut reader| self.ingest_trajectory(&mut reader, options));
            let frames = self.snapshot_count() - before;

            let error = match result {
                Ok(_) => {
                    log::info!("loaded {frames} frames from {path:?}");
                    None
                }
                Err(err) => {
                    log::error!("could not load {path:?} (after {frames} frames): {err}");
                    Some(err)
                }
            };
            reports.push(TrajectoryReport {
                path: path.to_path_buf(),
                frames,
                error,
            });
        }
        reports
    }
}
