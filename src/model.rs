use glam::Vec3;

use crate::error::{Error, Result};

/// The identity of an atom, as established by the topology.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// One-based index into every trajectory frame.
    pub id: u32,
    pub residue_id: u32,
    pub name: String,
    pub residue_type: String,
    /// In Ångström.
    pub covalent_radius: f32,
    /// In cubic Ångström. Zero if unknown.
    pub volume: f32,
    /// Position in Ångström, as given by the topology.
    pub position: Vec3,
}

impl Atom {
    /// The index of this atom's position within a decoded frame. `None` for an id of zero.
    pub fn frame_index(&self) -> Option<usize> {
        (self.id as usize).checked_sub(1)
    }
}

/// A set of atoms together with an append-only history of their positions.
///
/// The atom identities are captured from the first snapshot and never change afterwards. Each
/// snapshot holds three values per atom, in the order of [`Model::atoms`].
#[derive(Debug, Default, Clone)]
pub struct Model {
    atoms: Option<Box<[Atom]>>,
    snapshots: Vec<Box<[f32]>>,
}

/// The molecule of interest, which is everything in the topology apart from solvent, ions, and
/// ligands.
pub type MoleculeModel = Model;
/// A single ligand residue.
pub type DrugModel = Model;

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model whose first snapshot holds the positions of `atoms`.
    pub fn with_atoms(atoms: Vec<Atom>) -> Self {
        let positions = atoms.iter().flat_map(|atom| atom.position.to_array()).collect();
        Self {
            atoms: Some(atoms.into_boxed_slice()),
            snapshots: vec![positions],
        }
    }

    /// Appends the positions of `atoms` as a new snapshot.
    ///
    /// The first call establishes the atom identities of this model. Later calls must provide the
    /// same number of atoms, or they are rejected without touching the history.
    pub fn add_snapshot(&mut self, atoms: &[Atom]) -> Result<()> {
        if let Some(known) = &self.atoms {
            if known.len() != atoms.len() {
                return Err(Error::AtomCountMismatch {
                    expected: known.len(),
                    found: atoms.len(),
                });
            }
        }

        let positions = atoms.iter().flat_map(|atom| atom.position.to_array()).collect();
        if self.atoms.is_none() {
            self.atoms = Some(atoms.into());
        }
        self.snapshots.push(positions);
        Ok(())
    }

    /// Appends a snapshot of flat positions, three values per atom.
    ///
    /// The atom identities must have been established by [`Model::add_snapshot`] before.
    pub fn add_positions(&mut self, positions: Vec<f32>) -> Result<()> {
        self.check_positions(&positions)?;
        self.snapshots.push(positions.into_boxed_slice());
        Ok(())
    }

    /// Checks whether `positions` would be accepted as the next snapshot.
    pub fn check_positions(&self, positions: &[f32]) -> Result<()> {
        let expected = self.atom_count();
        let found = positions.len() / 3;
        if self.atoms.is_none() || positions.len() % 3 != 0 || found != expected {
            return Err(Error::AtomCountMismatch { expected, found });
        }
        Ok(())
    }

    /// Appends a snapshot that has already passed [`Model::check_positions`].
    pub(crate) fn push_checked(&mut self, positions: Vec<f32>) {
        debug_assert!(self.check_positions(&positions).is_ok());
        self.snapshots.push(positions.into_boxed_slice());
    }

    pub fn atoms(&self) -> &[Atom] {
        self.atoms.as_deref().unwrap_or_default()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms().len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns the flat positions of snapshot `frame`.
    pub fn positions(&self, frame: usize) -> Option<&[f32]> {
        self.snapshots.get(frame).map(|snapshot| &snapshot[..])
    }

    pub fn coords(&self, frame: usize) -> Option<impl Iterator<Item = Vec3> + '_> {
        let positions = self.positions(frame)?;
        Some(positions.chunks_exact(3).map(Vec3::from_slice))
    }

    /// Returns the positions of the most recent snapshot.
    pub fn latest(&self) -> Option<&[f32]> {
        self.snapshots.last().map(|snapshot| &snapshot[..])
    }

    /// Gathers the positions of this model's atoms from a flat frame, indexed by atom id and scaled
    /// by `scale`.
    pub(crate) fn gather(&self, frame_positions: &[f32], scale: f32) -> Result<Vec<f32>> {
        let mut positions = Vec::with_capacity(self.atom_count() * 3);
        for atom in self.atoms() {
            let position = atom
                .frame_index()
                .and_then(|idx| frame_positions.get(idx * 3..idx * 3 + 3));
            let Some(position) = position else {
                return Err(Error::AtomCountMismatch {
                    expected: atom.id as usize,
                    found: frame_positions.len() / 3,
                });
            };
            positions.extend(position.iter().map(|v| v * scale));
        }
        Ok(positions)
    }
}
