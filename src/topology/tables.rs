//! Reference data for the topology parser.
use phf::{phf_map, phf_set, Map, Set};

/// Residues that are dropped from the topology entirely.
pub static SOLVENT_RESIDUES: Set<&'static str> = phf_set! {
    "SOL", "WAT", "HOH", "TIP3", "TIP4", "SPC",
    "NA", "NA+", "SOD", "CL", "CL-", "CLA", "K", "K+", "POT",
    "MG", "MG2+", "CA2+", "ZN", "ZN2+",
};

/// The residue name that marks ligand atoms.
pub const DRUG_RESIDUE: &str = "DRG";

/// Covalent radii in Ångström, by element symbol.
pub static COVALENT_RADII: Map<&'static str, f32> = phf_map! {
    "H" => 0.31, "C" => 0.76, "N" => 0.71, "O" => 0.66, "S" => 1.05, "P" => 1.07,
    "F" => 0.57, "CL" => 1.02, "BR" => 1.20, "I" => 1.39, "B" => 0.84, "SE" => 1.20,
    "NA" => 1.66, "K" => 2.03, "MG" => 1.41, "CA" => 1.76, "MN" => 1.39, "FE" => 1.32,
    "CO" => 1.26, "NI" => 1.24, "CU" => 1.32, "ZN" => 1.22,
};

/// Used when the element of an atom cannot be determined.
pub const DEFAULT_ELEMENT: &str = "C";

/// Volumes in cubic Ångström of the backbone atoms shared by all standard amino acids.
///
/// Hydrogens are folded into the volume of the heavy atom they are bound to.
static BACKBONE_VOLUMES: Map<&'static str, f32> = phf_map! {
    "N" => 13.6, "CA" => 14.7, "C" => 9.7, "O" => 15.9,
    "OXT" => 15.9, "OC1" => 15.9, "OC2" => 15.9, "OT1" => 15.9, "OT2" => 15.9,
};

/// Per-residue atom volumes in cubic Ångström. Entries take precedence over the backbone volumes.
static RESIDUE_VOLUMES: Map<&'static str, &'static [(&'static str, f32)]> = phf_map! {
    "ALA" => &[("CB", 36.7)],
    "ARG" => &[
        ("CB", 23.2), ("CG", 23.2), ("CD", 23.2), ("NE", 13.6), ("CZ", 9.7), ("NH1", 21.9),
        ("NH2", 21.9),
    ],
    "ASN" => &[("CB", 23.2), ("CG", 9.7), ("OD1", 15.9), ("ND2", 21.9)],
    "ASP" => &[("CB", 23.2), ("CG", 9.7), ("OD1", 15.9), ("OD2", 15.9)],
    "CYS" => &[("CB", 23.2), ("SG", 36.7)],
    "GLN" => &[("CB", 23.2), ("CG", 23.2), ("CD", 9.7), ("OE1", 15.9), ("NE2", 21.9)],
    "GLU" => &[("CB", 23.2), ("CG", 23.2), ("CD", 9.7), ("OE1", 15.9), ("OE2", 15.9)],
    "GLY" => &[("CA", 23.2)],
    "HIS" => &[
        ("CB", 23.2), ("CG", 9.7), ("ND1", 13.6), ("CD2", 20.4), ("CE1", 20.4), ("NE2", 13.6),
    ],
    "ILE" => &[("CB", 14.7), ("CG1", 23.2), ("CG2", 36.7), ("CD", 36.7), ("CD1", 36.7)],
    "LEU" => &[("CB", 23.2), ("CG", 14.7), ("CD1", 36.7), ("CD2", 36.7)],
    "LYS" => &[("CB", 23.2), ("CG", 23.2), ("CD", 23.2), ("CE", 23.2), ("NZ", 21.9)],
    "MET" => &[("CB", 23.2), ("CG", 23.2), ("SD", 29.2), ("CE", 36.7)],
    "PHE" => &[
        ("CB", 23.2), ("CG", 9.7), ("CD1", 20.4), ("CD2", 20.4), ("CE1", 20.4), ("CE2", 20.4),
        ("CZ", 20.4),
    ],
    "PRO" => &[("N", 8.7), ("CB", 23.2), ("CG", 23.2), ("CD", 23.2)],
    "SER" => &[("CB", 23.2), ("OG", 17.9)],
    "THR" => &[("CB", 14.7), ("OG1", 17.9), ("CG2", 36.7)],
    "TRP" => &[
        ("CB", 23.2), ("CG", 9.7), ("CD1", 20.4), ("CD2", 9.7), ("NE1", 13.6), ("CE2", 9.7),
        ("CE3", 20.4), ("CZ2", 20.4), ("CZ3", 20.4), ("CH2", 20.4),
    ],
    "TYR" => &[
        ("CB", 23.2), ("CG", 9.7), ("CD1", 20.4), ("CD2", 20.4), ("CE1", 20.4), ("CE2", 20.4),
        ("CZ", 9.7), ("OH", 17.9),
    ],
    "VAL" => &[("CB", 14.7), ("CG1", 36.7), ("CG2", 36.7)],
};

pub fn is_solvent(residue: &str) -> bool {
    SOLVENT_RESIDUES.contains(residue)
}

pub fn covalent_radius(element: &str) -> Option<f32> {
    COVALENT_RADII.get(element).copied()
}

/// Looks up the volume of an atom in a (normalized) residue.
pub fn volume(residue: &str, atom_name: &str) -> Option<f32> {
    let atoms = RESIDUE_VOLUMES.get(residue)?;
    atoms
        .iter()
        .find(|(name, _)| *name == atom_name)
        .map(|&(_, volume)| volume)
        .or_else(|| BACKBONE_VOLUMES.get(atom_name).copied())
}
