//! Parser for the fixed-column GROMACS topology (`.gro`) format.
//!
//! A file starts with a title line and the number of atom records, followed by one record per
//! atom and a final line with the box vectors. Records are laid out in fixed byte columns:
//!
//! | columns  | field                  |
//! |----------|------------------------|
//! | `0..5`   | residue sequence number |
//! | `5..10`  | residue name           |
//! | `10..15` | atom name              |
//! | `15..20` | atom id                |
//! | `20..28` | x (nm)                 |
//! | `28..36` | y (nm)                 |
//! | `36..44` | z (nm)                 |
//!
//! Solvent and ions are dropped, and ligand (`DRG`) residues are collected separately.
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use glam::{Mat3, Vec3};

use crate::error::{Error, Result};
use crate::model::Atom;
use crate::BoxVec;

pub mod tables;

pub use tables::is_solvent;

/// Nanometers to Ångström.
pub const NM_TO_ANGSTROM: f32 = 10.0;

/// Atom ids in the id column wrap around after this many atoms.
const ID_MODULUS: u32 = 100_000;

/// A parsed topology.
#[derive(Debug, Default, Clone)]
pub struct Topology {
    pub title: String,
    /// The atoms of the molecule, in file order.
    pub atoms: Vec<Atom>,
    /// The ligand atoms, keyed by their residue sequence number.
    pub drugs: BTreeMap<u32, Vec<Atom>>,
    /// The number of records in the file, including the ones that were filtered out. This is the
    /// number of atoms every trajectory frame must hold.
    pub total_atoms: usize,
    /// Box vectors in Ångström, if the file provides them.
    pub boxvec: Option<BoxVec>,
}

/// Where a record ends up after classification.
#[derive(Debug, Clone, PartialEq)]
enum Record {
    Solvent,
    Molecule(Atom),
    Drug(Atom),
}

impl Topology {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let mut next_line = |line: usize, what: &str| -> Result<String> {
            match lines.next() {
                Some(line) => Ok(line?),
                None => Err(Error::malformed(line, format!("unexpected end of file, expected {what}"))),
            }
        };

        let title = next_line(1, "a title")?.trim().to_string();
        let count = next_line(2, "the number of atoms")?;
        let total_atoms: usize = count
            .trim()
            .parse()
            .map_err(|err| Error::malformed(2, format!("invalid number of atoms {count:?}: {err}")))?;

        let mut topology = Topology {
            title,
            total_atoms,
            ..Self::default()
        };
        let mut warnings = VolumeWarnings::default();
        for index in 0..total_atoms {
            let lineno = index + 3;
            let line = next_line(lineno, "an atom record")?;
            let record = parse_record(&line, index).map_err(|details| Error::malformed(lineno, details))?;
            match classify(record, &mut warnings) {
                Record::Solvent => {}
                Record::Molecule(atom) => topology.atoms.push(atom),
                Record::Drug(atom) => topology.drugs.entry(atom.residue_id).or_default().push(atom),
            }
        }

        let lineno = total_atoms + 3;
        topology.boxvec = match lines.next().transpose()? {
            Some(line) if !line.trim().is_empty() => Some(
                parse_boxvec(&line).map_err(|details| Error::malformed(lineno, details))?,
            ),
            _ => None,
        };

        log::info!(
            "read topology '{}': {} atoms, {} kept, {} ligand residues",
            topology.title,
            topology.total_atoms,
            topology.atoms.len(),
            topology.drugs.len()
        );

        Ok(topology)
    }

    pub fn drug_atom_count(&self) -> usize {
        self.drugs.values().map(Vec::len).sum()
    }
}

/// The raw contents of one atom record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: u32,
    pub residue_id: u32,
    pub residue_name: String,
    pub atom_name: String,
    /// In nanometers.
    pub position: Vec3,
}

fn column<'l>(line: &'l str, range: std::ops::Range<usize>, what: &str) -> std::result::Result<&'l str, String> {
    line.get(range.clone())
        .map(str::trim)
        .ok_or_else(|| format!("line is too short to hold the {what} at columns {range:?}"))
}

fn number<T: std::str::FromStr>(value: &str, what: &str) -> std::result::Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| format!("invalid {what} {value:?}: {err}"))
}

/// Parses the fixed-column atom record at `index` (zero-based, counting records only).
///
/// The id column must agree with the position of the record, since ids are dense and map directly
/// onto trajectory frames.
pub fn parse_record(line: &str, index: usize) -> std::result::Result<RawRecord, String> {
    let residue_id = number(column(line, 0..5, "residue number")?, "residue number")?;
    let residue_name = column(line, 5..10, "residue name")?.to_string();
    let atom_name = column(line, 10..15, "atom name")?.to_string();
    let file_id: u32 = number(column(line, 15..20, "atom id")?, "atom id")?;
    let x: f32 = number(column(line, 20..28, "x coordinate")?, "x coordinate")?;
    let y: f32 = number(column(line, 28..36, "y coordinate")?, "y coordinate")?;
    let z: f32 = number(column(line, 36..44, "z coordinate")?, "z coordinate")?;

    let id = u32::try_from(index + 1).map_err(|_| "too many atoms".to_string())?;
    if file_id != id % ID_MODULUS {
        return Err(format!("atom id {file_id} does not match its position (atom {id})"));
    }
    if residue_name.is_empty() || atom_name.is_empty() {
        return Err("empty residue or atom name".to_string());
    }

    Ok(RawRecord {
        id,
        residue_id,
        residue_name,
        atom_name,
        position: Vec3::new(x, y, z),
    })
}

/// Normalizes residue names to their three-letter form.
///
/// Protonation variants of cysteine become `CYS`, terminal caps (`NALA`, `CLYS`) lose their prefix,
/// and other four-letter names (`HISE`, `LYSH`) are truncated.
pub fn normalize_residue(name: &str) -> String {
    match name {
        "CYSH" | "CYS2" => "CYS".to_string(),
        _ if name.len() == 4 && name.is_ascii() => match name.as_bytes()[0] {
            b'N' | b'C' => name[1..].to_string(),
            _ => name[..3].to_string(),
        },
        _ => name.to_string(),
    }
}

/// Derives the element symbol from an atom name.
///
/// Leading digits are skipped (`1HB`). For ligands, two-letter elements (`CL1`, `BR`) are tried
/// first, since protein atom names such as `CA` refer to carbons.
pub fn element_of(atom_name: &str, hetero: bool) -> Option<String> {
    let letters: String = atom_name
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if hetero && letters.len() >= 2 && tables::covalent_radius(&letters[..2]).is_some() {
        return Some(letters[..2].to_string());
    }
    let first = letters.get(..1)?;
    tables::covalent_radius(first).map(|_| first.to_string())
}

/// Remembers which volume gaps have been reported, so each is only logged once.
#[derive(Debug, Default)]
struct VolumeWarnings(HashSet<(String, String)>);

impl VolumeWarnings {
    fn warn(&mut self, residue: &str, atom_name: &str) {
        if self.0.insert((residue.to_string(), atom_name.to_string())) {
            log::warn!("no volume known for atom {atom_name} in residue {residue}, using 0");
        }
    }
}

fn classify(record: RawRecord, warnings: &mut VolumeWarnings) -> Record {
    if is_solvent(&record.residue_name) {
        return Record::Solvent;
    }
    let hetero = record.residue_name == tables::DRUG_RESIDUE;
    let residue_type = if hetero {
        record.residue_name
    } else {
        normalize_residue(&record.residue_name)
    };

    let element = element_of(&record.atom_name, hetero);
    let covalent_radius = match element.as_deref().and_then(tables::covalent_radius) {
        Some(radius) => radius,
        None => {
            log::warn!(
                "could not determine the element of atom {} ({}), assuming {}",
                record.atom_name,
                record.id,
                tables::DEFAULT_ELEMENT
            );
            tables::covalent_radius(tables::DEFAULT_ELEMENT).unwrap_or_default()
        }
    };

    let volume = match tables::volume(&residue_type, &record.atom_name) {
        Some(volume) => volume,
        None => {
            warnings.warn(&residue_type, &record.atom_name);
            0.0
        }
    };

    let atom = Atom {
        id: record.id,
        residue_id: record.residue_id,
        name: record.atom_name,
        residue_type,
        covalent_radius,
        volume,
        position: record.position * NM_TO_ANGSTROM,
    };
    if hetero {
        Record::Drug(atom)
    } else {
        Record::Molecule(atom)
    }
}

/// Parses the box line, which holds either three (rectangular) or nine (triclinic) values.
///
/// The triclinic order is `v1(x) v2(y) v3(z) v1(y) v1(z) v2(x) v2(z) v3(x) v3(y)`.
fn parse_boxvec(line: &str) -> std::result::Result<BoxVec, String> {
    let values = line
        .split_whitespace()
        .map(|v| number::<f32>(v, "box vector component"))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let v = |i: usize| values[i] * NM_TO_ANGSTROM;
    match values.len() {
        3 => Ok(Mat3::from_diagonal(Vec3::new(v(0), v(1), v(2)))),
        9 => Ok(Mat3::from_cols(
            Vec3::new(v(0), v(3), v(4)),
            Vec3::new(v(5), v(1), v(6)),
            Vec3::new(v(7), v(8), v(2)),
        )),
        n => Err(format!("expected 3 or 9 box vector components, found {n}")),
    }
}
