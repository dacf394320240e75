use super::traits::MolecularFile;
use crate::core::models::anchor::AnchorMap;
use crate::core::models::atom::{Atom, Element};
use crate::core::models::conformer::{Conformer, Geometry};
use crate::core::models::molecule::{Molecule, MoleculeError};
use crate::core::models::topology::{Bond, BondOrder};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Data item holding a conformer's energy in kcal/mol.
pub const ENERGY_PROPERTY: &str = "Energy";
/// Data item holding the optimizer's convergence flag, written for refined conformers.
pub const CONVERGED_PROPERTY: &str = "Converged";
/// Data item pinning atoms to template coordinates, one `<atom number> <x> <y> <z>` line each.
pub const TEMPLATE_PROPERTY: &str = "Template";

const PROGRAM_LINE: &str = "  confgen    3D";
const MAX_CHARGES_PER_LINE: usize = 8;

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid molecular graph in record {record}: {source}")]
    InvalidMolecule {
        record: usize,
        #[source]
        source: MoleculeError,
    },

    #[error("Conformer has {actual} coordinates but molecule '{molecule}' has {expected} atoms")]
    AtomCountMismatch {
        molecule: String,
        expected: usize,
        actual: usize,
    },
}

impl SdfError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// One record of an SD file: the molecular graph, its coordinates and its data items.
#[derive(Debug, Clone)]
pub struct SdfRecord {
    pub molecule: Molecule,
    pub geometry: Geometry,
    pub properties: Vec<(String, String)>,
    /// Template coordinates from the [`TEMPLATE_PROPERTY`] data item.
    pub anchors: Option<AnchorMap>,
}

impl SdfRecord {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn energy(&self) -> Option<f64> {
        self.property(ENERGY_PROPERTY)
            .and_then(|v| v.trim().parse().ok())
    }
}

/// MDL V2000 SD files.
pub struct SdfFile;

impl MolecularFile for SdfFile {
    type Record = SdfRecord;
    type Error = SdfError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<SdfRecord>, SdfError> {
        let mut records = Vec::new();
        let mut block: Vec<(usize, String)> = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let content = line?;
            if content.trim() == "$$$$" {
                if !block.is_empty() {
                    records.push(parse_record(&block, records.len())?);
                    block.clear();
                }
                continue;
            }
            block.push((i + 1, content));
        }
        if block.iter().any(|(_, l)| !l.trim().is_empty()) {
            records.push(parse_record(&block, records.len())?);
        }
        Ok(records)
    }

    fn write_to(
        molecule: &Molecule,
        conformers: &[Conformer],
        writer: &mut impl Write,
    ) -> Result<(), SdfError> {
        for conformer in conformers {
            write_conformer(writer, molecule, conformer)?;
        }
        Ok(())
    }
}

/// Streams conformers of one molecule into an SD file as they are produced.
pub struct SdfWriter<'m, W: Write> {
    molecule: &'m Molecule,
    writer: W,
    written: usize,
}

impl<'m, W: Write> SdfWriter<'m, W> {
    pub fn new(molecule: &'m Molecule, writer: W) -> Self {
        Self {
            molecule,
            writer,
            written: 0,
        }
    }

    pub fn write(&mut self, conformer: &Conformer) -> Result<(), SdfError> {
        write_conformer(&mut self.writer, self.molecule, conformer)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<W, SdfError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn write_conformer(
    writer: &mut impl Write,
    molecule: &Molecule,
    conformer: &Conformer,
) -> Result<(), SdfError> {
    let mut properties = vec![(ENERGY_PROPERTY, conformer.energy.to_string())];
    if let Some(converged) = conformer.converged {
        properties.push((CONVERGED_PROPERTY, converged.to_string()));
    }
    let title = conformer.name.as_deref().unwrap_or(molecule.name());
    write_record(writer, molecule, &conformer.geometry, title, &properties)
}

/// Writes one V2000 record terminated by `$$$$`.
pub fn write_record(
    writer: &mut impl Write,
    molecule: &Molecule,
    geometry: &[Point3<f64>],
    title: &str,
    properties: &[(&str, String)],
) -> Result<(), SdfError> {
    if geometry.len() != molecule.atom_count() {
        return Err(SdfError::AtomCountMismatch {
            molecule: molecule.name().to_string(),
            expected: molecule.atom_count(),
            actual: geometry.len(),
        });
    }

    writeln!(writer, "{title}")?;
    writeln!(writer, "{PROGRAM_LINE}")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
        molecule.atom_count(),
        molecule.bonds().len()
    )?;
    for (atom, position) in molecule.atoms().iter().zip(geometry) {
        writeln!(
            writer,
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0",
            position.x,
            position.y,
            position.z,
            atom.element.symbol()
        )?;
    }
    for bond in molecule.bonds() {
        writeln!(
            writer,
            "{:>3}{:>3}{:>3}  0",
            bond.atom1 + 1,
            bond.atom2 + 1,
            bond.order.mdl_code()
        )?;
    }

    let charged: Vec<(usize, i8)> = molecule
        .atoms()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.formal_charge != 0)
        .map(|(i, a)| (i + 1, a.formal_charge))
        .collect();
    for chunk in charged.chunks(MAX_CHARGES_PER_LINE) {
        write!(writer, "M  CHG{:>3}", chunk.len())?;
        for (atom, charge) in chunk {
            write!(writer, "{atom:>4}{charge:>4}")?;
        }
        writeln!(writer)?;
    }
    writeln!(writer, "M  END")?;

    for (key, value) in properties {
        writeln!(writer, ">  <{key}>")?;
        writeln!(writer, "{value}")?;
        writeln!(writer)?;
    }
    writeln!(writer, "$$$$")?;
    Ok(())
}

fn parse_record(lines: &[(usize, String)], index: usize) -> Result<SdfRecord, SdfError> {
    let first_line = lines.first().map(|(ln, _)| *ln).unwrap_or(1);
    if lines.len() < 4 {
        return Err(SdfError::parse(
            first_line,
            "record must contain a header block and a counts line",
        ));
    }
    let (counts_ln, counts_line) = (&lines[3].0, &lines[3].1);
    if counts_line.contains("V3000") {
        return Err(SdfError::parse(*counts_ln, "V3000 connection tables are not supported"));
    }
    let (atom_count, bond_count) = parse_counts(counts_line, *counts_ln)?;
    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    let block_end = bond_start + bond_count;
    if lines.len() < block_end {
        return Err(SdfError::parse(
            lines.last().map(|(ln, _)| *ln).unwrap_or(*counts_ln),
            "record ended before atoms and bonds were fully specified",
        ));
    }

    let (mut atoms, geometry) = parse_atoms(&lines[atom_start..bond_start])?;
    let bonds = parse_bonds(&lines[bond_start..block_end], atom_count)?;

    let mut cursor = block_end;
    let mut charges_reset = false;
    while cursor < lines.len() {
        let (ln, line) = &lines[cursor];
        cursor += 1;
        if line.starts_with("M  END") {
            break;
        }
        if line.starts_with("M  CHG") {
            // Charge property lines supersede atom-block charges.
            if !charges_reset {
                atoms.iter_mut().for_each(|a| a.formal_charge = 0);
                charges_reset = true;
            }
            apply_charge_line(line, *ln, &mut atoms)?;
        }
    }

    let mut properties = Vec::new();
    let mut anchors = None;
    while cursor < lines.len() {
        let (ln, line) = &lines[cursor];
        cursor += 1;
        let Some(key) = data_item_key(line) else {
            continue;
        };
        let start = cursor;
        while cursor < lines.len() && !lines[cursor].1.trim().is_empty() {
            cursor += 1;
        }
        let values = &lines[start..cursor];
        if key == TEMPLATE_PROPERTY {
            anchors = Some(parse_template(values, *ln, atoms.len())?);
        }
        let joined: Vec<&str> = values.iter().map(|(_, v)| v.trim_end()).collect();
        properties.push((key, joined.join("\n")));
    }

    infer_implicit_hydrogens(&mut atoms, &bonds);
    let title = lines[0].1.trim();
    let name = if title.is_empty() {
        format!("molecule_{}", index + 1)
    } else {
        title.to_string()
    };
    let molecule = Molecule::new(&name, atoms, bonds).map_err(|source| {
        SdfError::InvalidMolecule {
            record: index + 1,
            source,
        }
    })?;
    Ok(SdfRecord {
        molecule,
        geometry,
        properties,
        anchors,
    })
}

fn parse_template(
    lines: &[(usize, String)],
    header_line: usize,
    atom_count: usize,
) -> Result<AnchorMap, SdfError> {
    if lines.is_empty() {
        return Err(SdfError::parse(header_line, "template data item has no entries"));
    }
    let mut anchors = AnchorMap::new();
    for (ln, line) in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [atom, x, y, z] = tokens.as_slice() else {
            return Err(SdfError::parse(
                *ln,
                "template entry must be '<atom number> <x> <y> <z>'",
            ));
        };
        let atom: usize = atom
            .parse()
            .ok()
            .filter(|&a| a >= 1 && a <= atom_count)
            .ok_or_else(|| SdfError::parse(*ln, "template references an unknown atom"))?;
        let coordinate = |field: &str| {
            field
                .parse::<f64>()
                .map_err(|_| SdfError::parse(*ln, format!("invalid template coordinate '{field}'")))
        };
        anchors.insert(atom - 1, Point3::new(coordinate(x)?, coordinate(y)?, coordinate(z)?));
    }
    Ok(anchors)
}

fn fixed_field<T: std::str::FromStr>(line: &str, start: usize, end: usize) -> Option<T> {
    line.get(start..end.min(line.len()))
        .and_then(|f| f.trim().parse().ok())
}

fn parse_counts(line: &str, line_no: usize) -> Result<(usize, usize), SdfError> {
    if let (Some(atoms), Some(bonds)) = (fixed_field(line, 0, 3), fixed_field(line, 3, 6)) {
        return Ok((atoms, bonds));
    }
    let tokens: Vec<_> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(SdfError::parse(
            line_no,
            "counts line must contain atom and bond counts",
        ));
    }
    let atoms = tokens[0]
        .parse()
        .map_err(|_| SdfError::parse(line_no, "invalid atom count"))?;
    let bonds = tokens[1]
        .parse()
        .map_err(|_| SdfError::parse(line_no, "invalid bond count"))?;
    Ok((atoms, bonds))
}

fn parse_atoms(lines: &[(usize, String)]) -> Result<(Vec<Atom>, Geometry), SdfError> {
    let mut atoms = Vec::with_capacity(lines.len());
    let mut geometry = Vec::with_capacity(lines.len());
    for (ln, raw) in lines {
        let padded = format!("{raw:<69}");
        let coordinate = |start: usize, axis: &str| -> Result<f64, SdfError> {
            fixed_field(&padded, start, start + 10)
                .ok_or_else(|| SdfError::parse(*ln, format!("invalid {axis} coordinate in atom line")))
        };
        let position = Point3::new(coordinate(0, "x")?, coordinate(10, "y")?, coordinate(20, "z")?);
        let symbol = padded.get(31..34).map(str::trim).unwrap_or_default();
        let element: Element = symbol
            .parse()
            .map_err(|_| SdfError::parse(*ln, format!("unknown element symbol '{symbol}'")))?;
        let charge_code: u8 = fixed_field(&padded, 36, 39).unwrap_or(0);
        atoms.push(Atom::new(element).with_charge(charge_from_code(charge_code)));
        geometry.push(position);
    }
    Ok((atoms, geometry))
}

fn charge_from_code(code: u8) -> i8 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

fn parse_bonds(lines: &[(usize, String)], atom_count: usize) -> Result<Vec<Bond>, SdfError> {
    let mut bonds = Vec::with_capacity(lines.len());
    for (ln, raw) in lines {
        let fields: Option<(usize, usize, u8)> = match (
            fixed_field(raw, 0, 3),
            fixed_field(raw, 3, 6),
            fixed_field(raw, 6, 9),
        ) {
            (Some(a), Some(b), Some(o)) => Some((a, b, o)),
            _ => {
                let tokens: Vec<_> = raw.split_whitespace().collect();
                match tokens.as_slice() {
                    [a, b, o, ..] => a
                        .parse()
                        .ok()
                        .zip(b.parse().ok())
                        .zip(o.parse().ok())
                        .map(|((a, b), o)| (a, b, o)),
                    _ => None,
                }
            }
        };
        let (a1, a2, code) = fields.ok_or_else(|| SdfError::parse(*ln, "invalid bond line"))?;
        if a1 == 0 || a2 == 0 || a1 > atom_count || a2 > atom_count {
            return Err(SdfError::parse(
                *ln,
                "bond references atom outside declared range",
            ));
        }
        let order: BondOrder = code
            .to_string()
            .parse()
            .map_err(|_| SdfError::parse(*ln, format!("unsupported bond type {code}")))?;
        bonds.push(Bond::new(a1 - 1, a2 - 1, order));
    }
    Ok(bonds)
}

fn apply_charge_line(line: &str, line_no: usize, atoms: &mut [Atom]) -> Result<(), SdfError> {
    let values: Vec<i64> = line
        .split_whitespace()
        .skip(2)
        .map(|t| t.parse::<i64>())
        .collect::<Result<_, _>>()
        .map_err(|_| SdfError::parse(line_no, "invalid M  CHG entry"))?;
    let Some((&count, pairs)) = values.split_first() else {
        return Err(SdfError::parse(line_no, "M  CHG line without entries"));
    };
    if count < 0 || pairs.len() < 2 * count as usize {
        return Err(SdfError::parse(line_no, "M  CHG entry count does not match its pairs"));
    }
    for pair in pairs.chunks(2).take(count as usize) {
        let atom = usize::try_from(pair[0] - 1)
            .ok()
            .filter(|&a| a < atoms.len())
            .ok_or_else(|| SdfError::parse(line_no, "M  CHG references an unknown atom"))?;
        atoms[atom].formal_charge = i8::try_from(pair[1])
            .map_err(|_| SdfError::parse(line_no, "M  CHG charge out of range"))?;
    }
    Ok(())
}

fn data_item_key(line: &str) -> Option<String> {
    if !line.starts_with('>') {
        return None;
    }
    let start = line.find('<')? + 1;
    let end = start + line[start..].find('>')?;
    Some(line[start..end].to_string())
}

/// Fills in implicit hydrogens from default valences, aromatic bonds counting as 1.5.
fn infer_implicit_hydrogens(atoms: &mut [Atom], bonds: &[Bond]) {
    let mut valence_used = vec![0.0f64; atoms.len()];
    for bond in bonds {
        let order = match bond.order {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        };
        valence_used[bond.atom1] += order;
        valence_used[bond.atom2] += order;
    }
    for (atom, used) in atoms.iter_mut().zip(valence_used) {
        let charge = i32::from(atom.formal_charge);
        let target = match atom.element.atomic_number() {
            5 => 3 - charge,
            6 => 4 - charge.abs(),
            7 | 15 => 3 + charge,
            8 | 16 => 2 + charge,
            9 | 17 | 35 | 53 => 1 + charge,
            _ => 0,
        };
        let missing = target - used.round() as i32;
        atom.implicit_hydrogens = missing.clamp(0, 4) as u8;
    }
}
