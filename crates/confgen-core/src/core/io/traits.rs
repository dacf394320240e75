use crate::core::models::conformer::Conformer;
use crate::core::models::molecule::Molecule;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Common API for multi-record molecular file formats.
///
/// A file holds a sequence of records; writing takes one molecular graph and an ensemble of
/// conformers of that graph.
pub trait MolecularFile {
    /// The type produced for each record read.
    type Record;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every record from a buffered reader.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Self::Record>, Self::Error>;

    /// Writes an ensemble of conformers of `molecule`, one record per conformer, in order.
    fn write_to(
        molecule: &Molecule,
        conformers: &[Conformer],
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Self::Record>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(
        molecule: &Molecule,
        conformers: &[Conformer],
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(molecule, conformers, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
