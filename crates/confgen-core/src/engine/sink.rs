use super::error::EngineError;
use crate::core::io::sdf::{SdfError, SdfWriter};
use crate::core::models::conformer::Conformer;
use crate::core::models::molecule::Molecule;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Receives conformers one at a time as a stage produces them.
pub trait ConformerSink {
    fn accept(&mut self, conformer: Conformer) -> Result<(), EngineError>;
}

impl ConformerSink for Vec<Conformer> {
    fn accept(&mut self, conformer: Conformer) -> Result<(), EngineError> {
        self.push(conformer);
        Ok(())
    }
}

impl<S: ConformerSink + ?Sized> ConformerSink for &mut S {
    fn accept(&mut self, conformer: Conformer) -> Result<(), EngineError> {
        (**self).accept(conformer)
    }
}

/// Tee: every conformer goes to both sinks, in order.
impl<A: ConformerSink, B: ConformerSink> ConformerSink for (A, B) {
    fn accept(&mut self, conformer: Conformer) -> Result<(), EngineError> {
        self.0.accept(conformer.clone())?;
        self.1.accept(conformer)
    }
}

/// An SD file on disk that conformers are appended to as they arrive.
pub struct EnsembleWriter<'m> {
    path: PathBuf,
    writer: SdfWriter<'m, BufWriter<File>>,
}

impl<'m> EnsembleWriter<'m> {
    pub fn create(path: &Path, molecule: &'m Molecule) -> Result<Self, EngineError> {
        let file = File::create(path).map_err(|e| EngineError::Output {
            path: path.to_path_buf(),
            source: SdfError::Io(e),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: SdfWriter::new(molecule, BufWriter::new(file)),
        })
    }

    /// Writes a whole ensemble to `path` in the given order.
    pub fn write_all(
        path: &Path,
        molecule: &'m Molecule,
        conformers: &[Conformer],
    ) -> Result<usize, EngineError> {
        let mut writer = Self::create(path, molecule)?;
        for conformer in conformers {
            writer.accept(conformer.clone())?;
        }
        writer.finish()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes the file and returns the number of records written.
    pub fn finish(self) -> Result<usize, EngineError> {
        let written = self.writer.written();
        let path = self.path;
        self.writer
            .finish()
            .map_err(|source| EngineError::Output { path, source })?;
        Ok(written)
    }
}

impl ConformerSink for EnsembleWriter<'_> {
    fn accept(&mut self, conformer: Conformer) -> Result<(), EngineError> {
        self.writer
            .write(&conformer)
            .map_err(|source| EngineError::Output {
                path: self.path.clone(),
                source,
            })
    }
}
