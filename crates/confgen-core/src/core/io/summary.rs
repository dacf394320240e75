use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters of the torsion enumeration stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotatedCounts {
    pub total: usize,
    pub unique: usize,
}

/// Counters of one refinement engine pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementCounts {
    pub engine: String,
    pub initial: usize,
    pub energy_duplicates: usize,
    pub rmsd_duplicates: usize,
    pub rejected: usize,
    pub unique: usize,
}

/// One molecule's line of the summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub molecule: String,
    pub initial_samples: usize,
    pub prefilter_duplicates: usize,
    pub geometry_duplicates: usize,
    pub unique_conformers: usize,
    /// `None` when the molecule was not enumerated.
    pub rotated: Option<RotatedCounts>,
    pub refinements: Vec<RefinementCounts>,
    pub elapsed_seconds: f64,
    pub overall_charge: i32,
}

impl SummaryRow {
    pub fn refinement(&self, engine: &str) -> Option<&RefinementCounts> {
        self.refinements.iter().find(|r| r.engine == engine)
    }
}

/// Per-molecule counters collected over a batch and written as CSV.
///
/// Columns are derived from the rows: rotated-conformer columns appear when any row was
/// enumerated, and one block of columns appears per refinement engine, in first-seen order.
/// Rows lacking a stage get empty cells.
#[derive(Debug, Default, Clone)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: SummaryRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn has_rotated(&self) -> bool {
        self.rows.iter().any(|r| r.rotated.is_some())
    }

    fn engines(&self) -> Vec<&str> {
        let mut engines: Vec<&str> = Vec::new();
        for refinement in self.rows.iter().flat_map(|r| &r.refinements) {
            if !engines.contains(&refinement.engine.as_str()) {
                engines.push(&refinement.engine);
            }
        }
        engines
    }

    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = [
            "Molecule",
            "Initial-samples",
            "Energy-duplicates",
            "RMSD-and-energy-duplicates",
            "Unique-conformers",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if self.has_rotated() {
            header.push("Rotated-conformers".to_string());
            header.push("Rotated-unique-conformers".to_string());
        }
        for engine in self.engines() {
            for column in [
                "Initial-samples",
                "Energy-duplicates",
                "RMSD-and-energy-duplicates",
                "Rejected",
                "Unique-conformers",
            ] {
                header.push(format!("{engine}-{column}"));
            }
        }
        header.push("time (seconds)".to_string());
        header.push("Overall charge".to_string());
        header
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), SummaryError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.header())?;

        let has_rotated = self.has_rotated();
        let engines = self.engines();
        for row in &self.rows {
            let mut record = vec![
                row.molecule.clone(),
                row.initial_samples.to_string(),
                row.prefilter_duplicates.to_string(),
                row.geometry_duplicates.to_string(),
                row.unique_conformers.to_string(),
            ];
            if has_rotated {
                match row.rotated {
                    Some(rotated) => {
                        record.push(rotated.total.to_string());
                        record.push(rotated.unique.to_string());
                    }
                    None => record.extend([String::new(), String::new()]),
                }
            }
            for engine in &engines {
                match row.refinement(engine) {
                    Some(r) => record.extend([
                        r.initial.to_string(),
                        r.energy_duplicates.to_string(),
                        r.rmsd_duplicates.to_string(),
                        r.rejected.to_string(),
                        r.unique.to_string(),
                    ]),
                    None => record.extend(std::iter::repeat_n(String::new(), 5)),
                }
            }
            record.push(format!("{:.2}", row.elapsed_seconds));
            record.push(row.overall_charge.to_string());
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_to_path(&self, path: &std::path::Path) -> Result<(), SummaryError> {
        let file = std::fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file))
    }
}
